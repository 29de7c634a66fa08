//! Sensitivity analysis: one- and two-way sweeps over input variables.
//!
//! Sweeps are deterministic. Each grid point is an independent clone of the
//! base scenario, so points can be evaluated in parallel without changing the
//! result layout.

mod config;
mod evaluator;
mod tornado;

pub use config::{Range, SensitivityConfig, SweepGrid};
pub use evaluator::{SensitivityResult, SweepRun, sweep};
pub use tornado::{TornadoBar, tornado};
