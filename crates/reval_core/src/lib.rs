//! Scenario analysis and optimization for real-estate investment models
//!
//! This crate drives a deterministic valuation model (anything implementing
//! [`Valuation`]) through:
//! - Goal-seek: the input value at which a KPI hits a target
//! - One- and two-way sensitivity sweeps, plus tornado ranking
//! - Correlated Monte Carlo simulation with risk statistics
//! - Stress / base / upside triads and side-by-side scenario comparison
//!
//! Every engine works on clones of the base scenario; the caller's
//! [`ScenarioConfig`] is never modified.
//!
//! # Builder DSL
//!
//! ```ignore
//! use reval_core::{ProForma, ScenarioBuilder, SolverConfig, TargetKpi, InputVariable, solve};
//!
//! let scenario = ScenarioBuilder::new()
//!     .hotel("Harbor Hotel", 100, 200.0, 0.70)
//!     .initial_investment(20_000_000.0)
//!     .senior_debt(10_000_000.0, 0.06, 25)
//!     .discount_rate(0.10)
//!     .build();
//!
//! let config = SolverConfig::new(TargetKpi::Npv, 0.0, InputVariable::RoomRate);
//! let break_even_adr = solve(&ProForma, &scenario, &config)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Analysis engines
// ============================================================================

pub mod goal_seek;
pub mod monte_carlo;
pub mod scenarios;
pub mod sensitivity;

// ============================================================================
// Shared plumbing
// ============================================================================

pub mod error;
pub mod invoker;
pub mod progress;
pub mod valuation;
pub mod variables;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::ScenarioBuilder;
pub use error::{AnalysisError, ConfigError, CorrelationError, ModelEvaluationError, TrialContext};
pub use goal_seek::{GoalSeekResult, SolverConfig, goal_seek, solve};
pub use model::{KpiSnapshot, ModelOutput, OperationId, ScenarioConfig, TargetKpi};
pub use monte_carlo::{CorrelationMatrix, Marginal, SimulationConfig, SimulationResult, simulate};
pub use progress::AnalysisProgress;
pub use scenarios::{NamedScenario, ScenarioVariant, Shock, compare_scenarios, run_triad, run_variants};
pub use sensitivity::{Range, SensitivityConfig, SensitivityResult, sweep, tornado};
pub use valuation::{ProForma, Valuation};
pub use variables::InputVariable;
