//! Command-line front end for reval_core
//!
//! Loads scenarios from YAML, runs analyses on a background worker and renders
//! the results as text tables, JSON or YAML.

// ============================================================================
// Application modules
// ============================================================================

pub mod commands;
pub mod report;
pub mod worker;

// ============================================================================
// Persistence and logging
// ============================================================================

pub mod io;
pub mod logging;
pub mod storage;

pub use logging::init_logging;
pub use report::OutputFormat;
pub use storage::{DataDirectory, StorageError};
pub use worker::{AnalysisOutcome, AnalysisRequest, AnalysisResponse, AnalysisWorker};
