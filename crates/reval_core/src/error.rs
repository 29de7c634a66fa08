use std::fmt;

use crate::model::{OperationId, TargetKpi};
use crate::variables::InputVariable;

/// Failure raised by the valuation pipeline for a structurally invalid scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluationError {
    pub message: String,
}

impl ModelEvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelEvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "valuation failed: {}", self.message)
    }
}

impl std::error::Error for ModelEvaluationError {}

/// Which trial produced an error, and with what inputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialContext {
    /// Trial or iteration index within the analysis; `None` for the base case
    pub trial: Option<usize>,
    pub inputs: Vec<(InputVariable, f64)>,
}

impl TrialContext {
    #[must_use]
    pub fn base() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trial(index: usize, inputs: Vec<(InputVariable, f64)>) -> Self {
        Self {
            trial: Some(index),
            inputs,
        }
    }
}

impl fmt::Display for TrialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trial {
            Some(i) => write!(f, "trial {i}")?,
            None => write!(f, "base case")?,
        }
        if !self.inputs.is_empty() {
            write!(f, " (")?;
            for (n, (variable, value)) in self.inputs.iter().enumerate() {
                if n > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{variable}={value}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Problems with the analysis request itself. Raised before any model evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidBounds {
        variable: InputVariable,
        min: f64,
        max: f64,
    },
    InvalidRange {
        variable: InputVariable,
        reason: &'static str,
    },
    OperationNotFound(OperationId),
    /// The addressed operation(s) carry no field for this variable
    NotApplicable {
        variable: InputVariable,
        operation: Option<OperationId>,
    },
    NoDebtTranche {
        variable: InputVariable,
    },
    OutOfDomain {
        variable: InputVariable,
        value: f64,
        min: f64,
        max: f64,
    },
    InvalidDistribution {
        variable: InputVariable,
        reason: String,
    },
    /// The target KPI does not move across the search bracket
    Insensitive {
        variable: InputVariable,
        kpi: TargetKpi,
        min: f64,
        max: f64,
    },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBounds { variable, min, max } => {
                write!(f, "invalid bounds for {variable}: min ({min}) must be below max ({max})")
            }
            ConfigError::InvalidRange { variable, reason } => {
                write!(f, "invalid range for {variable}: {reason}")
            }
            ConfigError::OperationNotFound(id) => write!(f, "operation {} not found", id.0),
            ConfigError::NotApplicable {
                variable,
                operation: Some(id),
            } => write!(f, "operation {} has no {variable} to vary", id.0),
            ConfigError::NotApplicable {
                variable,
                operation: None,
            } => write!(f, "scenario has no operation with a {variable} to vary"),
            ConfigError::NoDebtTranche { variable } => {
                write!(f, "{variable} requires at least one debt tranche")
            }
            ConfigError::OutOfDomain {
                variable,
                value,
                min,
                max,
            } => write!(f, "{variable} value {value} is outside [{min}, {max}]"),
            ConfigError::InvalidDistribution { variable, reason } => {
                write!(f, "invalid distribution for {variable}: {reason}")
            }
            ConfigError::Insensitive {
                variable,
                kpi,
                min,
                max,
            } => write!(
                f,
                "{kpi} does not change when {variable} moves between {min} and {max}"
            ),
            ConfigError::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors related to correlation matrix construction and decomposition
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationError {
    NotSquare { rows: usize, row: usize, len: usize },
    VariableCountMismatch { variables: usize, rows: usize },
    DuplicateVariable(InputVariable),
    NotSymmetric { i: usize, j: usize },
    InvalidDiagonal { index: usize, value: f64 },
    OutOfRange { i: usize, j: usize, value: f64 },
    NotPositiveDefinite,
    UnknownVariable(InputVariable),
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::NotSquare { rows, row, len } => write!(
                f,
                "correlation matrix is not square: row {row} has {len} entries, expected {rows}"
            ),
            CorrelationError::VariableCountMismatch { variables, rows } => write!(
                f,
                "correlation matrix has {rows} rows but {variables} variables"
            ),
            CorrelationError::DuplicateVariable(v) => {
                write!(f, "variable {v} appears twice in the correlation matrix")
            }
            CorrelationError::NotSymmetric { i, j } => {
                write!(f, "correlation matrix is not symmetric at ({i}, {j})")
            }
            CorrelationError::InvalidDiagonal { index, value } => {
                write!(f, "diagonal element {index} is {value}, expected 1")
            }
            CorrelationError::OutOfRange { i, j, value } => {
                write!(f, "correlation at ({i}, {j}) is {value}, must be in [-1, 1]")
            }
            CorrelationError::NotPositiveDefinite => {
                write!(f, "correlation matrix is not positive definite")
            }
            CorrelationError::UnknownVariable(v) => {
                write!(f, "correlation matrix names {v}, which is not simulated")
            }
        }
    }
}

impl std::error::Error for CorrelationError {}

/// Top-level error for every analysis engine
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    Config(ConfigError),
    /// The valuation pipeline failed on one trial; the whole analysis is aborted
    Evaluation {
        context: TrialContext,
        source: ModelEvaluationError,
    },
    /// Solver exhausted its iteration budget
    NonConvergence {
        variable: InputVariable,
        iterations: usize,
        low: f64,
        high: f64,
        last_error: f64,
    },
    /// Target lies outside the KPI values at both ends of the bracket
    TargetNotBracketed {
        kpi: TargetKpi,
        target: f64,
        low: f64,
        high: f64,
        kpi_at_low: f64,
        kpi_at_high: f64,
    },
    /// The model ran but could not produce the requested KPI
    KpiUnavailable {
        kpi: TargetKpi,
        context: TrialContext,
    },
    Correlation(CorrelationError),
    Cancelled,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Config(e) => write!(f, "configuration error: {e}"),
            AnalysisError::Evaluation { context, source } => write!(f, "{context}: {source}"),
            AnalysisError::NonConvergence {
                variable,
                iterations,
                low,
                high,
                last_error,
            } => write!(
                f,
                "solver did not converge after {iterations} iterations; {variable} bracket \
                 [{low}, {high}], last relative error {last_error:.3e}"
            ),
            AnalysisError::TargetNotBracketed {
                kpi,
                target,
                low,
                high,
                kpi_at_low,
                kpi_at_high,
            } => write!(
                f,
                "target {kpi} of {target} is unreachable within [{low}, {high}] \
                 ({kpi} ranges from {kpi_at_low} to {kpi_at_high})"
            ),
            AnalysisError::KpiUnavailable { kpi, context } => write!(
                f,
                "could not extract {kpi} at {context}; the scenario does not define enough to \
                 compute it"
            ),
            AnalysisError::Correlation(e) => write!(f, "{e}"),
            AnalysisError::Cancelled => write!(f, "analysis cancelled"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Config(e) => Some(e),
            AnalysisError::Evaluation { source, .. } => Some(source),
            AnalysisError::Correlation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for AnalysisError {
    fn from(e: ConfigError) -> Self {
        AnalysisError::Config(e)
    }
}

impl From<CorrelationError> for AnalysisError {
    fn from(e: CorrelationError) -> Self {
        AnalysisError::Correlation(e)
    }
}

impl AnalysisError {
    /// True for errors in the request itself (never worth retrying unchanged)
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, AnalysisError::Config(_) | AnalysisError::Correlation(_))
    }

    /// True when one trial could not be valued (model failure or missing KPI)
    #[must_use]
    pub fn is_trial_failure(&self) -> bool {
        matches!(
            self,
            AnalysisError::Evaluation { .. } | AnalysisError::KpiUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
