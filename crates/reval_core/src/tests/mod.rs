//! Cross-module tests for the analysis engines
//!
//! Tests are organized by topic:
//! - `solver` - Goal-seek convergence and bound validation
//! - `sweeps` - Sweep grid sizes and matrix layout
//! - `simulation` - Monte Carlo sample counts and reproducibility
//! - `triad` - Stress / base / upside ordering
//! - `immutability` - Engines never touch the caller's scenario
//! - `end_to_end` - Break-even ADR on the pro-forma

mod simulation;
mod triad;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ModelEvaluationError;
use crate::model::{ModelOutput, ScenarioConfig};
use crate::valuation::Valuation;
use crate::variables::{InputVariable, read_value};

pub(crate) type ModelResult = Result<ModelOutput, ModelEvaluationError>;

/// Output carrying only an NPV
pub(crate) fn npv_only(npv: f64) -> ModelOutput {
    ModelOutput {
        annual: Vec::new(),
        terminal_value: 0.0,
        npv,
        unlevered_irr: None,
        equity_multiple: None,
        levered_irr: None,
        moic: None,
        min_dscr: None,
        partners: Vec::new(),
    }
}

/// Synthetic model: NPV = slope * mean room rate + intercept
pub(crate) fn linear_in_adr(slope: f64, intercept: f64) -> impl Valuation {
    move |scenario: &ScenarioConfig| -> ModelResult {
        let adr = read_value(scenario, InputVariable::RoomRate, None)
            .map_err(|e| ModelEvaluationError::new(e.to_string()))?;
        Ok(npv_only(slope * adr + intercept))
    }
}

/// Synthetic model that fails whenever the mean room rate exceeds `ceiling`,
/// otherwise NPV = room rate
pub(crate) fn failing_above_adr(ceiling: f64) -> impl Valuation {
    move |scenario: &ScenarioConfig| -> ModelResult {
        let adr = read_value(scenario, InputVariable::RoomRate, None)
            .map_err(|e| ModelEvaluationError::new(e.to_string()))?;
        if adr > ceiling {
            return Err(ModelEvaluationError::new(format!("rate {adr} above {ceiling}")));
        }
        Ok(npv_only(adr))
    }
}

/// Wraps a model and counts how often it is called
pub(crate) struct Counting<M> {
    inner: M,
    calls: Arc<AtomicUsize>,
}

impl<M: Valuation> Counting<M> {
    pub(crate) fn new(inner: M) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<M: Valuation> Valuation for Counting<M> {
    fn evaluate(&self, scenario: &ScenarioConfig) -> ModelResult {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(scenario)
    }
}
