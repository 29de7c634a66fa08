//! The single chokepoint between analysis engines and the valuation pipeline

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AnalysisError, Result, TrialContext};
use crate::model::{KpiSnapshot, ModelOutput, ScenarioConfig, TargetKpi};
use crate::valuation::Valuation;

/// Value of a KPI in a model output, `None` when it cannot be computed
#[must_use]
pub fn extract_kpi(output: &ModelOutput, kpi: TargetKpi) -> Option<f64> {
    KpiSnapshot::from_output(output).get(kpi)
}

/// Calls the valuation pipeline once per trial and counts the calls.
///
/// Shared by reference across rayon workers; the counter is atomic.
pub struct ModelInvoker<'a> {
    model: &'a dyn Valuation,
    evaluations: AtomicUsize,
}

impl<'a> ModelInvoker<'a> {
    pub fn new(model: &'a dyn Valuation) -> Self {
        Self {
            model,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Evaluate a scenario. `context` is only built when the model fails.
    pub fn evaluate(
        &self,
        scenario: &ScenarioConfig,
        context: impl FnOnce() -> TrialContext,
    ) -> Result<ModelOutput> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.model
            .evaluate(scenario)
            .map_err(|source| AnalysisError::Evaluation {
                context: context(),
                source,
            })
    }

    /// Evaluate and keep only the KPI snapshot
    pub fn snapshot(
        &self,
        scenario: &ScenarioConfig,
        context: impl FnOnce() -> TrialContext,
    ) -> Result<KpiSnapshot> {
        self.evaluate(scenario, context)
            .map(|output| KpiSnapshot::from_output(&output))
    }

    /// Evaluate and extract one KPI, failing if it is unavailable
    pub fn kpi(
        &self,
        scenario: &ScenarioConfig,
        kpi: TargetKpi,
        context: impl Fn() -> TrialContext,
    ) -> Result<f64> {
        let output = self.evaluate(scenario, &context)?;
        extract_kpi(&output, kpi).ok_or_else(|| AnalysisError::KpiUnavailable {
            kpi,
            context: context(),
        })
    }

    /// Number of model evaluations issued so far
    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelEvaluationError;
    use crate::tests::{ModelResult, npv_only};
    use crate::variables::InputVariable;

    #[test]
    fn test_counts_and_wraps_failures() {
        let failing = |_: &ScenarioConfig| -> ModelResult { Err(ModelEvaluationError::new("boom")) };
        let invoker = ModelInvoker::new(&failing);
        let err = invoker
            .evaluate(&ScenarioConfig::default(), || {
                TrialContext::trial(3, vec![(InputVariable::Occupancy, 0.4)])
            })
            .unwrap_err();

        assert_eq!(invoker.evaluations(), 1);
        match err {
            AnalysisError::Evaluation { context, source } => {
                assert_eq!(context.trial, Some(3));
                assert_eq!(source.message, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_kpi_is_distinct_error() {
        let model = |_: &ScenarioConfig| -> ModelResult { Ok(npv_only(5.0)) };
        let invoker = ModelInvoker::new(&model);
        let scenario = ScenarioConfig::default();

        assert_eq!(
            invoker.kpi(&scenario, TargetKpi::Npv, TrialContext::base).unwrap(),
            5.0
        );
        assert!(matches!(
            invoker.kpi(&scenario, TargetKpi::LeveredIrr, TrialContext::base),
            Err(AnalysisError::KpiUnavailable {
                kpi: TargetKpi::LeveredIrr,
                ..
            })
        ));
    }

    #[test]
    fn test_nan_kpi_is_unavailable() {
        assert_eq!(extract_kpi(&npv_only(f64::NAN), TargetKpi::Npv), None);
    }
}
