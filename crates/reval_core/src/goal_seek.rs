//! Goal-seek: find the input value at which a KPI hits a target.
//!
//! Bisection over one input variable. Both ends of the bracket are evaluated
//! first; their KPI values tell the search whether the KPI rises or falls with
//! the input (NPV rises with occupancy but falls with the interest rate) and
//! whether the target is reachable at all.
//!
//! A bracket end the model cannot value (discount rate below terminal growth,
//! no IRR at zero occupancy) is pulled inward to the nearest input it can.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ConfigError, Result, TrialContext};
use crate::invoker::ModelInvoker;
use crate::model::{OperationId, ScenarioConfig, TargetKpi};
use crate::valuation::Valuation;
use crate::variables::{InputVariable, check_applicable, set_value};

/// Bracket width below which the search stops and returns the midpoint
const MIN_BRACKET_WIDTH: f64 = 1e-10;

/// Halvings spent locating the valuable end of a bracket whose endpoint fails
const EDGE_SEARCH_STEPS: usize = 20;

/// Progress callback for goal-seek
///
/// Arguments: (iteration, `input_value`, `kpi_value`)
pub type ProgressCallback = Box<dyn Fn(usize, f64, f64) + Send + Sync>;

fn default_tolerance() -> f64 {
    1e-4
}

fn default_max_iterations() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub target_kpi: TargetKpi,
    pub target_value: f64,
    pub input_variable: InputVariable,
    /// Overrides the variable's default lower bound
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Relative tolerance (absolute when the target is zero)
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Restrict the mutation to one operation
    #[serde(default)]
    pub operation_id: Option<OperationId>,
}

impl SolverConfig {
    #[must_use]
    pub fn new(target_kpi: TargetKpi, target_value: f64, input_variable: InputVariable) -> Self {
        Self {
            target_kpi,
            target_value,
            input_variable,
            min: None,
            max: None,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            operation_id: None,
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn for_operation(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id);
        self
    }

    /// Search bracket: overrides where given, variable defaults otherwise
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        let (default_min, default_max) = self.input_variable.default_bounds();
        (
            self.min.unwrap_or(default_min),
            self.max.unwrap_or(default_max),
        )
    }

    /// Everything that can be checked without evaluating the model
    pub fn validate(&self, base: &ScenarioConfig) -> std::result::Result<(), ConfigError> {
        let variable = self.input_variable;
        let (min, max) = self.bounds();
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ConfigError::InvalidBounds { variable, min, max });
        }
        let (domain_min, domain_max) = variable.natural_domain();
        for value in [min, max] {
            if value < domain_min || value > domain_max {
                return Err(ConfigError::OutOfDomain {
                    variable,
                    value,
                    min: domain_min,
                    max: domain_max,
                });
            }
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be positive (got {})",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.target_value.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "target value must be finite (got {})",
                self.target_value
            )));
        }
        check_applicable(base, variable, self.operation_id)
    }
}

/// One evaluated point of the search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverStep {
    /// 0 for the two bracket ends
    pub iteration: usize,
    pub input: f64,
    pub kpi: f64,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSeekResult {
    /// Input value that achieves the target
    pub value: f64,
    /// KPI at `value`
    pub achieved: f64,
    /// Bisection iterations, excluding the two bracket ends
    pub iterations: usize,
    /// False when the bracket collapsed before the tolerance was met
    pub converged: bool,
    pub history: Vec<SolverStep>,
}

/// Evaluate between a point the model can value (`good`) and one it cannot
/// (`bad`), returning the valued point closest to `bad`.
///
/// Assumes the inputs the model can value form one interval. `None` when every
/// midpoint tried fails.
fn feasible_edge(
    evaluate: impl Fn(f64) -> Result<f64>,
    mut good: f64,
    mut bad: f64,
) -> Result<Option<(f64, f64)>> {
    let mut edge = None;
    for _ in 0..EDGE_SEARCH_STEPS {
        let mid = f64::midpoint(good, bad);
        match evaluate(mid) {
            Ok(kpi) => {
                good = mid;
                edge = Some((mid, kpi));
            }
            Err(e) if e.is_trial_failure() => bad = mid,
            Err(e) => return Err(e),
        }
    }
    Ok(edge)
}

/// Distance from the target, relative unless the target is zero.
///
/// The denominator is `|target|` alone, never `max(|target|, actual)`: an
/// overshoot must not shrink its own error, so a converged result always
/// satisfies `|actual - target| / |target| < tolerance`.
#[must_use]
pub fn relative_error(actual: f64, target: f64) -> f64 {
    if target == 0.0 {
        actual.abs()
    } else {
        (actual - target).abs() / target.abs()
    }
}

/// Find the input value at which `config.target_kpi` equals `config.target_value`.
///
/// Configuration problems are reported before the model is evaluated. The
/// base scenario is never modified.
pub fn goal_seek(
    model: &dyn Valuation,
    base: &ScenarioConfig,
    config: &SolverConfig,
    progress_callback: Option<ProgressCallback>,
) -> Result<GoalSeekResult> {
    config.validate(base)?;

    let invoker = ModelInvoker::new(model);
    let variable = config.input_variable;
    let kpi = config.target_kpi;
    let target = config.target_value;
    let scope = config.operation_id;

    let evaluate_at = |iteration: usize, value: f64| -> Result<f64> {
        let mut trial = base.clone();
        set_value(&mut trial, variable, value, scope)?;
        invoker.kpi(&trial, kpi, || {
            TrialContext::trial(iteration, vec![(variable, value)])
        })
    };

    let mut history = Vec::with_capacity(config.max_iterations + 2);
    let mut record = |iteration: usize, input: f64, value: f64| {
        let error = relative_error(value, target);
        history.push(SolverStep {
            iteration,
            input,
            kpi: value,
            error,
        });
        if let Some(ref callback) = progress_callback {
            callback(iteration, input, value);
        }
        error
    };

    // Value both ends, pulling an end inward when the model cannot value it
    let (low_bound, high_bound) = config.bounds();
    let edge_toward = |good: f64, bad: f64| feasible_edge(|v| evaluate_at(0, v), good, bad);
    let ((mut low, kpi_at_low), (mut high, kpi_at_high)) =
        match (evaluate_at(0, low_bound), evaluate_at(0, high_bound)) {
            (Ok(at_low), Ok(at_high)) => ((low_bound, at_low), (high_bound, at_high)),
            (Err(e), _) | (_, Err(e)) if !e.is_trial_failure() => return Err(e),
            (Ok(at_low), Err(e)) => {
                let upper = edge_toward(low_bound, high_bound)?.ok_or(e)?;
                ((low_bound, at_low), upper)
            }
            (Err(e), Ok(at_high)) => {
                let lower = edge_toward(high_bound, low_bound)?.ok_or(e)?;
                (lower, (high_bound, at_high))
            }
            (Err(e), Err(_)) => {
                let mid = f64::midpoint(low_bound, high_bound);
                let at_mid = match evaluate_at(0, mid) {
                    Ok(value) => value,
                    Err(inner) if inner.is_trial_failure() => return Err(e),
                    Err(inner) => return Err(inner),
                };
                match (edge_toward(mid, low_bound)?, edge_toward(mid, high_bound)?) {
                    (None, None) => return Err(e),
                    (lower, upper) => (
                        lower.unwrap_or((mid, at_mid)),
                        upper.unwrap_or((mid, at_mid)),
                    ),
                }
            }
        };
    let low_error = record(0, low, kpi_at_low);
    let high_error = record(0, high, kpi_at_high);

    if low_error < config.tolerance || high_error < config.tolerance {
        let (value, achieved) = if low_error <= high_error {
            (low, kpi_at_low)
        } else {
            (high, kpi_at_high)
        };
        return Ok(GoalSeekResult {
            value,
            achieved,
            iterations: 0,
            converged: true,
            history,
        });
    }

    if kpi_at_low == kpi_at_high {
        return Err(ConfigError::Insensitive {
            variable,
            kpi,
            min: low,
            max: high,
        }
        .into());
    }
    if target < kpi_at_low.min(kpi_at_high) || target > kpi_at_low.max(kpi_at_high) {
        return Err(AnalysisError::TargetNotBracketed {
            kpi,
            target,
            low,
            high,
            kpi_at_low,
            kpi_at_high,
        });
    }
    let increasing = kpi_at_high > kpi_at_low;

    let mut last_error = low_error.min(high_error);
    for iteration in 1..=config.max_iterations {
        let mid = f64::midpoint(low, high);
        let actual = evaluate_at(iteration, mid)?;
        last_error = record(iteration, mid, actual);

        if last_error < config.tolerance {
            return Ok(GoalSeekResult {
                value: mid,
                achieved: actual,
                iterations: iteration,
                converged: true,
                history,
            });
        }

        if (actual < target) == increasing {
            low = mid;
        } else {
            high = mid;
        }

        if high - low < MIN_BRACKET_WIDTH {
            return Ok(GoalSeekResult {
                value: mid,
                achieved: actual,
                iterations: iteration,
                converged: false,
                history,
            });
        }
    }

    Err(AnalysisError::NonConvergence {
        variable,
        iterations: config.max_iterations,
        low,
        high,
        last_error,
    })
}

/// Goal-seek returning only the input value
pub fn solve(model: &dyn Valuation, base: &ScenarioConfig, config: &SolverConfig) -> Result<f64> {
    goal_seek(model, base, config, None).map(|result| result.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioBuilder;
    use crate::tests::linear_in_adr;
    use crate::valuation::ProForma;

    #[test]
    fn test_relative_error_forms() {
        assert_eq!(relative_error(3.0, 0.0), 3.0);
        assert!((relative_error(110.0, 100.0) - 0.1).abs() < 1e-12);
        assert!((relative_error(-50.0, 100.0) - 1.5).abs() < 1e-12);
        // Overshoot is measured against the target, not the larger actual
        assert!((relative_error(300.0, 100.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_relationship_is_solved() {
        // NPV falls as the discount rate rises
        let scenario = ScenarioBuilder::new()
            .hotel("Harbor Hotel", 100, 200.0, 0.70)
            .initial_investment(20_000_000.0)
            .build();
        let config = SolverConfig::new(TargetKpi::Npv, 0.0, InputVariable::DiscountRate)
            .with_bounds(0.03, 0.30);

        let result = goal_seek(&ProForma, &scenario, &config, None).unwrap();
        assert!(result.value > 0.03 && result.value < 0.30);
        // NPV moves ~1e8 per unit of rate, so the bracket may collapse first
        assert!(result.achieved.abs() < 1.0, "{result:?}");
        assert!(result.history[0].kpi > 0.0 && result.history[1].kpi < 0.0);
    }

    #[test]
    fn test_unreachable_target_reports_bracket() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build();
        let model = linear_in_adr(1_000.0, 0.0);
        let config = SolverConfig::new(TargetKpi::Npv, 1e9, InputVariable::RoomRate);

        match goal_seek(&model, &scenario, &config, None) {
            Err(AnalysisError::TargetNotBracketed {
                kpi_at_low,
                kpi_at_high,
                ..
            }) => {
                assert_eq!(kpi_at_low, 10_000.0);
                assert_eq!(kpi_at_high, 2_000_000.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_flat_kpi_is_config_error() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build();
        let model = linear_in_adr(0.0, 7.0);
        let config = SolverConfig::new(TargetKpi::Npv, 3.0, InputVariable::RoomRate);
        let err = goal_seek(&model, &scenario, &config, None).unwrap_err();
        assert!(err.is_config(), "{err}");
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build();
        let model = linear_in_adr(1.0, 0.0);
        let mut config = SolverConfig::new(TargetKpi::Npv, 1234.567, InputVariable::RoomRate);
        config.tolerance = 1e-12;
        config.max_iterations = 3;

        match goal_seek(&model, &scenario, &config, None) {
            Err(AnalysisError::NonConvergence {
                iterations,
                low,
                high,
                ..
            }) => {
                assert_eq!(iterations, 3);
                assert!(low <= 1234.567 && 1234.567 <= high);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_progress_callback_sees_every_step() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let scenario = ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build();
        let model = linear_in_adr(2.0, -100.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: ProgressCallback = Box::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let config = SolverConfig::new(TargetKpi::Npv, 500.0, InputVariable::RoomRate);
        let result = goal_seek(&model, &scenario, &config, Some(callback)).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), result.history.len());
        assert!((result.value - 300.0).abs() < 0.1);
    }
}
