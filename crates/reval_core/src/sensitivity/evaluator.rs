//! Sweep evaluator: runs the model at every point of a one- or two-way grid.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ConfigError, Result, TrialContext};
use crate::invoker::{ModelInvoker, extract_kpi};
use crate::model::{KpiSnapshot, ModelOutput, ScenarioConfig, TargetKpi};
use crate::progress::AnalysisProgress;
use crate::valuation::Valuation;
use crate::variables::{InputVariable, apply_sweep_value, check_applicable};

use super::{SensitivityConfig, SweepGrid};

/// One evaluated grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRun {
    pub x_value: f64,
    pub y_value: Option<f64>,
    pub kpis: KpiSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub variable_x: InputVariable,
    pub variable_y: Option<InputVariable>,
    pub x_values: Vec<f64>,
    /// Empty for a one-way sweep
    pub y_values: Vec<f64>,
    /// The unperturbed base case
    pub baseline: ModelOutput,
    /// `[x_steps]` or `[y_steps, x_steps]`
    pub grid: SweepGrid<SweepRun>,
}

impl SensitivityResult {
    #[must_use]
    pub fn is_two_way(&self) -> bool {
        self.variable_y.is_some()
    }

    /// All runs in row-major order (X varies fastest)
    #[must_use]
    pub fn runs(&self) -> &[SweepRun] {
        self.grid.data()
    }

    /// Rows of the matrix, one per Y value; `None` for a one-way sweep
    #[must_use]
    pub fn matrix(&self) -> Option<Vec<&[SweepRun]>> {
        self.is_two_way().then(|| self.grid.rows().collect())
    }

    /// Cell at row `y` (Y index), column `x` (X index)
    #[must_use]
    pub fn cell(&self, y: usize, x: usize) -> Option<&SweepRun> {
        if self.is_two_way() {
            self.grid.get(&[y, x])
        } else if y == 0 {
            self.grid.get(&[x])
        } else {
            None
        }
    }

    /// One KPI across every run
    #[must_use]
    pub fn kpi_series(&self, kpi: TargetKpi) -> Vec<Option<f64>> {
        self.runs().iter().map(|run| run.kpis.get(kpi)).collect()
    }

    /// One KPI laid out as rows (Y) by columns (X)
    #[must_use]
    pub fn kpi_matrix(&self, kpi: TargetKpi) -> Option<Vec<Vec<Option<f64>>>> {
        let values = self.grid.map(|run| run.kpis.get(kpi));
        self.is_two_way()
            .then(|| values.rows().map(<[Option<f64>]>::to_vec).collect())
    }

    /// Baseline value of a KPI
    #[must_use]
    pub fn baseline_kpi(&self, kpi: TargetKpi) -> Option<f64> {
        extract_kpi(&self.baseline, kpi)
    }
}

/// Evaluate the model over the sweep grid.
///
/// Every grid point is evaluated independently on a clone of `base`. The
/// first failing point aborts the sweep.
pub fn sweep(
    model: &dyn Valuation,
    base: &ScenarioConfig,
    config: &SensitivityConfig,
    progress: Option<&AnalysisProgress>,
) -> Result<SensitivityResult> {
    config.validate()?;
    let scope = config.operation_id;
    check_applicable(base, config.variable_x, scope)?;
    if let Some(y) = config.variable_y {
        check_applicable(base, y, scope)?;
    }

    let x_values = config.range_x.values();
    let y_axis = config.y_axis();
    let y_values = y_axis.map(|(_, range)| range.values()).unwrap_or_default();

    // (x, y) per point, row-major: rows are Y, X varies fastest
    let points: Vec<(f64, Option<f64>)> = if y_axis.is_some() {
        y_values
            .iter()
            .flat_map(|&y| x_values.iter().map(move |&x| (x, Some(y))))
            .collect()
    } else {
        x_values.iter().map(|&x| (x, None)).collect()
    };

    if let Some(p) = progress {
        p.reset(points.len() + 1);
    }

    let invoker = ModelInvoker::new(model);
    let baseline = invoker.evaluate(base, TrialContext::base)?;
    if let Some(p) = progress {
        p.increment();
    }

    let run_point = |(index, &(x, y)): (usize, &(f64, Option<f64>))| -> Result<SweepRun> {
        if let Some(p) = progress
            && p.is_cancelled()
        {
            return Err(AnalysisError::Cancelled);
        }

        let mut inputs = vec![(config.variable_x, x)];
        let mut trial = base.clone();
        apply_sweep_value(&mut trial, config.variable_x, x, scope)?;
        if let (Some((variable_y, _)), Some(y)) = (y_axis, y) {
            apply_sweep_value(&mut trial, variable_y, y, scope)?;
            inputs.push((variable_y, y));
        }

        let kpis = invoker.snapshot(&trial, || TrialContext::trial(index, inputs))?;
        if let Some(p) = progress {
            p.increment();
        }
        Ok(SweepRun {
            x_value: x,
            y_value: y,
            kpis,
        })
    };

    #[cfg(feature = "parallel")]
    let runs: Result<Vec<SweepRun>> = points.par_iter().enumerate().map(run_point).collect();

    #[cfg(not(feature = "parallel"))]
    let runs: Result<Vec<SweepRun>> = points.iter().enumerate().map(run_point).collect();

    let grid = SweepGrid::from_data(config.grid_shape(), runs?).ok_or_else(|| {
        AnalysisError::Config(ConfigError::Invalid(
            "sweep grid does not match its shape".to_string(),
        ))
    })?;

    Ok(SensitivityResult {
        variable_x: config.variable_x,
        variable_y: y_axis.map(|(v, _)| v),
        x_values,
        y_values,
        baseline,
        grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioBuilder;
    use crate::sensitivity::Range;
    use crate::valuation::ProForma;

    fn resort() -> ScenarioConfig {
        ScenarioBuilder::new()
            .hotel("Resort", 120, 250.0, 0.65)
            .ancillary("Spa", 400_000.0)
            .initial_investment(30_000_000.0)
            .senior_debt(15_000_000.0, 0.055, 25)
            .build()
    }

    #[test]
    fn test_npv_rises_across_rate_sweep() {
        let config =
            SensitivityConfig::one_way(InputVariable::RoomRate, Range::new(0.8, 1.2, 5));
        let result = sweep(&ProForma, &resort(), &config, None).unwrap();

        let npvs: Vec<f64> = result
            .kpi_series(TargetKpi::Npv)
            .into_iter()
            .map(Option::unwrap)
            .collect();
        assert!(npvs.windows(2).all(|w| w[0] < w[1]));
        // The multiplier 1.0 column reproduces the baseline
        assert!((npvs[2] - result.baseline.npv).abs() < 1e-6);
        assert!(result.matrix().is_none());
    }

    #[test]
    fn test_cancelled_sweep_returns_no_result() {
        let progress = AnalysisProgress::new(0);
        progress.cancel();
        let config =
            SensitivityConfig::one_way(InputVariable::Occupancy, Range::new(0.5, 0.9, 9));
        let result = sweep(&ProForma, &resort(), &config, Some(&progress));
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }

    #[test]
    fn test_progress_reaches_total() {
        let progress = AnalysisProgress::new(0);
        let config = SensitivityConfig::two_way(
            InputVariable::RoomRate,
            Range::new(0.9, 1.1, 3),
            InputVariable::DiscountRate,
            Range::new(0.08, 0.12, 3),
        );
        sweep(&ProForma, &resort(), &config, Some(&progress)).unwrap();
        assert_eq!(progress.completed(), 10);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_debt_sweep_without_tranche_fails_before_evaluating() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let counting = |s: &ScenarioConfig| {
            calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            ProForma.evaluate(s)
        };
        let mut scenario = resort();
        scenario.capital.debt.clear();
        let config =
            SensitivityConfig::one_way(InputVariable::InterestRate, Range::new(0.04, 0.08, 3));

        assert!(sweep(&counting, &scenario, &config, None).unwrap_err().is_config());
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
