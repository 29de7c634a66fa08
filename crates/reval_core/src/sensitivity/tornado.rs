//! One-at-a-time swings for a tornado chart

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ConfigError, Result, TrialContext};
use crate::invoker::ModelInvoker;
use crate::model::{ScenarioConfig, TargetKpi};
use crate::progress::AnalysisProgress;
use crate::valuation::Valuation;
use crate::variables::{InputVariable, check_applicable, scale_value};

/// KPI response to moving one variable down and up, everything else at base
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TornadoBar {
    pub variable: InputVariable,
    pub kpi_at_low: f64,
    pub kpi_at_high: f64,
}

impl TornadoBar {
    #[must_use]
    pub fn swing(&self) -> f64 {
        (self.kpi_at_high - self.kpi_at_low).abs()
    }
}

/// Scale each variable by `low` and `high` (e.g. 0.9 and 1.1) in turn and
/// record `kpi`. Bars come back sorted by swing, widest first.
///
/// Progress counts two evaluations per variable. Cancellation is checked
/// before each one.
pub fn tornado(
    model: &dyn Valuation,
    base: &ScenarioConfig,
    variables: &[InputVariable],
    low: f64,
    high: f64,
    kpi: TargetKpi,
    progress: Option<&AnalysisProgress>,
) -> Result<Vec<TornadoBar>> {
    if !(low >= 0.0 && low < high && high.is_finite()) {
        return Err(ConfigError::Invalid(format!(
            "tornado factors must satisfy 0 <= low < high (got {low}, {high})"
        ))
        .into());
    }
    for &variable in variables {
        check_applicable(base, variable, None)?;
    }

    if let Some(p) = progress {
        p.reset(variables.len() * 2);
    }

    let invoker = ModelInvoker::new(model);
    let bar_for = |(index, &variable): (usize, &InputVariable)| -> Result<TornadoBar> {
        let at = |factor: f64| -> Result<f64> {
            if let Some(p) = progress
                && p.is_cancelled()
            {
                return Err(AnalysisError::Cancelled);
            }
            let mut trial = base.clone();
            scale_value(&mut trial, variable, factor, None)?;
            let value = invoker.kpi(&trial, kpi, || {
                TrialContext::trial(index, vec![(variable, factor)])
            })?;
            if let Some(p) = progress {
                p.increment();
            }
            Ok(value)
        };
        Ok(TornadoBar {
            variable,
            kpi_at_low: at(low)?,
            kpi_at_high: at(high)?,
        })
    };

    #[cfg(feature = "parallel")]
    let bars: Result<Vec<TornadoBar>> = variables.par_iter().enumerate().map(bar_for).collect();

    #[cfg(not(feature = "parallel"))]
    let bars: Result<Vec<TornadoBar>> = variables.iter().enumerate().map(bar_for).collect();

    let mut bars = bars?;
    bars.sort_by(|a, b| b.swing().total_cmp(&a.swing()));
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioBuilder;
    use crate::valuation::ProForma;

    #[test]
    fn test_bars_sorted_by_swing() {
        let scenario = ScenarioBuilder::new()
            .hotel("City Hotel", 200, 180.0, 0.75)
            .initial_investment(40_000_000.0)
            .senior_debt(20_000_000.0, 0.06, 25)
            .build();
        let bars = tornado(
            &ProForma,
            &scenario,
            &[
                InputVariable::InterestRate,
                InputVariable::RoomRate,
                InputVariable::DiscountRate,
            ],
            0.9,
            1.1,
            TargetKpi::Npv,
            None,
        )
        .unwrap();

        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].swing() >= w[1].swing()));
        // Unlevered NPV ignores the loan
        let interest = bars
            .iter()
            .find(|b| b.variable == InputVariable::InterestRate)
            .unwrap();
        assert_eq!(interest.swing(), 0.0);
    }

    #[test]
    fn test_rejects_inverted_factors() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build();
        let err = tornado(
            &ProForma,
            &scenario,
            &[InputVariable::RoomRate],
            1.1,
            0.9,
            TargetKpi::Npv,
            None,
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_progress_counts_both_ends_of_every_bar() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 40, 150.0, 0.6).build();
        let variables = [InputVariable::RoomRate, InputVariable::Occupancy];
        let progress = AnalysisProgress::new(0);
        tornado(&ProForma, &scenario, &variables, 0.9, 1.1, TargetKpi::Npv, Some(&progress))
            .unwrap();
        assert_eq!(progress.total(), 4);
        assert_eq!(progress.completed(), 4);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_cancelled_before_start() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 40, 150.0, 0.6).build();
        let progress = AnalysisProgress::new(0);
        progress.cancel();
        let err = tornado(
            &ProForma,
            &scenario,
            &[InputVariable::RoomRate],
            0.9,
            1.1,
            TargetKpi::Npv,
            Some(&progress),
        )
        .unwrap_err();
        assert_eq!(err, AnalysisError::Cancelled);
        assert_eq!(progress.completed(), 0);
    }
}
