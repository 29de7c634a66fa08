//! Named scenario variants: stress / base / upside triads and side-by-side
//! comparison of independently built scenarios.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, TrialContext};
use crate::invoker::ModelInvoker;
use crate::model::{KpiSnapshot, OperationId, ScenarioConfig};
use crate::valuation::Valuation;
use crate::variables::{InputVariable, check_applicable, scale_value};

/// Demand drivers moved by a triad
pub const TRIAD_DRIVERS: [InputVariable; 2] = [InputVariable::Occupancy, InputVariable::RoomRate];

/// Relative change to one variable: the field is multiplied by `1 + change`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shock {
    pub variable: InputVariable,
    pub change: f64,
    #[serde(default)]
    pub operation_id: Option<OperationId>,
}

impl Shock {
    #[must_use]
    pub fn new(variable: InputVariable, change: f64) -> Self {
        Self {
            variable,
            change,
            operation_id: None,
        }
    }
}

/// A labelled set of shocks applied together to the base scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioVariant {
    pub label: String,
    pub shocks: Vec<Shock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOutcome {
    pub label: String,
    pub kpis: KpiSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriadResult {
    pub stress_pct: f64,
    pub stress: KpiSnapshot,
    pub base: KpiSnapshot,
    pub upside: KpiSnapshot,
}

/// An independently supplied scenario for comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedScenario {
    pub id: String,
    pub name: String,
    pub config: ScenarioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioKpis {
    pub id: String,
    pub name: String,
    pub kpis: KpiSnapshot,
}

/// Evaluate each variant on its own clone of `base`, in order
pub fn run_variants(
    model: &dyn Valuation,
    base: &ScenarioConfig,
    variants: &[ScenarioVariant],
) -> Result<Vec<VariantOutcome>> {
    for shock in variants.iter().flat_map(|v| &v.shocks) {
        if !shock.change.is_finite() || shock.change < -1.0 {
            return Err(ConfigError::Invalid(format!(
                "shock to {} must be a finite change of at least -100% (got {})",
                shock.variable, shock.change
            ))
            .into());
        }
        check_applicable(base, shock.variable, shock.operation_id)?;
    }

    let invoker = ModelInvoker::new(model);
    variants
        .iter()
        .enumerate()
        .map(|(index, variant)| {
            let mut trial = base.clone();
            for shock in &variant.shocks {
                scale_value(
                    &mut trial,
                    shock.variable,
                    1.0 + shock.change,
                    shock.operation_id,
                )?;
            }
            let kpis = invoker.snapshot(&trial, || {
                TrialContext::trial(
                    index,
                    variant
                        .shocks
                        .iter()
                        .map(|s| (s.variable, 1.0 + s.change))
                        .collect(),
                )
            })?;
            Ok(VariantOutcome {
                label: variant.label.clone(),
                kpis,
            })
        })
        .collect()
}

/// Stress, base and upside cases: occupancy and rate moved down and up by
/// `stress_pct` (e.g. 0.2 for ±20%).
///
/// Only drivers the scenario carries are moved. Occupancy is clipped to 1 on
/// the upside.
pub fn run_triad(
    model: &dyn Valuation,
    base: &ScenarioConfig,
    stress_pct: f64,
) -> Result<TriadResult> {
    if !(stress_pct > 0.0 && stress_pct < 1.0) {
        return Err(ConfigError::Invalid(format!(
            "stress percentage must be between 0 and 1 (got {stress_pct})"
        ))
        .into());
    }

    let drivers: Vec<InputVariable> = TRIAD_DRIVERS
        .into_iter()
        .filter(|v| check_applicable(base, *v, None).is_ok())
        .collect();
    if drivers.is_empty() {
        return Err(ConfigError::NotApplicable {
            variable: InputVariable::Occupancy,
            operation: None,
        }
        .into());
    }

    let shocked = |label: &str, change: f64| ScenarioVariant {
        label: label.to_string(),
        shocks: drivers.iter().map(|v| Shock::new(*v, change)).collect(),
    };
    let variants = [
        shocked("stress", -stress_pct),
        ScenarioVariant {
            label: "base".to_string(),
            shocks: Vec::new(),
        },
        shocked("upside", stress_pct),
    ];

    match run_variants(model, base, &variants)?.as_slice() {
        [stress, base_case, upside] => Ok(TriadResult {
            stress_pct,
            stress: stress.kpis,
            base: base_case.kpis,
            upside: upside.kpis,
        }),
        _ => Err(ConfigError::Invalid("triad produced the wrong number of cases".into()).into()),
    }
}

/// Evaluate independently supplied scenarios. One record per input, in input order.
pub fn compare_scenarios(
    model: &dyn Valuation,
    scenarios: &[NamedScenario],
) -> Result<Vec<ScenarioKpis>> {
    let invoker = ModelInvoker::new(model);
    scenarios
        .iter()
        .enumerate()
        .map(|(index, named)| {
            let kpis = invoker.snapshot(&named.config, || TrialContext::trial(index, Vec::new()))?;
            Ok(ScenarioKpis {
                id: named.id.clone(),
                name: named.name.clone(),
                kpis,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioBuilder;
    use crate::error::AnalysisError;
    use crate::valuation::ProForma;

    #[test]
    fn test_triad_requires_fraction() {
        let scenario = ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build();
        for pct in [0.0, 1.0, -0.1, f64::NAN] {
            assert!(run_triad(&ProForma, &scenario, pct).unwrap_err().is_config());
        }
    }

    #[test]
    fn test_triad_needs_a_demand_driver() {
        let scenario = ScenarioBuilder::new().ancillary("Parking", 100_000.0).build();
        assert!(matches!(
            run_triad(&ProForma, &scenario, 0.1),
            Err(AnalysisError::Config(ConfigError::NotApplicable { .. }))
        ));
    }

    #[test]
    fn test_variants_keep_order_and_labels() {
        let scenario = ScenarioBuilder::new()
            .hotel("Inn", 40, 150.0, 0.6)
            .initial_investment(5_000_000.0)
            .build();
        let variants = vec![
            ScenarioVariant {
                label: "cheap money".into(),
                shocks: vec![Shock::new(InputVariable::DiscountRate, -0.2)],
            },
            ScenarioVariant {
                label: "cost overrun".into(),
                shocks: vec![Shock::new(InputVariable::InitialInvestment, 0.15)],
            },
        ];
        let outcomes = run_variants(&ProForma, &scenario, &variants).unwrap();
        let base = ProForma.evaluate(&scenario).unwrap();

        assert_eq!(outcomes[0].label, "cheap money");
        assert!(outcomes[0].kpis.npv > base.npv);
        assert!(outcomes[1].kpis.npv < base.npv);
    }

    #[test]
    fn test_compare_reports_per_input() {
        let small = ScenarioBuilder::new().hotel("Inn", 20, 120.0, 0.6).build();
        let large = ScenarioBuilder::new().hotel("Grand", 300, 320.0, 0.8).build();
        let results = compare_scenarios(
            &ProForma,
            &[
                NamedScenario {
                    id: "b".into(),
                    name: "Grand".into(),
                    config: large,
                },
                NamedScenario {
                    id: "a".into(),
                    name: "Inn".into(),
                    config: small,
                },
            ],
        )
        .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "b");
        assert!(results[0].kpis.npv > results[1].kpis.npv);
    }

    #[test]
    fn test_compare_wraps_failing_scenario() {
        let broken = NamedScenario {
            id: "x".into(),
            name: "Empty".into(),
            config: ScenarioConfig::default(),
        };
        match compare_scenarios(&ProForma, &[broken]) {
            Err(AnalysisError::Evaluation { context, .. }) => assert_eq!(context.trial, Some(0)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
