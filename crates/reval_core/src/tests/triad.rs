use crate::config::ScenarioBuilder;
use crate::model::ScenarioConfig;
use crate::scenarios::run_triad;
use crate::valuation::ProForma;

fn single_hotel() -> ScenarioConfig {
    ScenarioBuilder::new()
        .hotel("Harbor Hotel", 100, 200.0, 0.70)
        .initial_investment(20_000_000.0)
        .senior_debt(10_000_000.0, 0.06, 25)
        .build()
}

fn mixed_use() -> ScenarioConfig {
    ScenarioBuilder::new()
        .seasonal_hotel(
            "Beach Resort",
            180,
            260.0,
            [0.5, 0.55, 0.65, 0.7, 0.8, 0.92, 0.97, 0.96, 0.82, 0.7, 0.55, 0.6],
        )
        .leasing("Shops", 6_000.0, 55.0, 0.93)
        .ancillary("Spa", 900_000.0)
        .initial_investment(55_000_000.0)
        .senior_debt(30_000_000.0, 0.065, 30)
        .build()
}

#[test]
fn test_stress_base_upside_ordering() {
    for scenario in [single_hotel(), mixed_use()] {
        for pct in [0.01, 0.10, 0.20] {
            let triad = run_triad(&ProForma, &scenario, pct).unwrap();
            assert!(
                triad.stress.npv < triad.base.npv && triad.base.npv < triad.upside.npv,
                "{pct}: {triad:?}"
            );
        }
    }
}

#[test]
fn test_base_case_matches_direct_evaluation() {
    use crate::valuation::Valuation;

    let scenario = mixed_use();
    let triad = run_triad(&ProForma, &scenario, 0.15).unwrap();
    assert_eq!(triad.base.npv, ProForma.evaluate(&scenario).unwrap().npv);
}

#[test]
fn test_upside_from_full_occupancy_still_gains_on_rate() {
    let scenario = ScenarioBuilder::new()
        .hotel("Sold Out", 60, 180.0, 1.0)
        .initial_investment(8_000_000.0)
        .build();
    let triad = run_triad(&ProForma, &scenario, 0.10).unwrap();
    assert!(triad.upside.npv > triad.base.npv);
}
