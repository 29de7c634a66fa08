//! Rendering finished analyses as text tables, JSON or YAML.

use color_eyre::eyre::WrapErr;
use reval_core::goal_seek::{GoalSeekResult, SolverConfig};
use reval_core::model::KpiSnapshot;
use reval_core::monte_carlo::{CorrelationMatrix, HistogramBucket, KpiSummary, SimulationResult};
use reval_core::scenarios::{ScenarioKpis, TriadResult, VariantOutcome};
use reval_core::sensitivity::{SensitivityResult, TornadoBar};
use reval_core::{InputVariable, TargetKpi};
use serde::Serialize;

use crate::worker::AnalysisOutcome;

/// Buckets in the simulation NPV histogram
pub const HISTOGRAM_BUCKETS: usize = 20;
/// Width of the longest histogram bar in text output
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Summary view of a simulation. Raw samples stay out of reports.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub iterations: usize,
    pub variables: Vec<InputVariable>,
    pub summaries: Vec<KpiSummary>,
    pub npv_histogram: Vec<HistogramBucket>,
    pub input_correlation: CorrelationMatrix,
}

impl SimulationReport {
    pub fn from_result(result: &SimulationResult) -> Self {
        Self {
            seed: result.seed,
            iterations: result.len(),
            variables: result.variables.clone(),
            summaries: TargetKpi::ALL
                .iter()
                .filter_map(|kpi| result.summary(*kpi))
                .collect(),
            npv_histogram: result.histogram(TargetKpi::Npv, HISTOGRAM_BUCKETS),
            input_correlation: result.input_correlation(),
        }
    }
}

/// Serialized shape of every report
#[derive(Serialize)]
#[serde(tag = "analysis", rename_all = "kebab-case")]
enum Report<'a> {
    GoalSeek {
        config: &'a SolverConfig,
        result: &'a GoalSeekResult,
    },
    Sweep {
        result: &'a SensitivityResult,
    },
    Tornado {
        kpi: TargetKpi,
        low: f64,
        high: f64,
        bars: &'a [TornadoBar],
    },
    Simulation {
        #[serde(flatten)]
        report: SimulationReport,
    },
    Triad {
        #[serde(flatten)]
        result: &'a TriadResult,
    },
    Variants {
        outcomes: &'a [VariantOutcome],
    },
    Compare {
        scenarios: &'a [ScenarioKpis],
    },
}

impl<'a> Report<'a> {
    fn from_outcome(outcome: &'a AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::GoalSeek { config, result } => Report::GoalSeek { config, result },
            AnalysisOutcome::Sweep(result) => Report::Sweep { result },
            AnalysisOutcome::Tornado {
                kpi,
                low,
                high,
                bars,
            } => Report::Tornado {
                kpi: *kpi,
                low: *low,
                high: *high,
                bars,
            },
            AnalysisOutcome::Simulation(result) => Report::Simulation {
                report: SimulationReport::from_result(result),
            },
            AnalysisOutcome::Triad(result) => Report::Triad { result },
            AnalysisOutcome::Variants(outcomes) => Report::Variants { outcomes },
            AnalysisOutcome::Compare(scenarios) => Report::Compare { scenarios },
        }
    }
}

/// Render an outcome in the requested format
pub fn render(outcome: &AnalysisOutcome, format: OutputFormat) -> color_eyre::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(outcome)),
        OutputFormat::Json => serde_json::to_string_pretty(&Report::from_outcome(outcome))
            .wrap_err("Failed to serialize report as JSON"),
        OutputFormat::Yaml => serde_saphyr::to_string(&Report::from_outcome(outcome))
            .wrap_err("Failed to serialize report as YAML"),
    }
}

// ============================================================================
// Value formatting
// ============================================================================

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut result = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Whole dollars with thousands separators, e.g. `-$1,234,568`
pub fn format_currency(value: f64) -> String {
    let grouped = group_thousands(value.abs().round() as u64);
    if value < 0.0 && value.round() != 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Compact form for matrix cells (e.g., $2.1M, $450K, $50)
pub fn format_compact_currency(value: f64) -> String {
    let abs_value = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    if abs_value >= 1_000_000.0 {
        format!("{sign}${:.1}M", abs_value / 1_000_000.0)
    } else if abs_value >= 1_000.0 {
        format!("{sign}${:.0}K", abs_value / 1_000.0)
    } else {
        format!("{sign}${abs_value:.0}")
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

pub fn format_multiple(value: f64) -> String {
    format!("{value:.2}x")
}

/// A KPI value in its natural unit; `n/a` when the model could not compute it
pub fn format_kpi(kpi: TargetKpi, value: Option<f64>) -> String {
    let Some(value) = value else {
        return "n/a".to_string();
    };
    match kpi {
        TargetKpi::Npv => format_currency(value),
        TargetKpi::UnleveredIrr | TargetKpi::LeveredIrr => format_percentage(value),
        TargetKpi::EquityMultiple | TargetKpi::Moic => format_multiple(value),
    }
}

/// Input values in the units the CLI accepts them in
fn format_input(variable: InputVariable, value: f64) -> String {
    match variable {
        InputVariable::Occupancy
        | InputVariable::DiscountRate
        | InputVariable::InterestRate
        | InputVariable::TerminalGrowthRate => format_percentage(value),
        InputVariable::RoomRate
        | InputVariable::InitialInvestment
        | InputVariable::DebtAmount => format!("{value:.4}"),
    }
}

fn kpi_title(kpi: TargetKpi) -> &'static str {
    match kpi {
        TargetKpi::Npv => "NPV",
        TargetKpi::UnleveredIrr => "Unlevered IRR",
        TargetKpi::LeveredIrr => "Levered IRR",
        TargetKpi::EquityMultiple => "Equity multiple",
        TargetKpi::Moic => "MOIC",
    }
}

// ============================================================================
// Text tables
// ============================================================================

/// Left-aligned first column, right-aligned numbers
fn table(headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == 0 {
                    format!("{cell:<width$}", width = widths[i])
                } else {
                    format!("{cell:>width$}", width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers);
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (columns.saturating_sub(1))));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

fn snapshot_headers(first: &str) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(TargetKpi::ALL.iter().map(|kpi| kpi_title(*kpi).to_string()))
        .chain(std::iter::once("Min DSCR".to_string()))
        .collect()
}

fn snapshot_row(label: String, kpis: &KpiSnapshot) -> Vec<String> {
    std::iter::once(label)
        .chain(TargetKpi::ALL.iter().map(|kpi| format_kpi(*kpi, kpis.get(*kpi))))
        .chain(std::iter::once(
            kpis.min_dscr.map_or_else(|| "n/a".to_string(), format_multiple),
        ))
        .collect()
}

fn render_text(outcome: &AnalysisOutcome) -> String {
    match outcome {
        AnalysisOutcome::GoalSeek { config, result } => goal_seek_text(config, result),
        AnalysisOutcome::Sweep(result) => sweep_text(result),
        AnalysisOutcome::Tornado {
            kpi,
            low,
            high,
            bars,
        } => tornado_text(*kpi, *low, *high, bars),
        AnalysisOutcome::Simulation(result) => simulation_text(&SimulationReport::from_result(result)),
        AnalysisOutcome::Triad(result) => triad_text(result),
        AnalysisOutcome::Variants(outcomes) => {
            let rows: Vec<Vec<String>> = outcomes
                .iter()
                .map(|o| snapshot_row(o.label.clone(), &o.kpis))
                .collect();
            table(&snapshot_headers("Variant"), &rows)
        }
        AnalysisOutcome::Compare(scenarios) => {
            let rows: Vec<Vec<String>> = scenarios
                .iter()
                .map(|s| snapshot_row(format!("{} ({})", s.name, s.id), &s.kpis))
                .collect();
            table(&snapshot_headers("Scenario"), &rows)
        }
    }
}

fn goal_seek_text(config: &SolverConfig, result: &GoalSeekResult) -> String {
    let kpi = config.target_kpi;
    let variable = config.input_variable;
    let status = if result.converged {
        "converged"
    } else {
        "bracket collapsed before tolerance"
    };
    format!(
        "Goal seek: {} = {} by varying {variable}\n\
         Solved {variable}: {}\n\
         Achieved {}: {}\n\
         Iterations: {} ({status})\n",
        kpi_title(kpi),
        format_kpi(kpi, Some(config.target_value)),
        format_input(variable, result.value),
        kpi_title(kpi),
        format_kpi(kpi, Some(result.achieved)),
        result.iterations,
    )
}

fn sweep_text(result: &SensitivityResult) -> String {
    let mut out = format!(
        "Baseline NPV: {}\n\n",
        format_kpi(TargetKpi::Npv, result.baseline_kpi(TargetKpi::Npv))
    );

    match (result.variable_y, result.kpi_matrix(TargetKpi::Npv)) {
        (Some(variable_y), Some(matrix)) => {
            out.push_str(&format!(
                "NPV by {} (columns) and {variable_y} (rows)\n",
                result.variable_x
            ));
            let headers: Vec<String> = std::iter::once(variable_y.to_string())
                .chain(
                    result
                        .x_values
                        .iter()
                        .map(|x| format_input(result.variable_x, *x)),
                )
                .collect();
            let rows: Vec<Vec<String>> = matrix
                .iter()
                .zip(&result.y_values)
                .map(|(row, y)| {
                    std::iter::once(format_input(variable_y, *y))
                        .chain(row.iter().map(|npv| {
                            npv.map_or_else(|| "n/a".to_string(), format_compact_currency)
                        }))
                        .collect()
                })
                .collect();
            out.push_str(&table(&headers, &rows));
        }
        _ => {
            let rows: Vec<Vec<String>> = result
                .runs()
                .iter()
                .map(|run| snapshot_row(format_input(result.variable_x, run.x_value), &run.kpis))
                .collect();
            out.push_str(&table(&snapshot_headers(result.variable_x.label()), &rows));
        }
    }
    out
}

fn tornado_text(kpi: TargetKpi, low: f64, high: f64, bars: &[TornadoBar]) -> String {
    let headers = vec![
        "Variable".to_string(),
        format!("{} at x{low}", kpi_title(kpi)),
        format!("{} at x{high}", kpi_title(kpi)),
        "Swing".to_string(),
    ];
    let rows: Vec<Vec<String>> = bars
        .iter()
        .map(|bar| {
            vec![
                bar.variable.to_string(),
                format_kpi(kpi, Some(bar.kpi_at_low)),
                format_kpi(kpi, Some(bar.kpi_at_high)),
                format_kpi(kpi, Some(bar.swing())),
            ]
        })
        .collect();
    table(&headers, &rows)
}

fn simulation_text(report: &SimulationReport) -> String {
    let mut out = format!(
        "Monte Carlo: {} iterations over {} (seed {})\n\n",
        report.iterations,
        report
            .variables
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        report.seed
    );

    let headers: Vec<String> = [
        "KPI", "Trials", "N/A", "Mean", "Std dev", "P5", "P50", "P95", "VaR95", "P(loss)",
    ]
        .iter()
        .map(ToString::to_string)
        .collect();
    let rows: Vec<Vec<String>> = report
        .summaries
        .iter()
        .map(|s| {
            let fmt = |v: f64| format_kpi(s.kpi, Some(v));
            vec![
                kpi_title(s.kpi).to_string(),
                s.count.to_string(),
                s.unavailable.to_string(),
                fmt(s.mean),
                fmt(s.std_dev),
                fmt(s.p5),
                fmt(s.p50),
                fmt(s.p95),
                fmt(s.var95),
                format_percentage(s.probability_of_loss),
            ]
        })
        .collect();
    out.push_str(&table(&headers, &rows));

    if let Some(peak) = report.npv_histogram.iter().map(|b| b.count).max()
        && peak > 0
    {
        out.push_str("\nNPV distribution\n");
        for bucket in &report.npv_histogram {
            let bar = "#".repeat(bucket.count * BAR_WIDTH / peak);
            out.push_str(&format!(
                "{:>12} {bar} {}\n",
                format_compact_currency(bucket.lower),
                bucket.count
            ));
        }
    }
    out
}

fn triad_text(result: &TriadResult) -> String {
    let pct = format_percentage(result.stress_pct);
    let headers = vec![
        "KPI".to_string(),
        format!("Stress (-{pct})"),
        "Base".to_string(),
        format!("Upside (+{pct})"),
    ];
    let mut rows: Vec<Vec<String>> = TargetKpi::ALL
        .iter()
        .map(|kpi| {
            vec![
                kpi_title(*kpi).to_string(),
                format_kpi(*kpi, result.stress.get(*kpi)),
                format_kpi(*kpi, result.base.get(*kpi)),
                format_kpi(*kpi, result.upside.get(*kpi)),
            ]
        })
        .collect();
    rows.push(
        std::iter::once("Min DSCR".to_string())
            .chain(
                [result.stress, result.base, result.upside]
                    .iter()
                    .map(|k| k.min_dscr.map_or_else(|| "n/a".to_string(), format_multiple)),
            )
            .collect(),
    );
    table(&headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reval_core::monte_carlo::{SimulationConfig, simulate};
    use reval_core::scenarios::run_triad;
    use reval_core::{ProForma, ScenarioBuilder, ScenarioConfig};

    fn harbor() -> ScenarioConfig {
        ScenarioBuilder::new()
            .hotel("Harbor Hotel", 100, 200.0, 0.70)
            .initial_investment(20_000_000.0)
            .senior_debt(10_000_000.0, 0.06, 25)
            .build()
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1_234_567.89), "$1,234,568");
        assert_eq!(format_currency(-1_000.0), "-$1,000");
        assert_eq!(format_currency(-0.2), "$0");
        assert_eq!(format_currency(999.0), "$999");
    }

    #[test]
    fn test_format_kpi_units() {
        assert_eq!(format_kpi(TargetKpi::UnleveredIrr, Some(0.1234)), "12.34%");
        assert_eq!(format_kpi(TargetKpi::Moic, Some(1.5)), "1.50x");
        assert_eq!(format_kpi(TargetKpi::LeveredIrr, None), "n/a");
        assert_eq!(format_compact_currency(-2_150_000.0), "-$2.1M");
    }

    #[test]
    fn test_table_aligns_columns() {
        let text = table(
            &["Name".to_string(), "Value".to_string()],
            &[
                vec!["a".to_string(), "1".to_string()],
                vec!["longer".to_string(), "12345".to_string()],
            ],
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name    Value");
        assert_eq!(lines[2], "a           1");
        assert_eq!(lines[3], "longer  12345");
    }

    #[test]
    fn test_triad_renders_in_every_format() {
        let triad = run_triad(&ProForma, &harbor(), 0.2).unwrap();
        let outcome = AnalysisOutcome::Triad(triad);

        let text = render(&outcome, OutputFormat::Text).unwrap();
        assert!(text.contains("Stress (-20.00%)"));

        let json: serde_json::Value =
            serde_json::from_str(&render(&outcome, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["analysis"], "triad");
        assert_eq!(json["stress_pct"], 0.2);

        let yaml = render(&outcome, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("triad"));
    }

    #[test]
    fn test_simulation_report_omits_raw_samples() {
        let config = SimulationConfig::defaults_for(&harbor())
            .with_seed(12)
            .with_iterations(200);
        let result = simulate(&ProForma, &harbor(), &config, None).unwrap();
        let outcome = AnalysisOutcome::Simulation(Box::new(result));

        let json: serde_json::Value =
            serde_json::from_str(&render(&outcome, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["iterations"], 200);
        assert_eq!(json["seed"], 12);
        assert!(json.get("samples").is_none());
        assert_eq!(json["npv_histogram"].as_array().unwrap().len(), HISTOGRAM_BUCKETS);

        assert_eq!(json["summaries"][0]["unavailable"], 0);

        let text = render(&outcome, OutputFormat::Text).unwrap();
        assert!(text.contains("NPV distribution"));
        assert!(text.lines().any(|line| line.starts_with("KPI") && line.contains("N/A")));
    }
}
