//! Glue between parsed CLI arguments and the analysis worker.

use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use color_eyre::eyre::{WrapErr, bail, eyre};
use reval_core::sensitivity::Range;
use reval_core::{InputVariable, ScenarioBuilder, ScenarioConfig};

use crate::io::atomic_write;
use crate::report::{OutputFormat, render};
use crate::worker::{AnalysisOutcome, AnalysisRequest, AnalysisResponse, AnalysisWorker};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sweep range as `min:max:steps`, e.g. `0.8:1.2:5`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeArg(pub Range);

impl FromStr for RangeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let [min, max, steps] = parts.as_slice() else {
            return Err(format!("expected min:max:steps, got '{s}'"));
        };
        let min: f64 = min.parse().map_err(|_| format!("bad range minimum '{min}'"))?;
        let max: f64 = max.parse().map_err(|_| format!("bad range maximum '{max}'"))?;
        let steps: usize = steps
            .parse()
            .map_err(|_| format!("bad step count '{steps}'"))?;
        Ok(RangeArg(Range::new(min, max, steps)))
    }
}

/// Comma-separated variable list, e.g. `adr,occupancy,discount-rate`
pub fn parse_variables(s: &str) -> Result<Vec<InputVariable>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(InputVariable::from_str)
        .collect()
}

/// Send one request and block until it finishes, printing progress to stderr
pub fn run_analysis(
    worker: &AnalysisWorker,
    request: AnalysisRequest,
    show_progress: bool,
) -> color_eyre::Result<AnalysisOutcome> {
    let kind = request.kind();
    if !worker.send(request) {
        bail!("Analysis worker is not running");
    }

    let mut last_percent = None;
    loop {
        let response = worker
            .recv_timeout(POLL_INTERVAL)
            .map_err(|e| eyre!("{kind} failed: {e}"))?;
        match response {
            Some(AnalysisResponse::Progress(percent)) => {
                if show_progress && last_percent.is_none_or(|last| percent > last) {
                    last_percent = Some(percent);
                    eprint!("\r{kind}: {percent:>3}%");
                    let _ = std::io::stderr().flush();
                }
            }
            Some(AnalysisResponse::Complete(outcome)) => {
                if show_progress && last_percent.is_some() {
                    eprintln!();
                }
                return Ok(*outcome);
            }
            Some(AnalysisResponse::Cancelled) => bail!("{kind} was cancelled"),
            Some(AnalysisResponse::Error(message)) => bail!("{kind} failed: {message}"),
            None => {}
        }
    }
}

/// Render an outcome and write it to stdout or to `output`
pub fn emit(
    outcome: &AnalysisOutcome,
    format: OutputFormat,
    output: Option<&Path>,
) -> color_eyre::Result<()> {
    let rendered = render(outcome, format)?;
    match output {
        Some(path) => {
            atomic_write(path, &rendered)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote report");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// A small mixed hotel/retail scenario to start editing from
pub fn template_scenario() -> ScenarioConfig {
    ScenarioBuilder::new()
        .name("Harbor Hotel")
        .start(2026, 1, 1)
        .hold_years(10)
        .discount_rate(0.10)
        .terminal_growth_rate(0.02)
        .hotel("Harbor Hotel", 120, 210.0, 0.72)
        .leasing("Lobby Retail", 4_000.0, 42.0, 0.9)
        .initial_investment(28_000_000.0)
        .senior_debt(16_000_000.0, 0.065, 25)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_arg_parses() {
        let RangeArg(range) = "0.8:1.2:5".parse().unwrap();
        assert_eq!(range, Range::new(0.8, 1.2, 5));
    }

    #[test]
    fn test_range_arg_rejects_malformed() {
        assert!("0.8:1.2".parse::<RangeArg>().is_err());
        assert!("a:1.2:5".parse::<RangeArg>().is_err());
        assert!("0.8:1.2:-1".parse::<RangeArg>().is_err());
    }

    #[test]
    fn test_parse_variables() {
        assert_eq!(
            parse_variables("adr, occupancy").unwrap(),
            vec![InputVariable::RoomRate, InputVariable::Occupancy]
        );
        assert!(parse_variables("adr,bogus").is_err());
    }

    #[test]
    fn test_template_is_valid() {
        assert!(template_scenario().validate().is_ok());
    }

    #[test]
    fn test_run_analysis_returns_outcome() {
        let worker = AnalysisWorker::new();
        let outcome = run_analysis(
            &worker,
            AnalysisRequest::Triad {
                scenario: template_scenario(),
                stress_pct: 0.1,
            },
            false,
        )
        .unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Triad(_)));
    }

    #[test]
    fn test_run_analysis_surfaces_errors() {
        let worker = AnalysisWorker::new();
        let err = run_analysis(
            &worker,
            AnalysisRequest::Triad {
                scenario: template_scenario(),
                stress_pct: 2.0,
            },
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("stress percentage"));
    }
}
