use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use reval::commands::{RangeArg, emit, parse_variables, run_analysis, template_scenario};
use reval::storage::load_yaml;
use reval::{AnalysisRequest, AnalysisWorker, DataDirectory, OutputFormat, init_logging};
use reval_core::scenarios::{NamedScenario, ScenarioVariant};
use reval_core::variables::check_applicable;
use reval_core::{
    InputVariable, OperationId, SensitivityConfig, SimulationConfig, SolverConfig, TargetKpi,
};

#[derive(Parser, Debug)]
#[command(name = "reval")]
#[command(about = "Scenario analysis for real-estate investment models")]
struct Args {
    /// Path to the data directory (default: ~/.reval/)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Suppress progress on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the input value at which a KPI reaches a target
    GoalSeek {
        /// Scenario file or saved scenario name
        scenario: String,
        #[arg(long, default_value = "npv")]
        kpi: TargetKpi,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        target: f64,
        #[arg(long, default_value = "room-rate")]
        variable: InputVariable,
        #[arg(long, allow_negative_numbers = true)]
        min: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        max: Option<f64>,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Restrict the variable to one operation
        #[arg(long)]
        operation: Option<u16>,
    },
    /// One- or two-way sensitivity sweep
    Sweep {
        scenario: String,
        #[arg(long)]
        x: InputVariable,
        /// min:max:steps
        #[arg(long, allow_hyphen_values = true)]
        x_range: RangeArg,
        #[arg(long, requires = "y_range")]
        y: Option<InputVariable>,
        #[arg(long, requires = "y", allow_hyphen_values = true)]
        y_range: Option<RangeArg>,
        #[arg(long)]
        operation: Option<u16>,
    },
    /// Rank variables by KPI swing between two multipliers
    Tornado {
        scenario: String,
        /// Comma-separated variables (default: all that apply)
        #[arg(long)]
        variables: Option<String>,
        #[arg(long, default_value_t = 0.9)]
        low: f64,
        #[arg(long, default_value_t = 1.1)]
        high: f64,
        #[arg(long, default_value = "npv")]
        kpi: TargetKpi,
    },
    /// Correlated Monte Carlo simulation
    Simulate {
        scenario: String,
        /// YAML simulation settings (default: built from the scenario)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Stress / base / upside cases
    Triad {
        scenario: String,
        /// Fractional shock to occupancy and rate
        #[arg(long, default_value_t = 0.2)]
        stress: f64,
    },
    /// Evaluate labelled shock sets from a YAML file
    Variants {
        scenario: String,
        variants: PathBuf,
    },
    /// Evaluate several scenarios side by side
    Compare {
        #[arg(required = true, num_args = 1..)]
        scenarios: Vec<String>,
    },
    /// Write a starter scenario to the data directory
    Template {
        #[arg(long, default_value = "harbor-hotel")]
        name: String,
    },
    /// List saved scenarios
    List,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(DataDirectory::default_path);

    init_logging(&data_dir, &args.log_level)?;
    let data = DataDirectory::new(data_dir);

    let request = match args.command {
        Command::Template { name } => {
            let path = data.save_scenario(&name, &template_scenario())?;
            println!("Wrote {}", path.display());
            return Ok(());
        }
        Command::List => {
            for name in data.list_scenarios()? {
                println!("{name}");
            }
            return Ok(());
        }
        Command::GoalSeek {
            scenario,
            kpi,
            target,
            variable,
            min,
            max,
            tolerance,
            max_iterations,
            operation,
        } => {
            let mut config = SolverConfig::new(kpi, target, variable);
            config.min = min;
            config.max = max;
            if let Some(tolerance) = tolerance {
                config.tolerance = tolerance;
            }
            if let Some(max_iterations) = max_iterations {
                config.max_iterations = max_iterations;
            }
            config.operation_id = operation.map(OperationId);
            AnalysisRequest::GoalSeek {
                scenario: data.load_scenario(&scenario)?,
                config,
            }
        }
        Command::Sweep {
            scenario,
            x,
            x_range,
            y,
            y_range,
            operation,
        } => {
            let mut config = match (y, y_range) {
                (Some(y), Some(y_range)) => SensitivityConfig::two_way(x, x_range.0, y, y_range.0),
                _ => SensitivityConfig::one_way(x, x_range.0),
            };
            config.operation_id = operation.map(OperationId);
            AnalysisRequest::Sweep {
                scenario: data.load_scenario(&scenario)?,
                config,
            }
        }
        Command::Tornado {
            scenario,
            variables,
            low,
            high,
            kpi,
        } => {
            let scenario = data.load_scenario(&scenario)?;
            let variables = match variables {
                Some(list) => parse_variables(&list).map_err(|e| eyre!(e))?,
                None => InputVariable::ALL
                    .into_iter()
                    .filter(|v| check_applicable(&scenario, *v, None).is_ok())
                    .collect(),
            };
            AnalysisRequest::Tornado {
                scenario,
                variables,
                low,
                high,
                kpi,
            }
        }
        Command::Simulate {
            scenario,
            config,
            iterations,
            seed,
        } => {
            let scenario = data.load_scenario(&scenario)?;
            let mut config = match config {
                Some(path) => load_yaml::<SimulationConfig>(&path)?,
                None => SimulationConfig::defaults_for(&scenario),
            };
            if let Some(iterations) = iterations {
                config = config.with_iterations(iterations);
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            AnalysisRequest::Simulate { scenario, config }
        }
        Command::Triad { scenario, stress } => AnalysisRequest::Triad {
            scenario: data.load_scenario(&scenario)?,
            stress_pct: stress,
        },
        Command::Variants { scenario, variants } => AnalysisRequest::Variants {
            scenario: data.load_scenario(&scenario)?,
            variants: load_yaml::<Vec<ScenarioVariant>>(&variants)?,
        },
        Command::Compare { scenarios } => AnalysisRequest::Compare {
            scenarios: scenarios
                .iter()
                .map(|reference| {
                    let config = data.load_scenario(reference)?;
                    let name = if config.name.is_empty() {
                        reference.clone()
                    } else {
                        config.name.clone()
                    };
                    Ok(NamedScenario {
                        id: reference.clone(),
                        name,
                        config,
                    })
                })
                .collect::<Result<_, reval::StorageError>>()?,
        },
    };

    let worker = AnalysisWorker::new();
    let outcome = run_analysis(&worker, request, !args.quiet)
        .wrap_err("Analysis did not complete")?;
    emit(&outcome, args.format, args.output.as_deref())?;

    tracing::info!("Analysis finished");
    Ok(())
}
