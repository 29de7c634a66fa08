//! Correlated Monte Carlo over the scenario's stochastic inputs.
//!
//! Each trial draws one standard normal per variable, correlates the vector
//! through the Cholesky factor, maps each component through its marginal,
//! writes the values into a clone of the base scenario and evaluates it.
//! Trials run in fixed-size batches. Every batch seeds its own RNG from the
//! run seed, and every trial seeds its own RNG from its batch, so the sample
//! sequence is identical whether batches run in parallel or not.

use rand::{Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ConfigError, Result, TrialContext};
use crate::invoker::ModelInvoker;
use crate::model::{KpiSnapshot, OperationId, ScenarioConfig};
use crate::progress::AnalysisProgress;
use crate::valuation::Valuation;
use crate::variables::{InputVariable, SweepMode, apply_sweep_value, check_applicable, read_value};

use super::{CholeskyFactor, CorrelationMatrix, Marginal, Sampler, SimulationResult};

/// Trials per batch; progress is reported once per batch
pub const MAX_BATCH_SIZE: usize = 100;

fn default_iterations() -> usize {
    1_000
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

/// One stochastic input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticVariable {
    pub variable: InputVariable,
    pub marginal: Marginal,
    #[serde(default)]
    pub operation_id: Option<OperationId>,
}

impl StochasticVariable {
    #[must_use]
    pub fn new(variable: InputVariable, marginal: Marginal) -> Self {
        Self {
            variable,
            marginal,
            operation_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// `None` seeds from system entropy; the seed used is reported in the result
    #[serde(default)]
    pub seed: Option<u64>,
    pub variables: Vec<StochasticVariable>,
    /// Variables the matrix does not mention are uncorrelated
    #[serde(default)]
    pub correlation: Option<CorrelationMatrix>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl SimulationConfig {
    /// Occupancy, room rate and senior interest rate around the scenario's
    /// current values, for whichever of them the scenario has.
    #[must_use]
    pub fn defaults_for(scenario: &ScenarioConfig) -> Self {
        let mut variables = Vec::new();
        if let Ok(occupancy) = read_value(scenario, InputVariable::Occupancy, None) {
            variables.push(StochasticVariable::new(
                InputVariable::Occupancy,
                Marginal::Normal {
                    mean: occupancy,
                    std_dev: 0.05,
                },
            ));
        }
        if check_applicable(scenario, InputVariable::RoomRate, None).is_ok() {
            variables.push(StochasticVariable::new(
                InputVariable::RoomRate,
                Marginal::Normal {
                    mean: 1.0,
                    std_dev: 0.10,
                },
            ));
        }
        if let Ok(rate) = read_value(scenario, InputVariable::InterestRate, None) {
            variables.push(StochasticVariable::new(
                InputVariable::InterestRate,
                Marginal::Normal {
                    mean: rate,
                    std_dev: 0.01,
                },
            ));
        }

        Self {
            iterations: default_iterations(),
            seed: None,
            variables,
            correlation: None,
            batch_size: default_batch_size(),
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_correlation(mut self, correlation: CorrelationMatrix) -> Self {
        self.correlation = Some(correlation);
        self
    }

    #[must_use]
    pub fn variable_names(&self) -> Vec<InputVariable> {
        self.variables.iter().map(|v| v.variable).collect()
    }
}

/// Everything a trial needs, checked once up front
struct Plan {
    variables: Vec<StochasticVariable>,
    samplers: Vec<Sampler>,
    factor: Option<CholeskyFactor>,
}

fn prepare(base: &ScenarioConfig, config: &SimulationConfig) -> Result<Plan> {
    if config.iterations == 0 {
        return Err(ConfigError::Invalid("iterations must be at least 1".to_string()).into());
    }
    if config.batch_size == 0 {
        return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()).into());
    }
    if config.variables.is_empty() {
        return Err(ConfigError::Invalid(
            "simulation needs at least one stochastic variable".to_string(),
        )
        .into());
    }

    let names = config.variable_names();
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(ConfigError::Invalid(format!("{name} is simulated twice")).into());
        }
    }

    let mut samplers = Vec::with_capacity(config.variables.len());
    for v in &config.variables {
        check_applicable(base, v.variable, v.operation_id)?;
        samplers.push(v.marginal.compile(v.variable)?);
    }

    let factor = config
        .correlation
        .as_ref()
        .map(|c| c.aligned_to(&names).and_then(|aligned| aligned.cholesky()))
        .transpose()?;

    Ok(Plan {
        variables: config.variables.clone(),
        samplers,
        factor,
    })
}

/// Keep a sampled value physically meaningful
fn clip_to_domain(variable: InputVariable, value: f64) -> f64 {
    match variable.sweep_mode() {
        SweepMode::Absolute => variable.clip(value),
        SweepMode::Multiplier => value.max(0.0),
    }
}

struct Trial {
    inputs: Vec<f64>,
    snapshot: KpiSnapshot,
}

fn run_trial(
    invoker: &ModelInvoker<'_>,
    base: &ScenarioConfig,
    plan: &Plan,
    index: usize,
    seed: u64,
) -> Result<Trial> {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    let n = plan.variables.len();

    let z: Vec<f64> = (0..n).map(|_| rng.sample(StandardNormal)).collect();
    let correlated = match &plan.factor {
        Some(factor) => {
            let mut out = vec![0.0; n];
            factor.correlate(&z, &mut out);
            out
        }
        None => z,
    };

    let mut trial = base.clone();
    let mut inputs = Vec::with_capacity(n);
    for ((v, sampler), z) in plan.variables.iter().zip(&plan.samplers).zip(correlated) {
        let value = clip_to_domain(v.variable, sampler.transform(z));
        apply_sweep_value(&mut trial, v.variable, value, v.operation_id)?;
        inputs.push(value);
    }

    let snapshot = invoker.snapshot(&trial, || {
        TrialContext::trial(
            index,
            plan.variables
                .iter()
                .map(|v| v.variable)
                .zip(inputs.iter().copied())
                .collect(),
        )
    })?;
    Ok(Trial { inputs, snapshot })
}

/// Run the simulation.
///
/// Returns exactly `config.iterations` samples in trial order, or an error:
/// the first failing trial aborts the run and no partial result is returned.
pub fn simulate(
    model: &dyn Valuation,
    base: &ScenarioConfig,
    config: &SimulationConfig,
    progress: Option<&AnalysisProgress>,
) -> Result<SimulationResult> {
    let plan = prepare(base, config)?;
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let iterations = config.iterations;
    let batch_size = config.batch_size;
    let num_batches = iterations.div_ceil(batch_size);

    if let Some(p) = progress {
        p.reset(iterations);
    }

    let invoker = ModelInvoker::new(model);
    let run_batch = |batch: usize| -> Result<Vec<Trial>> {
        let mut rng = rand::rngs::SmallRng::seed_from_u64(seed.wrapping_add(batch as u64));
        let start = batch * batch_size;
        let len = batch_size.min(iterations - start);

        let mut trials = Vec::with_capacity(len);
        for index in start..start + len {
            if let Some(p) = progress
                && p.is_cancelled()
            {
                return Err(AnalysisError::Cancelled);
            }
            let trial_seed = rng.next_u64();
            trials.push(run_trial(&invoker, base, &plan, index, trial_seed)?);
        }

        if let Some(p) = progress {
            p.add(len);
        }
        Ok(trials)
    };

    #[cfg(feature = "parallel")]
    let batches: Result<Vec<Vec<Trial>>> = (0..num_batches).into_par_iter().map(run_batch).collect();

    #[cfg(not(feature = "parallel"))]
    let batches: Result<Vec<Vec<Trial>>> = (0..num_batches).map(run_batch).collect();

    let mut inputs = Vec::with_capacity(iterations);
    let mut samples = Vec::with_capacity(iterations);
    for trial in batches?.into_iter().flatten() {
        inputs.push(trial.inputs);
        samples.push(trial.snapshot);
    }

    Ok(SimulationResult {
        variables: plan.variables.iter().map(|v| v.variable).collect(),
        inputs,
        samples,
        seed,
    })
}
