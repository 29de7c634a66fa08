//! Monte Carlo risk simulation with correlated inputs

mod correlation;
mod distributions;
mod simulation;
mod stats;

pub use correlation::{CholeskyFactor, CorrelationMatrix};
pub use distributions::{Marginal, Sampler, standard_normal_cdf};
pub use simulation::{MAX_BATCH_SIZE, SimulationConfig, StochasticVariable, simulate};
pub use stats::{HistogramBucket, KpiSummary, SimulationResult};
