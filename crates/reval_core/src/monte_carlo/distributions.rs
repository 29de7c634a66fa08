//! Marginal distributions, driven by (possibly correlated) standard normals.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Continuous, ContinuousCDF};
use statrs::function::erf::erfc;

use crate::error::ConfigError;
use crate::variables::InputVariable;

/// Marginal distribution of one stochastic input.
///
/// Values are in the variable's sweep units: multipliers for room rate,
/// initial investment and debt amount; absolute values otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marginal {
    Normal { mean: f64, std_dev: f64 },
    /// `exp(mu + sigma * z)`
    LogNormal { mu: f64, sigma: f64 },
    /// Beta-PERT on [min, max] peaking at `mode`
    Pert { min: f64, mode: f64, max: f64 },
}

impl Marginal {
    /// Lognormal with the given arithmetic mean and standard deviation
    pub fn log_normal_from_moments(mean: f64, std_dev: f64) -> Result<Self, String> {
        if mean <= 0.0 || std_dev < 0.0 {
            return Err(format!(
                "lognormal needs a positive mean and non-negative std dev (got {mean}, {std_dev})"
            ));
        }
        let sigma2 = (1.0 + (std_dev / mean).powi(2)).ln();
        Ok(Marginal::LogNormal {
            mu: mean.ln() - sigma2 / 2.0,
            sigma: sigma2.sqrt(),
        })
    }

    /// Distribution mean
    #[must_use]
    pub fn mean(&self) -> f64 {
        match *self {
            Marginal::Normal { mean, .. } => mean,
            Marginal::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Marginal::Pert { min, mode, max } => (min + 4.0 * mode + max) / 6.0,
        }
    }

    /// Check parameters and precompute what sampling needs
    pub fn compile(&self, variable: InputVariable) -> Result<Sampler, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDistribution { variable, reason };
        match *self {
            Marginal::Normal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(invalid(format!(
                        "normal needs a finite mean and non-negative std dev (got {mean}, {std_dev})"
                    )));
                }
                Ok(Sampler::Normal { mean, std_dev })
            }
            Marginal::LogNormal { mu, sigma } => {
                if !mu.is_finite() || !sigma.is_finite() || sigma < 0.0 {
                    return Err(invalid(format!(
                        "lognormal needs finite mu and non-negative sigma (got {mu}, {sigma})"
                    )));
                }
                Ok(Sampler::LogNormal { mu, sigma })
            }
            Marginal::Pert { min, mode, max } => {
                if !(min < max && min <= mode && mode <= max) {
                    return Err(invalid(format!(
                        "pert needs min <= mode <= max and min < max (got {min}, {mode}, {max})"
                    )));
                }
                let range = max - min;
                let alpha = 1.0 + 4.0 * (mode - min) / range;
                let beta = 1.0 + 4.0 * (max - mode) / range;
                let shape = Beta::new(alpha, beta).map_err(|e| invalid(e.to_string()))?;
                Ok(Sampler::Pert { min, range, shape })
            }
        }
    }
}

/// A validated marginal, ready to map standard normals
#[derive(Debug, Clone)]
pub enum Sampler {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Pert { min: f64, range: f64, shape: Beta },
}

impl Sampler {
    /// Map a standard-normal draw through this marginal
    #[must_use]
    pub fn transform(&self, z: f64) -> f64 {
        match self {
            Sampler::Normal { mean, std_dev } => mean + std_dev * z,
            Sampler::LogNormal { mu, sigma } => (mu + sigma * z).exp(),
            Sampler::Pert { min, range, shape } => {
                let u = standard_normal_cdf(z).clamp(0.0, 1.0);
                min + range * beta_quantile(shape, u)
            }
        }
    }
}

/// Largest |cdf(x) - p| accepted by [`beta_quantile`]
const QUANTILE_TOLERANCE: f64 = 1e-12;
const QUANTILE_MAX_STEPS: usize = 60;

/// Beta quantile to within [`QUANTILE_TOLERANCE`] in probability.
///
/// statrs' `inverse_cdf` stops at about 2^-16, so its estimate seeds a
/// safeguarded Newton iteration: steps that leave the current bracket fall
/// back to bisection.
#[must_use]
pub fn beta_quantile(shape: &Beta, p: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }

    let (mut low, mut high) = (0.0_f64, 1.0_f64);
    let mut x = shape.inverse_cdf(p).clamp(0.0, 1.0);
    for _ in 0..QUANTILE_MAX_STEPS {
        let error = shape.cdf(x) - p;
        if error.abs() < QUANTILE_TOLERANCE {
            break;
        }
        if error > 0.0 {
            high = x;
        } else {
            low = x;
        }
        let density = shape.pdf(x);
        let newton = x - error / density;
        x = if density.is_finite() && density > 0.0 && newton > low && newton < high {
            newton
        } else {
            f64::midpoint(low, high)
        };
    }
    x
}

/// Φ(z)
#[must_use]
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}
