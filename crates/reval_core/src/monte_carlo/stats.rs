//! Statistics over the raw Monte Carlo sample set.
//!
//! Nothing here is precomputed: every statistic is derived on demand from the
//! per-trial snapshots, so one result supports any KPI.

use serde::{Deserialize, Serialize};

use crate::model::{KpiSnapshot, TargetKpi};
use crate::variables::InputVariable;

use super::CorrelationMatrix;

/// Raw output of one simulation, in trial order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Stochastic inputs, in sampling order
    pub variables: Vec<InputVariable>,
    /// Sampled input values per trial, aligned with `variables`
    pub inputs: Vec<Vec<f64>>,
    /// KPI snapshot per trial
    pub samples: Vec<KpiSnapshot>,
    /// Seed the run started from; reuse it to reproduce the run
    pub seed: u64,
}

/// One histogram bucket, `[lower, upper)` except the last which is closed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Summary statistics for one KPI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub kpi: TargetKpi,
    /// Trials where the KPI was available
    pub count: usize,
    /// Trials where the model could not produce the KPI
    pub unavailable: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
    pub var95: f64,
    pub probability_of_loss: f64,
}

impl SimulationResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of one KPI in trial order, skipping trials where it is unavailable
    #[must_use]
    pub fn values(&self, kpi: TargetKpi) -> Vec<f64> {
        self.samples.iter().filter_map(|s| s.get(kpi)).collect()
    }

    fn sorted(&self, kpi: TargetKpi) -> Vec<f64> {
        let mut values = self.values(kpi);
        values.sort_by(f64::total_cmp);
        values
    }

    #[must_use]
    pub fn mean(&self, kpi: TargetKpi) -> Option<f64> {
        mean(&self.values(kpi))
    }

    /// Sample standard deviation (n - 1); `None` below two samples
    #[must_use]
    pub fn std_dev(&self, kpi: TargetKpi) -> Option<f64> {
        sample_std_dev(&self.values(kpi))
    }

    /// `sorted[floor(p * N)]`, with `p` in [0, 1]
    #[must_use]
    pub fn percentile(&self, kpi: TargetKpi, p: f64) -> Option<f64> {
        percentile_sorted(&self.sorted(kpi), p)
    }

    /// 5th percentile of the outcome distribution
    #[must_use]
    pub fn var95(&self, kpi: TargetKpi) -> Option<f64> {
        self.percentile(kpi, 0.05)
    }

    /// Negative outcomes over all trials, `count(value < 0) / N`.
    ///
    /// Trials without the KPI stay in the denominator, so a KPI missing from
    /// some trials never inflates the loss share.
    #[must_use]
    pub fn probability_of_loss(&self, kpi: TargetKpi) -> Option<f64> {
        let values = self.values(kpi);
        if values.is_empty() {
            return None;
        }
        Some(loss_share(&values, self.len()))
    }

    /// Equal-width buckets between the sample min and max
    #[must_use]
    pub fn histogram(&self, kpi: TargetKpi, buckets: usize) -> Vec<HistogramBucket> {
        let sorted = self.sorted(kpi);
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Vec::new();
        };
        if buckets == 0 {
            return Vec::new();
        }
        if min == max {
            return vec![HistogramBucket {
                lower: min,
                upper: max,
                count: sorted.len(),
            }];
        }

        let width = (max - min) / buckets as f64;
        let mut counts = vec![0usize; buckets];
        for v in &sorted {
            let index = (((v - min) / width) as usize).min(buckets - 1);
            counts[index] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBucket {
                lower: min + width * i as f64,
                upper: if i == buckets - 1 {
                    max
                } else {
                    min + width * (i + 1) as f64
                },
                count,
            })
            .collect()
    }

    /// All summary statistics for one KPI; `None` if it was never available.
    ///
    /// Moments and percentiles describe the trials where the KPI exists;
    /// `unavailable` says how many trials that leaves out.
    #[must_use]
    pub fn summary(&self, kpi: TargetKpi) -> Option<KpiSummary> {
        let sorted = self.sorted(kpi);
        let count = sorted.len();
        let mean = mean(&sorted)?;
        Some(KpiSummary {
            kpi,
            count,
            unavailable: self.len() - count,
            mean,
            std_dev: sample_std_dev(&sorted).unwrap_or(0.0),
            min: sorted[0],
            p5: percentile_sorted(&sorted, 0.05)?,
            p50: percentile_sorted(&sorted, 0.50)?,
            p95: percentile_sorted(&sorted, 0.95)?,
            max: sorted[count - 1],
            var95: percentile_sorted(&sorted, 0.05)?,
            probability_of_loss: loss_share(&sorted, self.len()),
        })
    }

    /// Realized Pearson correlation between the sampled inputs
    #[must_use]
    pub fn input_correlation(&self) -> CorrelationMatrix {
        let n = self.variables.len();
        let columns: Vec<Vec<f64>> = (0..n)
            .map(|j| self.inputs.iter().map(|row| row[j]).collect())
            .collect();

        let mut correlation = CorrelationMatrix::identity(self.variables.clone());
        for i in 0..n {
            for j in (i + 1)..n {
                let r = pearson(&columns[i], &columns[j]).unwrap_or(0.0);
                correlation.matrix[i][j] = r;
                correlation.matrix[j][i] = r;
            }
        }
        correlation
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn loss_share(values: &[f64], trials: usize) -> f64 {
    values.iter().filter(|v| **v < 0.0).count() as f64 / trials as f64
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = ((p.clamp(0.0, 1.0) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Some(sorted[index])
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let (ma, mb) = (mean(a)?, mean(b)?);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    let denom = (va * vb).sqrt();
    (denom > 0.0).then(|| (cov / denom).clamp(-1.0, 1.0))
}
