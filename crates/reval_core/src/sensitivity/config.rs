//! Configuration types for sensitivity sweeps.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::OperationId;
use crate::variables::{InputVariable, SweepMode};

/// Linear grid over one input variable, endpoints inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl Range {
    #[must_use]
    pub fn new(min: f64, max: f64, steps: usize) -> Self {
        Self { min, max, steps }
    }

    /// Generate the sweep values. The last value is exactly `max`.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        if self.steps <= 1 {
            return vec![self.min];
        }
        let step_size = (self.max - self.min) / (self.steps - 1) as f64;
        (0..self.steps)
            .map(|i| {
                if i == self.steps - 1 {
                    self.max
                } else {
                    self.min + step_size * i as f64
                }
            })
            .collect()
    }

    /// Check the range against the variable it sweeps
    pub fn validate(&self, variable: InputVariable) -> Result<(), ConfigError> {
        let invalid = |reason| Err(ConfigError::InvalidRange { variable, reason });
        if self.steps == 0 {
            return invalid("steps must be at least 1");
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return invalid("min and max must be finite");
        }
        if self.min > self.max || (self.steps > 1 && self.min == self.max) {
            return Err(ConfigError::InvalidBounds {
                variable,
                min: self.min,
                max: self.max,
            });
        }

        let (domain_min, domain_max) = match variable.sweep_mode() {
            SweepMode::Absolute => variable.natural_domain(),
            SweepMode::Multiplier => (0.0, f64::INFINITY),
        };
        for value in [self.min, self.max] {
            if value < domain_min || value > domain_max {
                return Err(ConfigError::OutOfDomain {
                    variable,
                    value,
                    min: domain_min,
                    max: domain_max,
                });
            }
        }
        Ok(())
    }
}

/// One- or two-variable sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    pub variable_x: InputVariable,
    pub range_x: Range,
    #[serde(default)]
    pub variable_y: Option<InputVariable>,
    #[serde(default)]
    pub range_y: Option<Range>,
    /// Restrict operation-level variables to one operation
    #[serde(default)]
    pub operation_id: Option<OperationId>,
}

impl SensitivityConfig {
    #[must_use]
    pub fn one_way(variable: InputVariable, range: Range) -> Self {
        Self {
            variable_x: variable,
            range_x: range,
            variable_y: None,
            range_y: None,
            operation_id: None,
        }
    }

    #[must_use]
    pub fn two_way(x: InputVariable, range_x: Range, y: InputVariable, range_y: Range) -> Self {
        Self {
            variable_x: x,
            range_x,
            variable_y: Some(y),
            range_y: Some(range_y),
            operation_id: None,
        }
    }

    /// The Y axis, if both its variable and range are set
    #[must_use]
    pub fn y_axis(&self) -> Option<(InputVariable, Range)> {
        self.variable_y.zip(self.range_y)
    }

    /// Grid shape: `[x_steps]` or `[y_steps, x_steps]` (rows are Y)
    #[must_use]
    pub fn grid_shape(&self) -> Vec<usize> {
        match self.y_axis() {
            Some((_, range_y)) => vec![range_y.steps, self.range_x.steps],
            None => vec![self.range_x.steps],
        }
    }

    #[must_use]
    pub fn total_points(&self) -> usize {
        self.grid_shape().iter().product()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.range_x.validate(self.variable_x)?;
        match (self.variable_y, self.range_y) {
            (Some(y), Some(range_y)) => {
                if y == self.variable_x {
                    return Err(ConfigError::Invalid(format!(
                        "cannot sweep {y} against itself"
                    )));
                }
                range_y.validate(y)
            }
            (None, None) => Ok(()),
            _ => Err(ConfigError::Invalid(
                "a Y variable needs a Y range and vice versa".to_string(),
            )),
        }
    }
}

/// N-dimensional grid storage with flat backing array and stride-based indexing.
///
/// Stores values in row-major order where the last dimension varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<T> SweepGrid<T> {
    /// Create a grid from existing data. Data must be in row-major order.
    pub fn from_data(shape: Vec<usize>, data: Vec<T>) -> Option<Self> {
        let total_size: usize = shape.iter().product();
        if data.len() != total_size {
            return None;
        }
        let strides = compute_strides(&shape);
        Some(Self {
            data,
            shape,
            strides,
        })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Convert multi-dimensional indices to flat index
    fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (i, (&idx, &size)) in indices.iter().zip(&self.shape).enumerate() {
            if idx >= size {
                return None;
            }
            flat += idx * self.strides[i];
        }
        Some(flat)
    }

    #[must_use]
    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.flat_index(indices).map(|i| &self.data[i])
    }

    /// Flat row-major view
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Rows along the last dimension
    pub fn rows(&self) -> std::slice::Chunks<'_, T> {
        let width = self.shape.last().copied().unwrap_or(1).max(1);
        self.data.chunks(width)
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> SweepGrid<U> {
        SweepGrid {
            data: self.data.iter().map(f).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }
}

/// Compute strides for row-major order
fn compute_strides(shape: &[usize]) -> Vec<usize> {
    if shape.is_empty() {
        return Vec::new();
    }
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len() - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_values_hit_endpoints() {
        let values = Range::new(0.8, 1.2, 5).values();
        assert_eq!(values.len(), 5);
        assert_eq!(values[0], 0.8);
        assert_eq!(values[4], 1.2);
        for (v, expected) in values.iter().zip([0.8, 0.9, 1.0, 1.1, 1.2]) {
            assert!((v - expected).abs() < 1e-12);
        }
        assert_eq!(Range::new(0.5, 0.9, 1).values(), vec![0.5]);
    }

    #[test]
    fn test_range_validation() {
        let occ = InputVariable::Occupancy;
        assert!(Range::new(0.5, 0.9, 3).validate(occ).is_ok());
        assert!(matches!(
            Range::new(0.9, 0.5, 3).validate(occ),
            Err(ConfigError::InvalidBounds { .. })
        ));
        assert!(matches!(
            Range::new(0.5, 0.9, 0).validate(occ),
            Err(ConfigError::InvalidRange { .. })
        ));
        // Occupancy is absolute; room rate is a multiplier
        assert!(Range::new(0.8, 1.2, 3).validate(occ).is_err());
        assert!(Range::new(0.8, 1.2, 3).validate(InputVariable::RoomRate).is_ok());
    }

    #[test]
    fn test_half_configured_y_axis_rejected() {
        let mut config = SensitivityConfig::one_way(InputVariable::RoomRate, Range::new(0.8, 1.2, 5));
        config.variable_y = Some(InputVariable::Occupancy);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grid_rows_and_lookup() {
        let grid = SweepGrid::from_data(vec![2, 3], (0..6).collect::<Vec<i32>>()).unwrap();
        assert_eq!(grid.shape(), &[2, 3]);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.get(&[1, 0]), Some(&3));
        assert_eq!(grid.get(&[2, 0]), None);
        assert_eq!(grid.get(&[1]), None);
        let rows: Vec<&[i32]> = grid.rows().collect();
        assert_eq!(rows, vec![&[0, 1, 2][..], &[3, 4, 5][..]]);
        assert!(SweepGrid::from_data(vec![2, 2], vec![1, 2, 3]).is_none());
    }
}
