//! Correlation matrices over input variables and their Cholesky factors.

use serde::{Deserialize, Serialize};

use crate::error::CorrelationError;
use crate::variables::InputVariable;

/// Tolerance for unit-diagonal and symmetry checks
const EPSILON: f64 = 1e-10;

/// Shrink steps tried by [`CorrelationMatrix::repaired`] before giving up on
/// off-diagonal terms entirely
const MAX_REPAIR_STEPS: usize = 50;

/// Pairwise correlation between named input variables.
///
/// Invariants (checked by [`validate`](Self::validate)): square, one row per
/// variable, no duplicate variables, symmetric, unit diagonal, entries in
/// [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub variables: Vec<InputVariable>,
    pub matrix: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Build and validate
    pub fn new(
        variables: Vec<InputVariable>,
        matrix: Vec<Vec<f64>>,
    ) -> Result<Self, CorrelationError> {
        let correlation = Self { variables, matrix };
        correlation.validate()?;
        Ok(correlation)
    }

    /// No correlation between any pair
    #[must_use]
    pub fn identity(variables: Vec<InputVariable>) -> Self {
        let n = variables.len();
        let matrix = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self { variables, matrix }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    fn index_of(&self, variable: InputVariable) -> Option<usize> {
        self.variables.iter().position(|v| *v == variable)
    }

    /// Correlation between two variables, if both are in the matrix
    #[must_use]
    pub fn get(&self, a: InputVariable, b: InputVariable) -> Option<f64> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        self.matrix.get(i)?.get(j).copied()
    }

    /// Set a pairwise correlation, keeping the matrix symmetric
    pub fn set(
        &mut self,
        a: InputVariable,
        b: InputVariable,
        value: f64,
    ) -> Result<(), CorrelationError> {
        let i = self.index_of(a).ok_or(CorrelationError::UnknownVariable(a))?;
        let j = self.index_of(b).ok_or(CorrelationError::UnknownVariable(b))?;
        if i == j {
            if (value - 1.0).abs() > EPSILON {
                return Err(CorrelationError::InvalidDiagonal { index: i, value });
            }
            return Ok(());
        }
        if !(-1.0..=1.0).contains(&value) {
            return Err(CorrelationError::OutOfRange { i, j, value });
        }
        self.matrix[i][j] = value;
        self.matrix[j][i] = value;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CorrelationError> {
        let n = self.variables.len();
        if self.matrix.len() != n {
            return Err(CorrelationError::VariableCountMismatch {
                variables: n,
                rows: self.matrix.len(),
            });
        }
        for (row, entries) in self.matrix.iter().enumerate() {
            if entries.len() != n {
                return Err(CorrelationError::NotSquare {
                    rows: n,
                    row,
                    len: entries.len(),
                });
            }
        }
        for (i, v) in self.variables.iter().enumerate() {
            if self.variables[..i].contains(v) {
                return Err(CorrelationError::DuplicateVariable(*v));
            }
        }

        for i in 0..n {
            let diag = self.matrix[i][i];
            if (diag - 1.0).abs() > EPSILON {
                return Err(CorrelationError::InvalidDiagonal {
                    index: i,
                    value: diag,
                });
            }
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let value = self.matrix[i][j];
                if (value - self.matrix[j][i]).abs() > EPSILON {
                    return Err(CorrelationError::NotSymmetric { i, j });
                }
                if !(-1.0..=1.0).contains(&value) {
                    return Err(CorrelationError::OutOfRange { i, j, value });
                }
            }
        }
        Ok(())
    }

    /// Nearest usable matrix: symmetrized by averaging, clamped to [-1, 1],
    /// unit diagonal, and with off-diagonal terms shrunk toward zero until it
    /// is positive definite. Rows must already be square.
    #[must_use]
    pub fn repaired(&self) -> Self {
        let n = self.variables.len();
        let at = |i: usize, j: usize| {
            self.matrix
                .get(i)
                .and_then(|row| row.get(j))
                .copied()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };

        let mut base = vec![vec![0.0; n]; n];
        for i in 0..n {
            base[i][i] = 1.0;
            for j in (i + 1)..n {
                let value = (f64::midpoint(at(i, j), at(j, i))).clamp(-1.0, 1.0);
                base[i][j] = value;
                base[j][i] = value;
            }
        }

        let mut shrink = 1.0;
        for _ in 0..MAX_REPAIR_STEPS {
            let candidate = Self {
                variables: self.variables.clone(),
                matrix: scaled_off_diagonal(&base, shrink),
            };
            if decompose(&candidate.matrix).is_ok() {
                return candidate;
            }
            shrink *= 0.9;
        }
        Self::identity(self.variables.clone())
    }

    /// Re-index onto `variables` (the simulation's order). Pairs this matrix
    /// does not mention are uncorrelated.
    pub fn aligned_to(&self, variables: &[InputVariable]) -> Result<Self, CorrelationError> {
        self.validate()?;
        if let Some(unknown) = self.variables.iter().find(|v| !variables.contains(v)) {
            return Err(CorrelationError::UnknownVariable(*unknown));
        }

        let mut aligned = Self::identity(variables.to_vec());
        for (i, a) in variables.iter().enumerate() {
            for (j, b) in variables.iter().enumerate() {
                if i != j
                    && let Some(value) = self.get(*a, *b)
                {
                    aligned.matrix[i][j] = value;
                }
            }
        }
        Ok(aligned)
    }

    /// Lower-triangular `L` with `L * L^T` equal to this matrix
    pub fn cholesky(&self) -> Result<CholeskyFactor, CorrelationError> {
        self.validate()?;
        decompose(&self.matrix).map(|lower| CholeskyFactor { lower })
    }
}

fn scaled_off_diagonal(matrix: &[Vec<f64>], factor: f64) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, v)| if i == j { *v } else { v * factor })
                .collect()
        })
        .collect()
}

/// Cholesky–Banachiewicz decomposition
fn decompose(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, CorrelationError> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();

            if i == j {
                let diag = matrix[i][i] - sum;
                if diag <= EPSILON {
                    return Err(CorrelationError::NotPositiveDefinite);
                }
                l[i][j] = diag.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }

    Ok(l)
}

/// Lower-triangular Cholesky factor.
///
/// Turns independent standard normals into normals with the factored
/// correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    lower: Vec<Vec<f64>>,
}

impl CholeskyFactor {
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Element (i, j); zero above the diagonal
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if j > i {
            0.0
        } else {
            self.lower[i][j]
        }
    }

    /// `out = L * z`
    pub fn correlate(&self, z: &[f64], out: &mut [f64]) {
        for (i, row) in self.lower.iter().enumerate() {
            out[i] = row[..=i].iter().zip(z).map(|(l, z)| l * z).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCC: InputVariable = InputVariable::Occupancy;
    const ADR: InputVariable = InputVariable::RoomRate;
    const RATE: InputVariable = InputVariable::InterestRate;

    #[test]
    fn test_rejects_asymmetric_and_bad_diagonal() {
        let asymmetric = CorrelationMatrix::new(vec![OCC, ADR], vec![vec![1.0, 0.5], vec![0.4, 1.0]]);
        assert_eq!(asymmetric, Err(CorrelationError::NotSymmetric { i: 0, j: 1 }));

        let diagonal = CorrelationMatrix::new(vec![OCC, ADR], vec![vec![0.9, 0.5], vec![0.5, 1.0]]);
        assert!(matches!(diagonal, Err(CorrelationError::InvalidDiagonal { index: 0, .. })));

        let ragged = CorrelationMatrix::new(vec![OCC, ADR], vec![vec![1.0, 0.5], vec![0.5]]);
        assert!(matches!(ragged, Err(CorrelationError::NotSquare { row: 1, .. })));
    }

    #[test]
    fn test_set_keeps_symmetry() {
        let mut m = CorrelationMatrix::identity(vec![OCC, ADR, RATE]);
        m.set(ADR, OCC, 0.6).unwrap();
        assert_eq!(m.get(OCC, ADR), Some(0.6));
        assert_eq!(m.get(ADR, OCC), Some(0.6));
        assert!(m.set(OCC, OCC, 0.5).is_err());
        assert!(m.set(OCC, RATE, 1.5).is_err());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_cholesky_reproduces_matrix() {
        let m = CorrelationMatrix::new(
            vec![OCC, ADR, RATE],
            vec![
                vec![1.0, 0.6, -0.3],
                vec![0.6, 1.0, -0.2],
                vec![-0.3, -0.2, 1.0],
            ],
        )
        .unwrap();
        let l = m.cholesky().unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let product: f64 = (0..3).map(|k| l.get(i, k) * l.get(j, k)).sum();
                assert!((product - m.matrix[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_inconsistent_matrix_is_not_positive_definite() {
        // a~b and a~c strongly positive but b~c strongly negative
        let m = CorrelationMatrix::new(
            vec![OCC, ADR, RATE],
            vec![
                vec![1.0, 0.9, 0.9],
                vec![0.9, 1.0, -0.9],
                vec![0.9, -0.9, 1.0],
            ],
        )
        .unwrap();
        assert_eq!(m.cholesky(), Err(CorrelationError::NotPositiveDefinite));

        let fixed = m.repaired();
        assert!(fixed.cholesky().is_ok());
        assert!(fixed.get(OCC, ADR).unwrap() > 0.0);
    }

    #[test]
    fn test_repair_symmetrizes() {
        let m = CorrelationMatrix {
            variables: vec![OCC, ADR],
            matrix: vec![vec![0.7, 0.4], vec![0.6, 1.0]],
        };
        let fixed = m.repaired();
        assert!(fixed.validate().is_ok());
        assert!((fixed.get(OCC, ADR).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_aligned_fills_missing_pairs_with_zero() {
        let m = CorrelationMatrix::new(vec![ADR, OCC], vec![vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
        let aligned = m.aligned_to(&[OCC, RATE, ADR]).unwrap();
        assert_eq!(aligned.matrix[0][2], 0.5);
        assert_eq!(aligned.matrix[0][1], 0.0);
        assert_eq!(aligned.matrix[1][1], 1.0);

        assert_eq!(
            m.aligned_to(&[OCC]),
            Err(CorrelationError::UnknownVariable(ADR))
        );
    }
}
