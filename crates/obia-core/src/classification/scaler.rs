use serde::Serialize;

use crate::error::{ObiaError, Result};

/// Per-column standardization `(x − mean) / std` fitted on training rows.
/// Population std; constant columns use std = 1 so they map to 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[&[f64]]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(ObiaError::NoTrainingData);
        };
        let dim = first.len();
        if rows.iter().any(|r| r.len() != dim) {
            return Err(ObiaError::InvalidParameters(
                "feature rows have inconsistent lengths".into(),
            ));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0f64; dim];
        for row in rows {
            for (m, &v) in mean.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut std = vec![0.0f64; dim];
        for row in rows {
            for ((s, &v), &m) in std.iter_mut().zip(row.iter()).zip(mean.iter()) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
            if *s < 1e-12 || !s.is_finite() {
                *s = 1.0;
            }
        }
        Ok(Self { mean, std })
    }

    pub fn transform(&self, rows: &[&[f64]]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.mean.iter().zip(self.std.iter()))
                    .map(|(&v, (&m, &s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn transformed_training_rows_have_zero_mean_unit_std() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0], vec![6.0, 40.0]];
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let scaler = StandardScaler::fit(&refs).unwrap();
        let out = scaler.transform(&refs);
        for col in 0..2 {
            let vals: Vec<f64> = out.iter().map(|r| r[col]).collect();
            let mean = vals.iter().sum::<f64>() / 4.0;
            let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let rows: Vec<Vec<f64>> = vec![vec![5.0], vec![5.0]];
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let scaler = StandardScaler::fit(&refs).unwrap();
        assert_eq!(scaler.std, vec![1.0]);
        assert_eq!(scaler.transform(&refs), vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let a = [1.0, 2.0];
        let b = [1.0];
        assert!(StandardScaler::fit(&[&a[..], &b[..]]).is_err());
        assert!(matches!(StandardScaler::fit(&[]), Err(ObiaError::NoTrainingData)));
    }
}
