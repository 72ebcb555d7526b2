use std::collections::BTreeMap;

use crate::error::{ObiaError, Result};

use super::Classifier;

/// Minimal bundled model: one mean feature vector per class, prediction by
/// Euclidean distance. Ties go to the lowest class code.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    centroids: BTreeMap<u32, Vec<f64>>,
}

impl NearestCentroid {
    pub fn centroids(&self) -> &BTreeMap<u32, Vec<f64>> {
        &self.centroids
    }
}

impl Classifier for NearestCentroid {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u32]) -> Result<()> {
        if features.len() != labels.len() {
            return Err(ObiaError::Classifier(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(ObiaError::NoTrainingData);
        }
        let dim = features[0].len();

        let mut sums: BTreeMap<u32, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, &label) in features.iter().zip(labels) {
            if row.len() != dim {
                return Err(ObiaError::Classifier("feature rows have inconsistent lengths".into()));
            }
            let (sum, count) = sums.entry(label).or_insert_with(|| (vec![0.0; dim], 0));
            sum.iter_mut().zip(row).for_each(|(s, v)| *s += v);
            *count += 1;
        }

        self.centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| (label, sum.into_iter().map(|s| s / count as f64).collect()))
            .collect();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u32>> {
        if self.centroids.is_empty() {
            return Err(ObiaError::Classifier("model is not fitted".into()));
        }
        let predictions = features
            .iter()
            .map(|row| {
                let mut best = (u32::MAX, f64::INFINITY);
                for (&label, centroid) in &self.centroids {
                    let d2: f64 = row.iter().zip(centroid).map(|(a, b)| (a - b).powi(2)).sum();
                    if d2 < best.1 {
                        best = (label, d2);
                    }
                }
                best.0
            })
            .collect();
        Ok(predictions)
    }
}
