//! Classification boundary: the model is an opaque [`Classifier`]; this
//! module only standardizes features, fits on the training subset of the
//! object table and predicts a class for every object.

pub mod centroid;
pub mod raster;
pub mod scaler;

pub use centroid::NearestCentroid;
pub use raster::{assess_accuracy, paint, AccuracyReport, ClassAccuracy, ClassifiedRaster};
pub use scaler::StandardScaler;

use serde::Serialize;
use tracing::info;

use crate::error::{ObiaError, Result};
use crate::objects::ObjectTable;

/// Opaque supervised model over fixed-length feature rows.
pub trait Classifier {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u32]) -> Result<()>;

    /// One class code per input row.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u32>>;
}

/// Predicted class for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub segment_id: u32,
    pub class_code: u32,
}

/// Standardize, fit on labeled objects, predict every object.
pub struct ClassificationDriver;

impl ClassificationDriver {
    pub fn run(table: &ObjectTable, classifier: &mut dyn Classifier) -> Result<Vec<Prediction>> {
        let training: Vec<&[f64]> = table.training_features();
        if training.is_empty() {
            return Err(ObiaError::NoTrainingData);
        }
        let labels = table.training_labels();

        let scaler = StandardScaler::fit(&training)?;
        let x_train = scaler.transform(&training);
        let all: Vec<&[f64]> = table.objects().iter().map(|o| o.features.as_slice()).collect();
        let x_all = scaler.transform(&all);

        classifier.fit(&x_train, &labels)?;
        let predicted = classifier.predict(&x_all)?;
        if predicted.len() != table.len() {
            return Err(ObiaError::Classifier(format!(
                "model returned {} predictions for {} objects",
                predicted.len(),
                table.len()
            )));
        }

        info!(
            trained_on = training.len(),
            predicted = predicted.len(),
            "classification complete"
        );
        Ok(table
            .objects()
            .iter()
            .zip(predicted)
            .map(|(o, class_code)| Prediction {
                segment_id: o.segment_id,
                class_code,
            })
            .collect())
    }
}
