//! Per-pixel classification output and accuracy against verification data.
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ObiaError, Result};
use crate::overlay::GroundTruthRaster;
use crate::segments::SegmentMap;

use super::Prediction;

/// Class code per pixel, row-major. 0 = no prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedRaster {
    pub data: Vec<u32>,
    pub rows: usize,
    pub cols: usize,
}

impl ClassifiedRaster {
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.data[row * self.cols + col]
    }

    /// Binary mask: `value` where the pixel is `code`, 0 elsewhere.
    pub fn mask_class(&self, code: u32, value: u32) -> Vec<u32> {
        self.data.iter().map(|&c| if c == code { value } else { 0 }).collect()
    }

    /// Pixel count per class code (code 0 included when present).
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for &c in &self.data {
            *counts.entry(c).or_insert(0) += 1;
        }
        counts
    }
}

/// Paint every pixel with the class predicted for its segment.
pub fn paint(segments: &SegmentMap, predictions: &[Prediction]) -> ClassifiedRaster {
    let by_segment: HashMap<u32, u32> =
        predictions.iter().map(|p| (p.segment_id, p.class_code)).collect();
    let mut missing = 0usize;
    let data = segments
        .data
        .iter()
        .map(|id| match by_segment.get(id) {
            Some(&code) => code,
            None => {
                missing += 1;
                0
            }
        })
        .collect();
    if missing > 0 {
        warn!(pixels = missing, "pixels belong to segments without a prediction");
    }
    ClassifiedRaster {
        data,
        rows: segments.rows,
        cols: segments.cols,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassAccuracy {
    pub total: usize,
    pub correct: usize,
}

impl ClassAccuracy {
    /// Producer's accuracy for this class.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub evaluated_pixels: usize,
    pub correct_pixels: usize,
    pub accuracy: f64,
    /// Keyed by verification class code.
    pub per_class: BTreeMap<u32, ClassAccuracy>,
}

/// Overall and per-class agreement between a classification and a
/// verification raster. Only pixels covered by exactly one verification
/// class are counted.
pub fn assess_accuracy(
    verification: &GroundTruthRaster,
    classified: &ClassifiedRaster,
) -> Result<AccuracyReport> {
    if verification.shape() != classified.shape() {
        return Err(ObiaError::ShapeMismatch {
            expected: verification.shape(),
            actual: classified.shape(),
        });
    }

    let mut per_class: BTreeMap<u32, ClassAccuracy> = BTreeMap::new();
    for (idx, &predicted) in classified.data.iter().enumerate() {
        let Some(truth) = verification.single_class_at(idx) else {
            continue;
        };
        let entry = per_class.entry(truth).or_default();
        entry.total += 1;
        if predicted == truth {
            entry.correct += 1;
        }
    }

    let evaluated_pixels: usize = per_class.values().map(|c| c.total).sum();
    if evaluated_pixels == 0 {
        return Err(ObiaError::NoVerificationPixels);
    }
    let correct_pixels: usize = per_class.values().map(|c| c.correct).sum();
    let accuracy = correct_pixels as f64 / evaluated_pixels as f64;
    info!(evaluated_pixels, correct_pixels, accuracy, "accuracy assessed");

    Ok(AccuracyReport {
        evaluated_pixels,
        correct_pixels,
        accuracy,
        per_class,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn prediction(segment_id: u32, class_code: u32) -> Prediction {
        Prediction { segment_id, class_code }
    }

    #[test]
    fn paint_spreads_segment_class_to_pixels() {
        let map = SegmentMap::new(vec![5, 5, 7, 7, 9, 9], 2, 3).unwrap();
        let raster = paint(&map, &[prediction(5, 1), prediction(7, 2)]);
        assert_eq!(raster.data, vec![1, 1, 2, 2, 0, 0]);
        assert_eq!(raster.get(1, 0), 2);
        assert_eq!(raster.class_counts(), BTreeMap::from([(0, 2), (1, 2), (2, 2)]));
    }

    #[test]
    fn mask_keeps_only_the_requested_class() {
        let raster = ClassifiedRaster { data: vec![1, 2, 2, 3], rows: 2, cols: 2 };
        assert_eq!(raster.mask_class(2, 255), vec![0, 255, 255, 0]);
    }

    #[test]
    fn accuracy_ignores_background_and_overlap() {
        let mut truth = GroundTruthRaster::from_codes(vec![1, 1, 2, 2, 0, 3], 2, 3).unwrap();
        // Last pixel burned by two classes (1 + 2).
        truth.coverage[5] = 2;
        let classified = ClassifiedRaster { data: vec![1, 2, 2, 2, 1, 3], rows: 2, cols: 3 };
        let report = assess_accuracy(&truth, &classified).unwrap();
        assert_eq!(report.evaluated_pixels, 4);
        assert_eq!(report.correct_pixels, 3);
        assert_relative_eq!(report.accuracy, 0.75);
        assert_eq!(report.per_class[&1], ClassAccuracy { total: 2, correct: 1 });
        assert_relative_eq!(report.per_class[&2].ratio(), 1.0);
        assert!(!report.per_class.contains_key(&3));
    }

    #[test]
    fn empty_verification_is_an_error() {
        let truth = GroundTruthRaster::zeros(2, 2);
        let classified = ClassifiedRaster { data: vec![1; 4], rows: 2, cols: 2 };
        assert!(matches!(
            assess_accuracy(&truth, &classified),
            Err(ObiaError::NoVerificationPixels)
        ));
    }

    #[test]
    fn shapes_must_agree() {
        let truth = GroundTruthRaster::zeros(2, 2);
        let classified = ClassifiedRaster { data: vec![1; 6], rows: 2, cols: 3 };
        assert!(matches!(
            assess_accuracy(&truth, &classified),
            Err(ObiaError::ShapeMismatch { .. })
        ));
    }
}
