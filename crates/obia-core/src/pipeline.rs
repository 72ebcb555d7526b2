//! Pipeline orchestrator: runs the training-table stages in order.
//!
//! ```text
//!   Segmented → Overlaid → Assigned ─┬─ conflict → Aborted
//!                                    └─ ok → TableBuilt → ReadyForClassification
//! ```
//!
//! No retries happen inside a run. After an abort the caller changes the
//! segmentation parameters (or the ground truth) and starts over.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assign::{assign_segments, Assignment};
use crate::error::{ObiaError, Result};
use crate::geo::RasterGeometry;
use crate::image::Image;
use crate::objects::{build_object_table, ObjectTable};
use crate::overlay::{overlay, GroundTruthRaster, TrainingClass};
use crate::segments::{SegmentMap, SegmentationParams, Segmenter};

// ── Parameters ────────────────────────────────────────────────────────────────

/// Run-level parameters. Defaults reproduce the reference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub segmentation: SegmentationParams,
    /// Stretch the image to [0, 1] before segmentation and feature extraction.
    pub rescale_intensity: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            segmentation: SegmentationParams::default(),
            rescale_intensity: true,
        }
    }
}

// ── States ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Segmented,
    Overlaid,
    Assigned,
    Aborted,
    TableBuilt,
    ReadyForClassification,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Aborted | Stage::ReadyForClassification)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Segmented => "segmented",
            Stage::Overlaid => "overlaid",
            Stage::Assigned => "assigned",
            Stage::Aborted => "aborted",
            Stage::TableBuilt => "table-built",
            Stage::ReadyForClassification => "ready-for-classification",
        };
        f.write_str(name)
    }
}

/// Successful run output, handed to the classification driver.
#[derive(Debug, Clone)]
pub struct PreparedObjects {
    pub segments: SegmentMap,
    pub ground_truth: GroundTruthRaster,
    pub assignment: Assignment,
    pub table: ObjectTable,
    pub stage: Stage,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Runs segmentation, overlay, assignment and table construction.
pub struct ObjectPipeline {
    params: PipelineParams,
}

impl ObjectPipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Run every stage for one image and class list.
    ///
    /// `image` is taken by value because the intensity stretch (when enabled)
    /// rewrites it; it is immutable from segmentation onward.
    pub fn run(
        &self,
        mut image: Image,
        geometry: &RasterGeometry,
        classes: &[TrainingClass],
        segmenter: &dyn Segmenter,
    ) -> Result<PreparedObjects> {
        if image.n_pixels() == 0 || image.bands == 0 {
            return Err(ObiaError::EmptyImage);
        }
        if image.shape() != geometry.shape() {
            return Err(ObiaError::ShapeMismatch {
                expected: geometry.shape(),
                actual: image.shape(),
            });
        }
        if classes.is_empty() {
            return Err(ObiaError::InvalidParameters("class list is empty".into()));
        }
        if self.params.rescale_intensity {
            image.rescale_intensity();
        }

        // ── 1. Segmentation ─────────────────────────────────────────────────
        let segments = segmenter.segment(&image, &self.params.segmentation)?;
        segments.ensure_shape(image.shape())?;
        transition(Stage::Segmented);

        // ── 2. Ground-truth overlay ─────────────────────────────────────────
        let ground_truth = overlay(classes, geometry)?;
        transition(Stage::Overlaid);

        // ── 3. Assignment + conflict check ──────────────────────────────────
        let assignment = match assign_segments(&segments, &ground_truth, classes) {
            Ok(a) => a,
            Err(err @ ObiaError::AmbiguousSegmentation(_)) => {
                transition(Stage::Aborted);
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        transition(Stage::Assigned);

        // ── 4. Object table ─────────────────────────────────────────────────
        let table = build_object_table(&image, &segments, &assignment)?;
        transition(Stage::TableBuilt);
        if table.n_labeled() == 0 {
            warn!("no segment carries a training label; classification cannot be fitted");
        }

        transition(Stage::ReadyForClassification);
        Ok(PreparedObjects {
            segments,
            ground_truth,
            assignment,
            table,
            stage: Stage::ReadyForClassification,
        })
    }
}

impl Default for ObjectPipeline {
    fn default() -> Self {
        Self::new(PipelineParams::default())
    }
}

fn transition(stage: Stage) {
    debug!(%stage, terminal = stage.is_terminal(), "pipeline stage");
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::Polygon;
    use crate::segments::{GridSegmenter, PrecomputedSegments};

    fn gradient_image(rows: usize, cols: usize) -> Image {
        let data = (0..rows * cols).map(|i| i as f32).collect();
        Image::from_interleaved(data, rows, cols, 1).unwrap()
    }

    #[test]
    fn default_params_match_reference_run() {
        let p = PipelineParams::default();
        assert_eq!(p.segmentation.n_segments, 1500);
        assert_eq!(p.segmentation.compactness, 1.0);
        assert_eq!(p.segmentation.sigma, 0.5);
        assert!(p.rescale_intensity);
    }

    #[test]
    fn grid_run_reaches_ready_state() {
        let img = gradient_image(8, 8);
        let geom = RasterGeometry::pixel_grid(8, 8);
        let classes = vec![
            TrainingClass::new("dark", vec![Polygon::rect(0.0, 0.0, 4.0, 4.0)]),
            TrainingClass::new("bright", vec![Polygon::rect(4.0, 4.0, 8.0, 8.0)]),
        ];
        let pipeline = ObjectPipeline::new(PipelineParams {
            segmentation: SegmentationParams { n_segments: 4, ..Default::default() },
            rescale_intensity: true,
        });
        let out = pipeline.run(img, &geom, &classes, &GridSegmenter).unwrap();
        assert_eq!(out.stage, Stage::ReadyForClassification);
        assert!(out.stage.is_terminal());
        assert_eq!(out.table.len(), 4);
        assert_eq!(out.table.training_labels(), vec![1, 2]);
    }

    #[test]
    fn coarse_segmentation_aborts() {
        let img = gradient_image(8, 8);
        let geom = RasterGeometry::pixel_grid(8, 8);
        let classes = vec![
            TrainingClass::new("dark", vec![Polygon::rect(0.0, 0.0, 2.0, 2.0)]),
            TrainingClass::new("bright", vec![Polygon::rect(6.0, 6.0, 8.0, 8.0)]),
        ];
        // One segment covers everything, so both classes land in it.
        let single = PrecomputedSegments::new(SegmentMap::new(vec![0; 64], 8, 8).unwrap());
        let err = ObjectPipeline::default().run(img, &geom, &classes, &single).unwrap_err();
        assert!(matches!(err, ObiaError::AmbiguousSegmentation(ref r) if r.segments.len() == 1));
    }

    #[test]
    fn geometry_must_match_image() {
        let img = gradient_image(4, 4);
        let geom = RasterGeometry::pixel_grid(4, 5);
        let classes = vec![TrainingClass::new("a", Vec::<Polygon>::new())];
        assert!(matches!(
            ObjectPipeline::default().run(img, &geom, &classes, &GridSegmenter),
            Err(ObiaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_class_list_is_rejected() {
        let img = gradient_image(4, 4);
        let geom = RasterGeometry::pixel_grid(4, 4);
        assert!(matches!(
            ObjectPipeline::default().run(img, &geom, &[], &GridSegmenter),
            Err(ObiaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn stage_names_are_kebab_case() {
        assert_eq!(Stage::ReadyForClassification.to_string(), "ready-for-classification");
        assert!(!Stage::Assigned.is_terminal());
    }
}
