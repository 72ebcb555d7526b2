//! Segment label rasters and the segmentation boundary.
//!
//! The segmentation algorithm itself is an external capability behind the
//! [`Segmenter`] trait; only its output contract matters here: a `u32` label
//! raster with the same rows × cols as the image.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ObiaError, Result};
use crate::image::Image;

/// Per-pixel segment identifiers, row-major.
///
/// Identifiers need not be contiguous. Disconnected regions sharing an id
/// are treated as one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMap {
    pub data: Vec<u32>,
    pub rows: usize,
    pub cols: usize,
}

impl SegmentMap {
    pub fn new(data: Vec<u32>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ObiaError::InvalidParameters(format!(
                "segment map holds {} cells, expected {rows}×{cols}",
                data.len()
            )));
        }
        Ok(Self { data, rows, cols })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, id: u32) {
        self.data[row * self.cols + col] = id;
    }

    /// Distinct segment identifiers in ascending order.
    pub fn segment_ids(&self) -> Vec<u32> {
        self.data.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Flat pixel indices of every segment, keyed by id (ascending).
    pub fn pixel_groups(&self) -> BTreeMap<u32, Vec<usize>> {
        let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, &id) in self.data.iter().enumerate() {
            groups.entry(id).or_default().push(idx);
        }
        groups
    }

    /// Fail unless this map covers exactly `rows × cols`.
    pub fn ensure_shape(&self, expected: (usize, usize)) -> Result<()> {
        if self.shape() != expected {
            return Err(ObiaError::ShapeMismatch {
                expected,
                actual: self.shape(),
            });
        }
        Ok(())
    }
}

/// Tunable parameters handed to the segmentation algorithm.
/// Defaults match the reference run (1500 segments, compactness 1, σ 0.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Approximate number of segments requested.
    pub n_segments: usize,
    /// Colour vs. spatial proximity balance (SLIC-style algorithms).
    pub compactness: f64,
    /// Gaussian pre-smoothing width in pixels (0 = none).
    pub sigma: f64,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            n_segments: 1500,
            compactness: 1.0,
            sigma: 0.5,
        }
    }
}

/// Opaque segmentation capability.
pub trait Segmenter {
    fn segment(&self, image: &Image, params: &SegmentationParams) -> Result<SegmentMap>;
}

/// Regular square blocks sized so that roughly `n_segments` of them tile the
/// image. A baseline segmenter; `compactness` and `sigma` are not used.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSegmenter;

impl Segmenter for GridSegmenter {
    fn segment(&self, image: &Image, params: &SegmentationParams) -> Result<SegmentMap> {
        if params.n_segments == 0 {
            return Err(ObiaError::InvalidParameters("n_segments must be at least 1".into()));
        }
        let (rows, cols) = image.shape();
        if rows == 0 || cols == 0 {
            return Err(ObiaError::EmptyImage);
        }

        let area_per_segment = (rows * cols) as f64 / params.n_segments as f64;
        let side = (area_per_segment.sqrt().ceil() as usize).max(1);
        let blocks_per_row = cols.div_ceil(side);

        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(((r / side) * blocks_per_row + c / side) as u32);
            }
        }
        debug!(side, blocks = blocks_per_row * rows.div_ceil(side), "grid segmentation");
        SegmentMap::new(data, rows, cols)
    }
}

/// Segment raster produced outside this crate (e.g. by a SLIC run in another
/// tool), replayed as a segmenter so it slots into the pipeline.
#[derive(Debug, Clone)]
pub struct PrecomputedSegments {
    map: SegmentMap,
}

impl PrecomputedSegments {
    pub fn new(map: SegmentMap) -> Self {
        Self { map }
    }
}

impl Segmenter for PrecomputedSegments {
    fn segment(&self, image: &Image, _params: &SegmentationParams) -> Result<SegmentMap> {
        self.map.ensure_shape(image.shape())?;
        Ok(self.map.clone())
    }
}
