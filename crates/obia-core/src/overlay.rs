//! Ground-truth overlay: burns every training class into one integer raster.
//!
//! Class `i` of the ordered class list burns code `i + 1`; code 0 means no
//! ground truth. Burns are additive onto a zero raster, so a pixel covered
//! by several classes holds the sum of their codes. That sum is kept for
//! parity but is not a class: the per-pixel `coverage` count marks such
//! overlap pixels so nothing downstream mistakes them for real labels.
//! The codes that met on each overlap pixel are recorded separately.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ObiaError, Result};
use crate::geo::RasterGeometry;
use crate::polygon::{rasterize, PolygonSource};

/// A named land-cover category and the polygons that delineate it.
pub struct TrainingClass {
    pub name: String,
    pub source: Box<dyn PolygonSource + Send + Sync>,
}

impl TrainingClass {
    pub fn new(name: impl Into<String>, source: impl PolygonSource + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

impl fmt::Debug for TrainingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingClass")
            .field("name", &self.name)
            .field("source", &self.source.describe())
            .finish()
    }
}

/// Integer code of the class at `index` in the class list.
#[inline]
pub fn class_code(index: usize) -> u32 {
    index as u32 + 1
}

/// Name of the class carrying `code`, if any.
pub fn class_name(classes: &[TrainingClass], code: u32) -> Option<&str> {
    let idx = (code as usize).checked_sub(1)?;
    classes.get(idx).map(|c| c.name.as_str())
}

/// Summed class codes plus per-pixel coverage, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundTruthRaster {
    pub codes: Vec<u32>,
    /// Number of classes that burned each pixel.
    pub coverage: Vec<u16>,
    /// Pixel index → class codes that burned it, for overlap pixels only.
    pub overlap_classes: BTreeMap<usize, BTreeSet<u32>>,
    pub rows: usize,
    pub cols: usize,
}

impl GroundTruthRaster {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            codes: vec![0; rows * cols],
            coverage: vec![0; rows * cols],
            overlap_classes: BTreeMap::new(),
            rows,
            cols,
        }
    }

    /// Build from bare codes, treating every non-zero cell as single coverage.
    /// Intended for rasters that were burned elsewhere without overlaps.
    pub fn from_codes(codes: Vec<u32>, rows: usize, cols: usize) -> Result<Self> {
        if codes.len() != rows * cols {
            return Err(ObiaError::InvalidParameters(format!(
                "ground truth holds {} cells, expected {rows}×{cols}",
                codes.len()
            )));
        }
        let coverage = codes.iter().map(|&c| u16::from(c != 0)).collect();
        Ok(Self {
            codes,
            coverage,
            overlap_classes: BTreeMap::new(),
            rows,
            cols,
        })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.codes[row * self.cols + col]
    }

    /// Class code of pixel `index` when exactly one class covers it.
    #[inline]
    pub fn single_class_at(&self, index: usize) -> Option<u32> {
        (self.coverage[index] == 1).then_some(self.codes[index])
    }

    #[inline]
    pub fn is_overlap(&self, index: usize) -> bool {
        self.coverage[index] > 1
    }

    /// Codes of the classes that burned overlap pixel `index`.
    pub fn classes_at(&self, index: usize) -> Option<&BTreeSet<u32>> {
        self.overlap_classes.get(&index)
    }

    /// Add one burn of `code` at `index`.
    fn burn(&mut self, index: usize, code: u32) {
        match self.coverage[index] {
            0 => {}
            1 => {
                let first = self.codes[index];
                self.overlap_classes.entry(index).or_default().extend([first, code]);
            }
            _ => {
                self.overlap_classes.entry(index).or_default().insert(code);
            }
        }
        self.codes[index] += code;
        self.coverage[index] = self.coverage[index].saturating_add(1);
    }

    pub fn overlap_count(&self) -> usize {
        self.coverage.iter().filter(|&&c| c > 1).count()
    }

    /// Single-coverage pixel count per class code `1..=n_classes` (index 0 = code 1).
    pub fn class_pixel_counts(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; n_classes];
        for idx in 0..self.codes.len() {
            if let Some(code) = self.single_class_at(idx) {
                if let Some(slot) = (code as usize).checked_sub(1).and_then(|i| counts.get_mut(i)) {
                    *slot += 1;
                }
            }
        }
        counts
    }
}

/// Burn `classes` (in list order) onto a zero raster shaped like `geometry`.
pub fn overlay(classes: &[TrainingClass], geometry: &RasterGeometry) -> Result<GroundTruthRaster> {
    let (rows, cols) = geometry.shape();
    let mut gt = GroundTruthRaster::zeros(rows, cols);

    for (i, class) in classes.iter().enumerate() {
        let code = class_code(i);
        let polygons = class.source.polygons()?;
        let mask = rasterize(&polygons, geometry)?;

        let mut burned = 0usize;
        for (idx, &inside) in mask.iter().enumerate() {
            if !inside {
                continue;
            }
            gt.burn(idx, code);
            burned += 1;
        }
        debug!(
            class = %class.name,
            code,
            polygons = polygons.len(),
            pixels = burned,
            source = %class.source.describe(),
            "burned training class"
        );
    }

    let overlaps = gt.overlap_count();
    if overlaps > 0 {
        warn!(overlaps, "training polygons of different classes overlap; summed codes are not classes");
    }
    Ok(gt)
}
