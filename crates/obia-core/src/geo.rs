//! Raster georeferencing: affine pixel ↔ world mapping and grid extent.
//! All coordinate math uses f64. No reprojection is performed; `projection`
//! is carried through untouched so writers can stamp it on outputs.
use serde::{Deserialize, Serialize};

use crate::error::{ObiaError, Result};

/// Six-coefficient affine transform in GDAL order:
///
/// ```text
///   x = c[0] + col · c[1] + row · c[2]
///   y = c[3] + col · c[4] + row · c[5]
/// ```
///
/// `(col, row)` are fractional pixel coordinates; `(0, 0)` is the outer
/// corner of the top-left pixel, `(0.5, 0.5)` its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub fn new(coeffs: [f64; 6]) -> Self {
        Self(coeffs)
    }

    /// Pixel space == world space. Used for ungeoreferenced rasters.
    pub fn identity() -> Self {
        Self([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// North-up transform from a GeoTIFF pixel scale and a single tiepoint.
    ///
    /// `scale` = (ScaleX, ScaleY) as stored in ModelPixelScaleTag (ScaleY is
    /// positive even though world Y decreases downwards).
    /// `tiepoint` = (I, J, X, Y): raster point (I, J) maps to world (X, Y).
    pub fn from_tiepoint(scale: (f64, f64), tiepoint: (f64, f64, f64, f64)) -> Self {
        let (sx, sy) = scale;
        let (i, j, x, y) = tiepoint;
        Self([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy])
    }

    /// Map fractional pixel coordinates to world coordinates.
    #[inline]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (c[0] + col * c[1] + row * c[2], c[3] + col * c[4] + row * c[5])
    }

    /// Inverse affine transform (world → fractional pixel).
    /// Fails when the linear part has zero determinant.
    pub fn inverse(&self) -> Result<GeoTransform> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return Err(ObiaError::DegenerateGeoTransform);
        }
        let inv_det = 1.0 / det;
        let a = c[5] * inv_det;
        let b = -c[2] * inv_det;
        let d = -c[4] * inv_det;
        let e = c[1] * inv_det;
        Ok(Self([
            -c[0] * a - c[3] * b,
            a,
            b,
            -c[0] * d - c[3] * e,
            d,
            e,
        ]))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Grid extent plus georeferencing shared by every raster in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGeometry {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    /// Projection definition (WKT, EPSG code, ...). Opaque to the core.
    pub projection: String,
}

impl RasterGeometry {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, projection: impl Into<String>) -> Self {
        Self {
            rows,
            cols,
            transform,
            projection: projection.into(),
        }
    }

    /// Ungeoreferenced grid: world coordinates are pixel coordinates.
    pub fn pixel_grid(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, GeoTransform::identity(), "")
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// World coordinates of the centre of pixel `(row, col)`.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }
}
