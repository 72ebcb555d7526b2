use serde::{Deserialize, Serialize};

use crate::error::{ObiaError, Result};

/// A multi-band raster stored as f32, row-major and band-interleaved:
/// sample `(row, col, band)` lives at `(row * cols + col) * bands + band`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub data: Vec<f32>,
    pub rows: usize,
    pub cols: usize,
    pub bands: usize,
}

impl Image {
    /// Wrap interleaved samples. `data.len()` must equal `rows * cols * bands`.
    pub fn from_interleaved(data: Vec<f32>, rows: usize, cols: usize, bands: usize) -> Result<Self> {
        if rows == 0 || cols == 0 || bands == 0 {
            return Err(ObiaError::EmptyImage);
        }
        if data.len() != rows * cols * bands {
            return Err(ObiaError::InvalidParameters(format!(
                "image buffer holds {} samples, expected {rows}×{cols}×{bands}",
                data.len()
            )));
        }
        Ok(Self { data, rows, cols, bands })
    }

    /// Stack single-band planes (each `rows * cols`, row-major) into one image.
    pub fn from_planes(planes: &[Vec<f32>], rows: usize, cols: usize) -> Result<Self> {
        let bands = planes.len();
        if let Some(bad) = planes.iter().find(|p| p.len() != rows * cols) {
            return Err(ObiaError::InvalidParameters(format!(
                "band plane holds {} samples, expected {rows}×{cols}",
                bad.len()
            )));
        }
        let mut data = Vec::with_capacity(rows * cols * bands);
        for i in 0..rows * cols {
            data.extend(planes.iter().map(|p| p[i]));
        }
        Self::from_interleaved(data, rows, cols, bands)
    }

    /// Create an image filled with the given value.
    pub fn filled(rows: usize, cols: usize, bands: usize, fill: f32) -> Self {
        Self {
            data: vec![fill; rows * cols * bands],
            rows,
            cols,
            bands,
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn n_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// All band samples of one pixel.
    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &[f32] {
        let start = (row * self.cols + col) * self.bands;
        &self.data[start..start + self.bands]
    }

    /// Band samples of the pixel at flat index `row * cols + col`.
    #[inline]
    pub fn pixel_at(&self, index: usize) -> &[f32] {
        let start = index * self.bands;
        &self.data[start..start + self.bands]
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, band: usize) -> f32 {
        self.data[(row * self.cols + col) * self.bands + band]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, band: usize, val: f32) {
        self.data[(row * self.cols + col) * self.bands + band] = val;
    }

    pub fn min_value(&self) -> f32 {
        self.data.iter().cloned().fold(f32::INFINITY, f32::min)
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Linear contrast stretch of the whole image (all bands jointly) from
    /// its own [min, max] onto [0, 1]. A constant image becomes all zeros.
    pub fn rescale_intensity(&mut self) {
        let lo = self.min_value();
        let hi = self.max_value();
        let range = hi - lo;
        if !range.is_finite() || range <= 0.0 {
            self.data.iter_mut().for_each(|v| *v = 0.0);
            return;
        }
        for v in &mut self.data {
            *v = ((*v - lo) / range).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_planes_interleaves_bands() {
        let r = vec![1.0, 2.0, 3.0, 4.0];
        let g = vec![10.0, 20.0, 30.0, 40.0];
        let img = Image::from_planes(&[r, g], 2, 2).unwrap();
        assert_eq!(img.bands, 2);
        assert_eq!(img.pixel(0, 1), &[2.0, 20.0]);
        assert_eq!(img.pixel(1, 1), &[4.0, 40.0]);
        assert_eq!(img.get(1, 0, 1), 30.0);
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let err = Image::from_interleaved(vec![0.0; 5], 2, 2, 1).unwrap_err();
        assert!(matches!(err, ObiaError::InvalidParameters(_)));
        assert!(matches!(Image::from_interleaved(vec![], 0, 2, 1), Err(ObiaError::EmptyImage)));
    }

    #[test]
    fn rescale_maps_extremes_to_unit_interval() {
        let mut img = Image::from_interleaved(vec![100.0, 300.0, 200.0, 500.0], 2, 2, 1).unwrap();
        img.rescale_intensity();
        assert_eq!(img.min_value(), 0.0);
        assert_eq!(img.max_value(), 1.0);
        assert!((img.get(0, 1, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rescale_constant_image_is_zero() {
        let mut img = Image::filled(3, 3, 2, 42.0);
        img.rescale_intensity();
        assert!(img.data.iter().all(|&v| v == 0.0));
    }
}
