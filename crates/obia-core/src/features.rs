//! Per-segment spectral descriptors.
//!
//! For each band, in band index order: `[min, max, mean, variance, skewness,
//! kurtosis]`, so a segment over `B` bands yields `6 · B` numbers.
//!
//! Moments:
//!   variance = Σ(x − x̄)² / (n − 1)           (unbiased)
//!   skewness = m₃ / m₂^1.5                     (biased Fisher–Pearson)
//!   kurtosis = m₄ / m₂² − 3                    (biased, Fisher excess)
//! with mₖ = Σ(x − x̄)ᵏ / n.
//!
//! Undefined moments are pinned to 0.0: variance when n == 1, skewness and
//! kurtosis whenever the band is constant over the segment (which includes
//! every single-pixel segment). No NaN ever leaves this module.
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::image::Image;
use crate::segments::SegmentMap;

#[cfg(feature = "threading")]
use rayon::prelude::*;

/// Number of statistics emitted per band.
pub const FEATURES_PER_BAND: usize = 6;

/// Statistic names in emission order, used for report headers.
pub const FEATURE_NAMES: [&str; FEATURES_PER_BAND] =
    ["min", "max", "mean", "variance", "skewness", "kurtosis"];

/// Fixed-length descriptor of one segment.
pub type FeatureVector = Vec<f64>;

/// Column headers for a descriptor over `n_bands` bands, e.g. `b0_min`.
pub fn feature_names(n_bands: usize) -> Vec<String> {
    (0..n_bands)
        .flat_map(|b| FEATURE_NAMES.iter().map(move |s| format!("b{b}_{s}")))
        .collect()
}

/// Describe one segment from its interleaved pixel rows
/// (`samples.len() == n_pixels * n_bands`).
pub fn segment_features(samples: &[f32], n_bands: usize) -> FeatureVector {
    if n_bands == 0 || samples.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(FEATURES_PER_BAND * n_bands);
    for b in 0..n_bands {
        let band = samples.iter().skip(b).step_by(n_bands).map(|&v| v as f64);
        out.extend_from_slice(&band_stats(band));
    }
    out
}

fn band_stats(values: impl Iterator<Item = f64> + Clone) -> [f64; FEATURES_PER_BAND] {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.clone() {
        n += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    if n == 0 {
        return [0.0; FEATURES_PER_BAND];
    }

    let mean = (sum / n as f64).clamp(min, max);
    if max == min {
        // Constant band (always the case for a single pixel).
        return [min, max, mean, 0.0, 0.0, 0.0];
    }

    let (mut s2, mut s3, mut s4) = (0.0f64, 0.0f64, 0.0f64);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        s2 += d2;
        s3 += d2 * d;
        s4 += d2 * d2;
    }
    let nf = n as f64;
    let m2 = s2 / nf;
    let m3 = s3 / nf;
    let m4 = s4 / nf;

    let variance = if n > 1 { s2 / (nf - 1.0) } else { 0.0 };
    let (skewness, kurtosis) = if m2 > 0.0 {
        (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
    } else {
        (0.0, 0.0)
    };
    [min, max, mean, variance, skewness, kurtosis]
}

/// Describe every segment of `segments` over the bands of `image`.
/// Returned map is keyed by segment id (ascending).
pub fn extract_all(image: &Image, segments: &SegmentMap) -> Result<BTreeMap<u32, FeatureVector>> {
    segments.ensure_shape(image.shape())?;

    let groups: Vec<(u32, Vec<usize>)> = segments.pixel_groups().into_iter().collect();
    let degenerate = groups.iter().filter(|(_, px)| px.len() == 1).count();
    if degenerate > 0 {
        debug!(degenerate, "single-pixel segments: variance pinned to 0");
    }

    let describe = |(id, pixels): &(u32, Vec<usize>)| -> (u32, FeatureVector) {
        let mut samples = Vec::with_capacity(pixels.len() * image.bands);
        for &idx in pixels {
            samples.extend_from_slice(image.pixel_at(idx));
        }
        (*id, segment_features(&samples, image.bands))
    };

    #[cfg(feature = "threading")]
    let described: Vec<(u32, FeatureVector)> = groups.par_iter().map(describe).collect();
    #[cfg(not(feature = "threading"))]
    let described: Vec<(u32, FeatureVector)> = groups.iter().map(describe).collect();

    Ok(described.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const MIN: usize = 0;
    const MAX: usize = 1;
    const MEAN: usize = 2;
    const VAR: usize = 3;
    const SKEW: usize = 4;
    const KURT: usize = 5;

    #[test]
    fn single_pixel_segment_has_zero_variance() {
        let f = segment_features(&[0.3, 0.7, 0.1], 3);
        assert_eq!(f.len(), 18);
        for b in 0..3 {
            let base = b * FEATURES_PER_BAND;
            assert_eq!(f[base + VAR], 0.0);
            assert_eq!(f[base + SKEW], 0.0);
            assert_eq!(f[base + KURT], 0.0);
        }
        assert!(f.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn constant_segment_is_nan_free() {
        let f = segment_features(&[0.5; 40], 2);
        assert!(f.iter().all(|v| v.is_finite()));
        assert_eq!(f[VAR], 0.0);
        assert_eq!(f[FEATURES_PER_BAND + KURT], 0.0);
    }

    #[test]
    fn moments_match_reference_values() {
        // x = [1, 2, 3, 4, 10]; mean 4, Σd² = 50, Σd³ = 180, Σd⁴ = 1394
        let f = segment_features(&[1.0, 2.0, 3.0, 4.0, 10.0], 1);
        assert_eq!(f[MIN], 1.0);
        assert_eq!(f[MAX], 10.0);
        assert_abs_diff_eq!(f[MEAN], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f[VAR], 12.5, epsilon = 1e-12);
        let m2: f64 = 10.0;
        assert_abs_diff_eq!(f[SKEW], 36.0 / m2.powf(1.5), epsilon = 1e-12);
        assert_abs_diff_eq!(f[KURT], 278.8 / 100.0 - 3.0, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_band_has_zero_skewness() {
        let f = segment_features(&[-2.0, -1.0, 0.0, 1.0, 2.0], 1);
        assert_abs_diff_eq!(f[SKEW], 0.0, epsilon = 1e-12);
        // Uniform-like: platykurtic.
        assert!(f[KURT] < 0.0);
    }

    #[test]
    fn bands_are_emitted_in_index_order() {
        // Two pixels, two bands: band 0 = [1, 3], band 1 = [10, 30].
        let f = segment_features(&[1.0, 10.0, 3.0, 30.0], 2);
        assert_eq!(&f[..3], &[1.0, 3.0, 2.0]);
        assert_eq!(&f[FEATURES_PER_BAND..FEATURES_PER_BAND + 3], &[10.0, 30.0, 20.0]);
    }

    #[test]
    fn min_le_mean_le_max_on_pseudo_random_segments() {
        let mut state: u64 = 99;
        for n in 1..60 {
            let samples: Vec<f32> = (0..n * 3)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    (state >> 40) as f32 / (1u64 << 24) as f32
                })
                .collect();
            let f = segment_features(&samples, 3);
            for b in 0..3 {
                let base = b * FEATURES_PER_BAND;
                assert!(f[base + MIN] <= f[base + MEAN]);
                assert!(f[base + MEAN] <= f[base + MAX]);
                assert!(f[base..base + FEATURES_PER_BAND].iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn extract_all_keys_by_segment_id() {
        let img = Image::from_interleaved(vec![1.0, 2.0, 3.0, 4.0], 2, 2, 1).unwrap();
        let map = SegmentMap::new(vec![8, 8, 2, 2], 2, 2).unwrap();
        let table = extract_all(&img, &map).unwrap();
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![2, 8]);
        assert_eq!(table[&8][MEAN], 1.5);
        assert_eq!(table[&2][MEAN], 3.5);
    }

    #[test]
    fn feature_names_follow_band_order() {
        let names = feature_names(2);
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "b0_min");
        assert_eq!(names[11], "b1_kurtosis");
    }
}
