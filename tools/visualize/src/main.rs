//! Label-raster visualizer: renders a segment or class GeoTIFF to PNG.
//! Each label gets a stable colour; 0 is drawn black. Segment boundaries can
//! be outlined for checking segmentation granularity against the polygons.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use obia_core::SegmentMap;
use obia_io::read_label_raster;

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Render a label GeoTIFF (segments or classes) to PNG")]
struct Args {
    /// Integer label GeoTIFF.
    #[arg(short, long)]
    input: PathBuf,

    /// Output PNG.
    #[arg(short, long, default_value = "labels.png")]
    output: PathBuf,

    /// Outline label boundaries in white.
    #[arg(short, long)]
    boundaries: bool,
}

// ── Colour helpers ────────────────────────────────────────────────────────────

/// HSV (all in [0, 1]) → RGB.
fn hsv(h: f32, s: f32, v: f32) -> [u8; 3] {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match i as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Label → colour. Hues step by the golden ratio so neighbouring ids differ.
fn label_color(label: u32) -> [u8; 3] {
    if label == 0 {
        return [0, 0, 0];
    }
    let hue = (label as f64 * 0.618_033_988_75).fract() as f32;
    let sat = if label % 2 == 0 { 0.55 } else { 0.8 };
    hsv(hue, sat, 0.95)
}

/// True if a 4-connected neighbour of `(r, c)` carries a different label.
/// Image edges do not count as boundaries.
fn is_boundary(map: &SegmentMap, r: usize, c: usize) -> bool {
    let here = map.get(r, c);
    let neighbors: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    neighbors.iter().any(|&(dr, dc)| {
        let nr = r as i64 + dr;
        let nc = c as i64 + dc;
        if nr < 0 || nr >= map.rows as i64 || nc < 0 || nc >= map.cols as i64 {
            return false;
        }
        map.get(nr as usize, nc as usize) != here
    })
}

fn render(map: &SegmentMap, boundaries: bool) -> image::RgbImage {
    let mut img = image::RgbImage::new(map.cols as u32, map.rows as u32);
    for r in 0..map.rows {
        for c in 0..map.cols {
            let px = if boundaries && is_boundary(map, r, c) {
                [255, 255, 255]
            } else {
                label_color(map.get(r, c))
            };
            img.put_pixel(c as u32, r as u32, image::Rgb(px));
        }
    }
    img
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let args = Args::parse();

    let (map, _) = read_label_raster(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let img = render(&map, args.boundaries);
    img.save(&args.output)
        .with_context(|| format!("saving {}", args.output.display()))?;
    info!(path = %args.output.display(), labels = map.segment_ids().len(), "wrote PNG");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_black_and_labels_differ() {
        assert_eq!(label_color(0), [0, 0, 0]);
        assert_ne!(label_color(1), label_color(2));
        assert_ne!(label_color(1), [0, 0, 0]);
    }

    #[test]
    fn boundaries_follow_label_changes() {
        let map = SegmentMap::new(vec![1, 1, 2, 1, 1, 2], 2, 3).unwrap();
        assert!(!is_boundary(&map, 0, 0));
        assert!(is_boundary(&map, 0, 1));
        assert!(is_boundary(&map, 1, 2));
        let img = render(&map, true);
        assert_eq!(img.get_pixel(0, 0).0, label_color(1));
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255]);
    }
}
