//! Training-region polygons and their rasterization onto a pixel grid.
//!
//! Burn rule: a pixel is inside when its centre is inside the polygon under
//! the even-odd rule over all rings (exterior and holes alike). This is the
//! default, non-all-touched rule of common rasterizers.
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::RasterGeometry;

/// A polygon in world coordinates: one exterior ring plus optional holes.
/// Rings may be open or closed; the closing edge is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<[f64; 2]>,
    #[serde(default)]
    pub holes: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    pub fn new(exterior: Vec<[f64; 2]>) -> Self {
        Self { exterior, holes: Vec::new() }
    }

    pub fn with_holes(exterior: Vec<[f64; 2]>, holes: Vec<Vec<[f64; 2]>>) -> Self {
        Self { exterior, holes }
    }

    /// Axis-aligned rectangle `[x0, x1] × [y0, y1]`.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
    }

    fn rings(&self) -> impl Iterator<Item = &Vec<[f64; 2]>> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }
}

/// Supplier of one class's training polygons (a file, a database layer, a
/// literal list). Implementations live outside the core.
pub trait PolygonSource {
    /// Short description for log lines (usually a path).
    fn describe(&self) -> String;

    fn polygons(&self) -> Result<Vec<Polygon>>;
}

impl PolygonSource for Vec<Polygon> {
    fn describe(&self) -> String {
        format!("{} in-memory polygon(s)", self.len())
    }

    fn polygons(&self) -> Result<Vec<Polygon>> {
        Ok(self.clone())
    }
}

/// Rasterize `polygons` onto `geometry`: returns a row-major mask with
/// `true` for every pixel whose centre falls inside any polygon.
pub fn rasterize(polygons: &[Polygon], geometry: &RasterGeometry) -> Result<Vec<bool>> {
    let (rows, cols) = geometry.shape();
    let mut mask = vec![false; rows * cols];
    if rows == 0 || cols == 0 {
        return Ok(mask);
    }
    let to_pixel = geometry.transform.inverse()?;

    let mut crossings: Vec<f64> = Vec::new();
    for poly in polygons {
        // Edges in fractional pixel space (col, row).
        let edges: Vec<((f64, f64), (f64, f64))> = poly
            .rings()
            .filter(|ring| ring.len() >= 3)
            .flat_map(|ring| {
                let pts: Vec<(f64, f64)> =
                    ring.iter().map(|p| to_pixel.pixel_to_world(p[0], p[1])).collect();
                let n = pts.len();
                (0..n).map(move |i| (pts[i], pts[(i + 1) % n]))
            })
            .collect();
        if edges.is_empty() {
            continue;
        }

        let row_min = edges.iter().map(|(a, b)| a.1.min(b.1)).fold(f64::INFINITY, f64::min);
        let row_max = edges.iter().map(|(a, b)| a.1.max(b.1)).fold(f64::NEG_INFINITY, f64::max);
        let r0 = (row_min - 0.5).ceil().max(0.0) as usize;
        let r1 = ((row_max - 0.5).floor().min(rows as f64 - 1.0)).max(-1.0);
        if r1 < 0.0 {
            continue;
        }
        let r1 = r1 as usize;

        for r in r0..=r1 {
            let yc = r as f64 + 0.5;
            crossings.clear();
            for &((x0, y0), (x1, y1)) in &edges {
                // Half-open rule: count an edge when yc ∈ [min_y, max_y).
                if (y0 <= yc && yc < y1) || (y1 <= yc && yc < y0) {
                    crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                // Pixel centres c + 0.5 with span[0] <= c + 0.5 < span[1].
                let c0 = (span[0] - 0.5).ceil().max(0.0);
                let c1 = (span[1] - 0.5).ceil().min(cols as f64);
                if c1 <= c0 {
                    continue;
                }
                let row = &mut mask[r * cols..(r + 1) * cols];
                row[c0 as usize..c1 as usize].iter_mut().for_each(|m| *m = true);
            }
        }
    }
    Ok(mask)
}
