//! GeoJSON polygon source. Accepts a FeatureCollection, a single Feature or
//! a bare geometry; Polygon, MultiPolygon and GeometryCollection members are
//! expanded into polygons, every other geometry type is skipped.
use std::fs;
use std::path::{Path, PathBuf};

use ::geojson::{GeoJson, Geometry, PolygonType, Position, Value};
use obia_core::{ObiaError, Polygon, PolygonSource};
use tracing::{debug, warn};

use crate::error::{IoError, IoResult};

fn to_ring(ring: Vec<Position>) -> IoResult<Vec<[f64; 2]>> {
    ring.into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok([*x, *y]),
            _ => Err(IoError::InvalidData("position with fewer than two coordinates".into())),
        })
        .collect()
}

/// First ring is the exterior, the rest are holes.
fn to_polygon(rings: PolygonType) -> IoResult<Option<Polygon>> {
    let mut rings = rings.into_iter();
    let Some(exterior) = rings.next() else {
        return Ok(None);
    };
    let holes = rings.map(to_ring).collect::<IoResult<Vec<_>>>()?;
    Ok(Some(Polygon::with_holes(to_ring(exterior)?, holes)))
}

fn collect_geometry(geometry: Geometry, out: &mut Vec<Polygon>) -> IoResult<()> {
    match geometry.value {
        Value::Polygon(rings) => out.extend(to_polygon(rings)?),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.extend(to_polygon(rings)?);
            }
        }
        Value::GeometryCollection(members) => {
            for member in members {
                collect_geometry(member, out)?;
            }
        }
        Value::Point(_) => warn!(geometry = "Point", "skipping non-polygon geometry"),
        Value::MultiPoint(_) => warn!(geometry = "MultiPoint", "skipping non-polygon geometry"),
        Value::LineString(_) => warn!(geometry = "LineString", "skipping non-polygon geometry"),
        Value::MultiLineString(_) => {
            warn!(geometry = "MultiLineString", "skipping non-polygon geometry")
        }
    }
    Ok(())
}

/// Parse every polygon out of a GeoJSON document.
pub fn parse_polygons(text: &str) -> IoResult<Vec<Polygon>> {
    let mut polygons = Vec::new();
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => {
            for geometry in fc.features.into_iter().filter_map(|f| f.geometry) {
                collect_geometry(geometry, &mut polygons)?;
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = feature.geometry {
                collect_geometry(geometry, &mut polygons)?;
            }
        }
        GeoJson::Geometry(geometry) => collect_geometry(geometry, &mut polygons)?,
    }
    Ok(polygons)
}

/// Training polygons stored in a GeoJSON file, read on demand.
#[derive(Debug, Clone)]
pub struct GeoJsonFile {
    path: PathBuf,
}

impl GeoJsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> IoResult<Vec<Polygon>> {
        let text = fs::read_to_string(&self.path)?;
        let polygons = parse_polygons(&text)?;
        debug!(path = %self.path.display(), polygons = polygons.len(), "GeoJSON read");
        Ok(polygons)
    }
}

impl PolygonSource for GeoJsonFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn polygons(&self) -> obia_core::Result<Vec<Polygon>> {
        self.read()
            .map_err(|e| ObiaError::Polygon(format!("{}: {e}", self.path.display())))
    }
}
