//! Building the ordered training-class list from file paths.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use obia_core::{Polygon, TrainingClass};
use tracing::warn;

use crate::error::IoResult;
use crate::geojson::GeoJsonFile;

/// One `name=path` pair naming a class and its GeoJSON polygons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for ClassSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=PATH, got {s:?}"))?;
        let name = name.trim();
        if name.is_empty() || path.is_empty() {
            return Err(format!("expected NAME=PATH, got {s:?}"));
        }
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.path.display())
    }
}

/// Every `*.geojson` file in `dir`, sorted by file name; the file stem is the
/// class name.
pub fn scan_class_dir(dir: &Path) -> IoResult<Vec<ClassSpec>> {
    let mut specs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("geojson") {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        specs.push(ClassSpec { name: stem, path });
    }
    specs.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(specs)
}

/// Class list in `specs` order (code = position + 1).
pub fn training_classes(specs: &[ClassSpec]) -> Vec<TrainingClass> {
    specs
        .iter()
        .map(|s| TrainingClass::new(s.name.clone(), GeoJsonFile::new(&s.path)))
        .collect()
}

/// Verification classes aligned with `names`: class `i` reads
/// `<dir>/<names[i]>.geojson` so its code matches the training code. A
/// missing file yields a class with no polygons.
pub fn aligned_classes(names: &[&str], dir: &Path) -> Vec<TrainingClass> {
    names
        .iter()
        .map(|&name| {
            let path = dir.join(format!("{name}.geojson"));
            if path.is_file() {
                TrainingClass::new(name, GeoJsonFile::new(path))
            } else {
                warn!(class = name, dir = %dir.display(), "no verification polygons for class");
                TrainingClass::new(name, Vec::<Polygon>::new())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use obia_core::PolygonSource;
    use tempfile::TempDir;

    #[test]
    fn class_spec_parses_name_and_path() {
        let spec: ClassSpec = "water=data/water.geojson".parse().unwrap();
        assert_eq!(spec.name, "water");
        assert_eq!(spec.path, PathBuf::from("data/water.geojson"));
        assert_eq!(spec.to_string(), "water=data/water.geojson");
        assert!("water".parse::<ClassSpec>().is_err());
        assert!("=x.geojson".parse::<ClassSpec>().is_err());
    }

    #[test]
    fn directory_scan_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["urban.geojson", "forest.geojson", "notes.txt", "water.geojson"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let names: Vec<String> = scan_class_dir(dir.path()).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["forest", "urban", "water"]);
    }

    #[test]
    fn aligned_classes_keep_positions_for_missing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("urban.geojson"), "{}").unwrap();
        let classes = aligned_classes(&["forest", "urban"], dir.path());
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[1].name, "urban");
        assert!(classes[0].source.polygons().unwrap().is_empty());
        assert!(classes[1].source.describe().ends_with("urban.geojson"));
    }
}
