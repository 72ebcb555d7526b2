//! Object-based image analysis: segment an image, overlay training polygons,
//! assign segments to classes and build the object table a classifier
//! trains on.

pub mod assign;
pub mod classification;
pub mod error;
pub mod features;
pub mod geo;
pub mod image;
pub mod objects;
pub mod overlay;
pub mod pipeline;
pub mod polygon;
pub mod segments;

pub use assign::{assign_segments, find_conflicts, Assignment, ClassPair, ConflictReport};
pub use classification::{ClassificationDriver, Classifier, Prediction};
pub use error::{ObiaError, Result};
pub use geo::{GeoTransform, RasterGeometry};
pub use image::Image;
pub use objects::{build_object_table, ObjectTable, SegmentObject};
pub use overlay::{overlay, GroundTruthRaster, TrainingClass};
pub use pipeline::{ObjectPipeline, PipelineParams, PreparedObjects, Stage};
pub use polygon::{rasterize, Polygon, PolygonSource};
pub use segments::{GridSegmenter, PrecomputedSegments, SegmentMap, SegmentationParams, Segmenter};
