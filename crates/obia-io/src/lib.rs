//! File adapters for obia-core: GeoTIFF rasters and GeoJSON training
//! polygons.

pub mod classes;
pub mod error;
pub mod geojson;
pub mod geotiff;

pub use classes::{aligned_classes, scan_class_dir, training_classes, ClassSpec};
pub use error::{IoError, IoResult};
pub use geojson::{parse_polygons, GeoJsonFile};
pub use geotiff::{read_image, read_label_raster, write_label_raster};
