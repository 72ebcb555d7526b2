//! Error types for obia-io

use thiserror::Error;

/// Errors raised while reading or writing rasters and polygon files
#[derive(Debug, Error)]
pub enum IoError {
    /// Standard I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TIFF decoder or encoder failed
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Malformed JSON or GeoJSON structure
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] ::geojson::Error),

    /// File parsed but its content cannot be used
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// An error from the core library (shape checks and the like)
    #[error("core error: {0}")]
    Core(#[from] obia_core::ObiaError),
}

/// Convenience alias for I/O results.
pub type IoResult<T> = Result<T, IoError>;
