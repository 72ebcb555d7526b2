//! Error types for obia-core

use thiserror::Error;

use crate::assign::ConflictReport;

/// Errors that can occur while building or classifying the object table
#[derive(Debug, Error)]
pub enum ObiaError {
    /// At least one segment overlaps ground truth of more than one class.
    /// The run must be aborted; no training table is produced.
    #[error(
        "ambiguous segmentation: {} segment(s) overlap more than one training class",
        .0.segments.len()
    )]
    AmbiguousSegmentation(ConflictReport),

    /// Two grids that must be aligned have different extents
    #[error("shape mismatch: expected {expected:?} (rows, cols), got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Image has no pixels or no bands
    #[error("empty image: no pixels to process")]
    EmptyImage,

    /// Geotransform cannot be inverted (zero pixel size)
    #[error("degenerate geotransform: pixel-to-world mapping is not invertible")]
    DegenerateGeoTransform,

    /// Training subset of the object table is empty
    #[error("no training data: no segment carries a class label")]
    NoTrainingData,

    /// Verification raster has no single-coverage pixels
    #[error("no verification pixels: ground truth does not cover the image")]
    NoVerificationPixels,

    /// Invalid parameters
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A polygon source failed to produce its geometry
    #[error("polygon source error: {0}")]
    Polygon(String),

    /// Classifier failed to fit or predict
    #[error("classifier error: {0}")]
    Classifier(String),
}

/// Result type for obia-core operations
pub type Result<T> = std::result::Result<T, ObiaError>;
