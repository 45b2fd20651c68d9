//! EPIC-specific error types.

use thiserror::Error;

/// Result type for EPIC geometry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// EPIC-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Calibration header values produce an impossible geometry.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    /// Mosaic has the wrong shape for the requested operation.
    #[error("mosaic shape {found:?} does not match expected {expected:?}")]
    MosaicShape {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Array shape error while stitching rasters.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] flarescan_core::Error),
}
