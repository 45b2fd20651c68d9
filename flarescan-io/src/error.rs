//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A text input line could not be parsed.
    #[error("{}:{line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Raster header could not be encoded or decoded.
    #[error("raster header error: {0}")]
    Header(#[from] serde_json::Error),

    /// Raster dimensions do not match the payload.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// The external astrometry task failed.
    #[error("astrometry failed: {0}")]
    Astrometry(String),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] flarescan_core::Error),
}
