//! Error types for flarescan-core.

use thiserror::Error;

/// Result type alias for flarescan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for flarescan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Instrument identifier outside the supported families.
    #[error("unknown instrument '{0}' (expected one of PN, M1, M2)")]
    UnknownInstrument(String),

    /// Number of tiles does not match the instrument.
    #[error("expected {expected} tiles, found {found}")]
    TileCountMismatch { expected: usize, found: usize },

    /// A tile matrix has the wrong shape for the instrument.
    #[error("tile {tile} has shape {found:?}, expected {expected:?}")]
    TileShapeMismatch {
        tile: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// The event list carries no events at all.
    #[error("observation contains no events")]
    EmptyObservation,

    /// A required header keyword is missing or unparsable.
    #[error("header keyword {key}: {reason}")]
    HeaderError { key: String, reason: String },
}
