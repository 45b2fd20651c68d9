//! Error types for the detection pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while running the detection pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Core data model error (configuration, header, tile layout).
    #[error(transparent)]
    Core(#[from] flarescan_core::Error),

    /// Camera geometry error (mosaic or sky transform).
    #[error(transparent)]
    Epic(#[from] flarescan_epic::Error),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Event or dead-time data refers to a tile the instrument does not have.
    #[error("tile {tile} is out of range for {instrument} ({count} tiles)")]
    TileOutOfRange {
        /// Offending tile index.
        tile: usize,
        /// Camera the run was configured for.
        instrument: flarescan_core::Instrument,
        /// Number of tiles the camera has.
        count: usize,
    },
}
