//! flarescan-core: Core types for variable X-ray source detection.
//!
//! This crate provides the data model shared by the pipeline crates:
//! photon events, dead-time intervals, time windows, detection
//! configuration, instrument families, and detected sources.
//!

pub mod config;
pub mod error;
pub mod event;
pub mod header;
pub mod instrument;
pub mod source;
pub mod window;

pub use config::DetectionConfig;
pub use error::{Error, Result};
pub use event::{DeadTimeInterval, Event, RAW_ORIGIN};
pub use header::ObservationHeader;
pub use instrument::{Instrument, RotationCanvas};
pub use source::{CandidateRegion, SkyPosition, Source};
pub use window::TimeWindow;

/// Per-pixel variability of one tile, indexed `[[x, y]]`.
pub type VariabilityMatrix = ndarray::Array2<f64>;
