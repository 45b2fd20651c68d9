//! flarescan-algorithms: Variability detection pipeline.
//!
//! This crate provides the numerical stages of the detector:
//! - **Windows** - Good-time filtered tiling of the observation span
//! - **Variability** - Per-pixel max-deviation-over-median statistic
//! - **Detection** - Box scan against the global median, union-find merging
//! - **Sources** - Sequential numbering and sky-coordinate enrichment
//!
#![warn(missing_docs)]

pub mod detection;
pub mod error;
pub mod processing;
pub mod sources;
pub mod variability;
pub mod windows;

pub use detection::{global_median, raw_median, RegionDetector, MEDIAN_FLOOR};
pub use error::{Error, Result};
pub use processing::{
    detect_sources, detect_variability, group_by_tile, sky_image, VariabilityRun,
};
pub use sources::{consolidate, enrich_sources, ResolveError, SkyResolver};
pub use variability::{tile_variability, WindowGrid};
pub use windows::{accepted_windows, build_windows, observation_span};
