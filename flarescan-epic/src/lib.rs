//! flarescan-epic: EPIC camera geometry.
//!
//! This crate knows how the CCD tiles of each EPIC camera are laid out in
//! the focal plane and how the assembled mosaic maps onto the canonical
//! sky-aligned raster.
//!
//! # Key Components
//!
//! - [`mosaic`] - Tile layouts, assembly into a mosaic and the inverse split
//! - [`resample`] - Rotation, resizing and padding of rasters
//! - [`transform`] - Calibrated transform into the 648 x 648 sky frame
//!
//! # Processing Pipeline
//!
//! 1. Assemble per-tile variability matrices into the camera mosaic
//! 2. Narrow the mosaic for windowed pn submodes
//! 3. Rotate by the pointing angle, flip, resample and pad

pub mod error;
pub mod mosaic;
pub mod resample;
pub mod transform;

pub use error::{Error, Result};
pub use mosaic::{assemble, assemble_for_submode, mosaic_shape, narrow, split, Submode};
pub use transform::{to_sky_frame, CalibrationHeader, FramePlacement, CANONICAL_SIZE};
