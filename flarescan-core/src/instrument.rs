//! Supported instrument families.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the rotation step treats the canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationCanvas {
    /// Grow the canvas to the rotated bounding box.
    Expand,
    /// Keep the input canvas size, clipping the corners.
    Fixed,
}

/// One of the three EPIC camera families.
///
/// Each variant fixes the tile count, the tile pixel grid, the mosaic
/// recipe and the geometric transform variant. The value is chosen once
/// from the configuration and passed around, never re-parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instrument {
    /// EPIC-pn: 12 CCDs of 64×200 pixels.
    #[cfg_attr(feature = "serde", serde(rename = "PN"))]
    Pn,
    /// EPIC-MOS1: 7 CCDs of 600×600 pixels.
    #[cfg_attr(feature = "serde", serde(rename = "M1"))]
    Mos1,
    /// EPIC-MOS2: 7 CCDs of 600×600 pixels.
    #[cfg_attr(feature = "serde", serde(rename = "M2"))]
    Mos2,
}

impl Instrument {
    /// All supported families.
    pub const ALL: [Instrument; 3] = [Instrument::Pn, Instrument::Mos1, Instrument::Mos2];

    /// Short identifier used in file names and headers.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Instrument::Pn => "PN",
            Instrument::Mos1 => "M1",
            Instrument::Mos2 => "M2",
        }
    }

    /// Number of tiles read out by the camera.
    #[must_use]
    pub fn tile_count(self) -> usize {
        match self {
            Instrument::Pn => 12,
            Instrument::Mos1 | Instrument::Mos2 => 7,
        }
    }

    /// Pixel grid of a single tile as `(raw_x extent, raw_y extent)`.
    #[must_use]
    pub fn tile_shape(self) -> (usize, usize) {
        match self {
            Instrument::Pn => (64, 200),
            Instrument::Mos1 | Instrument::Mos2 => (600, 600),
        }
    }

    /// Rotation canvas variant used by the sky transform.
    #[must_use]
    pub fn rotation_canvas(self) -> RotationCanvas {
        match self {
            Instrument::Pn => RotationCanvas::Expand,
            Instrument::Mos1 | Instrument::Mos2 => RotationCanvas::Fixed,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Instrument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PN" => Ok(Instrument::Pn),
            "M1" | "MOS1" => Ok(Instrument::Mos1),
            "M2" | "MOS2" => Ok(Instrument::Mos2),
            _ => Err(Error::UnknownInstrument(s.to_string())),
        }
    }
}
