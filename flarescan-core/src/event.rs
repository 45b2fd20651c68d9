//! Photon events and dead-time intervals.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset between detector raw coordinates and matrix indices.
///
/// Raw coordinates start at 1 on every tile.
pub const RAW_ORIGIN: u16 = 1;

/// A single photon event recorded on one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Arrival time in seconds (mission time).
    pub time: f64,
    /// Raw X coordinate on the tile (1-based).
    pub raw_x: u16,
    /// Raw Y coordinate on the tile (1-based).
    pub raw_y: u16,
    /// Tile (CCD) index.
    pub tile_id: u8,
}

impl Event {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub fn new(time: f64, raw_x: u16, raw_y: u16, tile_id: u8) -> Self {
        Self {
            time,
            raw_x,
            raw_y,
            tile_id,
        }
    }

    /// Returns the matrix index `(x, y)` of this event, if it is inside a
    /// tile of the given shape.
    #[inline]
    #[must_use]
    pub fn pixel_index(&self, shape: (usize, usize)) -> Option<(usize, usize)> {
        let x = usize::from(self.raw_x.checked_sub(RAW_ORIGIN)?);
        let y = usize::from(self.raw_y.checked_sub(RAW_ORIGIN)?);
        (x < shape.0 && y < shape.1).then_some((x, y))
    }
}

/// A span of time during which a tile recorded no valid events.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeadTimeInterval {
    /// Interval start (seconds).
    pub start: f64,
    /// Interval end (seconds).
    pub end: f64,
}

impl DeadTimeInterval {
    /// Creates a new interval.
    #[inline]
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the interval, zero when `end < start`.
    #[inline]
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Portion of this interval inside `[lo, hi]`, if any.
    #[inline]
    #[must_use]
    pub fn clip(&self, lo: f64, hi: f64) -> Option<Self> {
        let start = self.start.max(lo);
        let end = self.end.min(hi);
        (end > start).then_some(Self { start, end })
    }
}
