//! Time window type.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-width slice of the observation span.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeWindow {
    /// Position of the window in the tiling of `[t0, tf]`.
    pub index: usize,
    /// Window start (seconds).
    pub start: f64,
    /// Window duration (seconds). Only the final window may be shorter than
    /// the configured width.
    pub duration: f64,
    /// Fraction of the duration not covered by dead time.
    pub valid_duration_ratio: f64,
}

impl TimeWindow {
    /// Window end (seconds).
    #[inline]
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Returns true if the window passes the good-time ratio test.
    ///
    /// The threshold is inclusive; zero-duration windows never pass.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, good_time_ratio: f64) -> bool {
        self.duration > 0.0 && self.valid_duration_ratio >= good_time_ratio
    }

    /// Live time of the window in seconds.
    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f64 {
        self.duration * self.valid_duration_ratio
    }
}
