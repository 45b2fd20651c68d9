//! Detection configuration.

use crate::error::{Error, Result};
use crate::instrument::Instrument;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters consumed by the variability and detection pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionConfig {
    /// Side of the detection box in pixels.
    pub box_size: usize,
    /// Multiple of the median variability a box must exceed per pixel.
    pub detection_level: f64,
    /// Time window width in seconds.
    pub time_window: f64,
    /// Minimum live fraction of a time window, in `[0, 1]`.
    pub good_time_ratio: f64,
    /// Maximum number of concurrent tile workers.
    pub max_workers: usize,
    /// Box scan stride in pixels. `None` scans non-overlapping boxes.
    pub scan_stride: Option<usize>,
    /// Camera family.
    pub instrument: Instrument,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            box_size: 3,
            detection_level: 10.0,
            time_window: 100.0,
            good_time_ratio: 1.0,
            max_workers: 8,
            scan_stride: None,
            instrument: Instrument::Pn,
        }
    }
}

impl DetectionConfig {
    /// Creates a configuration with default values for the given camera.
    #[must_use]
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            ..Self::default()
        }
    }

    /// Sets the detection box size.
    #[must_use]
    pub fn with_box_size(mut self, box_size: usize) -> Self {
        self.box_size = box_size;
        self
    }

    /// Sets the detection level.
    #[must_use]
    pub fn with_detection_level(mut self, level: f64) -> Self {
        self.detection_level = level;
        self
    }

    /// Sets the time window width.
    #[must_use]
    pub fn with_time_window(mut self, seconds: f64) -> Self {
        self.time_window = seconds;
        self
    }

    /// Sets the good-time ratio.
    #[must_use]
    pub fn with_good_time_ratio(mut self, ratio: f64) -> Self {
        self.good_time_ratio = ratio;
        self
    }

    /// Sets the maximum number of workers.
    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Sets an explicit box scan stride.
    #[must_use]
    pub fn with_scan_stride(mut self, stride: usize) -> Self {
        self.scan_stride = Some(stride);
        self
    }

    /// Effective scan stride.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.scan_stride.unwrap_or(self.box_size)
    }

    /// Checks every parameter against its allowed range.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        if self.box_size == 0 {
            return Err(Error::ConfigError("box size must be at least 1".into()));
        }
        if !(self.detection_level.is_finite() && self.detection_level > 0.0) {
            return Err(Error::ConfigError(format!(
                "detection level must be positive, got {}",
                self.detection_level
            )));
        }
        if !(self.time_window.is_finite() && self.time_window > 0.0) {
            return Err(Error::ConfigError(format!(
                "time window must be positive, got {}",
                self.time_window
            )));
        }
        if !(0.0..=1.0).contains(&self.good_time_ratio) {
            return Err(Error::ConfigError(format!(
                "good time ratio must be within [0, 1], got {}",
                self.good_time_ratio
            )));
        }
        if self.max_workers == 0 {
            return Err(Error::ConfigError("max workers must be at least 1".into()));
        }
        if self.scan_stride == Some(0) {
            return Err(Error::ConfigError("scan stride must be at least 1".into()));
        }
        Ok(())
    }
}
