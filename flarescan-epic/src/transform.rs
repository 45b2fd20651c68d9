//! Geometric transform from the assembled raw-frame mosaic to the
//! canonical sky-aligned raster.
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::error::{Error, Result};
use crate::resample::{pad, resize, rotate};
use flarescan_core::{Instrument, ObservationHeader, RotationCanvas};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Side of the canonical output raster in pixels.
pub const CANONICAL_SIZE: usize = 648;

/// Side of the resampled MOS raster before padding.
pub const MOS_RESAMPLED_SIZE: usize = 500;

/// Calibration values read from the event-list header.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationHeader {
    /// Pointing position angle in degrees (`PA_PNT`).
    pub pointing_angle: f64,
    /// Projected sky X limits (`TDMIN6`, `TDMAX6`).
    pub projected_x: (f64, f64),
    /// Projected sky Y limits (`TDMIN7`, `TDMAX7`).
    pub projected_y: (f64, f64),
    /// Legal sky X limits (`TLMIN6`, `TLMAX6`).
    pub legal_x: (f64, f64),
    /// Legal sky Y limits (`TLMIN7`, `TLMAX7`).
    pub legal_y: (f64, f64),
}

impl CalibrationHeader {
    /// Extracts the calibration keywords from an event-list header.
    ///
    /// # Errors
    /// Returns an error if a keyword is missing or not numeric.
    pub fn from_header(header: &ObservationHeader) -> Result<Self> {
        Ok(Self {
            pointing_angle: header.float("PA_PNT")?,
            projected_x: (header.float("TDMIN6")?, header.float("TDMAX6")?),
            projected_y: (header.float("TDMIN7")?, header.float("TDMAX7")?),
            legal_x: (header.float("TLMIN6")?, header.float("TLMAX6")?),
            legal_y: (header.float("TLMIN7")?, header.float("TLMAX7")?),
        })
    }

    /// Canonical pixels per sky pixel along X and Y.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCalibration`] if a legal range is empty.
    pub fn scale(&self) -> Result<(f64, f64)> {
        let span_x = self.legal_x.1 - self.legal_x.0;
        let span_y = self.legal_y.1 - self.legal_y.0;
        if !(span_x > 0.0 && span_y > 0.0) {
            return Err(Error::InvalidCalibration(format!(
                "empty legal limits: x {:?}, y {:?}",
                self.legal_x, self.legal_y
            )));
        }
        Ok((
            CANONICAL_SIZE as f64 / span_x,
            CANONICAL_SIZE as f64 / span_y,
        ))
    }

    /// Canonical-pixel margins between the legal and projected limits,
    /// truncated towards zero, as `(x, y)` pairs of `(before, after)`.
    fn margins(&self) -> Result<((i64, i64), (i64, i64))> {
        let (sx, sy) = self.scale()?;
        let x = (
            ((self.projected_x.0 - self.legal_x.0) * sx) as i64,
            ((self.legal_x.1 - self.projected_x.1) * sx) as i64,
        );
        let y = (
            ((self.projected_y.0 - self.legal_y.0) * sy) as i64,
            ((self.legal_y.1 - self.projected_y.1) * sy) as i64,
        );
        Ok((x, y))
    }
}

/// Pixel layout of the resampled raster inside the canonical frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePlacement {
    /// Rows of the resampled raster.
    pub rows: usize,
    /// Columns of the resampled raster.
    pub cols: usize,
    /// Zero rows before/after.
    pub pad_rows: (usize, usize),
    /// Zero columns before/after.
    pub pad_cols: (usize, usize),
}

fn non_negative(value: i64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::InvalidCalibration(format!("{what} is negative ({value})")))
}

impl FramePlacement {
    /// Placement for the given rotation canvas variant.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCalibration`] if the calibration values yield
    /// negative margins or an empty raster.
    pub fn for_canvas(canvas: RotationCanvas, calibration: &CalibrationHeader) -> Result<Self> {
        let (mx, my) = calibration.margins()?;
        let size = CANONICAL_SIZE as i64;
        match canvas {
            RotationCanvas::Expand => {
                let cols = size - (mx.0 + mx.1);
                let rows = size - (my.0 + my.1);
                if cols <= 0 || rows <= 0 {
                    return Err(Error::InvalidCalibration(format!(
                        "projected area collapses to {rows}x{cols} pixels"
                    )));
                }
                Ok(Self {
                    rows: non_negative(rows, "row count")?,
                    cols: non_negative(cols, "column count")?,
                    pad_rows: (
                        non_negative(my.0, "top margin")?,
                        non_negative(my.1, "bottom margin")?,
                    ),
                    pad_cols: (
                        non_negative(mx.0, "left margin")?,
                        non_negative(mx.1, "right margin")?,
                    ),
                })
            }
            RotationCanvas::Fixed => {
                let spare = size - MOS_RESAMPLED_SIZE as i64;
                let centre = |m: (i64, i64)| -> (i64, i64) {
                    // Truncating division, matching the margin rounding.
                    let half = (spare - (m.0 + m.1)) / 2;
                    (m.0 + half, spare - (m.0 + half))
                };
                let (px, py) = (centre(mx), centre(my));
                Ok(Self {
                    rows: MOS_RESAMPLED_SIZE,
                    cols: MOS_RESAMPLED_SIZE,
                    pad_rows: (
                        non_negative(py.0, "top padding")?,
                        non_negative(py.1, "bottom padding")?,
                    ),
                    pad_cols: (
                        non_negative(px.0, "left padding")?,
                        non_negative(px.1, "right padding")?,
                    ),
                })
            }
        }
    }
}

/// Rotates, resamples and pads a mosaic into the canonical sky frame.
///
/// The rotation canvas variant is fixed by the instrument. The output is
/// always [`CANONICAL_SIZE`] pixels on each side.
///
/// # Errors
/// Returns [`Error::InvalidCalibration`] for calibration values that do not
/// describe a valid placement.
pub fn to_sky_frame(
    instrument: Instrument,
    mosaic: &Array2<f64>,
    calibration: &CalibrationHeader,
) -> Result<Array2<f64>> {
    let canvas = instrument.rotation_canvas();
    let placement = FramePlacement::for_canvas(canvas, calibration)?;
    debug!(
        "{instrument}: rotating {:?} by {:.3} deg, resampling to {}x{}, padding rows {:?} cols {:?}",
        mosaic.dim(),
        calibration.pointing_angle,
        placement.rows,
        placement.cols,
        placement.pad_rows,
        placement.pad_cols
    );

    let rotated = rotate(&mosaic.view(), calibration.pointing_angle, canvas);
    let flipped = rotated.slice(ndarray::s![..;-1, ..]);
    let resized = resize(&flipped, (placement.rows, placement.cols));
    Ok(pad(&resized.view(), placement.pad_rows, placement.pad_cols))
}
