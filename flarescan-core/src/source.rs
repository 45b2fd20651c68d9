//! Candidate regions and variable sources.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sky pixels per raw pixel.
pub const SKY_PIXELS_PER_RAW: f64 = 64.0;

/// Arcseconds per sky pixel.
pub const ARCSEC_PER_SKY_PIXEL: f64 = 0.05;

/// Raw-coordinate offset of the variability-image position of a source.
pub const VARIABILITY_OFFSET: f64 = 3.0;

/// A flagged area on one tile, before id assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidateRegion {
    /// Tile the region was found on.
    pub tile_id: u8,
    /// Weighted centroid, raw X coordinate.
    pub centroid_raw_x: f64,
    /// Weighted centroid, raw Y coordinate.
    pub centroid_raw_y: f64,
    /// Radius of the circle with the same area as the region (raw pixels).
    pub pixel_radius: f64,
    /// Largest box sum inside the region.
    pub peak_count: f64,
    /// Number of pixels covered by the region.
    pub area: usize,
}

/// Sky position filled in by the astrometry collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkyPosition {
    /// Sky pixel X.
    pub x: f64,
    /// Sky pixel Y.
    pub y: f64,
    /// Right ascension (degrees).
    pub ra: f64,
    /// Declination (degrees).
    pub dec: f64,
}

/// A detected variable source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Source {
    /// Sequential identifier, starting at 1.
    pub id: usize,
    /// Tile the source was detected on.
    pub tile_id: u8,
    /// Raw X coordinate on the tile.
    pub raw_x: f64,
    /// Raw Y coordinate on the tile.
    pub raw_y: f64,
    /// Radius in raw pixels.
    pub radius_raw: f64,
    /// Radius in sky pixels.
    pub radius_sky: f64,
    /// Radius in arcseconds.
    pub radius_arcsec: f64,
    /// Peak box count of the region.
    pub photon_count: f64,
    /// Raw X of the source on the variability image.
    pub var_raw_x: f64,
    /// Raw Y of the source on the variability image.
    pub var_raw_y: f64,
    /// Sky coordinates, unset until resolved.
    pub sky: Option<SkyPosition>,
}

impl Source {
    /// Builds a source from a candidate region.
    #[must_use]
    pub fn from_region(id: usize, region: &CandidateRegion) -> Self {
        let radius_raw = region.pixel_radius.max(0.0);
        let radius_sky = radius_raw * SKY_PIXELS_PER_RAW;
        Self {
            id,
            tile_id: region.tile_id,
            raw_x: region.centroid_raw_x,
            raw_y: region.centroid_raw_y,
            radius_raw,
            radius_sky,
            radius_arcsec: radius_sky * ARCSEC_PER_SKY_PIXEL,
            photon_count: region.peak_count,
            var_raw_x: region.centroid_raw_x + VARIABILITY_OFFSET,
            var_raw_y: region.centroid_raw_y + VARIABILITY_OFFSET,
            sky: None,
        }
    }

    /// Returns true once sky coordinates have been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.sky.is_some()
    }
}
