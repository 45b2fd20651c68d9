//! Tile-to-mosaic assembly for the EPIC cameras.
//!
//! Each camera family has a fixed recipe of flips, transposes and
//! concatenations that places its CCD readouts where they sit in the focal
//! plane. The recipes are pure geometry: the same tiles always give the
//! same mosaic, and [`split`] undoes [`assemble`] exactly.

use crate::error::{Error, Result};
use flarescan_core::{Instrument, VariabilityMatrix};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

/// EPIC-pn CCDs in the left half of the mosaic, top to bottom.
const PN_LEFT: [usize; 6] = [8, 7, 6, 9, 10, 11];
/// EPIC-pn CCDs in the right half of the mosaic, top to bottom.
const PN_RIGHT: [usize; 6] = [5, 4, 3, 0, 1, 2];

/// Acquisition submode, as far as it changes the assembled raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submode {
    /// Full frame (or any mode that reads the whole array).
    Full,
    /// EPIC-pn large window: only the central half of each CCD row.
    LargeWindow,
    /// EPIC-pn small window: a 64×64 patch on the focus CCD.
    SmallWindow,
}

impl Submode {
    /// Interprets the `SUBMODE` header value.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("PrimeLargeWindow") => Submode::LargeWindow,
            Some("PrimeSmallWindow") => Submode::SmallWindow,
            _ => Submode::Full,
        }
    }
}

/// Expected mosaic shape for a camera, before submode narrowing.
#[must_use]
pub fn mosaic_shape(instrument: Instrument) -> (usize, usize) {
    let (nx, ny) = instrument.tile_shape();
    match instrument {
        Instrument::Pn => (nx * PN_LEFT.len(), ny * 2),
        Instrument::Mos1 | Instrument::Mos2 => (3 * nx, 3 * nx),
    }
}

fn check_tiles(instrument: Instrument, tiles: &[VariabilityMatrix]) -> Result<()> {
    if tiles.len() != instrument.tile_count() {
        return Err(flarescan_core::Error::TileCountMismatch {
            expected: instrument.tile_count(),
            found: tiles.len(),
        }
        .into());
    }
    let expected = instrument.tile_shape();
    for (tile, matrix) in tiles.iter().enumerate() {
        if matrix.dim() != expected {
            return Err(flarescan_core::Error::TileShapeMismatch {
                tile,
                expected,
                found: matrix.dim(),
            }
            .into());
        }
    }
    Ok(())
}

/// Assembles the tiles of one camera into a full-frame mosaic.
///
/// # Errors
/// Returns an error if the tile count or any tile shape does not match the
/// instrument.
pub fn assemble(instrument: Instrument, tiles: &[VariabilityMatrix]) -> Result<Array2<f64>> {
    check_tiles(instrument, tiles)?;
    match instrument {
        Instrument::Pn => Ok(assemble_pn(tiles)),
        Instrument::Mos1 => Ok(mos_focal_plane(tiles)?
            .reversed_axes()
            .slice_move(s![..;-1, ..])
            .to_owned()),
        Instrument::Mos2 => Ok(mos_focal_plane(tiles)?
            .slice_move(s![..;-1, ..;-1])
            .to_owned()),
    }
}

/// Assembles the tiles and narrows the result to the read-out window.
///
/// # Errors
/// See [`assemble`].
pub fn assemble_for_submode(
    instrument: Instrument,
    tiles: &[VariabilityMatrix],
    submode: Submode,
) -> Result<Array2<f64>> {
    let mosaic = assemble(instrument, tiles)?;
    Ok(narrow(instrument, mosaic, submode))
}

/// Restricts a full-frame mosaic to the window read out in `submode`.
///
/// Only EPIC-pn has windowed modes that change the raster; other cameras
/// are returned unchanged.
#[must_use]
pub fn narrow(instrument: Instrument, mosaic: Array2<f64>, submode: Submode) -> Array2<f64> {
    if instrument != Instrument::Pn {
        return mosaic;
    }
    match submode {
        Submode::Full => mosaic,
        Submode::LargeWindow => mosaic.slice(s![.., 100..300]).to_owned(),
        Submode::SmallWindow => mosaic.slice(s![128..192, 200..264]).to_owned(),
    }
}

fn assemble_pn(tiles: &[VariabilityMatrix]) -> Array2<f64> {
    let (nx, ny) = Instrument::Pn.tile_shape();
    let mut mosaic = Array2::zeros(mosaic_shape(Instrument::Pn));

    for (slot, &tile) in PN_LEFT.iter().enumerate() {
        mosaic
            .slice_mut(s![slot * nx..(slot + 1) * nx, ..ny])
            .assign(&tiles[tile].slice(s![..;-1, ..]));
    }
    for (slot, &tile) in PN_RIGHT.iter().enumerate() {
        mosaic
            .slice_mut(s![slot * nx..(slot + 1) * nx, ny..])
            .assign(&tiles[tile].slice(s![.., ..;-1]));
    }
    mosaic
}

/// MOS focal plane before the camera-specific final orientation.
///
/// Three columns of CCDs; the outer columns hold two CCDs centred between
/// blank half-CCD corners, the middle column holds three.
fn mos_focal_plane(tiles: &[VariabilityMatrix]) -> Result<Array2<f64>> {
    let (n, _) = Instrument::Mos1.tile_shape();
    let corner = Array2::<f64>::zeros((n / 2, n));
    let corner = corner.view();

    let t = move |i: usize| tiles[i].t();
    let flipped_t = move |i: usize| tiles[i].t().slice_move(s![..;-1, ..;-1]);

    let left = concatenate(Axis(0), &[corner, t(1), flipped_t(6), corner])?;
    let middle = concatenate(Axis(0), &[t(2), tiles[0].slice(s![..;-1, ..]), flipped_t(5)])?;
    let right = concatenate(Axis(0), &[corner, t(3), flipped_t(4), corner])?;

    Ok(concatenate(Axis(1), &[left.view(), middle.view(), right.view()])?)
}

/// Recovers the individual tiles from a full-frame mosaic.
///
/// # Errors
/// Returns [`Error::MosaicShape`] if the mosaic is not a full frame for the
/// instrument.
pub fn split(instrument: Instrument, mosaic: &Array2<f64>) -> Result<Vec<VariabilityMatrix>> {
    let expected = mosaic_shape(instrument);
    if mosaic.dim() != expected {
        return Err(Error::MosaicShape {
            expected,
            found: mosaic.dim(),
        });
    }
    Ok(match instrument {
        Instrument::Pn => split_pn(mosaic),
        Instrument::Mos1 => split_mos(mosaic.slice(s![..;-1, ..]).reversed_axes()),
        Instrument::Mos2 => split_mos(mosaic.slice(s![..;-1, ..;-1])),
    })
}

fn split_pn(mosaic: &Array2<f64>) -> Vec<VariabilityMatrix> {
    let (nx, ny) = Instrument::Pn.tile_shape();
    let mut tiles = vec![Array2::zeros((nx, ny)); Instrument::Pn.tile_count()];

    for (slot, &tile) in PN_LEFT.iter().enumerate() {
        tiles[tile] = mosaic
            .slice(s![slot * nx..(slot + 1) * nx, ..ny])
            .slice_move(s![..;-1, ..])
            .to_owned();
    }
    for (slot, &tile) in PN_RIGHT.iter().enumerate() {
        tiles[tile] = mosaic
            .slice(s![slot * nx..(slot + 1) * nx, ny..])
            .slice_move(s![.., ..;-1])
            .to_owned();
    }
    tiles
}

fn split_mos(plane: ArrayView2<'_, f64>) -> Vec<VariabilityMatrix> {
    let (n, _) = Instrument::Mos1.tile_shape();
    let h = n / 2;
    let block = |rows: std::ops::Range<usize>, col: usize| {
        plane.slice_move(s![rows, col * n..(col + 1) * n])
    };
    let from_t = |view: ArrayView2<'_, f64>| view.reversed_axes().to_owned();
    let from_flipped_t = |view: ArrayView2<'_, f64>| {
        view.slice_move(s![..;-1, ..;-1]).reversed_axes().to_owned()
    };

    vec![
        block(n..2 * n, 1).slice_move(s![..;-1, ..]).to_owned(),
        from_t(block(h..h + n, 0)),
        from_t(block(0..n, 1)),
        from_t(block(h..h + n, 2)),
        from_flipped_t(block(h + n..h + 2 * n, 2)),
        from_flipped_t(block(2 * n..3 * n, 1)),
        from_flipped_t(block(h + n..h + 2 * n, 0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiles whose every pixel value is unique across the camera.
    fn labelled_tiles(instrument: Instrument) -> Vec<VariabilityMatrix> {
        let (nx, ny) = instrument.tile_shape();
        (0..instrument.tile_count())
            .map(|tile| {
                Array2::from_shape_fn((nx, ny), |(x, y)| {
                    1.0 + (tile * nx * ny + x * ny + y) as f64
                })
            })
            .collect()
    }

    #[test]
    fn test_submode_from_header() {
        assert_eq!(Submode::from_header(Some("PrimeLargeWindow")), Submode::LargeWindow);
        assert_eq!(Submode::from_header(Some("PrimeSmallWindow")), Submode::SmallWindow);
        assert_eq!(Submode::from_header(Some("PrimeFullWindow")), Submode::Full);
        assert_eq!(Submode::from_header(None), Submode::Full);
    }

    #[test]
    fn test_pn_layout() {
        let tiles = labelled_tiles(Instrument::Pn);
        let mosaic = assemble(Instrument::Pn, &tiles).unwrap();
        assert_eq!(mosaic.dim(), (384, 400));

        // First row of the mosaic is the last row of CCD 8.
        assert_eq!(mosaic[[0, 0]], tiles[8][[63, 0]]);
        // Right half, first row: CCD 5 row 0 reversed along y.
        assert_eq!(mosaic[[0, 200]], tiles[5][[0, 199]]);
        assert_eq!(mosaic[[0, 399]], tiles[5][[0, 0]]);
        // Bottom slot holds CCD 11 and CCD 2.
        assert_eq!(mosaic[[383, 0]], tiles[11][[0, 0]]);
        assert_eq!(mosaic[[383, 399]], tiles[2][[63, 0]]);
    }

    #[test]
    fn test_round_trip_all_families() {
        for instrument in Instrument::ALL {
            let tiles = labelled_tiles(instrument);
            let mosaic = assemble(instrument, &tiles).unwrap();
            assert_eq!(mosaic.dim(), mosaic_shape(instrument));

            let recovered = split(instrument, &mosaic).unwrap();
            assert_eq!(recovered.len(), tiles.len());
            for (tile, (original, back)) in tiles.iter().zip(&recovered).enumerate() {
                assert_eq!(original.dim(), back.dim(), "{instrument} tile {tile}");
                assert_eq!(original, back, "{instrument} tile {tile}");
            }
        }
    }

    #[test]
    fn test_mos_corners_are_blank() {
        let tiles = labelled_tiles(Instrument::Mos2);
        let mosaic = assemble(Instrument::Mos2, &tiles).unwrap();
        let total: f64 = tiles.iter().map(|t| t.sum()).sum();
        assert!((mosaic.sum() - total).abs() < 1e-3 * total);
        assert_eq!(mosaic.iter().filter(|&&v| v == 0.0).count(), 4 * 300 * 600);
    }

    #[test]
    fn test_pn_submode_windows() {
        let tiles = labelled_tiles(Instrument::Pn);
        let large = assemble_for_submode(Instrument::Pn, &tiles, Submode::LargeWindow).unwrap();
        assert_eq!(large.dim(), (384, 200));
        let small = assemble_for_submode(Instrument::Pn, &tiles, Submode::SmallWindow).unwrap();
        assert_eq!(small.dim(), (64, 64));

        let full = assemble(Instrument::Pn, &tiles).unwrap();
        assert_eq!(small[[0, 0]], full[[128, 200]]);
    }

    #[test]
    fn test_mos_ignores_submode() {
        let tiles = labelled_tiles(Instrument::Mos1);
        let mosaic =
            assemble_for_submode(Instrument::Mos1, &tiles, Submode::SmallWindow).unwrap();
        assert_eq!(mosaic.dim(), (1800, 1800));
    }

    #[test]
    fn test_wrong_tile_count() {
        let mut tiles = labelled_tiles(Instrument::Pn);
        tiles.pop();
        assert!(assemble(Instrument::Pn, &tiles).is_err());
    }

    #[test]
    fn test_wrong_tile_shape() {
        let mut tiles = labelled_tiles(Instrument::Pn);
        tiles[3] = Array2::zeros((10, 10));
        let err = assemble(Instrument::Pn, &tiles).unwrap_err();
        assert!(matches!(
            err,
            Error::CoreError(flarescan_core::Error::TileShapeMismatch { tile: 3, .. })
        ));
    }

    #[test]
    fn test_split_rejects_narrowed_mosaic() {
        let mosaic = Array2::zeros((384, 200));
        assert!(matches!(
            split(Instrument::Pn, &mosaic),
            Err(Error::MosaicShape { .. })
        ));
    }
}
