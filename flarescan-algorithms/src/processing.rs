//! High-level pipeline: windowing, variability, detection and imaging.
#![allow(clippy::cast_possible_truncation)]

use crate::detection::{global_median, RegionDetector};
use crate::error::{Error, Result};
use crate::sources::{consolidate, enrich_sources, SkyResolver};
use crate::variability::{tile_variability, WindowGrid};
use crate::windows::{accepted_windows, observation_span};
use flarescan_core::{
    DeadTimeInterval, DetectionConfig, Event, Instrument, ObservationHeader, Source, TimeWindow,
    VariabilityMatrix,
};
use flarescan_epic::{assemble_for_submode, to_sky_frame, CalibrationHeader, Submode};
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;

/// Everything the detection path produces for one observation.
#[derive(Clone, Debug)]
pub struct VariabilityRun {
    /// Observation span `[t0, tf]` in seconds.
    pub span: (f64, f64),
    /// Accepted windows per tile.
    pub windows: Vec<Vec<TimeWindow>>,
    /// Variability matrix per tile.
    pub matrices: Vec<VariabilityMatrix>,
    /// Global median used for the detection threshold (after the floor).
    pub median: f64,
    /// Detected sources, numbered from 1.
    pub sources: Vec<Source>,
}

impl VariabilityRun {
    /// Total number of accepted windows over all tiles.
    #[must_use]
    pub fn accepted_window_count(&self) -> usize {
        self.windows.iter().map(Vec::len).sum()
    }

    /// Fills in sky positions with the given resolver. See
    /// [`enrich_sources`].
    pub fn resolve_sources(&mut self, resolver: &dyn SkyResolver) -> usize {
        enrich_sources(&mut self.sources, resolver)
    }
}

fn tile_slot(tile_id: u8, instrument: Instrument) -> Result<usize> {
    let tile = usize::from(tile_id);
    let count = instrument.tile_count();
    if tile < count {
        Ok(tile)
    } else {
        Err(Error::TileOutOfRange {
            tile,
            instrument,
            count,
        })
    }
}

/// Splits a flat event list into one list per tile.
///
/// # Errors
/// Returns [`Error::TileOutOfRange`] for events on a tile the instrument
/// does not have.
pub fn group_by_tile(events: &[Event], instrument: Instrument) -> Result<Vec<Vec<Event>>> {
    let mut tiles = vec![Vec::new(); instrument.tile_count()];
    for event in events {
        tiles[tile_slot(event.tile_id, instrument)?].push(*event);
    }
    Ok(tiles)
}

fn build_pool(max_workers: usize) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .thread_name(|i| format!("flarescan-tile-{i}"))
        .build()?)
}

fn detect_on(
    pool: &rayon::ThreadPool,
    config: &DetectionConfig,
    matrices: &[VariabilityMatrix],
) -> (f64, Vec<Source>) {
    let median = global_median(matrices);
    let detector = RegionDetector::new(config);
    let regions: Vec<_> = pool.install(|| {
        matrices
            .par_iter()
            .enumerate()
            .map(|(tile, matrix)| detector.detect(tile as u8, matrix, median))
            .collect()
    });
    let sources = consolidate(regions);
    info!(
        "{}: {} variable sources detected",
        config.instrument,
        sources.len()
    );
    (median, sources)
}

/// Detects sources on matrices computed earlier, for instance read back from
/// a variability dump. Returns the clamped global median and the sources.
///
/// # Errors
/// Returns an error if the configuration is invalid or the number of
/// matrices does not match the instrument.
pub fn detect_sources(
    config: &DetectionConfig,
    matrices: &[VariabilityMatrix],
) -> Result<(f64, Vec<Source>)> {
    config.validate()?;
    let expected = config.instrument.tile_count();
    if matrices.len() != expected {
        return Err(flarescan_core::Error::TileCountMismatch {
            expected,
            found: matrices.len(),
        }
        .into());
    }
    let pool = build_pool(config.max_workers)?;
    Ok(detect_on(&pool, config, matrices))
}

/// Runs the detection path on one observation.
///
/// `dead_time[t]` lists the dead-time intervals of tile `t`; tiles past the
/// end of the slice have none. Per-tile work runs on a pool of
/// `config.max_workers` threads and results are kept in tile order.
///
/// # Errors
/// Returns an error if the configuration is invalid, the observation holds
/// no events, or the inputs refer to tiles the instrument does not have.
pub fn detect_variability(
    config: &DetectionConfig,
    events: &[Event],
    dead_time: &[Vec<DeadTimeInterval>],
) -> Result<VariabilityRun> {
    config.validate()?;
    let instrument = config.instrument;
    let count = instrument.tile_count();
    if dead_time.len() > count {
        return Err(Error::TileOutOfRange {
            tile: dead_time.len() - 1,
            instrument,
            count,
        });
    }

    let span = observation_span(events)?;
    let tiles = group_by_tile(events, instrument)?;
    let grid = WindowGrid::new(config.time_window, span.1);
    let shape = instrument.tile_shape();
    info!(
        "{instrument}: {} events over [{:.1}, {:.1}] s, {} s windows",
        events.len(),
        span.0,
        span.1,
        config.time_window
    );

    let pool = build_pool(config.max_workers)?;
    let (windows, matrices): (Vec<Vec<TimeWindow>>, Vec<VariabilityMatrix>) = pool.install(|| {
        tiles
            .par_iter()
            .enumerate()
            .map(|(tile, tile_events)| {
                let dead = dead_time.get(tile).map_or(&[][..], Vec::as_slice);
                let accepted = accepted_windows(
                    span.0,
                    span.1,
                    config.time_window,
                    dead,
                    config.good_time_ratio,
                );
                debug!("Tile {tile}: {} accepted windows", accepted.len());
                let matrix = tile_variability(tile_events, &accepted, grid, shape);
                (accepted, matrix)
            })
            .unzip()
    });

    let (median, sources) = detect_on(&pool, config, &matrices);

    Ok(VariabilityRun {
        span,
        windows,
        matrices,
        median,
        sources,
    })
}

/// Builds the sky-aligned variability image of an observation.
///
/// # Errors
/// Returns an error if the matrices do not fit the instrument layout or the
/// header lacks usable calibration keywords.
pub fn sky_image(
    instrument: Instrument,
    matrices: &[VariabilityMatrix],
    header: &ObservationHeader,
) -> Result<Array2<f64>> {
    let calibration = CalibrationHeader::from_header(header)?;
    let submode = Submode::from_header(header.submode());
    let mosaic = assemble_for_submode(instrument, matrices, submode)?;
    debug!("{instrument}: {submode:?} mosaic of shape {:?}", mosaic.dim());
    to_sky_frame(instrument, &mosaic, &calibration).map_err(Into::into)
}
