//! Source consolidation and sky-coordinate enrichment.

use flarescan_core::{CandidateRegion, SkyPosition, Source};
use log::{debug, warn};

/// Error type returned by sky resolvers.
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

/// Converts raw detector coordinates on a tile into sky coordinates.
///
/// Implementations carry whatever context they need (event file, external
/// tool environment). A failure only affects the source being resolved.
pub trait SkyResolver {
    /// Resolves one raw position.
    ///
    /// # Errors
    /// Returns an error if the position cannot be resolved.
    fn resolve(&self, raw_x: f64, raw_y: f64, tile_id: u8) -> Result<SkyPosition, ResolveError>;
}

/// Turns per-tile candidate regions into numbered sources.
///
/// Regions are taken in the order given (tile order, then detection
/// order within a tile) and numbered from 1. Regions of different tiles are
/// never merged.
#[must_use]
pub fn consolidate<I>(per_tile: I) -> Vec<Source>
where
    I: IntoIterator<Item = Vec<CandidateRegion>>,
{
    per_tile
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(i, region)| Source::from_region(i + 1, &region))
        .collect()
}

/// Fills in the sky position of every source the resolver can handle.
///
/// Returns the number of sources resolved. Failures are logged and leave the
/// sky fields unset.
pub fn enrich_sources(sources: &mut [Source], resolver: &dyn SkyResolver) -> usize {
    let mut resolved = 0;
    for source in sources.iter_mut() {
        match resolver.resolve(source.raw_x, source.raw_y, source.tile_id) {
            Ok(sky) => {
                debug!(
                    "Source {}: RA {:.5} Dec {:.5} (sky {:.1}, {:.1})",
                    source.id, sky.ra, sky.dec, sky.x, sky.y
                );
                source.sky = Some(sky);
                resolved += 1;
            }
            Err(e) => {
                warn!("Source {}: sky position unavailable: {e}", source.id);
                source.sky = None;
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn region(tile_id: u8, x: f64, y: f64) -> CandidateRegion {
        CandidateRegion {
            tile_id,
            centroid_raw_x: x,
            centroid_raw_y: y,
            pixel_radius: 1.5,
            peak_count: 120.0,
            area: 7,
        }
    }

    struct OddTilesOnly;

    impl SkyResolver for OddTilesOnly {
        fn resolve(
            &self,
            raw_x: f64,
            raw_y: f64,
            tile_id: u8,
        ) -> Result<SkyPosition, ResolveError> {
            if tile_id % 2 == 1 {
                Ok(SkyPosition {
                    x: raw_x * 10.0,
                    y: raw_y * 10.0,
                    ra: 150.0,
                    dec: -20.0,
                })
            } else {
                Err("timed out".into())
            }
        }
    }

    #[test]
    fn test_sequential_ids_across_tiles() {
        let sources = consolidate(vec![
            vec![region(0, 3.0, 4.0), region(0, 8.0, 9.0)],
            vec![],
            vec![region(2, 1.0, 1.0)],
        ]);
        let ids: Vec<_> = sources.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(sources[2].tile_id, 2);
        assert_abs_diff_eq!(sources[1].var_raw_x, 11.0);
        assert_abs_diff_eq!(sources[0].radius_sky, 96.0);
        assert!(sources.iter().all(|s| s.sky.is_none()));
    }

    #[test]
    fn test_empty_input() {
        assert!(consolidate(Vec::<Vec<CandidateRegion>>::new()).is_empty());
    }

    #[test]
    fn test_enrichment_failures_leave_sky_unset() {
        let mut sources = consolidate(vec![vec![region(0, 2.0, 2.0)], vec![region(1, 5.0, 6.0)]]);
        let resolved = enrich_sources(&mut sources, &OddTilesOnly);
        assert_eq!(resolved, 1);
        assert!(sources[0].sky.is_none());
        let sky = sources[1].sky.unwrap();
        assert_abs_diff_eq!(sky.x, 50.0);
        assert_abs_diff_eq!(sky.dec, -20.0);
    }
}
