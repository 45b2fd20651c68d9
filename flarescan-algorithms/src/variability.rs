//! Per-pixel variability statistic.
//!
//! Photon counts of every pixel are binned into the accepted time windows of
//! its tile, normalised to the nominal window exposure, and reduced to
//!
//! ```text
//! V = max(C_max - C_med, C_med - C_min) / C_med    if C_med > 0
//! V = C_max                                         otherwise
//! ```
//!
//! Most pixels see photons in a handful of windows only, so counts are kept
//! sparse: a window without photons contributes a normalised count of zero
//! regardless of its exposure.
#![allow(clippy::cast_precision_loss)]

use flarescan_core::{Event, TimeWindow, VariabilityMatrix};

/// Inputs shared by every tile of one observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowGrid {
    /// Nominal window width (seconds).
    pub width: f64,
    /// End of the observation span. Events at exactly this time belong to
    /// the last window.
    pub end: f64,
}

impl WindowGrid {
    /// Creates a grid description.
    #[must_use]
    pub fn new(width: f64, end: f64) -> Self {
        Self { width, end }
    }
}

/// Position in `windows` of the accepted window holding `time`.
fn window_of(windows: &[TimeWindow], grid: WindowGrid, time: f64) -> Option<usize> {
    let pos = windows.partition_point(|w| w.start <= time).checked_sub(1)?;
    let window = &windows[pos];
    let end = window.end();
    let inside = time < end || (time <= end && end >= grid.end);
    inside.then_some(pos)
}

/// Factor turning a raw window count into a count at nominal exposure.
fn normalisation(window: &TimeWindow, width: f64) -> f64 {
    let exposure = window.exposure();
    if exposure > 0.0 {
        width / exposure
    } else {
        0.0
    }
}

/// Value at position `rank` of the ascending sequence made of `zeros` zeros
/// followed by `sorted`.
fn ranked(sorted: &[f64], zeros: usize, rank: usize) -> f64 {
    if rank < zeros {
        0.0
    } else {
        sorted[rank - zeros]
    }
}

/// Variability of one pixel given its non-zero normalised counts and the
/// total number of accepted windows.
fn pixel_statistic(mut counts: Vec<f64>, windows: usize) -> f64 {
    if windows == 0 || counts.is_empty() {
        return 0.0;
    }
    counts.sort_by(f64::total_cmp);
    let zeros = windows - counts.len();

    let c_min = ranked(&counts, zeros, 0);
    let c_max = ranked(&counts, zeros, windows - 1);
    let c_med = 0.5
        * (ranked(&counts, zeros, (windows - 1) / 2) + ranked(&counts, zeros, windows / 2));

    if c_med > 0.0 {
        (c_max - c_med).max(c_med - c_min) / c_med
    } else {
        c_max
    }
}

/// Computes the variability matrix of one tile.
///
/// `events` are the tile's photons, `windows` its accepted windows in
/// ascending start order and `shape` the tile's `(raw_x, raw_y)` extent.
/// Events outside the grid or outside every accepted window are ignored.
#[must_use]
pub fn tile_variability<'a, I>(
    events: I,
    windows: &[TimeWindow],
    grid: WindowGrid,
    shape: (usize, usize),
) -> VariabilityMatrix
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut matrix = VariabilityMatrix::zeros(shape);
    if windows.is_empty() {
        return matrix;
    }

    let mut hits: Vec<(usize, usize)> = events
        .into_iter()
        .filter_map(|event| {
            let (x, y) = event.pixel_index(shape)?;
            let window = window_of(windows, grid, event.time)?;
            Some((x * shape.1 + y, window))
        })
        .collect();
    hits.sort_unstable();

    let factors: Vec<f64> = windows
        .iter()
        .map(|window| normalisation(window, grid.width))
        .collect();

    for pixel_hits in hits.chunk_by(|a, b| a.0 == b.0) {
        let pixel = pixel_hits[0].0;
        let counts: Vec<f64> = pixel_hits
            .chunk_by(|a, b| a.1 == b.1)
            .map(|run| run.len() as f64 * factors[run[0].1])
            .filter(|count| *count > 0.0)
            .collect();
        matrix[[pixel / shape.1, pixel % shape.1]] = pixel_statistic(counts, windows.len());
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn windows(n: usize, width: f64) -> Vec<TimeWindow> {
        (0..n)
            .map(|index| TimeWindow {
                index,
                start: index as f64 * width,
                duration: width,
                valid_duration_ratio: 1.0,
            })
            .collect()
    }

    fn events_at(raw: (u16, u16), per_window: &[usize], width: f64) -> Vec<Event> {
        per_window
            .iter()
            .enumerate()
            .flat_map(|(k, &count)| {
                (0..count).map(move |i| {
                    let time = k as f64 * width + (i as f64 + 0.5) * width / (count as f64 + 1.0);
                    Event::new(time, raw.0, raw.1, 0)
                })
            })
            .collect()
    }

    #[test]
    fn test_uniform_counts_give_zero() {
        let wins = windows(6, 10.0);
        let events = events_at((2, 3), &[4, 4, 4, 4, 4, 4], 10.0);
        let m = tile_variability(&events, &wins, WindowGrid::new(10.0, 60.0), (4, 5));
        assert_abs_diff_eq!(m[[1, 2]], 0.0);
        assert_abs_diff_eq!(m.sum(), 0.0);
    }

    #[test]
    fn test_spike_increases_variability() {
        let wins = windows(5, 10.0);
        let grid = WindowGrid::new(10.0, 50.0);
        let mut last = 0.0;
        for spike in [2, 3, 6, 12] {
            let events = events_at((1, 1), &[2, 2, spike, 2, 2], 10.0);
            let m = tile_variability(&events, &wins, grid, (3, 3));
            assert!(m[[0, 0]] > last || (spike == 2 && m[[0, 0]] == 0.0));
            last = m[[0, 0]];
        }
        // (12 - 2) / 2
        assert_abs_diff_eq!(last, 5.0);
    }

    #[test]
    fn test_same_total_packed_in_one_window_is_more_variable() {
        let grid = WindowGrid::new(10.0, 60.0);
        for (n, spread, burst) in [
            (6, [5, 5, 5, 5, 5, 5], [0, 0, 30, 0, 0, 0]),
            (6, [2, 2, 2, 2, 2, 2], [12, 0, 0, 0, 0, 0]),
        ] {
            let wins = windows(n, 10.0);
            assert_eq!(spread.iter().sum::<usize>(), burst.iter().sum::<usize>());
            let mut events = events_at((1, 1), &spread, 10.0);
            events.extend(events_at((2, 2), &burst, 10.0));
            let m = tile_variability(&events, &wins, grid, (2, 2));
            assert!(m[[0, 0]] < m[[1, 1]]);
        }
    }

    #[test]
    fn test_sparse_pixel_uses_max_when_median_is_zero() {
        let wins = windows(5, 10.0);
        let events = events_at((3, 1), &[0, 0, 7, 0, 0], 10.0);
        let m = tile_variability(&events, &wins, WindowGrid::new(10.0, 50.0), (3, 3));
        assert_abs_diff_eq!(m[[2, 0]], 7.0);
    }

    #[test]
    fn test_even_window_count_averages_median() {
        let wins = windows(4, 10.0);
        let events = events_at((1, 1), &[1, 3, 5, 7], 10.0);
        let m = tile_variability(&events, &wins, WindowGrid::new(10.0, 40.0), (1, 1));
        // median 4, max deviation 3
        assert_abs_diff_eq!(m[[0, 0]], 0.75);
    }

    #[test]
    fn test_counts_are_normalised_by_exposure() {
        let mut wins = windows(3, 10.0);
        wins[1].valid_duration_ratio = 0.5;
        // 2 photons in half the live time is a normalised 4.
        let events = events_at((1, 1), &[4, 2, 4], 10.0);
        let m = tile_variability(&events, &wins, WindowGrid::new(10.0, 30.0), (1, 1));
        assert_abs_diff_eq!(m[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_events_outside_grid_or_windows_are_dropped() {
        let wins = vec![
            TimeWindow {
                index: 0,
                start: 0.0,
                duration: 10.0,
                valid_duration_ratio: 1.0,
            },
            TimeWindow {
                index: 2,
                start: 20.0,
                duration: 10.0,
                valid_duration_ratio: 1.0,
            },
        ];
        let events = vec![
            Event::new(5.0, 1, 1, 0),
            Event::new(15.0, 1, 1, 0),
            Event::new(15.0, 1, 1, 0),
            Event::new(25.0, 1, 1, 0),
            Event::new(25.0, 0, 1, 0),
            Event::new(25.0, 9, 9, 0),
            Event::new(-1.0, 1, 1, 0),
        ];
        let m = tile_variability(&events, &wins, WindowGrid::new(10.0, 30.0), (2, 2));
        assert_abs_diff_eq!(m.sum(), 0.0);
    }

    #[test]
    fn test_last_window_includes_span_end() {
        let wins = windows(2, 10.0);
        let events = vec![Event::new(20.0, 1, 1, 0), Event::new(20.0, 1, 1, 0)];
        let m = tile_variability(&events, &wins, WindowGrid::new(10.0, 20.0), (1, 1));
        // counts [0, 2] give median 1
        assert_abs_diff_eq!(m[[0, 0]], 1.0);
    }

    #[test]
    fn test_no_windows_gives_zeros() {
        let events = vec![Event::new(1.0, 1, 1, 0)];
        let m = tile_variability(&events, &[], WindowGrid::new(10.0, 10.0), (2, 3));
        assert_eq!(m.dim(), (2, 3));
        assert_abs_diff_eq!(m.sum(), 0.0);
    }
}
