//! Observation time windowing and good-time filtering.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use flarescan_core::{DeadTimeInterval, Error, Event, Result, TimeWindow};

/// Earliest and latest event time across all tiles.
///
/// # Errors
/// Returns [`Error::EmptyObservation`] if there are no events.
pub fn observation_span<'a, I>(events: I) -> Result<(f64, f64)>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .fold(None, |span: Option<(f64, f64)>, event| match span {
            None => Some((event.time, event.time)),
            Some((lo, hi)) => Some((lo.min(event.time), hi.max(event.time))),
        })
        .ok_or(Error::EmptyObservation)
}

/// Total length of `[start, end]` covered by the union of the intervals.
fn covered_length(intervals: &[DeadTimeInterval], start: f64, end: f64) -> f64 {
    let mut clipped: Vec<DeadTimeInterval> = intervals
        .iter()
        .filter_map(|interval| interval.clip(start, end))
        .collect();
    clipped.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut covered = 0.0;
    let mut current: Option<DeadTimeInterval> = None;
    for interval in clipped {
        current = match current {
            Some(mut open) if interval.start <= open.end => {
                open.end = open.end.max(interval.end);
                Some(open)
            }
            Some(open) => {
                covered += open.length();
                Some(interval)
            }
            None => Some(interval),
        };
    }
    covered + current.map_or(0.0, |open| open.length())
}

/// Tiles `[t0, tf]` into windows of width `width` and measures the dead-time
/// coverage of each.
///
/// Window `k` starts at `t0 + k * width` for `k = 0..=floor((tf - t0) / width)`
/// and ends at `min(start + width, tf)`, so the last window may be short or
/// even empty.
#[must_use]
pub fn build_windows(
    t0: f64,
    tf: f64,
    width: f64,
    dead_time: &[DeadTimeInterval],
) -> Vec<TimeWindow> {
    if !(width > 0.0) || tf < t0 {
        return Vec::new();
    }
    let count = ((tf - t0) / width).floor() as usize + 1;

    (0..count)
        .map(|index| {
            let start = t0 + index as f64 * width;
            let end = (start + width).min(tf);
            let duration = (end - start).max(0.0);
            let valid_duration_ratio = if duration > 0.0 {
                (duration - covered_length(dead_time, start, end)) / duration
            } else {
                0.0
            };
            TimeWindow {
                index,
                start,
                duration,
                valid_duration_ratio,
            }
        })
        .collect()
}

/// Windows of one tile that pass the good-time ratio test, ordered by start.
#[must_use]
pub fn accepted_windows(
    t0: f64,
    tf: f64,
    width: f64,
    dead_time: &[DeadTimeInterval],
    good_time_ratio: f64,
) -> Vec<TimeWindow> {
    build_windows(t0, tf, width, dead_time)
        .into_iter()
        .filter(|window| window.is_valid(good_time_ratio))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_span() {
        let events = [
            Event::new(5.0, 1, 1, 0),
            Event::new(2.0, 1, 1, 3),
            Event::new(9.5, 1, 1, 1),
        ];
        assert_eq!(observation_span(&events).unwrap(), (2.0, 9.5));
        let none: Vec<Event> = Vec::new();
        assert!(matches!(
            observation_span(&none),
            Err(Error::EmptyObservation)
        ));
    }

    #[test]
    fn test_window_tiling() {
        let windows = build_windows(0.0, 250.0, 100.0, &[]);
        assert_eq!(windows.len(), 3);
        assert_abs_diff_eq!(windows[2].start, 200.0);
        assert_abs_diff_eq!(windows[2].duration, 50.0);
        assert!(windows.iter().all(|w| (w.valid_duration_ratio - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_exact_multiple_gives_empty_tail() {
        let windows = build_windows(0.0, 300.0, 100.0, &[]);
        assert_eq!(windows.len(), 4);
        assert_abs_diff_eq!(windows[3].duration, 0.0);
        assert_abs_diff_eq!(windows[3].valid_duration_ratio, 0.0);

        let accepted = accepted_windows(0.0, 300.0, 100.0, &[], 0.0);
        assert_eq!(accepted.len(), 3);
    }

    #[test]
    fn test_no_dead_time_accepts_every_window() {
        let accepted = accepted_windows(10.0, 1010.0, 100.0, &[], 1.0);
        assert_eq!(accepted.len(), 10);
        let indices: Vec<_> = accepted.iter().map(|w| w.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_overlapping_dead_time_is_merged() {
        let dead = [
            DeadTimeInterval::new(20.0, 40.0),
            DeadTimeInterval::new(30.0, 50.0),
            DeadTimeInterval::new(90.0, 150.0),
        ];
        let windows = build_windows(0.0, 200.0, 100.0, &dead);
        // [20, 50] and [90, 100] in the first window.
        assert_abs_diff_eq!(windows[0].valid_duration_ratio, 0.6, epsilon = 1e-12);
        // [100, 150] in the second.
        assert_abs_diff_eq!(windows[1].valid_duration_ratio, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_interval_is_empty() {
        let dead = [DeadTimeInterval::new(60.0, 40.0)];
        let windows = build_windows(0.0, 100.0, 100.0, &dead);
        assert_abs_diff_eq!(windows[0].valid_duration_ratio, 1.0);
    }

    #[test]
    fn test_ratio_threshold_is_inclusive() {
        let dead = [DeadTimeInterval::new(0.0, 25.0)];
        let accepted = accepted_windows(0.0, 100.0, 100.0, &dead, 0.75);
        assert_eq!(accepted.len(), 1);
        let rejected = accepted_windows(0.0, 100.0, 100.0, &dead, 0.76);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_raising_ratio_never_adds_windows() {
        let dead = [
            DeadTimeInterval::new(15.0, 35.0),
            DeadTimeInterval::new(130.0, 190.0),
            DeadTimeInterval::new(240.0, 250.0),
            DeadTimeInterval::new(400.0, 480.0),
        ];
        let mut previous = usize::MAX;
        for step in 0..=10 {
            let gtr = f64::from(step) / 10.0;
            let count = accepted_windows(0.0, 500.0, 100.0, &dead, gtr).len();
            assert!(count <= previous);
            previous = count;
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(build_windows(0.0, 100.0, 0.0, &[]).is_empty());
        assert!(build_windows(10.0, 5.0, 1.0, &[]).is_empty());
        let single = build_windows(5.0, 5.0, 1.0, &[]);
        assert_eq!(single.len(), 1);
        assert!(!single[0].is_valid(0.0));
    }
}
