//! Event and dead-time extractors.
//!
//! The detector consumes decoded event lists; decoding the mission's own
//! file formats is left to external tools. The text readers here accept
//! the plain interchange format those tools are expected to emit:
//!
//! ```text
//! # OBS_ID = 0123456789
//! # PA_PNT = 73.25
//! 12345.6;4;31;92
//! ```
//!
//! Dead-time files hold one `tile;start;end` row per interval.

use crate::{Error, Result};
use flarescan_core::{DeadTimeInterval, Event, ObservationHeader};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SEPARATOR: char = ';';
const COMMENT: char = '#';

/// Photons of one observation together with its header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventList {
    /// All events, on every tile.
    pub events: Vec<Event>,
    /// Header keywords.
    pub header: ObservationHeader,
}

/// Dead-time intervals indexed by tile.
pub type DeadTimeTable = Vec<Vec<DeadTimeInterval>>;

/// Source of photon events for an observation.
pub trait PhotonExtractor {
    /// Reads the event list stored at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded.
    fn extract(&self, path: &Path) -> Result<EventList>;
}

/// Source of per-tile dead-time intervals.
pub trait DeadTimeExtractor {
    /// Reads the dead-time intervals stored at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded.
    fn extract(&self, path: &Path) -> Result<DeadTimeTable>;
}

/// Line-oriented reader shared by the text extractors.
struct Lines {
    path: PathBuf,
    inner: std::io::Lines<BufReader<File>>,
    line: usize,
}

impl Lines {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufReader::new(file).lines(),
            line: 0,
        })
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Parse {
            path: self.path.clone(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn field<T: FromStr>(&self, raw: Option<&str>, name: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = raw.ok_or_else(|| self.error(format!("missing {name}")))?;
        raw.trim()
            .parse()
            .map_err(|e| self.error(format!("bad {name} '{}': {e}", raw.trim())))
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        let next = self.inner.next()?;
        self.line += 1;
        Some(next.map_err(Error::from))
    }
}

/// Parses a `# KEY = value` header line.
fn header_entry(comment: &str) -> Option<(&str, &str)> {
    let (key, value) = comment.split_once('=')?;
    let key = key.trim();
    (!key.is_empty() && !key.contains(char::is_whitespace)).then_some((key, value.trim()))
}

/// Reader for `time;tile;raw_x;raw_y` event files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextEventReader;

impl PhotonExtractor for TextEventReader {
    fn extract(&self, path: &Path) -> Result<EventList> {
        let mut lines = Lines::open(path)?;
        let mut list = EventList::default();

        while let Some(line) = lines.next_line() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix(COMMENT) {
                if let Some((key, value)) = header_entry(comment) {
                    list.header.insert(key, value);
                }
                continue;
            }

            let mut fields = trimmed.split(SEPARATOR);
            let time: f64 = lines.field(fields.next(), "time")?;
            let tile: u8 = lines.field(fields.next(), "tile")?;
            let raw_x: u16 = lines.field(fields.next(), "raw_x")?;
            let raw_y: u16 = lines.field(fields.next(), "raw_y")?;
            if !time.is_finite() {
                return Err(lines.error("non-finite time"));
            }
            list.events.push(Event::new(time, raw_x, raw_y, tile));
        }

        debug!(
            "Read {} events and {} header keywords from {}",
            list.events.len(),
            list.header.iter().count(),
            path.display()
        );
        Ok(list)
    }
}

/// Reader for `tile;start;end` dead-time files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDeadTimeReader;

impl DeadTimeExtractor for TextDeadTimeReader {
    fn extract(&self, path: &Path) -> Result<DeadTimeTable> {
        let mut lines = Lines::open(path)?;
        let mut table: DeadTimeTable = Vec::new();

        while let Some(line) = lines.next_line() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
                continue;
            }

            let mut fields = trimmed.split(SEPARATOR);
            let tile: u8 = lines.field(fields.next(), "tile")?;
            let start: f64 = lines.field(fields.next(), "start")?;
            let end: f64 = lines.field(fields.next(), "end")?;

            let tile = usize::from(tile);
            if table.len() <= tile {
                table.resize_with(tile + 1, Vec::new);
            }
            table[tile].push(DeadTimeInterval::new(start, end));
        }

        debug!(
            "Read {} dead-time intervals over {} tiles from {}",
            table.iter().map(Vec::len).sum::<usize>(),
            table.len(),
            path.display()
        );
        Ok(table)
    }
}
