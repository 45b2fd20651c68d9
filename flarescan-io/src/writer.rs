//! Output folder layout and file writers.

use crate::{Error, Result};
use flarescan_core::{Instrument, Source};
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Magic bytes opening a variability dump.
pub const VARIABILITY_MAGIC: &[u8; 8] = b"FSVAR001";

/// Variability dump of the sky-frame image.
pub const VARIABILITY_FILE: &str = "variability.bin";
/// Variability dump of the assembled tile mosaic, reloaded by reruns.
pub const MOSAIC_FILE: &str = "variability_mosaic.bin";
/// Source list file name.
pub const SOURCES_FILE: &str = "variable_sources.reg";
/// Catalogue cross-match file name.
pub const BEST_MATCH_FILE: &str = "best_match.txt";
/// Sky-frame image file name.
pub const IMAGE_FILE: &str = "variability_image.fsi";

const SOURCES_LEGEND: &str = "# id;tile;raw_x;raw_y;radius;count";
const BEST_MATCH_LEGEND: &str = "# id;catalogue;name;ra;dec;separation_arcsec";

/// The folder receiving the outputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFolder {
    root: PathBuf,
}

impl OutputFolder {
    /// Creates the folder (and its parents) if needed.
    ///
    /// # Errors
    /// Returns an error if the folder cannot be created.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    /// Folder path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the variability dump.
    #[must_use]
    pub fn variability(&self) -> PathBuf {
        self.root.join(VARIABILITY_FILE)
    }

    /// Path of the mosaic dump.
    #[must_use]
    pub fn mosaic(&self) -> PathBuf {
        self.root.join(MOSAIC_FILE)
    }

    /// Path of the source list.
    #[must_use]
    pub fn sources(&self) -> PathBuf {
        self.root.join(SOURCES_FILE)
    }

    /// Path of the cross-match file.
    #[must_use]
    pub fn best_match(&self) -> PathBuf {
        self.root.join(BEST_MATCH_FILE)
    }

    /// Path of the sky-frame image.
    #[must_use]
    pub fn image(&self) -> PathBuf {
        self.root.join(IMAGE_FILE)
    }
}

/// Run parameters stored in front of the sky-frame image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Who ran the detector.
    pub creator: String,
    /// UTC creation time, `YYYY-MM-DD HH:MM:SS`.
    pub date: String,
    /// Observation identifier.
    pub obs_id: Option<String>,
    /// Camera.
    pub instrument: Instrument,
    /// Window width (seconds).
    pub time_window: f64,
    /// Good-time ratio threshold.
    pub good_time_ratio: f64,
    /// Detection level.
    pub detection_level: f64,
    /// Box side (pixels).
    pub box_size: usize,
    /// Raster shape `[rows, cols]`, filled in when writing.
    #[serde(default)]
    pub shape: [usize; 2],
    /// Detected sources.
    #[serde(default)]
    pub sources: Vec<Source>,
}

fn write_raster<W: Write>(writer: &mut W, raster: &Array2<f64>) -> Result<()> {
    for value in raster {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn dimension(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidFormat(format!("{what} {value} does not fit in 32 bits")))
}

/// Writes a raster as `FSVAR001`, rows and columns (u32 LE) and the
/// row-major f64 LE values.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_variability<P: AsRef<Path>>(path: P, raster: &Array2<f64>) -> Result<()> {
    let (rows, cols) = raster.dim();
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(VARIABILITY_MAGIC)?;
    writer.write_all(&dimension(rows, "row count")?.to_le_bytes())?;
    writer.write_all(&dimension(cols, "column count")?.to_le_bytes())?;
    write_raster(&mut writer, raster)?;
    writer.flush()?;
    info!(
        "Wrote {rows}x{cols} variability raster to {}",
        path.as_ref().display()
    );
    Ok(())
}

/// Writes the source list, one `id;tile;raw_x;raw_y;radius;count` line per
/// source after a legend line.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_sources<P: AsRef<Path>>(path: P, sources: &[Source]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writeln!(writer, "{SOURCES_LEGEND}")?;
    for s in sources {
        writeln!(
            writer,
            "{};{};{};{};{};{}",
            s.id, s.tile_id, s.raw_x, s.raw_y, s.radius_raw, s.photon_count
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the cross-match file. Only the legend is written; matching
/// against catalogues happens downstream.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_best_match<P: AsRef<Path>>(path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writeln!(writer, "{BEST_MATCH_LEGEND}")?;
    writer.flush()?;
    Ok(())
}

/// Writes the sky-frame image: the JSON header on the first line, then the
/// raster as row-major f64 LE values.
///
/// # Errors
/// Returns an error if the header cannot be encoded or the file cannot be
/// written.
pub fn write_image<P: AsRef<Path>>(
    path: P,
    header: &ImageHeader,
    image: &Array2<f64>,
) -> Result<()> {
    let (rows, cols) = image.dim();
    let header = ImageHeader {
        shape: [rows, cols],
        ..header.clone()
    };
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &header)?;
    writer.write_all(b"\n")?;
    write_raster(&mut writer, image)?;
    writer.flush()?;
    info!(
        "Wrote {rows}x{cols} image with {} sources to {}",
        header.sources.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flarescan_core::CandidateRegion;
    use tempfile::{tempdir, NamedTempFile};

    fn source() -> Source {
        Source::from_region(
            1,
            &CandidateRegion {
                tile_id: 5,
                centroid_raw_x: 32.0,
                centroid_raw_y: 92.0,
                pixel_radius: 1.5,
                peak_count: 900.0,
                area: 9,
            },
        )
    }

    #[test]
    fn test_output_folder_layout() {
        let dir = tempdir().unwrap();
        let out = OutputFolder::create(dir.path().join("10_100_3_1_PN")).unwrap();
        assert!(out.root().is_dir());
        assert_eq!(out.sources().file_name().unwrap(), SOURCES_FILE);
        assert_ne!(out.mosaic(), out.variability());
        assert!(out.image().starts_with(out.root()));
    }

    #[test]
    fn test_variability_layout() {
        let file = NamedTempFile::new().unwrap();
        let raster = Array2::from_shape_vec((2, 3), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.5]).unwrap();
        write_variability(file.path(), &raster).unwrap();

        let data = std::fs::read(file.path()).unwrap();
        assert_eq!(data.len(), 8 + 4 + 4 + 6 * 8);
        assert_eq!(&data[..8], VARIABILITY_MAGIC);
        assert_eq!(u32::from_le_bytes(data[8..12].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(data[12..16].try_into().unwrap()), 3);
        let last = f64::from_le_bytes(data[data.len() - 8..].try_into().unwrap());
        assert!((last - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_sources() {
        let file = NamedTempFile::new().unwrap();
        write_sources(file.path(), &[source()]).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('#'));
        assert_eq!(lines[1], "1;5;32;92;1.5;900");
    }

    #[test]
    fn test_best_match_is_legend_only() {
        let file = NamedTempFile::new().unwrap();
        write_best_match(file.path()).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with('#'));
    }
}
