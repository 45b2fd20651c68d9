//! Memory-mapped readers for the binary outputs.

use crate::writer::{ImageHeader, VARIABILITY_MAGIC};
use crate::{Error, Result};
use memmap2::Mmap;
use ndarray::Array2;
use std::fs::File;
use std::path::{Path, PathBuf};

const DIMENSIONS_END: usize = VARIABILITY_MAGIC.len() + 8;

/// Read-only mapping of one output file.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Maps `path` read-only.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: output files are written once and only read afterwards.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Mapped bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// True for a zero-length file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the mapping was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_u32(bytes: &[u8]) -> usize {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw) as usize
}

/// Decodes `rows * cols` row-major f64 LE values.
fn decode_raster(payload: &[u8], rows: usize, cols: usize) -> Result<Array2<f64>> {
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(8))
        .ok_or_else(|| Error::InvalidFormat(format!("raster {rows}x{cols} is too large")))?;
    if payload.len() != expected {
        return Err(Error::InvalidFormat(format!(
            "raster {rows}x{cols} needs {expected} bytes, found {}",
            payload.len()
        )));
    }
    let values: Vec<f64> = payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

/// Loads a variability dump written by
/// [`write_variability`](crate::write_variability).
///
/// # Errors
/// Returns an error if the file cannot be mapped or is not a valid dump.
pub fn read_variability<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let reader = MappedFileReader::open(path)?;
    let bytes = reader.as_bytes();
    if bytes.len() < DIMENSIONS_END || &bytes[..VARIABILITY_MAGIC.len()] != VARIABILITY_MAGIC {
        return Err(Error::InvalidFormat(format!(
            "{} is not a variability dump",
            reader.path().display()
        )));
    }
    let rows = read_u32(&bytes[8..12]);
    let cols = read_u32(&bytes[12..16]);
    decode_raster(&bytes[DIMENSIONS_END..], rows, cols)
}

/// Loads a sky-frame image written by [`write_image`](crate::write_image).
///
/// # Errors
/// Returns an error if the header line is missing or malformed, or the
/// raster does not match the recorded shape.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<(ImageHeader, Array2<f64>)> {
    let reader = MappedFileReader::open(path)?;
    let bytes = reader.as_bytes();
    let newline = bytes.iter().position(|&b| b == b'\n').ok_or_else(|| {
        Error::InvalidFormat(format!("{} has no header line", reader.path().display()))
    })?;
    let header: ImageHeader = serde_json::from_slice(&bytes[..newline])?;
    let raster = decode_raster(&bytes[newline + 1..], header.shape[0], header.shape[1])?;
    Ok((header, raster))
}
