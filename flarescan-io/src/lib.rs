//! flarescan-io: Inputs and outputs of the detector.
//!
//! This crate provides the text extractors for events and dead time, the
//! writers for every file of an output folder, memory-mapped readers for
//! the binary outputs, and the `edet2sky` astrometry bridge.
//!

pub mod astrometry;
mod error;
pub mod extract;
mod reader;
mod writer;

pub use astrometry::{parse_edet2sky, Edet2SkyResolver, SasEnvironment};
pub use error::{Error, Result};
pub use extract::{
    DeadTimeExtractor, DeadTimeTable, EventList, PhotonExtractor, TextDeadTimeReader,
    TextEventReader,
};
pub use reader::{read_image, read_variability, MappedFileReader};
pub use writer::{
    write_best_match, write_image, write_sources, write_variability, ImageHeader, OutputFolder,
    BEST_MATCH_FILE, IMAGE_FILE, MOSAIC_FILE, SOURCES_FILE, VARIABILITY_FILE,
    VARIABILITY_MAGIC,
};
