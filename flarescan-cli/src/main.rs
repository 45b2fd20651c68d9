//! `flarescan`: detects variable sources in one observation and writes the
//! result folder.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::struct_excessive_bools
)]

use chrono::Utc;
use clap::{Parser, ValueEnum};
use flarescan_algorithms::{
    detect_sources, detect_variability, enrich_sources, group_by_tile, observation_span,
    sky_image,
};
use flarescan_core::{DetectionConfig, Instrument, Source, VariabilityMatrix};
use flarescan_epic::{assemble, split, CalibrationHeader, FramePlacement};
use flarescan_io::{
    read_variability, write_best_match, write_image, write_sources, write_variability,
    DeadTimeExtractor, DeadTimeTable, Edet2SkyResolver, EventList, ImageHeader, OutputFolder,
    PhotonExtractor, SasEnvironment, TextDeadTimeReader, TextEventReader, MOSAIC_FILE,
};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        source: flarescan_io::Error,
    },

    #[error("unusable observation {}: {source}", path.display())]
    Observation {
        path: PathBuf,
        source: flarescan_algorithms::Error,
    },

    #[error("cannot prepare output folder {}: {source}", path.display())]
    OutputFolder {
        path: PathBuf,
        source: flarescan_io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(flarescan_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] flarescan_io::Error),

    #[error("processing error: {0}")]
    Processing(#[from] flarescan_algorithms::Error),

    #[error("geometry error: {0}")]
    Geometry(#[from] flarescan_epic::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::OutputFolder { .. } => 1,
            CliError::Input { .. } | CliError::Observation { .. } => 2,
            CliError::Config(_) => 3,
            CliError::Io(_) | CliError::Processing(_) | CliError::Geometry(_) => 4,
        }
    }
}

/// Camera selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InstrumentArg {
    /// EPIC pn, 12 CCDs
    #[value(name = "PN")]
    Pn,
    /// EPIC MOS1, 7 CCDs
    #[value(name = "M1")]
    M1,
    /// EPIC MOS2, 7 CCDs
    #[value(name = "M2")]
    M2,
}

impl From<InstrumentArg> for Instrument {
    fn from(arg: InstrumentArg) -> Self {
        match arg {
            InstrumentArg::Pn => Instrument::Pn,
            InstrumentArg::M1 => Instrument::Mos1,
            InstrumentArg::M2 => Instrument::Mos2,
        }
    }
}

/// Variable X-ray source detector for EPIC observations.
#[derive(Parser, Debug)]
#[command(name = "flarescan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Observation folder holding <INST>_clean.txt, <INST>_deadtime.txt and
    /// <INST>_image.fits
    #[arg(long)]
    path: PathBuf,

    /// Output folder [default: <path>/<dl>_<tw>_<bs>_<gtr>_<inst>]
    #[arg(long)]
    out: Option<PathBuf>,

    /// Detection box side (pixels)
    #[arg(long, default_value = "3")]
    box_size: usize,

    /// Detection level, in multiples of the median variability
    #[arg(long, default_value = "10")]
    detection_level: f64,

    /// Time window width (seconds)
    #[arg(long, default_value = "100")]
    time_window: f64,

    /// Minimum live fraction of an accepted window
    #[arg(long, default_value = "1.0")]
    good_time_ratio: f64,

    /// Maximum number of tile workers
    #[arg(long, default_value = "8")]
    max_workers: usize,

    /// Box scan stride (pixels) [default: box size]
    #[arg(long)]
    scan_stride: Option<usize>,

    /// Name recorded in the image header
    #[arg(long, env = "USER", default_value = "unknown")]
    creator: String,

    /// Observation identifier [default: OBS_ID from the event file]
    #[arg(long)]
    observation: Option<String>,

    /// Camera
    #[arg(long, value_enum, default_value = "PN")]
    instrument: InstrumentArg,

    /// Reuse the mosaic dump of an earlier run instead of recomputing it
    #[arg(long)]
    novar: bool,

    /// Skip sky coordinates for the detected sources
    #[arg(long)]
    no_astrometry: bool,

    /// SAS setup script sourced before each astrometry call
    #[arg(long, requires = "headas")]
    sas_setup: Option<PathBuf>,

    /// HEADAS installation root
    #[arg(long, requires = "sas_setup")]
    headas: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> DetectionConfig {
        let config = DetectionConfig::new(self.instrument.into())
            .with_box_size(self.box_size)
            .with_detection_level(self.detection_level)
            .with_time_window(self.time_window)
            .with_good_time_ratio(self.good_time_ratio)
            .with_max_workers(self.max_workers);
        match self.scan_stride {
            Some(stride) => config.with_scan_stride(stride),
            None => config,
        }
    }

    fn input(&self, instrument: Instrument, suffix: &str) -> PathBuf {
        self.path.join(format!("{}_{suffix}", instrument.code()))
    }
}

/// `<dl>_<tw>_<bs>_<gtr>_<inst>`, with the level and window truncated.
fn default_folder_name(config: &DetectionConfig) -> String {
    format!(
        "{}_{}_{}_{:?}_{}",
        config.detection_level as i64,
        config.time_window as i64,
        config.box_size,
        config.good_time_ratio,
        config.instrument.code()
    )
}

fn read_input<T>(path: &Path, read: impl FnOnce(&Path) -> flarescan_io::Result<T>) -> Result<T> {
    read(path).map_err(|source| CliError::Input {
        path: path.to_path_buf(),
        source,
    })
}

/// Detection results, freshly computed or rebuilt from a dump.
struct Detection {
    matrices: Vec<VariabilityMatrix>,
    median: f64,
    sources: Vec<Source>,
}

/// Rejects observations the pipeline cannot process, before anything is
/// written: no events, events or dead time on tiles the camera lacks, or a
/// header without usable calibration keywords.
fn check_observation(
    instrument: Instrument,
    list: &EventList,
    dead_time: &DeadTimeTable,
) -> flarescan_algorithms::Result<()> {
    observation_span(&list.events)?;
    group_by_tile(&list.events, instrument)?;
    let count = instrument.tile_count();
    if dead_time.len() > count {
        return Err(flarescan_algorithms::Error::TileOutOfRange {
            tile: dead_time.len() - 1,
            instrument,
            count,
        });
    }
    let calibration = CalibrationHeader::from_header(&list.header)?;
    FramePlacement::for_canvas(instrument.rotation_canvas(), &calibration)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();
    config.validate().map_err(CliError::Config)?;
    let instrument = config.instrument;

    let events_path = cli.input(instrument, "clean.txt");
    let dead_time_path = cli.input(instrument, "deadtime.txt");
    let image_path = cli.input(instrument, "image.fits");
    let list = read_input(&events_path, |p| TextEventReader.extract(p))?;
    let dead_time = read_input(&dead_time_path, |p| TextDeadTimeReader.extract(p))?;
    check_observation(instrument, &list, &dead_time).map_err(|source| {
        CliError::Observation {
            path: events_path.clone(),
            source,
        }
    })?;

    let root = cli
        .out
        .clone()
        .unwrap_or_else(|| cli.path.join(default_folder_name(&config)));
    let output = OutputFolder::create(&root).map_err(|source| CliError::OutputFolder {
        path: root.clone(),
        source,
    })?;

    let start = Instant::now();
    let reuse = cli.novar && output.mosaic().is_file();
    let (mut detection, mosaic) = if reuse {
        info!("Reusing {MOSAIC_FILE} from {}", output.root().display());
        let mosaic = read_variability(output.mosaic())?;
        let matrices = split(instrument, &mosaic)?;
        let (median, sources) = detect_sources(&config, &matrices)?;
        let detection = Detection {
            matrices,
            median,
            sources,
        };
        (detection, None)
    } else {
        let run = detect_variability(&config, &list.events, &dead_time)?;
        info!(
            "{} accepted windows over {} tiles",
            run.accepted_window_count(),
            run.windows.len()
        );
        let mosaic = assemble(instrument, &run.matrices)?;
        let detection = Detection {
            matrices: run.matrices,
            median: run.median,
            sources: run.sources,
        };
        (detection, Some(mosaic))
    };
    let image = sky_image(instrument, &detection.matrices, &list.header)?;

    if cli.no_astrometry {
        info!("Astrometry disabled, sky positions left unset");
    } else {
        let mut resolver = Edet2SkyResolver::new(&image_path);
        if let (Some(sas_setup), Some(headas)) = (&cli.sas_setup, &cli.headas) {
            resolver = resolver.with_environment(SasEnvironment {
                odf_dir: cli.path.clone(),
                headas: headas.clone(),
                sas_setup: sas_setup.clone(),
            });
        }
        let resolved = enrich_sources(&mut detection.sources, &resolver);
        info!(
            "Resolved sky positions for {resolved} of {} sources",
            detection.sources.len()
        );
    }

    let header = ImageHeader {
        creator: cli.creator.clone(),
        date: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        obs_id: cli
            .observation
            .clone()
            .or_else(|| list.header.observation_id().map(str::to_owned)),
        instrument,
        time_window: config.time_window,
        good_time_ratio: config.good_time_ratio,
        detection_level: config.detection_level,
        box_size: config.box_size,
        shape: [0, 0],
        sources: detection.sources.clone(),
    };
    if let Some(mosaic) = &mosaic {
        write_variability(output.mosaic(), mosaic)?;
    }
    write_variability(output.variability(), &image)?;
    write_sources(output.sources(), &detection.sources)?;
    write_best_match(output.best_match())?;
    write_image(output.image(), &header, &image)?;

    println!(
        "Detected {} variable sources in {:.2}s (median variability {:.3})",
        detection.sources.len(),
        start.elapsed().as_secs_f64(),
        detection.median
    );
    println!("Results written to {}", output.root().display());
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
