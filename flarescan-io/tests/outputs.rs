//! Text inputs through detection to the output folder and back.

use approx::assert_abs_diff_eq;
use flarescan_algorithms::{detect_variability, sky_image};
use flarescan_core::Instrument;
use flarescan_epic::{assemble, split};
use flarescan_io::{
    read_image, read_variability, write_best_match, write_image, write_sources,
    write_variability, DeadTimeExtractor, ImageHeader, OutputFolder, PhotonExtractor,
    TextDeadTimeReader, TextEventReader,
};
use std::fmt::Write as _;
use std::fs;
use tempfile::tempdir;

const HEADER: &str = "\
# OBS_ID = 0123456789
# PA_PNT = 0.0
# SUBMODE = PrimeFullWindow
# TLMIN6 = 3649
# TLMAX6 = 48106
# TLMIN7 = 3649
# TLMAX7 = 48106
# TDMIN6 = 10000
# TDMAX6 = 40000
# TDMIN7 = 10000
# TDMAX7 = 40000
";

/// Anchors the span at [0, 1000] and adds a 3x3 burst on PN tile 5 at raw
/// (31..=33, 91..=93) inside the window starting at 300 s.
fn events_file() -> String {
    let mut text = HEADER.to_string();
    text.push_str("0.0;0;1;1\n1000.0;0;1;1\n");
    for x in 31..=33 {
        for y in 91..=93 {
            for i in 0..100 {
                let t = 300.0 + f64::from(i) * 0.5;
                writeln!(text, "{t};5;{x};{y}").unwrap();
            }
        }
    }
    text
}

#[test]
fn test_observation_to_output_folder() {
    let dir = tempdir().unwrap();
    let events_path = dir.path().join("PN_clean.txt");
    let dead_path = dir.path().join("PN_deadtime.txt");
    fs::write(&events_path, events_file()).unwrap();
    fs::write(&dead_path, "# tile;start;end\n").unwrap();

    let list = TextEventReader.extract(&events_path).unwrap();
    let dead_time = TextDeadTimeReader.extract(&dead_path).unwrap();
    assert_eq!(list.events.len(), 902);
    assert!(dead_time.is_empty());

    let config = flarescan_core::DetectionConfig::new(Instrument::Pn).with_max_workers(2);
    let run = detect_variability(&config, &list.events, &dead_time).unwrap();
    assert_eq!(run.sources.len(), 1);

    let output = OutputFolder::create(dir.path().join("10_100_3_1.0_PN")).unwrap();
    let mosaic = assemble(Instrument::Pn, &run.matrices).unwrap();
    write_variability(output.mosaic(), &mosaic).unwrap();
    write_sources(output.sources(), &run.sources).unwrap();
    write_best_match(output.best_match()).unwrap();

    let image = sky_image(Instrument::Pn, &run.matrices, &list.header).unwrap();
    let header = ImageHeader {
        creator: "tester".into(),
        date: "2024-01-01 00:00:00".into(),
        obs_id: list.header.observation_id().map(str::to_owned),
        instrument: Instrument::Pn,
        time_window: config.time_window,
        good_time_ratio: config.good_time_ratio,
        detection_level: config.detection_level,
        box_size: config.box_size,
        shape: [0, 0],
        sources: run.sources.clone(),
    };
    write_image(output.image(), &header, &image).unwrap();
    write_variability(output.variability(), &image).unwrap();

    // The mosaic dump splits back into the exact per-tile matrices.
    let dumped = read_variability(output.mosaic()).unwrap();
    assert_eq!(dumped.dim(), (384, 400));
    assert_eq!(split(Instrument::Pn, &dumped).unwrap(), run.matrices);
    assert_eq!(read_variability(output.variability()).unwrap(), image);

    let sources = fs::read_to_string(output.sources()).unwrap();
    let rows: Vec<_> = sources.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("1;5;32;92;"));

    let (read_header, read_raster) = read_image(output.image()).unwrap();
    assert_eq!(read_header.shape, [648, 648]);
    assert_eq!(read_header.obs_id.as_deref(), Some("0123456789"));
    assert_eq!(read_header.sources, run.sources);
    assert!(read_header.sources[0].sky.is_none());
    assert_abs_diff_eq!(read_header.sources[0].var_raw_x, 35.0);
    assert_eq!(read_raster.dim(), (648, 648));
    assert!(read_raster.iter().all(|v| v.is_finite() && *v >= -1e-9));
}

#[test]
fn test_dead_tile_lowers_its_window_count() {
    let dir = tempdir().unwrap();
    let events_path = dir.path().join("PN_clean.txt");
    let dead_path = dir.path().join("PN_deadtime.txt");
    fs::write(&events_path, events_file()).unwrap();
    fs::write(&dead_path, "3;0;1000\n").unwrap();

    let list = TextEventReader.extract(&events_path).unwrap();
    let dead_time = TextDeadTimeReader.extract(&dead_path).unwrap();
    assert_eq!(dead_time.len(), 4);

    let config = flarescan_core::DetectionConfig::new(Instrument::Pn);
    let run = detect_variability(&config, &list.events, &dead_time).unwrap();
    assert!(run.windows[3].is_empty());
    assert_eq!(run.windows[5].len(), 10);
    assert_eq!(run.sources.len(), 1);
}
