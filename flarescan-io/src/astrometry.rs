//! Sky coordinates through the external `edet2sky` task.
//!
//! Each source costs one shell invocation. The task needs the mission
//! analysis environment, which is set up by sourcing the `HEADAS` and SAS
//! init scripts in the same shell before the call.

use crate::{Error, Result};
use flarescan_algorithms::{ResolveError, SkyResolver};
use flarescan_core::SkyPosition;
use log::{debug, trace};
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Wall-clock limit for one `edet2sky` call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const EQUATORIAL_MARKER: &str = "# RA (deg)   DEC (deg)";
const SKY_PIXEL_MARKER: &str = "# Sky X        Y pixel";

/// Locations needed to initialise the analysis environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasEnvironment {
    /// Observation data folder (`SAS_ODF`); the calibration index is
    /// expected at `ccf.cif` inside it.
    pub odf_dir: PathBuf,
    /// `HEADAS` installation root.
    pub headas: PathBuf,
    /// SAS setup script.
    pub sas_setup: PathBuf,
}

/// Single-quotes a value for `sh`.
fn quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

impl SasEnvironment {
    fn preamble(&self) -> String {
        let ccf = self.odf_dir.join("ccf.cif");
        format!(
            "export SAS_ODF={}; export SAS_CCF={}; export HEADAS={}; \
             . \"$HEADAS/headas-init.sh\"; . {};",
            quote(&self.odf_dir),
            quote(&ccf),
            quote(&self.headas),
            quote(&self.sas_setup)
        )
    }
}

/// [`SkyResolver`] backed by `edet2sky`.
#[derive(Debug, Clone)]
pub struct Edet2SkyResolver {
    calibration_image: PathBuf,
    environment: Option<SasEnvironment>,
    program: String,
    timeout: Duration,
}

impl Edet2SkyResolver {
    /// Creates a resolver using `calibration_image` as the `calinfoset`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(calibration_image: P) -> Self {
        Self {
            calibration_image: calibration_image.as_ref().to_path_buf(),
            environment: None,
            program: "edet2sky".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sources the given analysis environment before each call.
    #[must_use]
    pub fn with_environment(mut self, environment: SasEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Replaces the task name (a shell word or function).
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell script converting one raw position. `ccd` is 1-based.
    fn script(&self, raw_x: f64, raw_y: f64, ccd: u16) -> String {
        let mut script = self
            .environment
            .as_ref()
            .map(SasEnvironment::preamble)
            .unwrap_or_default();
        let _ = write!(
            script,
            " {} datastyle=user inputunit=raw X={raw_x} Y={raw_y} ccd={ccd} calinfoset={} -V 0",
            self.program,
            quote(&self.calibration_image)
        );
        script
    }

    /// Runs a script and returns its standard output. The shell runs in its
    /// own process group, which is killed whole if it outlives the timeout.
    fn run(&self, script: &str) -> Result<String> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        own_process_group(&mut command);
        let mut child = command.spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Astrometry("child has no standard output".into()))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            let _ = tx.send(result);
        });

        if let Ok(output) = rx.recv_timeout(self.timeout) {
            let status = child.wait()?;
            trace!("{} exited with {status}", self.program);
            Ok(output?)
        } else {
            terminate(&mut child);
            Err(Error::Astrometry(format!(
                "{} timed out after {:?}",
                self.program, self.timeout
            )))
        }
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Kills the task with everything it spawned, then reaps the shell.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Ok(pgid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                debug!("killpg({pgid}) failed: {e}");
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Two floats on the line following `marker`.
fn pair_after(output: &str, marker: &str) -> Result<(f64, f64)> {
    let mut lines = output.lines();
    lines
        .by_ref()
        .find(|line| line.split_whitespace().eq(marker.split_whitespace()))
        .ok_or_else(|| Error::Astrometry(format!("missing '{marker}' block")))?;
    let values = lines
        .next()
        .ok_or_else(|| Error::Astrometry(format!("'{marker}' block is empty")))?;
    let mut numbers = values.split_whitespace().map(str::parse::<f64>);
    match (numbers.next(), numbers.next()) {
        (Some(Ok(a)), Some(Ok(b))) => Ok((a, b)),
        _ => Err(Error::Astrometry(format!(
            "cannot read '{}' after '{marker}'",
            values.trim()
        ))),
    }
}

/// Extracts the sky position from `edet2sky` output.
///
/// # Errors
/// Returns [`Error::Astrometry`] if either coordinate block is missing or
/// malformed.
pub fn parse_edet2sky(output: &str) -> Result<SkyPosition> {
    let (ra, dec) = pair_after(output, EQUATORIAL_MARKER)?;
    let (x, y) = pair_after(output, SKY_PIXEL_MARKER)?;
    Ok(SkyPosition { x, y, ra, dec })
}

impl SkyResolver for Edet2SkyResolver {
    fn resolve(
        &self,
        raw_x: f64,
        raw_y: f64,
        tile_id: u8,
    ) -> std::result::Result<SkyPosition, ResolveError> {
        let script = self.script(raw_x, raw_y, u16::from(tile_id) + 1);
        debug!("Resolving raw ({raw_x}, {raw_y}) on tile {tile_id}");
        let output = self.run(&script)?;
        Ok(parse_edet2sky(&output)?)
    }
}
