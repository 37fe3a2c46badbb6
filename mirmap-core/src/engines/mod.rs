//! Adapters to the external thermodynamic and phylogenetic engines.
//!
//! The session never looks engines up by itself: callers build an
//! [`EngineSet`] and inject it. Each engine call is synchronous and either
//! returns a value or a typed [`EngineError`].
//!
//! ## Shipped adapters
//!
//! - [`vienna::ViennaCli`]: ViennaRNA `RNAduplex`, `RNAcofold` and `RNAfold`
//! - [`phast::PhastCli`]: PHAST `phyloFit` and `phyloP`
//!
//! ## Examples
//!
//! ```rust,no_run
//! use mirmap_core::config::MirmapConfig;
//! use mirmap_core::engines::EngineSet;
//!
//! let config = MirmapConfig::default();
//! let engines = EngineSet::discover(None, &config.thermodynamics);
//! println!("duplex engine available: {}", engines.has_duplex());
//! ```

pub mod phast;
pub mod vienna;

use crate::config::ThermodynamicsConfig;
use crate::constants::ENGINE_POLL_INTERVAL_MS;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of an external engine call.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} is not available")]
    Unavailable(String),
    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },
    #[error("unexpected output from {program}: {output}")]
    MalformedOutput { program: String, output: String },
    #[error("{program} failed: {message}")]
    Failed { program: String, message: String },
}

/// Sub-sequence of the target presented to the duplex engine.
#[derive(Debug, Clone, Copy)]
pub struct DuplexRequest<'a> {
    pub mirna: &'a str,
    /// Whole target transcript.
    pub target: &'a str,
    /// Site window in the target, 1-based and inclusive.
    pub region: (usize, usize),
}

impl DuplexRequest<'_> {
    #[must_use]
    pub fn window(&self) -> &str {
        &self.target[self.region.0 - 1..self.region.1]
    }
}

/// Energies of one miRNA/site duplex, in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplexEnergies {
    pub dg_duplex: f64,
    pub dg_binding: f64,
    pub dg_open: f64,
    pub dg_total: f64,
}

pub trait DuplexEngine: Send + Sync {
    fn name(&self) -> &str;

    fn fold(&self, request: &DuplexRequest<'_>) -> Result<DuplexEnergies, EngineError>;
}

/// Branch length fitting over an alignment.
#[derive(Debug, Clone, Copy)]
pub struct TreeFitRequest<'a> {
    /// Alignment in FASTA format.
    pub alignment: &'a str,
    /// Starting topology in Newick format.
    pub tree: &'a str,
    pub subst_model: &'a str,
    pub use_em: bool,
}

/// Conservation/acceleration test over a (sub-)alignment.
#[derive(Debug, Clone, Copy)]
pub struct PhyloPRequest<'a> {
    /// Alignment in FASTA format.
    pub alignment: &'a str,
    pub model_file: &'a Path,
    pub method: &'a str,
    pub mode: &'a str,
}

pub trait PhyloEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the fitted tree in Newick format.
    fn fit_tree(&self, request: &TreeFitRequest<'_>) -> Result<String, EngineError>;

    /// Returns the p-value of the test.
    fn phylop(&self, request: &PhyloPRequest<'_>) -> Result<f64, EngineError>;
}

/// Engines injected into prediction sessions.
///
/// Handles are shared read-only between sessions.
#[derive(Clone, Default)]
pub struct EngineSet {
    pub duplex: Option<Arc<dyn DuplexEngine>>,
    pub phylo: Option<Arc<dyn PhyloEngine>>,
}

impl EngineSet {
    /// No engine, pure-sequence features only.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_duplex(mut self, engine: Arc<dyn DuplexEngine>) -> Self {
        self.duplex = Some(engine);
        self
    }

    #[must_use]
    pub fn with_phylo(mut self, engine: Arc<dyn PhyloEngine>) -> Self {
        self.phylo = Some(engine);
        self
    }

    /// Locate the command-line engines, in `exe_dir` when given and on the
    /// `PATH` otherwise. Engines that cannot be found are left out.
    #[must_use]
    pub fn discover(exe_dir: Option<&Path>, thermodynamics: &ThermodynamicsConfig) -> Self {
        let mut engines = Self::none();
        match vienna::ViennaCli::locate(exe_dir) {
            Ok(cli) => {
                let cli = cli
                    .with_temperature(thermodynamics.temperature)
                    .with_opening_flank(thermodynamics.opening_flank)
                    .with_timeout(thermodynamics.timeout_secs.map(Duration::from_secs));
                debug!("using ViennaRNA duplex engine");
                engines.duplex = Some(Arc::new(cli));
            }
            Err(e) => warn!("thermodynamic features disabled: {e}"),
        }
        match phast::PhastCli::locate(exe_dir) {
            Ok(cli) => {
                let cli = cli.with_timeout(thermodynamics.timeout_secs.map(Duration::from_secs));
                debug!("using PHAST phylogenetic engine");
                engines.phylo = Some(Arc::new(cli));
            }
            Err(e) => debug!("phylogenetic engine not found: {e}"),
        }
        engines
    }

    #[must_use]
    pub fn has_duplex(&self) -> bool {
        self.duplex.is_some()
    }

    #[must_use]
    pub fn has_phylo(&self) -> bool {
        self.phylo.is_some()
    }
}

impl fmt::Debug for EngineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSet")
            .field("duplex", &self.duplex.as_ref().map(|e| e.name().to_string()))
            .field("phylo", &self.phylo.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

/// Find `program` in `dir`, or on the `PATH` when no directory is given.
pub(crate) fn locate_program(program: &str, dir: Option<&Path>) -> Result<PathBuf, EngineError> {
    match dir {
        Some(dir) => {
            let candidate = dir.join(program);
            if candidate.is_file() {
                Ok(candidate)
            } else {
                Err(EngineError::Unavailable(format!(
                    "{program} in {}",
                    dir.display()
                )))
            }
        }
        None => which::which(program).map_err(|_| EngineError::Unavailable(program.to_string())),
    }
}

/// Run a program to completion and return its standard output.
///
/// With a timeout the child is polled and killed once the deadline passes.
pub(crate) fn run_program(
    program: &Path,
    args: &[&str],
    stdin: Option<&str>,
    timeout: Option<Duration>,
) -> Result<String, EngineError> {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    let failed = |message: String| EngineError::Failed {
        program: name.clone(),
        message,
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!("About to spawn: {:?}", cmd);

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EngineError::Unavailable(name.clone()),
        _ => failed(e.to_string()),
    })?;

    let stdout_reader = child.stdout.take().map(drain_pipe);
    let stderr_reader = child.stderr.take().map(drain_pipe);

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .map_err(|e| failed(e.to_string()))?;
    }

    let status = match timeout {
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                match child.try_wait().map_err(|e| failed(e.to_string()))? {
                    Some(status) => break status,
                    None if Instant::now() >= deadline => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EngineError::Timeout {
                            program: name.clone(),
                            seconds: limit.as_secs(),
                        });
                    }
                    None => thread::sleep(Duration::from_millis(ENGINE_POLL_INTERVAL_MS)),
                }
            }
        }
        None => child.wait().map_err(|e| failed(e.to_string()))?,
    };

    let collect = |reader: Option<PipeReader>| -> Result<Vec<u8>, EngineError> {
        match reader {
            Some(handle) => handle
                .join()
                .map_err(|_| failed("pipe reader panicked".to_string()))?
                .map_err(|e| failed(e.to_string())),
            None => Ok(Vec::new()),
        }
    };
    let stdout = collect(stdout_reader)?;
    let stderr = collect(stderr_reader)?;

    if !status.success() {
        return Err(failed(format!(
            "exit status {:?}: {}",
            status.code(),
            String::from_utf8_lossy(&stderr).trim()
        )));
    }
    String::from_utf8(stdout).map_err(|e| EngineError::MalformedOutput {
        program: name.clone(),
        output: e.to_string(),
    })
}

type PipeReader = thread::JoinHandle<std::io::Result<Vec<u8>>>;

/// Read a child pipe to the end on its own thread.
fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> PipeReader {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

/// Last parenthesised number of the last non-empty line, as printed by the
/// ViennaRNA tools (`..((...)).  ( -3.40)`).
pub(crate) fn parse_trailing_energy(program: &str, output: &str) -> Result<f64, EngineError> {
    let malformed = || EngineError::MalformedOutput {
        program: program.to_string(),
        output: output.trim().to_string(),
    };
    let line = output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(malformed)?;
    let open = line.rfind('(').ok_or_else(malformed)?;
    let close = line[open..].find(')').ok_or_else(malformed)? + open;
    line[open + 1..close].trim().parse().map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trailing_energy() {
        assert_eq!(
            parse_trailing_energy("RNAfold", "ACGU\n.... (  0.00)\n").unwrap(),
            0.0
        );
        assert_eq!(
            parse_trailing_energy("RNAfold", "GGGAAACCC\n(((...))) ( -1.20)\n").unwrap(),
            -1.2
        );
        assert_eq!(
            parse_trailing_energy("RNAduplex", ".((((&)))).   1,5   :   2,6   (-7.50)\n").unwrap(),
            -7.5
        );
        assert!(matches!(
            parse_trailing_energy("RNAfold", "no energy here"),
            Err(EngineError::MalformedOutput { .. })
        ));
        assert!(parse_trailing_energy("RNAfold", "").is_err());
        assert!(parse_trailing_energy("RNAfold", ".... (abc)").is_err());
    }

    #[test]
    fn test_request_window() {
        let request = DuplexRequest {
            mirna: "UAGC",
            target: "ACGUACGU",
            region: (3, 6),
        };
        assert_eq!(request.window(), "GUAC");
    }

    #[test]
    fn test_locate_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = locate_program("RNAfold", Some(dir.path()));
        assert!(matches!(result, Err(EngineError::Unavailable(_))));
    }

    #[test]
    fn test_empty_engine_set() {
        let engines = EngineSet::none();
        assert!(!engines.has_duplex());
        assert!(!engines.has_phylo());
        assert!(format!("{engines:?}").contains("EngineSet"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_program_output_and_failure() {
        let out = run_program(Path::new("/bin/sh"), &["-c", "cat"], Some("hello"), None).unwrap();
        assert_eq!(out, "hello");

        let err = run_program(Path::new("/bin/sh"), &["-c", "exit 3"], None, None).unwrap_err();
        assert!(matches!(err, EngineError::Failed { .. }));

        let err = run_program(Path::new("/nonexistent/RNAfold"), &[], None, None).unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_program_large_output_with_timeout() {
        // Well past the 64 KiB pipe buffer
        let out = run_program(
            Path::new("/bin/sh"),
            &["-c", "head -c 300000 /dev/zero | tr '\\0' 'A'; echo err >&2"],
            None,
            Some(Duration::from_secs(20)),
        )
        .unwrap();
        assert_eq!(out.len(), 300_000);
        assert!(out.bytes().all(|b| b == b'A'));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_program_timeout() {
        let err = run_program(
            Path::new("/bin/sh"),
            &["-c", "sleep 5"],
            None,
            Some(Duration::from_millis(50)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }
}
