use crate::constants::*;
use crate::engines::{
    DuplexEngine, DuplexEnergies, DuplexRequest, EngineError, locate_program,
    parse_trailing_energy, run_program,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Duplex engine backed by the ViennaRNA command-line programs.
///
/// - `dg_duplex`: `RNAduplex` hybridization energy of miRNA and site.
/// - `dg_binding`: `RNAcofold` energy of the dimer minus the monomer
///   `RNAfold` energies.
/// - `dg_open`: energy needed to leave the site unpaired inside its flanking
///   context (constrained minus free `RNAfold` energy).
/// - `dg_total`: `dg_binding + dg_open`.
#[derive(Debug, Clone)]
pub struct ViennaCli {
    duplex: PathBuf,
    cofold: PathBuf,
    fold: PathBuf,
    temperature: f64,
    opening_flank: usize,
    timeout: Option<Duration>,
}

impl ViennaCli {
    pub fn locate(dir: Option<&Path>) -> Result<Self, EngineError> {
        Ok(Self {
            duplex: locate_program(VIENNA_DUPLEX, dir)?,
            cofold: locate_program(VIENNA_COFOLD, dir)?,
            fold: locate_program(VIENNA_FOLD, dir)?,
            temperature: DEFAULT_TEMPERATURE,
            opening_flank: DEFAULT_OPENING_FLANK,
            timeout: None,
        })
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_opening_flank(mut self, flank: usize) -> Self {
        self.opening_flank = flank;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, program: &Path, extra: &[&str], input: &str) -> Result<f64, EngineError> {
        let temperature = format!("{}", self.temperature);
        let mut args = vec!["--noPS", "-T", temperature.as_str()];
        args.extend_from_slice(extra);
        let output = run_program(program, &args, Some(input), self.timeout)?;
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        parse_trailing_energy(&name, &output)
    }

    fn mfe(&self, seq: &str) -> Result<f64, EngineError> {
        self.run(&self.fold, &[], &format!("{seq}\n"))
    }

    fn constrained_mfe(&self, seq: &str, constraint: &str) -> Result<f64, EngineError> {
        self.run(&self.fold, &["-C"], &format!("{seq}\n{constraint}\n"))
    }

    fn hybridize(&self, mirna: &str, site: &str) -> Result<f64, EngineError> {
        let temperature = format!("{}", self.temperature);
        let output = run_program(
            &self.duplex,
            &["-T", temperature.as_str()],
            Some(&format!("{mirna}\n{site}\n")),
            self.timeout,
        )?;
        parse_trailing_energy(VIENNA_DUPLEX, &output)
    }

    fn cofold(&self, mirna: &str, site: &str) -> Result<f64, EngineError> {
        self.run(&self.cofold, &[], &format!("{mirna}&{site}\n"))
    }
}

/// Context window around `region` and its `x`/`.` unpaired constraint.
pub(crate) fn opening_context(
    target: &str,
    region: (usize, usize),
    flank: usize,
) -> (String, String) {
    let start = region.0.saturating_sub(flank).max(1);
    let end = (region.1 + flank).min(target.len());
    let context = target[start - 1..end].to_string();
    let constraint = (start..=end)
        .map(|pos| if (region.0..=region.1).contains(&pos) { 'x' } else { '.' })
        .collect();
    (context, constraint)
}

impl DuplexEngine for ViennaCli {
    fn name(&self) -> &str {
        "ViennaRNA"
    }

    fn fold(&self, request: &DuplexRequest<'_>) -> Result<DuplexEnergies, EngineError> {
        let site = request.window();
        let dg_duplex = self.hybridize(request.mirna, site)?;
        let dg_binding =
            self.cofold(request.mirna, site)? - self.mfe(request.mirna)? - self.mfe(site)?;

        let (context, constraint) =
            opening_context(request.target, request.region, self.opening_flank);
        let dg_open = self.constrained_mfe(&context, &constraint)? - self.mfe(&context)?;

        Ok(DuplexEnergies {
            dg_duplex,
            dg_binding,
            dg_open,
            dg_total: dg_binding + dg_open,
        })
    }
}
