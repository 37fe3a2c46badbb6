//! Per-site feature evaluators.
//!
//! Every evaluator produces one value per candidate site for each feature it
//! provides, in site order. Evaluators declare the features they need;
//! the session refuses to run an evaluator whose prerequisites are missing.
//!
//! ## Evaluators
//!
//! - [`targetscan`]: A/U context, site position, 3′ pairing and their sum
//! - [`thermodynamics`]: duplex, binding, opening and total energies
//! - [`probability`]: chance of seeing as many motif copies in the target
//! - [`evolution`]: branch length score and phyloP conservation

pub mod evolution;
pub mod probability;
pub mod targetscan;
pub mod thermodynamics;

use crate::config::MirmapConfig;
use crate::engines::EngineSet;
use crate::types::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Every feature a session can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    TgsAu,
    TgsPosition,
    TgsPairing3p,
    TgsScore,
    DgDuplex,
    DgBinding,
    DgDuplexSeed,
    DgBindingSeed,
    DgOpen,
    DgTotal,
    ProbExact,
    ProbBinomial,
    ConsBls,
    SelecPhylop,
}

/// Families of features reported together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGroup {
    TargetScan,
    Thermodynamic,
    Probability,
    Evolutionary,
}

/// Reduction of a per-site vector into the session summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Max,
    Min,
    Mean,
}

impl Reduction {
    /// `None` for an empty vector.
    #[must_use]
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(match self {
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
        })
    }
}

impl FeatureKind {
    pub const ALL: [Self; 14] = [
        Self::TgsAu,
        Self::TgsPosition,
        Self::TgsPairing3p,
        Self::TgsScore,
        Self::DgDuplex,
        Self::DgBinding,
        Self::DgDuplexSeed,
        Self::DgBindingSeed,
        Self::DgOpen,
        Self::DgTotal,
        Self::ProbExact,
        Self::ProbBinomial,
        Self::ConsBls,
        Self::SelecPhylop,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TgsAu => "tgs_au",
            Self::TgsPosition => "tgs_position",
            Self::TgsPairing3p => "tgs_pairing3p",
            Self::TgsScore => "tgs_score",
            Self::DgDuplex => "dg_duplex",
            Self::DgBinding => "dg_binding",
            Self::DgDuplexSeed => "dg_duplex_seed",
            Self::DgBindingSeed => "dg_binding_seed",
            Self::DgOpen => "dg_open",
            Self::DgTotal => "dg_total",
            Self::ProbExact => "prob_exact",
            Self::ProbBinomial => "prob_binomial",
            Self::ConsBls => "cons_bls",
            Self::SelecPhylop => "selec_phylop",
        }
    }

    #[must_use]
    pub const fn group(self) -> FeatureGroup {
        match self {
            Self::TgsAu | Self::TgsPosition | Self::TgsPairing3p | Self::TgsScore => {
                FeatureGroup::TargetScan
            }
            Self::DgDuplex
            | Self::DgBinding
            | Self::DgDuplexSeed
            | Self::DgBindingSeed
            | Self::DgOpen
            | Self::DgTotal => FeatureGroup::Thermodynamic,
            Self::ProbExact | Self::ProbBinomial => FeatureGroup::Probability,
            Self::ConsBls | Self::SelecPhylop => FeatureGroup::Evolutionary,
        }
    }

    /// TargetScan features keep the best site, energies and probabilities
    /// the lowest value, conservation the average.
    #[must_use]
    pub const fn reduction(self) -> Reduction {
        match self.group() {
            FeatureGroup::TargetScan => Reduction::Max,
            FeatureGroup::Thermodynamic | FeatureGroup::Probability => Reduction::Min,
            FeatureGroup::Evolutionary => Reduction::Mean,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FeatureGroup {
    #[must_use]
    pub fn features(self) -> Vec<FeatureKind> {
        FeatureKind::ALL
            .into_iter()
            .filter(|k| k.group() == self)
            .collect()
    }
}

/// Computation status of one feature in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureStatus {
    #[default]
    NotRun,
    Running,
    Done,
    /// Skipped because an engine or an input was missing.
    Unavailable,
}

/// Per-site vectors of a session, all of the same length as the site list.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    site_count: usize,
    values: BTreeMap<FeatureKind, Vec<f64>>,
}

impl FeatureStore {
    #[must_use]
    pub fn new(site_count: usize) -> Self {
        Self {
            site_count,
            values: BTreeMap::new(),
        }
    }

    /// Store a vector, rejecting any length other than the site count.
    pub fn insert(&mut self, kind: FeatureKind, values: Vec<f64>) -> Result<(), MirmapError> {
        if values.len() != self.site_count {
            return Err(MirmapError::LengthMismatch {
                feature: kind,
                found: values.len(),
                expected: self.site_count,
            });
        }
        self.values.insert(kind, values);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, kind: FeatureKind) -> Option<&[f64]> {
        self.values.get(&kind).map(Vec::as_slice)
    }

    #[must_use]
    pub const fn site_count(&self) -> usize {
        self.site_count
    }

    pub(crate) fn into_values(self) -> BTreeMap<FeatureKind, Vec<f64>> {
        self.values
    }
}

/// Whether an evaluator can run in the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    MissingEngine(String),
    MissingInput(String),
}

impl Availability {
    pub(crate) fn into_error(self) -> Option<MirmapError> {
        match self {
            Self::Ready => None,
            Self::MissingEngine(what) => Some(MirmapError::MissingEngine(what)),
            Self::MissingInput(what) => Some(MirmapError::Configuration(what)),
        }
    }
}

/// Read-only view of a session handed to evaluators.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Uppercase RNA target.
    pub target: &'a str,
    /// Uppercase RNA miRNA.
    pub mirna: &'a str,
    pub sites: &'a [CandidateSite],
    pub min_target_length: usize,
    pub mirna_start_pairing: usize,
    pub engines: &'a EngineSet,
    pub store: &'a FeatureStore,
}

impl EvaluationContext<'_> {
    /// Per-site values of an evaluated feature.
    pub fn feature(&self, kind: FeatureKind) -> Result<&[f64], MirmapError> {
        self.store
            .get(kind)
            .ok_or_else(|| MirmapError::dependency(kind.name(), vec![kind]))
    }
}

pub type FeatureColumns = Vec<(FeatureKind, Vec<f64>)>;

/// A pluggable per-site scoring module.
pub trait FeatureEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Features written by [`evaluate`](Self::evaluate).
    fn provides(&self) -> &'static [FeatureKind];

    /// Features that must be evaluated first.
    fn requires(&self) -> &'static [FeatureKind] {
        &[]
    }

    fn availability(&self, _engines: &EngineSet) -> Availability {
        Availability::Ready
    }

    /// One column per provided feature, each with one value per site.
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError>;
}

/// Evaluators with default parameters, in dependency order.
#[must_use]
pub fn default_evaluators(config: &MirmapConfig) -> Vec<Arc<dyn FeatureEvaluator>> {
    vec![
        Arc::new(targetscan::TgsAu::new(config.targetscan.clone())),
        Arc::new(targetscan::TgsPosition::new(config.targetscan.clone())),
        Arc::new(targetscan::TgsPairing3p::new(config.targetscan.clone())),
        Arc::new(targetscan::TgsScore),
        Arc::new(thermodynamics::Thermodynamics),
        Arc::new(probability::ProbExact::new(config.probability.clone())),
        Arc::new(probability::ProbBinomial::new(config.probability.clone())),
        Arc::new(evolution::ConsBls::new(config.evolution.clone())),
        Arc::new(evolution::SelecPhylop::new(config.evolution.clone())),
    ]
}
