use crate::engines::EngineError;
use crate::features::FeatureKind;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classification of one miRNA/target base pair inside a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairClass {
    /// A·U or G·C
    WatsonCrick,
    /// G·U in either orientation
    GuWobble,
    /// Anything else, including non-ACGU symbols
    Mismatch,
}

impl PairClass {
    /// Classify the pair formed by a miRNA base and the target base facing it.
    ///
    /// Both bases are expected in uppercase RNA form.
    #[must_use]
    pub const fn classify(mirna_base: u8, target_base: u8) -> Self {
        match (mirna_base, target_base) {
            (b'A', b'U') | (b'U', b'A') | (b'G', b'C') | (b'C', b'G') => Self::WatsonCrick,
            (b'G', b'U') | (b'U', b'G') => Self::GuWobble,
            _ => Self::Mismatch,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::WatsonCrick => '|',
            Self::GuWobble => ':',
            Self::Mismatch => ' ',
        }
    }
}

/// Explicit base-pair alignment of a seed match.
///
/// All coordinates are 1-based and inclusive. The miRNA span runs 5′→3′ while
/// the target span runs in transcript orientation, so miRNA position
/// `mirna_start` faces target position `target_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitePairing {
    pub mirna_start: usize,
    pub mirna_end: usize,
    pub target_start: usize,
    pub target_end: usize,
    /// One entry per seed position, ordered from `mirna_start` to `mirna_end`.
    pub pairs: Vec<PairClass>,
}

impl SitePairing {
    /// Render the pairing as a one-line string (`|` pair, `:` wobble, space mismatch).
    #[must_use]
    pub fn diagram(&self) -> String {
        self.pairs.iter().map(|p| p.symbol()).collect()
    }
}

/// One accepted seed match between a miRNA and a target transcript.
///
/// `end_site` is the 1-based target coordinate facing miRNA position 1 (the
/// A1 anchor). Every per-site feature array of a session is indexed in the
/// same order as the site list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSite {
    pub end_site: usize,
    pub seed_length: usize,
    pub mismatch_count: usize,
    pub gu_wobble_count: usize,
    pub pairing: SitePairing,
}

impl CandidateSite {
    /// Ordering key used when several matches compete for one anchor:
    /// longer seeds first, then fewer mismatches, then fewer wobbles.
    #[must_use]
    pub fn is_better_than(&self, other: &Self) -> bool {
        (other.seed_length, self.mismatch_count, self.gu_wobble_count)
            < (self.seed_length, other.mismatch_count, other.gu_wobble_count)
    }
}

impl fmt::Display for CandidateSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "end_site={} seed={} mm={} gu={} [{}]",
            self.end_site,
            self.seed_length,
            self.mismatch_count,
            self.gu_wobble_count,
            self.pairing.diagram()
        )
    }
}

/// Error types that can occur while predicting and scoring target sites
#[derive(Error, Debug)]
pub enum MirmapError {
    /// Invalid policy, options, or model requirements
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A feature was read or evaluated before its prerequisites
    #[error("{feature} requires {missing:?} to be evaluated first")]
    DependencyNotSatisfied {
        feature: String,
        missing: Vec<FeatureKind>,
    },
    /// An explicitly requested evaluator has no engine to run on
    #[error("Missing engine: {0}")]
    MissingEngine(String),
    /// The feature was skipped because its inputs were not available
    #[error("Feature {0} is not available for this session")]
    FeatureUnavailable(FeatureKind),
    /// A per-site vector does not line up with the site list
    #[error("{feature} has {found} values for {expected} sites")]
    LengthMismatch {
        feature: FeatureKind,
        found: usize,
        expected: usize,
    },
    /// Summaries are undefined when no site was found
    #[error("No candidate sites found")]
    NoCandidateSites,
    /// Sequence with unexpected symbols or coordinates
    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),
    /// Error parsing input data
    #[error("Parse error: {0}")]
    ParseError(String),
    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// External engine failures
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl MirmapError {
    pub(crate) fn dependency(feature: impl Into<String>, missing: Vec<FeatureKind>) -> Self {
        Self::DependencyNotSatisfied {
            feature: feature.into(),
            missing,
        }
    }
}
