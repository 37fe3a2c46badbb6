use crate::constants::*;
use crate::sequence::alignment::AlignmentFormat;
use crate::types::MirmapError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Region of the target used as the motif of a site.
///
/// Probability and conservation evaluators look for this motif in the
/// transcript and in the aligned species respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifDefinition {
    /// Target bases paired with the seed.
    #[default]
    Seed,
    /// Seed bases plus the base facing miRNA position 1.
    SeedExtended,
    /// The whole site window, as long as the miRNA.
    Site,
}

/// Seed matching policy.
///
/// Mismatch and wobble caps are keyed by seed length and must cover every
/// allowed length.
///
/// # Examples
///
/// ```rust
/// use mirmap_core::config::SeedPolicy;
///
/// let policy = SeedPolicy {
///     take_best: false,
///     ..Default::default()
/// };
/// assert_eq!(policy.allowed_lengths, vec![6, 7]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedPolicy {
    /// Seed lengths to search, in any order (longest is tried first).
    ///
    /// **Default**: `[6, 7]`
    pub allowed_lengths: Vec<usize>,

    /// Maximal number of mismatches (not counting G·U wobbles) per length.
    ///
    /// **Default**: `{6: 0, 7: 0}`
    pub allowed_mismatches: BTreeMap<usize, usize>,

    /// Maximal number of G·U wobbles per length.
    ///
    /// **Default**: `{6: 0, 7: 0}`
    pub allowed_gu_wobbles: BTreeMap<usize, usize>,

    /// Keep only the best match per anchor.
    ///
    /// **Default**: `true`
    pub take_best: bool,

    /// miRNA position (1-based) where the seed starts.
    ///
    /// **Default**: `2`
    pub mirna_start_pairing: usize,

    /// Minimal number of target bases the site must span, counted from the
    /// anchor towards the transcript 5′ end.
    ///
    /// **Default**: `None` (the miRNA length)
    pub min_target_length: Option<usize>,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        let caps: BTreeMap<usize, usize> = DEFAULT_SEED_LENGTHS.iter().map(|&l| (l, 0)).collect();
        Self {
            allowed_lengths: DEFAULT_SEED_LENGTHS.to_vec(),
            allowed_mismatches: caps.clone(),
            allowed_gu_wobbles: caps,
            take_best: true,
            mirna_start_pairing: DEFAULT_MIRNA_START_PAIRING,
            min_target_length: None,
        }
    }
}

impl SeedPolicy {
    /// Policy accepting a single seed length with the given caps.
    #[must_use]
    pub fn single_length(length: usize, mismatches: usize, gu_wobbles: usize) -> Self {
        Self {
            allowed_lengths: vec![length],
            allowed_mismatches: BTreeMap::from([(length, mismatches)]),
            allowed_gu_wobbles: BTreeMap::from([(length, gu_wobbles)]),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), MirmapError> {
        if self.allowed_lengths.is_empty() {
            return Err(MirmapError::Configuration(
                "seed policy has no allowed lengths".to_string(),
            ));
        }
        if self.mirna_start_pairing == 0 {
            return Err(MirmapError::Configuration(
                "mirna_start_pairing is 1-based and must be at least 1".to_string(),
            ));
        }
        for length in &self.allowed_lengths {
            if *length == 0 {
                return Err(MirmapError::Configuration(
                    "seed length must be positive".to_string(),
                ));
            }
            if !self.allowed_mismatches.contains_key(length) {
                return Err(MirmapError::Configuration(format!(
                    "no mismatch cap for seed length {length}"
                )));
            }
            if !self.allowed_gu_wobbles.contains_key(length) {
                return Err(MirmapError::Configuration(format!(
                    "no G:U wobble cap for seed length {length}"
                )));
            }
        }
        Ok(())
    }
}

/// TargetScan-style context features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetScanConfig {
    /// Map raw values through the per-site-type regression.
    ///
    /// **Default**: `true`
    pub with_correction: bool,

    /// Number of bases scanned on each side of the seed for A/U content.
    ///
    /// **Default**: `30`
    pub ca_window_length: usize,

    /// Largest register shift tried when pairing the miRNA 3′ end.
    ///
    /// **Default**: `4`
    pub pairing3p_max_offset: usize,
}

impl Default for TargetScanConfig {
    fn default() -> Self {
        Self {
            with_correction: true,
            ca_window_length: DEFAULT_AU_WINDOW,
            pairing3p_max_offset: DEFAULT_PAIRING3P_MAX_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbabilityConfig {
    /// Order of the background Markov chain estimated on the target.
    ///
    /// **Default**: `1`
    pub markov_order: usize,

    /// Pseudocount added to every k-mer count.
    ///
    /// **Default**: `1.0`
    pub pseudocount: f64,

    pub motif_def: MotifDefinition,
    pub motif_upstream_extension: usize,
    pub motif_downstream_extension: usize,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            markov_order: DEFAULT_MARKOV_ORDER,
            pseudocount: DEFAULT_PSEUDOCOUNT,
            motif_def: MotifDefinition::Seed,
            motif_upstream_extension: 0,
            motif_downstream_extension: 0,
        }
    }
}

/// Options forwarded to the duplex engine adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermodynamicsConfig {
    /// Folding temperature in °C.
    ///
    /// **Default**: `37.0`
    pub temperature: f64,

    /// Bases of context on each side of the site for the opening energy.
    ///
    /// **Default**: `70`
    pub opening_flank: usize,

    /// Per-call wall-clock limit for engine processes, in seconds.
    ///
    /// **Default**: `None` (no limit)
    pub timeout_secs: Option<u64>,
}

impl Default for ThermodynamicsConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            opening_flank: DEFAULT_OPENING_FLANK,
            timeout_secs: None,
        }
    }
}

/// Conservation features over a multiple sequence alignment.
///
/// The first aligned record is the reference species and must be the
/// transcript itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Alignment file. Takes precedence over `alignment_text`.
    pub alignment_path: Option<PathBuf>,

    /// Inline alignment.
    pub alignment_text: Option<String>,

    /// Alignment format. Detected from the file extension when absent.
    pub alignment_format: Option<AlignmentFormat>,

    /// Symbols kept in aligned rows, others are filtered out.
    ///
    /// **Default**: `"ATCG"`
    pub alphabet: String,

    /// Species tree in Newick format.
    pub tree: Option<String>,

    /// Fit branch lengths on the alignment before computing the BLS.
    ///
    /// **Default**: `true`
    pub fitting_tree: bool,

    /// phyloFit substitution model.
    ///
    /// **Default**: `"REV"`
    pub subst_model: String,

    /// Fit the tree with expectation-maximization.
    ///
    /// **Default**: `true`
    pub use_em: bool,

    /// Fitted phyloP model (`.mod`).
    pub model_file: Option<PathBuf>,

    /// phyloP test.
    ///
    /// **Default**: `"SPH"`
    pub method: String,

    /// phyloP mode: CON, ACC or CONACC.
    ///
    /// **Default**: `"CONACC"`
    pub mode: String,

    pub motif_def: MotifDefinition,
    pub motif_upstream_extension: usize,
    pub motif_downstream_extension: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            alignment_path: None,
            alignment_text: None,
            alignment_format: None,
            alphabet: DEFAULT_ALIGNMENT_ALPHABET.to_string(),
            tree: None,
            fitting_tree: true,
            subst_model: DEFAULT_SUBST_MODEL.to_string(),
            use_em: true,
            model_file: None,
            method: DEFAULT_PHYLOP_METHOD.to_string(),
            mode: DEFAULT_PHYLOP_MODE.to_string(),
            motif_def: MotifDefinition::Seed,
            motif_upstream_extension: 0,
            motif_downstream_extension: 0,
        }
    }
}

impl EvolutionConfig {
    #[must_use]
    pub const fn has_alignment(&self) -> bool {
        self.alignment_path.is_some() || self.alignment_text.is_some()
    }
}

/// Configuration settings for target prediction.
///
/// Every overridable option lives in one of the sections below. Unknown keys
/// are rejected when a configuration is loaded from JSON.
///
/// # Examples
///
/// ```rust
/// use mirmap_core::config::{MirmapConfig, TargetScanConfig};
///
/// let config = MirmapConfig {
///     targetscan: TargetScanConfig {
///         with_correction: false,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
///
/// ```rust
/// use mirmap_core::config::MirmapConfig;
///
/// let config = MirmapConfig::from_json_str(r#"{"seed": {"take_best": false}}"#)?;
/// assert!(!config.seed.take_best);
///
/// assert!(MirmapConfig::from_json_str(r#"{"seed": {"take_bset": false}}"#).is_err());
/// # Ok::<(), mirmap_core::types::MirmapError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirmapConfig {
    pub seed: SeedPolicy,
    pub targetscan: TargetScanConfig,
    pub probability: ProbabilityConfig,
    pub thermodynamics: ThermodynamicsConfig,
    pub evolution: EvolutionConfig,

    /// Number of worker threads for batch runs.
    ///
    /// **Default**: `None` (one per core)
    pub num_threads: Option<usize>,
}

impl MirmapConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(text: &str) -> Result<Self, MirmapError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| MirmapError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, MirmapError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), MirmapError> {
        self.seed.validate()?;
        if self.targetscan.ca_window_length == 0 {
            return Err(MirmapError::Configuration(
                "ca_window_length must be positive".to_string(),
            ));
        }
        if self.probability.pseudocount <= 0.0 {
            return Err(MirmapError::Configuration(
                "pseudocount must be positive".to_string(),
            ));
        }
        let shortest = self.seed.allowed_lengths.iter().min().copied().unwrap_or(0);
        if self.probability.motif_def == MotifDefinition::Seed
            && self.probability.markov_order >= shortest
        {
            return Err(MirmapError::Configuration(format!(
                "markov_order {} must be smaller than the shortest seed ({shortest})",
                self.probability.markov_order
            )));
        }
        if self.evolution.alphabet.is_empty() {
            return Err(MirmapError::Configuration(
                "alignment alphabet is empty".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(MirmapError::Configuration(
                "num_threads must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
