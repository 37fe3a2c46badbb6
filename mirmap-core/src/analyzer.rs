use crate::constants::BATCH_CHUNK_SIZE;
use crate::config::{EvolutionConfig, MirmapConfig};
use crate::engines::EngineSet;
use crate::engines::phast::tree_from_model;
use crate::results::PredictionReport;
use crate::sequence::io::NamedSequence;
use crate::session::PredictionSession;
use crate::types::MirmapError;
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome of one miRNA/transcript pair in a batch.
#[derive(Debug)]
pub struct PairOutcome {
    pub mirna_id: String,
    pub transcript_id: String,
    pub result: Result<PredictionReport, MirmapError>,
}

/// High-level interface for scoring many miRNA/transcript pairs.
///
/// The analyzer builds one [`PredictionSession`] per pair, runs the whole
/// pipeline and freezes it into a [`PredictionReport`]. Conservation inputs
/// can be supplied per transcript through an alignment directory and a model
/// directory; transcripts without them get BLS 0 and phyloP 1.
///
/// # Examples
///
/// ## Single pair
///
/// ```rust
/// use mirmap_core::{MirmapAnalyzer, config::MirmapConfig, engines::EngineSet};
///
/// let analyzer = MirmapAnalyzer::new(MirmapConfig::default(), EngineSet::none());
/// let report = analyzer.analyze_pair(
///     "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGUAAGCUAGCAUG",
///     "UAGCAGCACGUAAAUAUUGGCG",
///     None,
/// )?;
/// assert!(!report.sites.is_empty());
/// # Ok::<(), mirmap_core::types::MirmapError>(())
/// ```
///
/// ## With conservation inputs
///
/// ```rust,no_run
/// use mirmap_core::{MirmapAnalyzer, config::MirmapConfig, engines::EngineSet};
///
/// let config = MirmapConfig {
///     num_threads: Some(4),
///     ..Default::default()
/// };
/// let engines = EngineSet::discover(None, &config.thermodynamics);
/// let analyzer = MirmapAnalyzer::new(config, engines)
///     .with_alignment_dir("alignments")
///     .with_model_dir("models");
/// # Ok::<(), mirmap_core::types::MirmapError>(())
/// ```
#[derive(Debug)]
pub struct MirmapAnalyzer {
    /// Configuration shared by every session
    pub config: MirmapConfig,
    engines: EngineSet,
    alignment_dir: Option<PathBuf>,
    model_dir: Option<PathBuf>,
}

impl MirmapAnalyzer {
    #[must_use]
    pub const fn new(config: MirmapConfig, engines: EngineSet) -> Self {
        Self {
            config,
            engines,
            alignment_dir: None,
            model_dir: None,
        }
    }

    /// Look up `<dir>/<transcript_id>.fa` for every transcript.
    #[must_use]
    pub fn with_alignment_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.alignment_dir = Some(dir.into());
        self
    }

    /// Look up `<dir>/<transcript_id>.mod` for every transcript.
    ///
    /// A model provides both the species tree used by the branch length
    /// score and the phyloP model; no tree is fitted. Transcripts without a
    /// model get the neutral conservation values.
    #[must_use]
    pub fn with_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn engines(&self) -> &EngineSet {
        &self.engines
    }

    /// Conservation settings for one transcript.
    fn evolution_for(&self, transcript_id: &str) -> Result<EvolutionConfig, MirmapError> {
        let mut evolution = self.config.evolution.clone();
        let Some(aln_dir) = &self.alignment_dir else {
            return Ok(evolution);
        };
        let alignment = aln_dir.join(format!("{transcript_id}.fa"));
        if !alignment.is_file() {
            debug!(transcript_id, "no alignment");
            evolution.alignment_path = None;
            evolution.alignment_text = None;
            return Ok(evolution);
        }
        evolution.alignment_path = Some(alignment);

        match &self.model_dir {
            Some(mod_dir) => {
                let model_file = mod_dir.join(format!("{transcript_id}.mod"));
                if model_file.is_file() {
                    let model = fs::read_to_string(&model_file)?;
                    evolution.tree = Some(tree_from_model(&model).ok_or_else(|| {
                        MirmapError::ParseError(format!(
                            "no TREE line in {}",
                            model_file.display()
                        ))
                    })?);
                    evolution.fitting_tree = false;
                    evolution.model_file = Some(model_file);
                } else {
                    debug!(transcript_id, "no phylogenetic model");
                    evolution.alignment_path = None;
                    evolution.alignment_text = None;
                }
            }
            None => {
                evolution.fitting_tree = true;
                evolution.model_file = None;
            }
        }
        Ok(evolution)
    }

    /// Score one pair.
    ///
    /// `transcript_id` selects the per-transcript conservation inputs; without
    /// one only the shared configuration applies.
    ///
    /// # Errors
    ///
    /// Any configuration, sequence or engine error of the session.
    pub fn analyze_pair(
        &self,
        target: &str,
        mirna: &str,
        transcript_id: Option<&str>,
    ) -> Result<PredictionReport, MirmapError> {
        let config = match transcript_id {
            Some(id) => MirmapConfig {
                evolution: self.evolution_for(id)?,
                ..self.config.clone()
            },
            None => self.config.clone(),
        };
        let mut session = PredictionSession::new(target, mirna, &config, self.engines.clone())?;
        if session.sites().is_empty() {
            return Ok(session.finalize());
        }
        session.run_all()?;
        Ok(session.finalize())
    }

    /// Score every miRNA against every transcript.
    ///
    /// Pairs are processed on a dedicated pool of `num_threads` workers (all
    /// cores when unset) in fixed chunks. A failing pair is logged and
    /// reported in its [`PairOutcome`]; the batch carries on.
    ///
    /// # Errors
    ///
    /// Returns [`MirmapError::Configuration`] if the thread pool cannot be
    /// built.
    pub fn analyze_all(
        &self,
        mirnas: &[NamedSequence],
        transcripts: &[NamedSequence],
    ) -> Result<Vec<PairOutcome>, MirmapError> {
        let pairs: Vec<(&NamedSequence, &NamedSequence)> = mirnas
            .iter()
            .flat_map(|m| transcripts.iter().map(move |t| (m, t)))
            .collect();

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = self.config.num_threads {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder.build().map_err(|e| {
            MirmapError::Configuration(format!("Failed to configure thread pool: {}", e))
        })?;

        info!(
            pairs = pairs.len(),
            workers = pool.current_num_threads(),
            "Starting batch"
        );
        let outcomes: Vec<PairOutcome> = pool.install(|| {
            pairs
                .par_chunks(BATCH_CHUNK_SIZE)
                .flat_map_iter(|chunk| {
                    chunk.iter().map(|((mirna_id, mirna), (transcript_id, target))| {
                        let result = self.analyze_pair(target, mirna, Some(transcript_id.as_str()));
                        if let Err(err) = &result {
                            warn!(%mirna_id, %transcript_id, "pair failed: {err}");
                        }
                        PairOutcome {
                            mirna_id: mirna_id.clone(),
                            transcript_id: transcript_id.clone(),
                            result,
                        }
                    })
                })
                .collect()
        });

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(pairs = outcomes.len(), failed, "Batch finished");
        Ok(outcomes)
    }
}
