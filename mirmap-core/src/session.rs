//! Prediction session for one miRNA/transcript pair.
//!
//! A session owns the candidate sites, the per-site feature vectors and the
//! computation status of every feature. Evaluation is explicit:
//!
//! - [`PredictionSession::evaluate`] runs one evaluator and fails when its
//!   prerequisites have not been evaluated.
//! - [`PredictionSession::values`] reads a per-site vector and fails when the
//!   feature has not been evaluated.
//! - [`PredictionSession::summary`] evaluates the missing prerequisite chain
//!   with default parameters once, then caches the reduced value.
//! - [`PredictionSession::run_all`] evaluates everything available in
//!   dependency order and computes per-site scores.
//!
//! ```rust
//! use mirmap_core::config::MirmapConfig;
//! use mirmap_core::engines::EngineSet;
//! use mirmap_core::features::FeatureKind;
//! use mirmap_core::session::PredictionSession;
//!
//! let target = "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGUAAGCUAGCAUG";
//! let mirna = "UAGCAGCACGUAAAUAUUGGCG";
//! let mut session = PredictionSession::new(target, mirna, &MirmapConfig::default(), EngineSet::none())?;
//!
//! assert!(session.values(FeatureKind::TgsScore).is_err());
//! let best = session.summary(FeatureKind::TgsScore)?;
//! assert!(best.is_finite());
//! # Ok::<(), mirmap_core::types::MirmapError>(())
//! ```

use crate::config::MirmapConfig;
use crate::engines::EngineSet;
use crate::features::{
    Availability, EvaluationContext, FeatureColumns, FeatureEvaluator, FeatureGroup, FeatureKind,
    FeatureStatus, FeatureStore, default_evaluators,
};
use crate::model::{Backend, ModelBundle};
use crate::results::PredictionReport;
use crate::seed::SeedMatcher;
use crate::sequence::normalize_rna;
use crate::types::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PredictionSession {
    target: String,
    mirna: String,
    sites: Vec<CandidateSite>,
    min_target_length: usize,
    mirna_start_pairing: usize,
    engines: EngineSet,
    evaluators: Vec<Arc<dyn FeatureEvaluator>>,
    status: BTreeMap<FeatureKind, FeatureStatus>,
    store: FeatureStore,
    summaries: BTreeMap<FeatureKind, f64>,
    backend: Backend,
    model: Option<&'static ModelBundle>,
    scores: Option<Vec<f64>>,
}

impl PredictionSession {
    /// Validate the configuration, normalize both sequences and find the
    /// candidate sites.
    pub fn new(
        target: &str,
        mirna: &str,
        config: &MirmapConfig,
        engines: EngineSet,
    ) -> Result<Self, MirmapError> {
        config.validate()?;
        let target = normalize_rna(target);
        let mirna = normalize_rna(mirna);
        let min_target_length = config.seed.min_target_length.unwrap_or(mirna.len());

        let sites = SeedMatcher::new(&config.seed, min_target_length)?
            .find_sites(target.as_bytes(), mirna.as_bytes())?;
        let backend = Backend::detect(&engines);
        debug!(
            target_length = target.len(),
            mirna_length = mirna.len(),
            sites = sites.len(),
            %backend,
            "session created"
        );

        Ok(Self {
            store: FeatureStore::new(sites.len()),
            target,
            mirna,
            sites,
            min_target_length,
            mirna_start_pairing: config.seed.mirna_start_pairing,
            engines,
            evaluators: default_evaluators(config),
            status: BTreeMap::new(),
            summaries: BTreeMap::new(),
            backend,
            model: None,
            scores: None,
        })
    }

    #[must_use]
    pub fn sites(&self) -> &[CandidateSite] {
        &self.sites
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn mirna(&self) -> &str {
        &self.mirna
    }

    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    #[must_use]
    pub fn status(&self, kind: FeatureKind) -> FeatureStatus {
        self.status.get(&kind).copied().unwrap_or_default()
    }

    fn set_status(&mut self, kinds: &[FeatureKind], status: FeatureStatus) {
        for &kind in kinds {
            self.status.insert(kind, status);
        }
    }

    fn evaluator_for(&self, kind: FeatureKind) -> Result<Arc<dyn FeatureEvaluator>, MirmapError> {
        self.evaluators
            .iter()
            .find(|e| e.provides().contains(&kind))
            .cloned()
            .ok_or_else(|| MirmapError::Configuration(format!("no evaluator provides {kind}")))
    }

    /// Per-site values of an evaluated feature.
    pub fn values(&self, kind: FeatureKind) -> Result<&[f64], MirmapError> {
        match self.status(kind) {
            FeatureStatus::Done => self
                .store
                .get(kind)
                .ok_or_else(|| MirmapError::dependency(kind.name(), vec![kind])),
            FeatureStatus::Unavailable => Err(MirmapError::FeatureUnavailable(kind)),
            FeatureStatus::NotRun | FeatureStatus::Running => {
                Err(MirmapError::dependency(kind.name(), vec![kind]))
            }
        }
    }

    /// Run the default evaluator of `kind`.
    pub fn evaluate(&mut self, kind: FeatureKind) -> Result<(), MirmapError> {
        let evaluator = self.evaluator_for(kind)?;
        self.evaluate_with(evaluator.as_ref())
    }

    /// Run an evaluator over the session sites and store its columns.
    ///
    /// # Errors
    ///
    /// - [`MirmapError::DependencyNotSatisfied`] when a required feature has
    ///   not been evaluated
    /// - [`MirmapError::MissingEngine`] or [`MirmapError::Configuration`] when
    ///   the evaluator cannot run in this session
    /// - any error raised by the evaluator itself, in which case its features
    ///   are left unevaluated
    pub fn evaluate_with(&mut self, evaluator: &dyn FeatureEvaluator) -> Result<(), MirmapError> {
        let missing: Vec<FeatureKind> = evaluator
            .requires()
            .iter()
            .copied()
            .filter(|&k| self.status(k) != FeatureStatus::Done)
            .collect();
        if !missing.is_empty() {
            return Err(MirmapError::dependency(evaluator.name(), missing));
        }
        if let Some(err) = evaluator.availability(&self.engines).into_error() {
            return Err(err);
        }

        let provides = evaluator.provides();
        self.set_status(provides, FeatureStatus::Running);
        let columns = {
            let ctx = EvaluationContext {
                target: &self.target,
                mirna: &self.mirna,
                sites: &self.sites,
                min_target_length: self.min_target_length,
                mirna_start_pairing: self.mirna_start_pairing,
                engines: &self.engines,
                store: &self.store,
            };
            evaluator.evaluate(&ctx)
        };
        let result = columns.and_then(|columns| self.store_columns(evaluator, columns));

        match result {
            Ok(()) => {
                self.set_status(provides, FeatureStatus::Done);
                self.summaries.clear();
                self.scores = None;
                debug!(evaluator = evaluator.name(), "evaluated");
                Ok(())
            }
            Err(err) => {
                self.set_status(provides, FeatureStatus::NotRun);
                Err(err)
            }
        }
    }

    fn store_columns(
        &mut self,
        evaluator: &dyn FeatureEvaluator,
        mut columns: FeatureColumns,
    ) -> Result<(), MirmapError> {
        for kind in evaluator.provides() {
            if !columns.iter().any(|(k, _)| k == kind) {
                return Err(MirmapError::Configuration(format!(
                    "{} did not produce {kind}",
                    evaluator.name()
                )));
            }
        }
        if let Some((kind, values)) = columns
            .iter()
            .find(|(_, values)| values.len() != self.sites.len())
        {
            return Err(MirmapError::LengthMismatch {
                feature: *kind,
                found: values.len(),
                expected: self.sites.len(),
            });
        }
        columns.retain(|(k, _)| evaluator.provides().contains(k));
        for (kind, values) in columns {
            self.store.insert(kind, values)?;
        }
        Ok(())
    }

    /// Evaluate `kind` and its prerequisites, default parameters, only where
    /// they have not run yet.
    fn ensure(&mut self, kind: FeatureKind) -> Result<(), MirmapError> {
        match self.status(kind) {
            FeatureStatus::Done => return Ok(()),
            FeatureStatus::Unavailable => return Err(MirmapError::FeatureUnavailable(kind)),
            FeatureStatus::Running => {
                return Err(MirmapError::Configuration(format!(
                    "cyclic dependency on {kind}"
                )));
            }
            FeatureStatus::NotRun => {}
        }
        let evaluator = self.evaluator_for(kind)?;
        for &required in evaluator.requires() {
            self.ensure(required)?;
        }
        self.evaluate_with(evaluator.as_ref())
    }

    /// Session-level value of a feature, computed on first access.
    pub fn summary(&mut self, kind: FeatureKind) -> Result<f64, MirmapError> {
        if self.sites.is_empty() {
            return Err(MirmapError::NoCandidateSites);
        }
        if let Some(&value) = self.summaries.get(&kind) {
            return Ok(value);
        }
        self.ensure(kind)?;
        let value = kind
            .reduction()
            .apply(self.values(kind)?)
            .ok_or(MirmapError::NoCandidateSites)?;
        self.summaries.insert(kind, value);
        Ok(value)
    }

    fn is_available(&self, kind: FeatureKind) -> bool {
        match self.status(kind) {
            FeatureStatus::Done => true,
            FeatureStatus::Unavailable => false,
            FeatureStatus::NotRun | FeatureStatus::Running => {
                self.evaluator_for(kind).is_ok_and(|e| {
                    e.availability(&self.engines) == Availability::Ready
                        && e.requires().iter().all(|&r| self.is_available(r))
                })
            }
        }
    }

    /// Summaries of the available features of one family.
    pub fn group_summaries(
        &mut self,
        group: FeatureGroup,
    ) -> Result<BTreeMap<FeatureKind, f64>, MirmapError> {
        let mut out = BTreeMap::new();
        for kind in group.features() {
            if self.is_available(kind) {
                out.insert(kind, self.summary(kind)?);
            }
        }
        Ok(out)
    }

    /// Run every evaluator in dependency order, skipping those that cannot
    /// run here, then score every site.
    pub fn run_all(&mut self) -> Result<(), MirmapError> {
        for evaluator in self.evaluators.clone() {
            let provides = evaluator.provides();
            if provides.iter().all(|&k| self.status(k) == FeatureStatus::Done) {
                continue;
            }
            let blocked: Vec<FeatureKind> = evaluator
                .requires()
                .iter()
                .copied()
                .filter(|&k| self.status(k) == FeatureStatus::Unavailable)
                .collect();
            let availability = evaluator.availability(&self.engines);
            if !blocked.is_empty() || availability != Availability::Ready {
                warn!(
                    evaluator = evaluator.name(),
                    ?availability,
                    ?blocked,
                    "evaluator skipped"
                );
                self.set_status(provides, FeatureStatus::Unavailable);
                continue;
            }
            self.evaluate_with(evaluator.as_ref())?;
        }
        self.evaluate_score()
    }

    /// Model applied to one seed length, honoring [`set_model`](Self::set_model).
    fn bundle_for(&self, seed_length: usize) -> Result<&'static ModelBundle, MirmapError> {
        match self.model {
            Some(bundle) => Ok(bundle),
            None => self.model_select(seed_length),
        }
    }

    fn site_value(&self, kind: FeatureKind, site: usize, model: &str) -> Result<f64, MirmapError> {
        match self.status(kind) {
            FeatureStatus::Done => self
                .values(kind)?
                .get(site)
                .copied()
                .ok_or(MirmapError::LengthMismatch {
                    feature: kind,
                    found: site,
                    expected: self.sites.len(),
                }),
            FeatureStatus::Unavailable => Err(MirmapError::Configuration(format!(
                "model {model} needs {kind}, which is unavailable"
            ))),
            FeatureStatus::NotRun | FeatureStatus::Running => {
                Err(MirmapError::dependency("score", vec![kind]))
            }
        }
    }

    /// Score every site with the bundle of its seed length.
    pub fn evaluate_score(&mut self) -> Result<(), MirmapError> {
        let mut scores = Vec::with_capacity(self.sites.len());
        for (i, site) in self.sites.iter().enumerate() {
            let bundle = self.bundle_for(site.seed_length)?;
            scores.push(bundle.score(|kind| self.site_value(kind, i, bundle.name))?);
        }
        self.scores = Some(scores);
        Ok(())
    }

    /// Per-site scores from the last [`evaluate_score`](Self::evaluate_score).
    pub fn scores(&self) -> Result<&[f64], MirmapError> {
        self.scores
            .as_deref()
            .ok_or_else(|| MirmapError::dependency("score", Vec::new()))
    }

    fn longest_seed(&self) -> Result<usize, MirmapError> {
        self.sites
            .iter()
            .map(|s| s.seed_length)
            .max()
            .ok_or(MirmapError::NoCandidateSites)
    }

    /// Current model: the one set explicitly, else the bundle of the longest
    /// seed found.
    pub fn model(&self) -> Result<&'static ModelBundle, MirmapError> {
        self.bundle_for(self.longest_seed()?)
    }

    pub fn set_model(&mut self, bundle: &'static ModelBundle) {
        self.model = Some(bundle);
        self.scores = None;
    }

    pub fn model_select(&self, seed_length: usize) -> Result<&'static ModelBundle, MirmapError> {
        ModelBundle::select(self.backend, seed_length)
    }

    /// Model applied to the session summaries.
    ///
    /// Every feature the model reads must be available; a skipped feature is
    /// a configuration error.
    pub fn combined_score(&mut self) -> Result<f64, MirmapError> {
        let bundle = self.model()?;
        bundle.score(|kind| {
            self.summary(kind).map_err(|err| match err {
                MirmapError::FeatureUnavailable(_) | MirmapError::MissingEngine(_) => {
                    MirmapError::Configuration(format!(
                        "model {} needs {kind}, which is unavailable: {err}",
                        bundle.name
                    ))
                }
                other => other,
            })
        })
    }

    /// Freeze the session into a report. Nothing is evaluated here.
    #[must_use]
    pub fn finalize(self) -> PredictionReport {
        let unavailable: Vec<FeatureKind> = FeatureKind::ALL
            .into_iter()
            .filter(|&k| self.status(k) == FeatureStatus::Unavailable)
            .collect();
        let model = self.model().ok();
        let features = self.store.into_values();
        let summaries: BTreeMap<FeatureKind, f64> = features
            .iter()
            .filter_map(|(&kind, values)| kind.reduction().apply(values).map(|v| (kind, v)))
            .collect();

        let combined_score = model.and_then(|bundle| {
            bundle
                .score(|kind| {
                    summaries
                        .get(&kind)
                        .copied()
                        .ok_or(MirmapError::FeatureUnavailable(kind))
                })
                .ok()
        });

        PredictionReport {
            mirna: self.mirna,
            target_length: self.target.len(),
            sites: self.sites,
            features,
            summaries,
            unavailable,
            scores: self.scores,
            combined_score,
            model: model.map(|b| b.name),
            backend: self.backend,
        }
    }
}
