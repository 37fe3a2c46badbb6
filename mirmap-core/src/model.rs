//! Fitted score models.
//!
//! A model bundle combines feature values into one score, either as a plain
//! linear combination or through a logistic link. Bundles are chosen by
//! backend (whether a duplex engine is present) and seed-length class.
//! Native bundles also read the conservation features, which are neutral
//! (BLS 0, phyloP 1) for transcripts without an alignment.
//!
//! ```rust
//! use mirmap_core::model::{Backend, ModelBundle};
//!
//! let six = ModelBundle::select(Backend::Fallback, 6)?;
//! let eight = ModelBundle::select(Backend::Fallback, 8)?;
//! assert_eq!(eight, ModelBundle::select(Backend::Fallback, 7)?);
//! assert_ne!(six, eight);
//! assert!(ModelBundle::select(Backend::Fallback, 2).is_err());
//! # Ok::<(), mirmap_core::types::MirmapError>(())
//! ```

use crate::engines::EngineSet;
use crate::features::FeatureKind;
use crate::types::MirmapError;
use serde::Serialize;
use std::fmt;

/// Which family of bundles a session can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Thermodynamic features are computed by an external engine.
    Native,
    /// Sequence-only features.
    Fallback,
}

impl Backend {
    #[must_use]
    pub fn detect(engines: &EngineSet) -> Self {
        if engines.has_duplex() {
            Self::Native
        } else {
            Self::Fallback
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Linear,
    Logistic,
}

/// A named set of coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelBundle {
    pub name: &'static str,
    pub backend: Backend,
    /// Seed length class, 6 or 7.
    pub seed_class: usize,
    pub link: Link,
    pub intercept: f64,
    pub terms: &'static [(FeatureKind, f64)],
}

pub static NATIVE_SEED6: ModelBundle = ModelBundle {
    name: "native_seed6",
    backend: Backend::Native,
    seed_class: 6,
    link: Link::Linear,
    intercept: 0.0,
    terms: &[
        (FeatureKind::TgsAu, -1.2),
        (FeatureKind::TgsPosition, -0.9),
        (FeatureKind::TgsPairing3p, -1.1),
        (FeatureKind::DgBinding, -0.04),
        (FeatureKind::DgOpen, -0.03),
        (FeatureKind::ProbExact, -0.6),
        (FeatureKind::ConsBls, 0.25),
        (FeatureKind::SelecPhylop, -0.3),
    ],
};

pub static NATIVE_SEED7: ModelBundle = ModelBundle {
    name: "native_seed7",
    backend: Backend::Native,
    seed_class: 7,
    link: Link::Logistic,
    intercept: -1.0,
    terms: &[
        (FeatureKind::TgsAu, -3.5),
        (FeatureKind::TgsPosition, -2.0),
        (FeatureKind::TgsPairing3p, -2.8),
        (FeatureKind::DgBinding, -0.09),
        (FeatureKind::DgOpen, -0.05),
        (FeatureKind::ProbExact, -1.4),
        (FeatureKind::ConsBls, 0.6),
        (FeatureKind::SelecPhylop, -0.8),
    ],
};

pub static FALLBACK_SEED6: ModelBundle = ModelBundle {
    name: "fallback_seed6",
    backend: Backend::Fallback,
    seed_class: 6,
    link: Link::Linear,
    intercept: 0.0,
    terms: &[
        (FeatureKind::TgsAu, -1.3),
        (FeatureKind::TgsPosition, -1.0),
        (FeatureKind::TgsPairing3p, -1.2),
        (FeatureKind::ProbExact, -0.7),
        (FeatureKind::ProbBinomial, -0.2),
    ],
};

pub static FALLBACK_SEED7: ModelBundle = ModelBundle {
    name: "fallback_seed7",
    backend: Backend::Fallback,
    seed_class: 7,
    link: Link::Logistic,
    intercept: -0.8,
    terms: &[
        (FeatureKind::TgsAu, -3.8),
        (FeatureKind::TgsPosition, -2.2),
        (FeatureKind::TgsPairing3p, -3.0),
        (FeatureKind::ProbExact, -1.6),
        (FeatureKind::ProbBinomial, -0.4),
    ],
};

impl ModelBundle {
    /// Bundle for a seed length: 6 uses the 6-mer class, 7 and 8 the 7-mer
    /// class.
    pub fn select(backend: Backend, seed_length: usize) -> Result<&'static Self, MirmapError> {
        match (backend, seed_length) {
            (Backend::Native, 6) => Ok(&NATIVE_SEED6),
            (Backend::Native, 7 | 8) => Ok(&NATIVE_SEED7),
            (Backend::Fallback, 6) => Ok(&FALLBACK_SEED6),
            (Backend::Fallback, 7 | 8) => Ok(&FALLBACK_SEED7),
            (_, length) => Err(MirmapError::Configuration(format!(
                "no score model for seed length {length}"
            ))),
        }
    }

    /// Features the bundle reads.
    pub fn features(&self) -> impl Iterator<Item = FeatureKind> + '_ {
        self.terms.iter().map(|(kind, _)| *kind)
    }

    /// Combine feature values, looked up through `value`.
    ///
    /// The lookup decides how a missing feature is reported.
    pub fn score<F>(&self, mut value: F) -> Result<f64, MirmapError>
    where
        F: FnMut(FeatureKind) -> Result<f64, MirmapError>,
    {
        let mut eta = self.intercept;
        for &(kind, weight) in self.terms {
            eta += weight * value(kind)?;
        }
        Ok(match self.link {
            Link::Linear => eta,
            Link::Logistic => 1.0 / (1.0 + (-eta).exp()),
        })
    }
}

impl fmt::Display for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
