//! # miRmap - miRNA Target Prediction
//!
//! Finds candidate miRNA binding sites in transcripts and scores them with
//! complementary feature families: TargetScan-style context, duplex
//! thermodynamics, motif over-representation probabilities and
//! cross-species conservation.
//!
//! ## Overview
//!
//! A miRNA binds a transcript through its seed (nucleotides 2-8). Candidate
//! sites are located by seed complementarity, then every site gets a vector
//! of features that each capture one determinant of repression. A fitted
//! model combines the features into a per-site score and a combined score
//! for the whole pair.
//!
//! ## Features
//!
//! - **Seed matching**: configurable seed lengths with mismatch and G·U
//!   wobble caps
//! - **TargetScan context**: A/U content, position in the 3′ UTR, 3′ pairing
//! - **Thermodynamics**: duplex and opening energies through ViennaRNA
//! - **Probability**: exact and binomial motif over-representation under a
//!   Markov background
//! - **Conservation**: branch length score and PhyloP through PHAST
//! - **Parallel batches**: many pairs at once using Rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use mirmap_core::{MirmapAnalyzer, config::MirmapConfig, engines::EngineSet};
//!
//! let analyzer = MirmapAnalyzer::new(MirmapConfig::default(), EngineSet::none());
//! let report = analyzer.analyze_pair(
//!     "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGUAAGCUAGCAUG",
//!     "UAGCAGCACGUAAAUAUUGGCG",
//!     None,
//! )?;
//!
//! println!("Found {} sites", report.site_count());
//! # Ok::<(), mirmap_core::types::MirmapError>(())
//! ```
//!
//! ## Sessions
//!
//! [`PredictionSession`] gives step-by-step control over one pair:
//!
//! ```rust
//! use mirmap_core::PredictionSession;
//! use mirmap_core::config::MirmapConfig;
//! use mirmap_core::engines::EngineSet;
//! use mirmap_core::features::FeatureKind;
//!
//! let mut session = PredictionSession::new(
//!     "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGUAAGCUAGCAUG",
//!     "UAGCAGCACGUAAAUAUUGGCG",
//!     &MirmapConfig::default(),
//!     EngineSet::none(),
//! )?;
//!
//! // Prerequisites are evaluated on demand
//! let score = session.summary(FeatureKind::TgsScore)?;
//! assert!(score.is_finite());
//! # Ok::<(), mirmap_core::types::MirmapError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: Configuration of every feature family
//! - [`seed`]: Candidate site detection
//! - [`features`]: Feature evaluators and their registry
//! - [`engines`]: Adapters to external folding and phylogenetic programs
//! - [`phylogeny`]: Newick trees and branch length scores
//! - [`model`]: Fitted score models
//! - [`session`]: Per-pair evaluation state
//! - [`analyzer`]: Batch scoring of many pairs
//! - [`results`]: Immutable prediction reports
//! - [`output`]: Tab-delimited output rows
//! - [`sequence`]: Sequence normalization, FASTA and alignment input
//! - [`types`]: Core data types and errors
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, MirmapError>`](types::MirmapError),
//! with distinct variants for:
//!
//! - Invalid configuration or sequences
//! - Features whose prerequisites were not evaluated
//! - Missing external engines or inputs
//! - Engine failures and I/O errors

pub mod analyzer;
pub mod config;
pub mod constants;
pub mod engines;
pub mod features;
pub mod model;
pub mod output;
pub mod phylogeny;
pub mod results;
pub mod seed;
pub mod sequence;
pub mod session;
pub mod types;

pub use analyzer::MirmapAnalyzer;
pub use session::PredictionSession;
