//! Tab-delimited prediction rows.
//!
//! Every row starts with the miRNA and transcript identifiers, followed by
//! the site description (`end_site`, seed length, mismatches, G·U wobbles),
//! the fourteen features in [`FeatureKind::ALL`] order and the score.
//! Features that were not evaluated print `NA`. No header is written and
//! pairs without sites produce no row.
//!
//! - **Per site** (default): one row per site, optionally with a 1-based
//!   site index after the identifiers.
//! - **Combined**: one row per pair; site columns are comma-joined lists and
//!   feature columns hold the session summaries and the combined score.
//!
//! ```rust
//! use mirmap_core::{MirmapAnalyzer, config::MirmapConfig, engines::EngineSet};
//! use mirmap_core::output::{RowOptions, write_report};
//!
//! let analyzer = MirmapAnalyzer::new(MirmapConfig::default(), EngineSet::none());
//! let report = analyzer.analyze_pair(
//!     "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGUAAGCUAGCAUG",
//!     "UAGCAGCACGUAAAUAUUGGCG",
//!     None,
//! )?;
//!
//! let mut out = Vec::new();
//! write_report(&mut out, "miR", "tx", &report, RowOptions::default())?;
//! assert!(String::from_utf8(out)?.starts_with("miR\ttx\t27\t7\t"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::analyzer::PairOutcome;
use crate::features::FeatureKind;
use crate::results::PredictionReport;
use crate::types::MirmapError;
use std::io::Write;

const MISSING: &str = "NA";

/// Row layout switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowOptions {
    /// One row per pair instead of one row per site.
    pub combine: bool,
    /// Add a site index column (per-site rows only).
    pub site_id: bool,
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Write the rows of one report.
pub fn write_report<W: Write>(
    writer: &mut W,
    mirna_id: &str,
    transcript_id: &str,
    report: &PredictionReport,
    options: RowOptions,
) -> Result<(), MirmapError> {
    if report.is_empty() {
        return Ok(());
    }
    if options.combine {
        return write_combined_row(writer, mirna_id, transcript_id, report);
    }

    for (i, site) in report.sites.iter().enumerate() {
        let mut fields = vec![mirna_id.to_string(), transcript_id.to_string()];
        if options.site_id {
            fields.push((i + 1).to_string());
        }
        fields.extend([
            site.end_site.to_string(),
            site.seed_length.to_string(),
            site.mismatch_count.to_string(),
            site.gu_wobble_count.to_string(),
        ]);
        fields.extend(
            FeatureKind::ALL
                .iter()
                .map(|&kind| format_value(report.value(kind, i))),
        );
        fields.push(format_value(report.score(i)));
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    Ok(())
}

fn write_combined_row<W: Write>(
    writer: &mut W,
    mirna_id: &str,
    transcript_id: &str,
    report: &PredictionReport,
) -> Result<(), MirmapError> {
    let sites = &report.sites;
    let mut fields = vec![
        mirna_id.to_string(),
        transcript_id.to_string(),
        join(sites.iter().map(|s| s.end_site)),
        join(sites.iter().map(|s| s.seed_length)),
        join(sites.iter().map(|s| s.mismatch_count)),
        join(sites.iter().map(|s| s.gu_wobble_count)),
    ];
    fields.extend(
        FeatureKind::ALL
            .iter()
            .map(|&kind| format_value(report.summary(kind))),
    );
    fields.push(format_value(report.combined_score));
    writeln!(writer, "{}", fields.join("\t"))?;
    Ok(())
}

/// Write the rows of every successful pair, in batch order.
pub fn write_outcomes<W: Write>(
    writer: &mut W,
    outcomes: &[PairOutcome],
    options: RowOptions,
) -> Result<(), MirmapError> {
    for outcome in outcomes {
        if let Ok(report) = &outcome.result {
            write_report(writer, &outcome.mirna_id, &outcome.transcript_id, report, options)?;
        }
    }
    Ok(())
}
