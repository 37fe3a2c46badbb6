//! TargetScan-style context features.
//!
//! Raw values are computed from sequence alone:
//!
//! - **A/U content**: weighted fraction of A and U around the seed core
//!   (miRNA 2-7), each base weighted by the inverse of its distance to the
//!   core. Bases beyond the transcript ends are not counted.
//! - **Position**: distance of the site to the closest transcript end.
//! - **3′ pairing**: best contiguous Watson–Crick run between the miRNA
//!   beyond the seed and the target upstream of the site, pairs at miRNA
//!   13-16 weighing double, allowing small register shifts for a penalty.
//!
//! With correction enabled each raw value goes through the linear
//! regression fitted for the site type, and `tgs_score` adds the mean fold
//! change of that type.

use crate::config::TargetScanConfig;
use crate::constants::*;
use crate::features::{EvaluationContext, FeatureColumns, FeatureEvaluator, FeatureKind};
use crate::types::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteType {
    EightMer,
    SevenMerM8,
    SevenMerA1,
    SixMer,
}

/// Regression and window parameters of one site type.
#[derive(Debug, Clone, Copy)]
pub struct SiteTypeParameters {
    pub fc_mean: f64,
    pub au: (f64, f64),
    pub position: (f64, f64),
    pub pairing3p: (f64, f64),
    /// Distance of the first scanned base upstream and downstream of the core.
    pub au_shifts: (usize, usize),
}

impl SiteType {
    /// Classify a site from its seed length and the base facing miRNA
    /// position 1.
    pub fn classify(
        site: &CandidateSite,
        target: &[u8],
        mirna_start_pairing: usize,
    ) -> Result<Self, MirmapError> {
        if mirna_start_pairing != DEFAULT_MIRNA_START_PAIRING {
            return Err(MirmapError::Configuration(format!(
                "TargetScan site types need seeds starting at miRNA position 2, not {mirna_start_pairing}"
            )));
        }
        let a1 = target.get(site.end_site - 1) == Some(&b'A');
        match (site.seed_length, a1) {
            (7 | 8, true) => Ok(Self::EightMer),
            (7 | 8, false) => Ok(Self::SevenMerM8),
            (6, true) => Ok(Self::SevenMerA1),
            (6, false) => Ok(Self::SixMer),
            (length, _) => Err(MirmapError::Configuration(format!(
                "no TargetScan site type for seed length {length}"
            ))),
        }
    }

    #[must_use]
    pub const fn parameters(self) -> SiteTypeParameters {
        match self {
            Self::EightMer => SiteTypeParameters {
                fc_mean: -0.310,
                au: (-0.64, 0.365),
                position: (0.000172, -0.07),
                pairing3p: (-0.0041, 0.011),
                au_shifts: (3, 2),
            },
            Self::SevenMerM8 => SiteTypeParameters {
                fc_mean: -0.161,
                au: (-0.50, 0.269),
                position: (0.000091, -0.037),
                pairing3p: (-0.031, 0.0515),
                au_shifts: (3, 1),
            },
            Self::SevenMerA1 => SiteTypeParameters {
                fc_mean: -0.099,
                au: (-0.42, 0.236),
                position: (0.000072, -0.032),
                pairing3p: (-0.0211, 0.0142),
                au_shifts: (2, 2),
            },
            Self::SixMer => SiteTypeParameters {
                fc_mean: -0.015,
                au: (-0.18, 0.085),
                position: (0.000008, -0.016),
                pairing3p: (-0.0041, 0.00722),
                au_shifts: (2, 1),
            },
        }
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EightMer => "8mer",
            Self::SevenMerM8 => "7mer-m8",
            Self::SevenMerA1 => "7mer-A1",
            Self::SixMer => "6mer",
        })
    }
}

fn correct(raw: f64, (slope, intercept): (f64, f64), with_correction: bool) -> f64 {
    if with_correction {
        slope * raw + intercept
    } else {
        raw
    }
}

/// Weighted A/U fraction around the seed core of a site.
#[must_use]
pub fn au_content(target: &[u8], end_site: usize, window: usize, shifts: (usize, usize)) -> f64 {
    let core_start = end_site + 1 - AU_CORE_MIRNA_SPAN.1;
    let core_end = end_site + 1 - AU_CORE_MIRNA_SPAN.0;
    let is_au = |pos: usize| matches!(target[pos - 1], b'A' | b'U');

    let mut score = 0.0;
    let mut total = 0.0;
    for d in shifts.0..=window + 1 {
        if d < core_start {
            let w = 1.0 / d as f64;
            total += w;
            if is_au(core_start - d) {
                score += w;
            }
        }
    }
    for d in shifts.1..=window {
        if core_end + d <= target.len() {
            let w = 1.0 / d as f64;
            total += w;
            if is_au(core_end + d) {
                score += w;
            }
        }
    }
    if total > 0.0 { score / total } else { 0.0 }
}

/// Bases between the site and the closest transcript end.
#[must_use]
pub fn position_distance(target_len: usize, site: &CandidateSite) -> f64 {
    (site.pairing.target_start - 1).min(target_len - site.end_site) as f64
}

/// Best 3′ supplementary pairing score of a site.
#[must_use]
pub fn pairing3p(target: &[u8], mirna: &[u8], site: &CandidateSite, max_offset: usize) -> f64 {
    let first_j = site.pairing.mirna_end + 1;
    let upstream_limit = site.pairing.target_start;
    let mut best = 0.0_f64;

    for offset in -(max_offset as isize)..=max_offset as isize {
        let mut run_len = 0;
        let mut run_score = 0.0;
        let mut best_run = 0.0_f64;
        for j in first_j..=mirna.len() {
            let pos = site.end_site as isize - (j as isize - 1) - offset;
            let paired = pos >= 1
                && (pos as usize) < upstream_limit
                && PairClass::classify(mirna[j - 1], target[pos as usize - 1])
                    == PairClass::WatsonCrick;
            if paired {
                run_len += 1;
                run_score += if (PAIRING3P_CORE.0..=PAIRING3P_CORE.1).contains(&j) {
                    1.0
                } else {
                    0.5
                };
                if run_len >= PAIRING3P_MIN_RUN {
                    best_run = best_run.max(run_score);
                }
            } else {
                run_len = 0;
                run_score = 0.0;
            }
        }
        let penalty = PAIRING3P_OFFSET_PENALTY
            * offset.unsigned_abs().saturating_sub(PAIRING3P_FREE_OFFSET) as f64;
        best = best.max(best_run - penalty);
    }
    best.max(0.0)
}

fn site_types(ctx: &EvaluationContext<'_>) -> Result<Vec<SiteType>, MirmapError> {
    ctx.sites
        .iter()
        .map(|s| SiteType::classify(s, ctx.target.as_bytes(), ctx.mirna_start_pairing))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct TgsAu {
    config: TargetScanConfig,
}

impl TgsAu {
    #[must_use]
    pub const fn new(config: TargetScanConfig) -> Self {
        Self { config }
    }
}

impl FeatureEvaluator for TgsAu {
    fn name(&self) -> &'static str {
        "tgs_au"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::TgsAu]
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let target = ctx.target.as_bytes();
        let values = ctx
            .sites
            .iter()
            .zip(site_types(ctx)?)
            .map(|(site, kind)| {
                let params = kind.parameters();
                let raw = au_content(
                    target,
                    site.end_site,
                    self.config.ca_window_length,
                    params.au_shifts,
                );
                correct(raw, params.au, self.config.with_correction)
            })
            .collect();
        Ok(vec![(FeatureKind::TgsAu, values)])
    }
}

#[derive(Debug, Clone, Default)]
pub struct TgsPosition {
    config: TargetScanConfig,
}

impl TgsPosition {
    #[must_use]
    pub const fn new(config: TargetScanConfig) -> Self {
        Self { config }
    }
}

impl FeatureEvaluator for TgsPosition {
    fn name(&self) -> &'static str {
        "tgs_position"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::TgsPosition]
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let values = ctx
            .sites
            .iter()
            .zip(site_types(ctx)?)
            .map(|(site, kind)| {
                let raw = position_distance(ctx.target.len(), site);
                correct(raw, kind.parameters().position, self.config.with_correction)
            })
            .collect();
        Ok(vec![(FeatureKind::TgsPosition, values)])
    }
}

#[derive(Debug, Clone, Default)]
pub struct TgsPairing3p {
    config: TargetScanConfig,
}

impl TgsPairing3p {
    #[must_use]
    pub const fn new(config: TargetScanConfig) -> Self {
        Self { config }
    }
}

impl FeatureEvaluator for TgsPairing3p {
    fn name(&self) -> &'static str {
        "tgs_pairing3p"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::TgsPairing3p]
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let target = ctx.target.as_bytes();
        let mirna = ctx.mirna.as_bytes();
        let values = ctx
            .sites
            .iter()
            .zip(site_types(ctx)?)
            .map(|(site, kind)| {
                let raw = pairing3p(target, mirna, site, self.config.pairing3p_max_offset);
                correct(raw, kind.parameters().pairing3p, self.config.with_correction)
            })
            .collect();
        Ok(vec![(FeatureKind::TgsPairing3p, values)])
    }
}

/// Sum of the site-type fold change and the three context contributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TgsScore;

impl FeatureEvaluator for TgsScore {
    fn name(&self) -> &'static str {
        "tgs_score"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::TgsScore]
    }

    fn requires(&self) -> &'static [FeatureKind] {
        &[
            FeatureKind::TgsAu,
            FeatureKind::TgsPosition,
            FeatureKind::TgsPairing3p,
        ]
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let au = ctx.feature(FeatureKind::TgsAu)?;
        let position = ctx.feature(FeatureKind::TgsPosition)?;
        let pairing = ctx.feature(FeatureKind::TgsPairing3p)?;
        let values = site_types(ctx)?
            .into_iter()
            .enumerate()
            .map(|(i, kind)| kind.parameters().fc_mean + au[i] + position[i] + pairing[i])
            .collect();
        Ok(vec![(FeatureKind::TgsScore, values)])
    }
}
