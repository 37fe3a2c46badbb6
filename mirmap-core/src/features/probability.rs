//! Probability of observing a site motif as often as it occurs in the target.
//!
//! The target's own composition defines a Markov background of order `m`
//! (pseudocounts added to every k-mer count). Two tail probabilities are
//! reported for each site motif occurring `k` times:
//!
//! - `prob_binomial`: `P(X >= k)` with `X ~ Binomial(n, p)`, where `p` is the
//!   motif probability under the background and `n` the number of motif
//!   positions in the target.
//! - `prob_exact`: the same tail computed exactly over random sequences of
//!   the target's length drawn from the background, counting overlapping
//!   occurrences.
//!
//! A motif holding a symbol outside ACGU cannot be scored and gets the
//! neutral probability 1.0.

use crate::config::ProbabilityConfig;
use crate::constants::RNA_ALPHABET;
use crate::features::{EvaluationContext, FeatureColumns, FeatureEvaluator, FeatureKind};
use crate::seed::motif::{motif_coordinates, motif_sequence};
use crate::sequence::find_all;
use crate::types::*;
use statrs::distribution::{Binomial, DiscreteCDF};
use std::collections::HashMap;
use tracing::warn;

const NEUTRAL_PROBABILITY: f64 = 1.0;

fn encode(base: u8) -> Option<usize> {
    RNA_ALPHABET.iter().position(|&b| b == base)
}

/// Encode an uppercase RNA motif as base indices.
pub fn encode_motif(motif: &[u8]) -> Result<Vec<usize>, MirmapError> {
    motif
        .iter()
        .map(|&b| encode(b))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            MirmapError::InvalidSequence(format!(
                "motif {} contains non-ACGU symbols",
                String::from_utf8_lossy(motif)
            ))
        })
}

/// Markov background fitted on one sequence.
#[derive(Debug, Clone)]
pub struct MarkovBackground {
    order: usize,
    pseudocount: f64,
    prefix_counts: Vec<f64>,
    prefix_total: f64,
    transition_counts: Vec<f64>,
}

impl MarkovBackground {
    /// Count every `order`-mer and `order + 1`-mer of `seq`. Windows holding
    /// a symbol outside ACGU are skipped.
    #[must_use]
    pub fn fit(seq: &[u8], order: usize, pseudocount: f64) -> Self {
        let contexts = 4usize.pow(order as u32);
        let mut prefix_counts = vec![0.0; contexts];
        let mut transition_counts = vec![0.0; contexts * 4];
        let codes: Vec<Option<usize>> = seq.iter().map(|&b| encode(b)).collect();

        let index = |window: &[Option<usize>]| {
            window
                .iter()
                .try_fold(0usize, |acc, code| (*code).map(|c| acc * 4 + c))
        };
        if order == 0 {
            prefix_counts[0] = seq.len() as f64;
        } else {
            for window in codes.windows(order) {
                if let Some(i) = index(window) {
                    prefix_counts[i] += 1.0;
                }
            }
        }
        for window in codes.windows(order + 1) {
            if let Some(i) = index(window) {
                transition_counts[i] += 1.0;
            }
        }
        let prefix_total = prefix_counts.iter().sum();

        Self {
            order,
            pseudocount,
            prefix_counts,
            prefix_total,
            transition_counts,
        }
    }

    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Number of distinct contexts, `4^order`.
    #[must_use]
    pub fn contexts(&self) -> usize {
        self.prefix_counts.len()
    }

    /// Probability of the context as the first `order` bases.
    #[must_use]
    pub fn initial(&self, context: usize) -> f64 {
        (self.prefix_counts[context] + self.pseudocount)
            / (self.prefix_total + self.contexts() as f64 * self.pseudocount)
    }

    /// Probability of `base` following `context`.
    #[must_use]
    pub fn transition(&self, context: usize, base: usize) -> f64 {
        let row = &self.transition_counts[context * 4..context * 4 + 4];
        let total: f64 = row.iter().sum();
        (row[base] + self.pseudocount) / (total + 4.0 * self.pseudocount)
    }

    /// Probability of the encoded motif at a given position.
    #[must_use]
    pub fn motif_probability(&self, motif: &[usize]) -> f64 {
        let context_of = |bases: &[usize]| bases.iter().fold(0, |acc, &b| acc * 4 + b);
        let mut p = self.initial(context_of(&motif[..self.order]));
        for i in self.order..motif.len() {
            p *= self.transition(context_of(&motif[i - self.order..i]), motif[i]);
        }
        p
    }
}

/// Knuth–Morris–Pratt automaton over the four RNA bases.
struct MotifAutomaton {
    delta: Vec<[usize; 4]>,
}

impl MotifAutomaton {
    fn new(motif: &[usize]) -> Self {
        let w = motif.len();
        let mut delta = vec![[0usize; 4]; w + 1];
        delta[0][motif[0]] = 1;
        let mut restart = 0;
        for q in 1..=w {
            delta[q] = delta[restart];
            if q < w {
                delta[q][motif[q]] = q + 1;
                restart = delta[restart][motif[q]];
            }
        }
        Self { delta }
    }

    fn states(&self) -> usize {
        self.delta.len()
    }

    fn step(&self, state: usize, base: usize) -> usize {
        self.delta[state][base]
    }
}

/// `P(X >= k)` for `X ~ Binomial(trials, p)`.
pub fn binomial_tail(p: f64, trials: u64, k: u64) -> Result<f64, MirmapError> {
    if k == 0 {
        return Ok(1.0);
    }
    let binomial = Binomial::new(p, trials)
        .map_err(|e| MirmapError::Configuration(format!("binomial model: {e}")))?;
    Ok(binomial.sf(k - 1))
}

/// Probability that a background sequence of `length` bases holds at least
/// `k` overlapping copies of `motif`.
#[must_use]
pub fn exact_tail(background: &MarkovBackground, motif: &[usize], length: usize, k: usize) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let order = background.order();
    if motif.is_empty() || length < motif.len() || length < order {
        return 0.0;
    }
    let automaton = MotifAutomaton::new(motif);
    let w = motif.len();
    let contexts = background.contexts();
    let counts = k + 1;
    let states = automaton.states();
    let at = |state: usize, context: usize, count: usize| (state * contexts + context) * counts + count;

    // Seed the chain with every possible first `order` bases.
    let mut current = vec![0.0; states * contexts * counts];
    for context in 0..contexts {
        let mut state = 0;
        let mut count = 0;
        for shift in (0..order).rev() {
            let base = (context / 4usize.pow(shift as u32)) % 4;
            state = automaton.step(state, base);
            if state == w {
                count = (count + 1).min(k);
            }
        }
        current[at(state, context, count)] += background.initial(context);
    }

    let mut next = vec![0.0; current.len()];
    for _ in order..length {
        next.iter_mut().for_each(|p| *p = 0.0);
        for state in 0..states {
            for context in 0..contexts {
                for count in 0..counts {
                    let p = current[at(state, context, count)];
                    if p == 0.0 {
                        continue;
                    }
                    for base in 0..4 {
                        let moved = automaton.step(state, base);
                        let new_count = if moved == w { (count + 1).min(k) } else { count };
                        let new_context = (context * 4 + base) % contexts;
                        next[at(moved, new_context, new_count)] +=
                            p * background.transition(context, base);
                    }
                }
            }
        }
        std::mem::swap(&mut current, &mut next);
    }

    (0..states)
        .flat_map(|state| (0..contexts).map(move |context| (state, context)))
        .map(|(state, context)| current[at(state, context, k)])
        .sum::<f64>()
        .min(1.0)
}

/// Encoded motif and occurrence count of every site, `None` for motifs
/// that cannot be encoded.
fn site_motifs(
    ctx: &EvaluationContext<'_>,
    config: &ProbabilityConfig,
) -> Result<Vec<Option<(Vec<usize>, usize)>>, MirmapError> {
    let target = ctx.target.as_bytes();
    ctx.sites
        .iter()
        .map(|site| {
            let span = motif_coordinates(
                site,
                config.motif_def,
                config.motif_upstream_extension,
                config.motif_downstream_extension,
                ctx.min_target_length,
                target.len(),
            );
            let motif = motif_sequence(target, span);
            if config.markov_order >= motif.len() {
                return Err(MirmapError::Configuration(format!(
                    "markov_order {} must be smaller than the motif length {}",
                    config.markov_order,
                    motif.len()
                )));
            }
            match encode_motif(motif) {
                Ok(encoded) => Ok(Some((encoded, find_all(target, motif).len()))),
                Err(err) => {
                    warn!(end_site = site.end_site, "{err}, using neutral probability");
                    Ok(None)
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ProbExact {
    config: ProbabilityConfig,
}

impl ProbExact {
    #[must_use]
    pub const fn new(config: ProbabilityConfig) -> Self {
        Self { config }
    }
}

impl FeatureEvaluator for ProbExact {
    fn name(&self) -> &'static str {
        "prob_exact"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::ProbExact]
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let motifs = site_motifs(ctx, &self.config)?;
        let background = MarkovBackground::fit(
            ctx.target.as_bytes(),
            self.config.markov_order,
            self.config.pseudocount,
        );
        let mut cache: HashMap<(Vec<usize>, usize), f64> = HashMap::new();
        let values = motifs
            .into_iter()
            .map(|key| match key {
                Some(key) => *cache.entry(key).or_insert_with_key(|(motif, k)| {
                    exact_tail(&background, motif, ctx.target.len(), *k)
                }),
                None => NEUTRAL_PROBABILITY,
            })
            .collect();
        Ok(vec![(FeatureKind::ProbExact, values)])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProbBinomial {
    config: ProbabilityConfig,
}

impl ProbBinomial {
    #[must_use]
    pub const fn new(config: ProbabilityConfig) -> Self {
        Self { config }
    }
}

impl FeatureEvaluator for ProbBinomial {
    fn name(&self) -> &'static str {
        "prob_binomial"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::ProbBinomial]
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let motifs = site_motifs(ctx, &self.config)?;
        let background = MarkovBackground::fit(
            ctx.target.as_bytes(),
            self.config.markov_order,
            self.config.pseudocount,
        );
        let values = motifs
            .iter()
            .map(|entry| match entry {
                Some((motif, k)) => {
                    let trials = (ctx.target.len() + 1).saturating_sub(motif.len()) as u64;
                    binomial_tail(background.motif_probability(motif), trials, *k as u64)
                }
                None => Ok(NEUTRAL_PROBABILITY),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vec![(FeatureKind::ProbBinomial, values)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotifDefinition;
    use crate::engines::EngineSet;
    use crate::features::FeatureStore;

    fn all_sequences(length: usize) -> Vec<Vec<usize>> {
        (0..4usize.pow(length as u32))
            .map(|mut n| {
                let mut seq = vec![0; length];
                for slot in seq.iter_mut().rev() {
                    *slot = n % 4;
                    n /= 4;
                }
                seq
            })
            .collect()
    }

    fn sequence_probability(background: &MarkovBackground, seq: &[usize]) -> f64 {
        background.motif_probability(seq)
    }

    fn count_overlapping(seq: &[usize], motif: &[usize]) -> usize {
        seq.windows(motif.len()).filter(|w| *w == motif).count()
    }

    #[test]
    fn test_background_is_normalized() {
        let bg = MarkovBackground::fit(b"ACGUUGCAAGGUACGUNACGU", 1, 1.0);
        let initial: f64 = (0..bg.contexts()).map(|c| bg.initial(c)).sum();
        assert!((initial - 1.0).abs() < 1e-12);
        for context in 0..bg.contexts() {
            let row: f64 = (0..4).map(|b| bg.transition(context, b)).sum();
            assert!((row - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_exact_matches_enumeration() {
        let target = b"UGCUGCUUAGCAUUGCAGU";
        let motif = encode_motif(b"UGC").unwrap();
        for order in [0, 1, 2] {
            let bg = MarkovBackground::fit(target, order, 1.0);
            let length = 7;
            let sequences = all_sequences(length);
            let total: f64 = sequences.iter().map(|s| sequence_probability(&bg, s)).sum();
            assert!((total - 1.0).abs() < 1e-9, "order {order}");
            for k in 1..=2 {
                let brute: f64 = sequences
                    .iter()
                    .filter(|s| count_overlapping(s, &motif) >= k)
                    .map(|s| sequence_probability(&bg, s))
                    .sum();
                let exact = exact_tail(&bg, &motif, length, k);
                assert!((exact - brute).abs() < 1e-9, "order {order} k {k}");
            }
        }
    }

    #[test]
    fn test_overlapping_occurrences() {
        let bg = MarkovBackground::fit(b"AAAAAAAA", 0, 1.0);
        let motif = encode_motif(b"AA").unwrap();
        let sequences = all_sequences(4);
        let brute: f64 = sequences
            .iter()
            .filter(|s| count_overlapping(s, &motif) >= 3)
            .map(|s| sequence_probability(&bg, s))
            .sum();
        assert!((exact_tail(&bg, &motif, 4, 3) - brute).abs() < 1e-12);
    }

    #[test]
    fn test_binomial_tail() {
        assert_eq!(binomial_tail(0.3, 10, 0).unwrap(), 1.0);
        let p = 0.1_f64;
        let expected = 1.0 - (1.0 - p).powi(5);
        assert!((binomial_tail(p, 5, 1).unwrap() - expected).abs() < 1e-12);
        assert!(binomial_tail(1.5, 5, 1).is_err());
    }

    #[test]
    fn test_invalid_motif() {
        assert!(matches!(
            encode_motif(b"ACNU"),
            Err(MirmapError::InvalidSequence(_))
        ));
    }

    fn site(end_site: usize, length: usize) -> CandidateSite {
        CandidateSite {
            end_site,
            seed_length: length,
            mismatch_count: 0,
            gu_wobble_count: 0,
            pairing: SitePairing {
                mirna_start: 2,
                mirna_end: length + 1,
                target_start: end_site - length,
                target_end: end_site - 1,
                pairs: vec![PairClass::WatsonCrick; length],
            },
        }
    }

    #[test]
    fn test_evaluators_on_sites() {
        let target = "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGU";
        let sites = vec![site(12, 6), site(27, 6)];
        let engines = EngineSet::none();
        let store = FeatureStore::new(2);
        let ctx = EvaluationContext {
            target,
            mirna: "UAGCAGCACGUAAAUAUUGGCG",
            sites: &sites,
            min_target_length: 22,
            mirna_start_pairing: 2,
            engines: &engines,
            store: &store,
        };
        let exact = ProbExact::new(ProbabilityConfig::default())
            .evaluate(&ctx)
            .unwrap();
        let binomial = ProbBinomial::new(ProbabilityConfig::default())
            .evaluate(&ctx)
            .unwrap();
        assert_eq!(exact[0].0, FeatureKind::ProbExact);
        assert_eq!(binomial[0].0, FeatureKind::ProbBinomial);
        for values in [&exact[0].1, &binomial[0].1] {
            assert_eq!(values.len(), 2);
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        }
        // Both sites carry the motif GCUGCU twice.
        assert!((exact[0].1[0] - exact[0].1[1]).abs() < 1e-12);
    }

    #[test]
    fn test_ambiguous_motif_is_neutral() {
        // N at base 19 falls in the second site window only.
        let target = "GCAUUGCUGCUAGUAGCCNUGCUGCUAAGCAGGUACCAGUCAGU";
        let sites = vec![site(12, 6), site(27, 6)];
        let engines = EngineSet::none();
        let store = FeatureStore::new(2);
        let ctx = EvaluationContext {
            target,
            mirna: "UAGCAGCACGUAAAUAUUGGCG",
            sites: &sites,
            min_target_length: 10,
            mirna_start_pairing: 2,
            engines: &engines,
            store: &store,
        };
        let config = ProbabilityConfig {
            motif_def: MotifDefinition::Site,
            ..Default::default()
        };
        let exact = ProbExact::new(config.clone()).evaluate(&ctx).unwrap();
        let binomial = ProbBinomial::new(config).evaluate(&ctx).unwrap();
        for values in [&exact[0].1, &binomial[0].1] {
            assert_eq!(values[1], 1.0);
            assert!(values[0] < 1.0);
        }
    }

    #[test]
    fn test_order_must_fit_motif() {
        let target = "GCAUUGCUGCUAGUAGCC";
        let sites = vec![site(12, 6)];
        let engines = EngineSet::none();
        let store = FeatureStore::new(1);
        let ctx = EvaluationContext {
            target,
            mirna: "UAGCAGCACGUAAAUAUUGGCG",
            sites: &sites,
            min_target_length: 22,
            mirna_start_pairing: 2,
            engines: &engines,
            store: &store,
        };
        let config = ProbabilityConfig {
            markov_order: 6,
            ..Default::default()
        };
        assert!(matches!(
            ProbExact::new(config).evaluate(&ctx),
            Err(MirmapError::Configuration(_))
        ));
    }
}
