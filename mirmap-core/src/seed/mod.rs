//! Seed matching between a miRNA 5′ region and a target transcript.
//!
//! For every allowed seed length `L` the matcher slides the complement of
//! miRNA positions `s..s+L-1` (with `s` the start pairing, 2 by default) along
//! the target and classifies each facing pair as Watson–Crick, G·U wobble or
//! mismatch. A position is accepted when both the mismatch and the wobble
//! counts stay within the caps configured for `L`.
//!
//! ## Coordinates
//!
//! A site is identified by its `end_site`, the 1-based target base facing
//! miRNA position 1. miRNA position `j` faces target position
//! `end_site - (j - 1)`, so the seed covers target bases
//! `end_site - (s + L - 2) ..= end_site - (s - 1)`.
//!
//! ## Examples
//!
//! ```rust
//! use mirmap_core::config::SeedPolicy;
//! use mirmap_core::seed::SeedMatcher;
//!
//! let policy = SeedPolicy::single_length(3, 0, 0);
//! let matcher = SeedMatcher::new(&policy, 4)?;
//! let sites = matcher.find_sites(b"AUGCAUGC", b"AUGC")?;
//!
//! assert_eq!(sites.len(), 1);
//! assert_eq!(sites[0].end_site, 6);
//! # Ok::<(), mirmap_core::types::MirmapError>(())
//! ```

pub mod motif;

use crate::config::SeedPolicy;
use crate::types::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Seed matcher bound to one policy and one minimal site length.
#[derive(Debug)]
pub struct SeedMatcher<'a> {
    policy: &'a SeedPolicy,
    min_target_length: usize,
}

impl<'a> SeedMatcher<'a> {
    /// # Errors
    ///
    /// Returns [`MirmapError::Configuration`] when the policy has no allowed
    /// lengths or lacks a cap for one of them.
    pub fn new(policy: &'a SeedPolicy, min_target_length: usize) -> Result<Self, MirmapError> {
        policy.validate()?;
        Ok(Self {
            policy,
            min_target_length,
        })
    }

    /// Find every accepted site, ordered by `end_site` then by decreasing
    /// seed length.
    ///
    /// Both sequences must be uppercase RNA. An empty miRNA or target yields
    /// an empty list.
    pub fn find_sites(&self, target: &[u8], mirna: &[u8]) -> Result<Vec<CandidateSite>, MirmapError> {
        if target.is_empty() || mirna.is_empty() {
            return Ok(Vec::new());
        }

        let mut lengths = self.policy.allowed_lengths.clone();
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        lengths.dedup();

        let mut best: BTreeMap<usize, CandidateSite> = BTreeMap::new();
        let mut all = Vec::new();

        for length in lengths {
            let (max_mismatches, max_wobbles) = self.caps(length)?;
            let found = self.scan_length(target, mirna, length, max_mismatches, max_wobbles);
            debug!(length, found = found.len(), "seed length scanned");

            for site in found {
                if self.policy.take_best {
                    match best.get(&site.end_site) {
                        Some(current) if !site.is_better_than(current) => {}
                        _ => {
                            best.insert(site.end_site, site);
                        }
                    }
                } else {
                    all.push(site);
                }
            }
        }

        let mut sites: Vec<CandidateSite> = if self.policy.take_best {
            best.into_values().collect()
        } else {
            all
        };
        sites.sort_by(|a, b| {
            a.end_site
                .cmp(&b.end_site)
                .then(b.seed_length.cmp(&a.seed_length))
        });
        Ok(sites)
    }

    fn caps(&self, length: usize) -> Result<(usize, usize), MirmapError> {
        let mismatches = self.policy.allowed_mismatches.get(&length).copied();
        let wobbles = self.policy.allowed_gu_wobbles.get(&length).copied();
        match (mismatches, wobbles) {
            (Some(m), Some(w)) => Ok((m, w)),
            _ => Err(MirmapError::Configuration(format!(
                "no mismatch or wobble cap for seed length {length}"
            ))),
        }
    }

    fn scan_length(
        &self,
        target: &[u8],
        mirna: &[u8],
        length: usize,
        max_mismatches: usize,
        max_wobbles: usize,
    ) -> Vec<CandidateSite> {
        let start = self.policy.mirna_start_pairing;
        let mirna_end = start + length - 1;
        if mirna_end > mirna.len() {
            return Vec::new();
        }

        // Lowest anchor whose seed still starts inside the target.
        let first_end = (start + length - 1).max(self.min_target_length).max(1);
        let mut sites = Vec::new();

        for end_site in first_end..=target.len() {
            let target_start = end_site + 1 - (start + length - 1);
            let target_end = end_site + 1 - start;

            let mut pairs = Vec::with_capacity(length);
            let mut mismatch_count = 0;
            let mut gu_wobble_count = 0;
            for j in start..=mirna_end {
                let pair = PairClass::classify(mirna[j - 1], target[end_site - j]);
                match pair {
                    PairClass::Mismatch => mismatch_count += 1,
                    PairClass::GuWobble => gu_wobble_count += 1,
                    PairClass::WatsonCrick => {}
                }
                if mismatch_count > max_mismatches || gu_wobble_count > max_wobbles {
                    break;
                }
                pairs.push(pair);
            }
            if pairs.len() < length {
                continue;
            }

            sites.push(CandidateSite {
                end_site,
                seed_length: length,
                mismatch_count,
                gu_wobble_count,
                pairing: SitePairing {
                    mirna_start: start,
                    mirna_end,
                    target_start,
                    target_end,
                    pairs,
                },
            });
        }
        sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const KNOWN_TARGET: &str = concat!(
        "GCUACAGUUUUUAUUUAGCAUGGGGAUUGCAGAGUGACCAGCAC",
        "ACUGGACUCCGAGGUGGUUCAGACAAGACAGAGGGGAGCAGUGG",
        "CCAUCAUCCUCCCGCCAGGAGCUUCUUCGUUCCUGCGCAUAUAG",
        "ACUGUACAUUAUGAAGAAUACCCAGGAAGACUUUGUGACUGUCA",
        "CUUGCUGCUUUUUCUGCGCUUCAGUAACAAGUGUUGGCAAACGA",
        "GACUUUCUCCUGGCCCCUGCCUGCUGGAGAUCAGCAUGCCUGUC",
        "CUUUCAGUCUGAUCCAUCCAUCUCUCUCUUGCCUGAGGGGAAAG",
        "AGAGAUGGGCCAGGCAGAGAACAGAACUGGAGGCAGUCCAUCUA",
    );
    const KNOWN_MIRNA: &str = "UAGCAGCACGUAAAUAUUGGCG";

    fn run(policy: &SeedPolicy, target: &str, mirna: &str) -> Vec<CandidateSite> {
        let matcher = SeedMatcher::new(policy, mirna.len()).unwrap();
        matcher.find_sites(target.as_bytes(), mirna.as_bytes()).unwrap()
    }

    #[test]
    fn test_known_site() {
        let sites = run(&SeedPolicy::default(), KNOWN_TARGET, KNOWN_MIRNA);
        assert_eq!(sites.len(), 1);
        let site = &sites[0];
        assert_eq!(site.end_site, 186);
        assert_eq!(site.seed_length, 7);
        assert_eq!(site.mismatch_count, 0);
        assert_eq!(site.gu_wobble_count, 0);
        assert_eq!(site.pairing.target_start, 179);
        assert_eq!(site.pairing.target_end, 185);
        assert_eq!(site.pairing.mirna_start, 2);
        assert_eq!(site.pairing.mirna_end, 8);
        assert_eq!(site.pairing.diagram(), "|||||||");
    }

    #[test]
    fn test_take_best_keeps_one_site_per_anchor() {
        let policy = SeedPolicy {
            take_best: false,
            ..Default::default()
        };
        let all = run(&policy, KNOWN_TARGET, KNOWN_MIRNA);
        // The 7-mer contains the 6-mer at the same anchor.
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].end_site, 186);
        assert_eq!(all[0].seed_length, 7);
        assert_eq!(all[1].end_site, 186);
        assert_eq!(all[1].seed_length, 6);

        let best = run(&SeedPolicy::default(), KNOWN_TARGET, KNOWN_MIRNA);
        let mut anchors: Vec<usize> = best.iter().map(|s| s.end_site).collect();
        anchors.dedup();
        assert_eq!(anchors.len(), best.len());
    }

    #[test]
    fn test_short_mirna_roundtrip() {
        // Pairing from miRNA position 2, a 4-nt miRNA only has room for a 3-nt seed.
        let policy = SeedPolicy::single_length(3, 0, 0);
        let sites = run(&policy, "AUGCAUGC", "AUGC");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].end_site, 6);
        assert_eq!(sites[0].pairing.target_start, 3);
        assert_eq!(sites[0].pairing.target_end, 5);

        // Default 6 and 7-nt seeds would end past miRNA position 4.
        assert!(run(&SeedPolicy::default(), "AUGCAUGC", "AUGC").is_empty());
    }

    #[test]
    fn test_min_target_length_limits_anchors() {
        let policy = SeedPolicy::single_length(3, 0, 0);
        let matcher = SeedMatcher::new(&policy, 7).unwrap();
        let sites = matcher.find_sites(b"AUGCAUGC", b"AUGC").unwrap();
        assert!(sites.is_empty());
    }

    #[test]
    fn test_wobble_and_mismatch_caps() {
        // Seed UGC (miRNA 2-4) faces GCA; the target below reads GUA (wobble at C->U).
        let strict = SeedPolicy::single_length(3, 0, 0);
        assert!(run(&strict, "GUAA", "AUGC").is_empty());

        let wobbly = SeedPolicy::single_length(3, 0, 1);
        let sites = run(&wobbly, "GUAA", "AUGC");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].end_site, 4);
        assert_eq!(sites[0].gu_wobble_count, 1);
        assert_eq!(sites[0].mismatch_count, 0);
        assert_eq!(sites[0].pairing.pairs[1], PairClass::GuWobble);

        let mismatching = SeedPolicy::single_length(3, 1, 0);
        let sites = run(&mismatching, "GAAA", "AUGC");
        assert!(sites.iter().any(|s| s.end_site == 4 && s.mismatch_count == 1));
        assert!(sites.iter().all(|s| s.mismatch_count <= 1 && s.gu_wobble_count == 0));
    }

    #[test]
    fn test_count_matches_brute_force() {
        let target = "GCAUAGCAUUGCAUCGCAUGGCACUGCAUAGCAUU";
        let mirna = "AUGCAUGA";
        let policy = SeedPolicy {
            allowed_lengths: vec![3, 4],
            allowed_mismatches: BTreeMap::from([(3, 0), (4, 0)]),
            allowed_gu_wobbles: BTreeMap::from([(3, 0), (4, 0)]),
            take_best: false,
            ..Default::default()
        };
        let sites = run(&policy, target, mirna);

        let t = target.as_bytes();
        let m = mirna.as_bytes();
        let mut expected = 0;
        for length in [3usize, 4] {
            for end in (1 + length).max(mirna.len())..=t.len() {
                let ok = (2..=1 + length).all(|j| {
                    PairClass::classify(m[j - 1], t[end - j]) == PairClass::WatsonCrick
                });
                if ok {
                    expected += 1;
                }
            }
        }
        assert_eq!(sites.len(), expected);
        assert!(sites.windows(2).all(|w| {
            w[0].end_site < w[1].end_site
                || (w[0].end_site == w[1].end_site && w[0].seed_length > w[1].seed_length)
        }));
    }

    #[test]
    fn test_empty_inputs() {
        let policy = SeedPolicy::default();
        let matcher = SeedMatcher::new(&policy, 22).unwrap();
        assert!(matcher.find_sites(b"", KNOWN_MIRNA.as_bytes()).unwrap().is_empty());
        assert!(matcher.find_sites(b"ACGU", b"").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_policy() {
        let policy = SeedPolicy {
            allowed_lengths: vec![],
            ..Default::default()
        };
        assert!(matches!(
            SeedMatcher::new(&policy, 4),
            Err(MirmapError::Configuration(_))
        ));
    }
}
