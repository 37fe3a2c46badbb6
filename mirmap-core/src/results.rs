use crate::features::{FeatureGroup, FeatureKind};
use crate::model::Backend;
use crate::types::CandidateSite;
use serde::Serialize;
use std::collections::BTreeMap;

/// Immutable outcome of one miRNA/transcript session.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub mirna: String,
    pub target_length: usize,
    pub sites: Vec<CandidateSite>,
    /// Per-site vectors of every evaluated feature, in site order.
    pub features: BTreeMap<FeatureKind, Vec<f64>>,
    pub summaries: BTreeMap<FeatureKind, f64>,
    /// Features skipped for lack of an engine or an input.
    pub unavailable: Vec<FeatureKind>,
    pub scores: Option<Vec<f64>>,
    pub combined_score: Option<f64>,
    pub model: Option<&'static str>,
    pub backend: Backend,
}

impl PredictionReport {
    #[must_use]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Value of a feature at one site, `None` when it was not evaluated.
    #[must_use]
    pub fn value(&self, kind: FeatureKind, site: usize) -> Option<f64> {
        self.features.get(&kind).and_then(|v| v.get(site)).copied()
    }

    #[must_use]
    pub fn summary(&self, kind: FeatureKind) -> Option<f64> {
        self.summaries.get(&kind).copied()
    }

    #[must_use]
    pub fn score(&self, site: usize) -> Option<f64> {
        self.scores.as_ref().and_then(|s| s.get(site)).copied()
    }

    /// Summaries of one feature family.
    #[must_use]
    pub fn group_summaries(&self, group: FeatureGroup) -> BTreeMap<FeatureKind, f64> {
        self.summaries
            .iter()
            .filter(|(kind, _)| kind.group() == group)
            .map(|(&kind, &value)| (kind, value))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PredictionReport {
        PredictionReport {
            mirna: "UAGCAGCACGUAAAUAUUGGCG".to_string(),
            target_length: 352,
            sites: Vec::new(),
            features: BTreeMap::from([
                (FeatureKind::TgsAu, vec![0.1, 0.3]),
                (FeatureKind::ProbExact, vec![0.5, 0.2]),
            ]),
            summaries: BTreeMap::from([
                (FeatureKind::TgsAu, 0.3),
                (FeatureKind::ProbExact, 0.2),
            ]),
            unavailable: vec![FeatureKind::ConsBls],
            scores: Some(vec![0.4, 0.6]),
            combined_score: Some(0.7),
            model: Some("fallback_seed7"),
            backend: Backend::Fallback,
        }
    }

    #[test]
    fn test_accessors() {
        let r = report();
        assert_eq!(r.value(FeatureKind::TgsAu, 1), Some(0.3));
        assert_eq!(r.value(FeatureKind::TgsAu, 2), None);
        assert_eq!(r.value(FeatureKind::DgOpen, 0), None);
        assert_eq!(r.summary(FeatureKind::ProbExact), Some(0.2));
        assert_eq!(r.score(0), Some(0.4));
        assert_eq!(
            r.group_summaries(FeatureGroup::TargetScan),
            BTreeMap::from([(FeatureKind::TgsAu, 0.3)])
        );
    }

    #[test]
    fn test_json() {
        let json = report().to_json().unwrap();
        assert!(json.contains("\"tgs_au\""));
        assert!(json.contains("\"cons_bls\""));
        assert!(json.contains("\"fallback\""));
    }
}
