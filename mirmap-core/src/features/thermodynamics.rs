use crate::engines::{DuplexEngine, DuplexRequest, EngineSet};
use crate::features::{
    Availability, EvaluationContext, FeatureColumns, FeatureEvaluator, FeatureKind,
};
use crate::types::*;
use tracing::debug;

/// Duplex energies of every site, delegated to the session's duplex engine.
///
/// Each site is folded twice: once over the whole site window
/// (`min_target_length` bases ending at `end_site`) against the full miRNA,
/// and once over the seed window against the miRNA 5′ end up to the last
/// seed position.
#[derive(Debug, Clone, Copy, Default)]
pub struct Thermodynamics;

const PROVIDED: [FeatureKind; 6] = [
    FeatureKind::DgDuplex,
    FeatureKind::DgBinding,
    FeatureKind::DgDuplexSeed,
    FeatureKind::DgBindingSeed,
    FeatureKind::DgOpen,
    FeatureKind::DgTotal,
];

pub(crate) fn site_region(site: &CandidateSite, min_target_length: usize) -> (usize, usize) {
    (
        (site.end_site + 1).saturating_sub(min_target_length).max(1),
        site.end_site,
    )
}

impl Thermodynamics {
    fn engine<'e>(engines: &'e EngineSet) -> Result<&'e dyn DuplexEngine, MirmapError> {
        engines
            .duplex
            .as_deref()
            .ok_or_else(|| MirmapError::MissingEngine("duplex folding engine".to_string()))
    }
}

impl FeatureEvaluator for Thermodynamics {
    fn name(&self) -> &'static str {
        "thermodynamics"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &PROVIDED
    }

    fn availability(&self, engines: &EngineSet) -> Availability {
        if engines.has_duplex() {
            Availability::Ready
        } else {
            Availability::MissingEngine("duplex folding engine".to_string())
        }
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let engine = Self::engine(ctx.engines)?;
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(ctx.sites.len()); PROVIDED.len()];

        for site in ctx.sites {
            if site.pairing.mirna_end > ctx.mirna.len() {
                return Err(MirmapError::InvalidSequence(format!(
                    "seed of site {} extends past the miRNA",
                    site.end_site
                )));
            }
            let full = engine.fold(&DuplexRequest {
                mirna: ctx.mirna,
                target: ctx.target,
                region: site_region(site, ctx.min_target_length),
            })?;
            let seed = engine.fold(&DuplexRequest {
                mirna: &ctx.mirna[..site.pairing.mirna_end],
                target: ctx.target,
                region: (site.pairing.target_start, site.end_site),
            })?;
            debug!(
                end_site = site.end_site,
                dg_duplex = full.dg_duplex,
                dg_open = full.dg_open,
                "site folded with {}",
                engine.name()
            );

            columns[0].push(full.dg_duplex);
            columns[1].push(full.dg_binding);
            columns[2].push(seed.dg_duplex);
            columns[3].push(seed.dg_binding);
            columns[4].push(full.dg_open);
            columns[5].push(full.dg_total);
        }

        Ok(PROVIDED.iter().copied().zip(columns).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{DuplexEnergies, EngineError};
    use crate::features::FeatureStore;
    use std::sync::{Arc, Mutex};

    /// Records every request and answers with energies derived from its window.
    #[derive(Default)]
    struct RecordingEngine {
        requests: Mutex<Vec<(String, (usize, usize))>>,
    }

    impl DuplexEngine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }

        fn fold(&self, request: &DuplexRequest<'_>) -> Result<DuplexEnergies, EngineError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.mirna.to_string(), request.region));
            let width = (request.region.1 - request.region.0 + 1) as f64;
            Ok(DuplexEnergies {
                dg_duplex: -width,
                dg_binding: -width / 2.0,
                dg_open: 3.0,
                dg_total: 3.0 - width / 2.0,
            })
        }
    }

    fn site(end_site: usize) -> CandidateSite {
        CandidateSite {
            end_site,
            seed_length: 7,
            mismatch_count: 0,
            gu_wobble_count: 0,
            pairing: SitePairing {
                mirna_start: 2,
                mirna_end: 8,
                target_start: end_site - 7,
                target_end: end_site - 1,
                pairs: vec![PairClass::WatsonCrick; 7],
            },
        }
    }

    #[test]
    fn test_requests_and_columns() {
        let engine = Arc::new(RecordingEngine::default());
        let engines = EngineSet::none().with_duplex(engine.clone());
        let target = "ACGU".repeat(10);
        let mirna = "UAGCAGCACGUAAAUAUUGGCG";
        let sites = vec![site(12), site(40)];
        let store = FeatureStore::new(2);
        let ctx = EvaluationContext {
            target: &target,
            mirna,
            sites: &sites,
            min_target_length: 22,
            mirna_start_pairing: 2,
            engines: &engines,
            store: &store,
        };

        let columns = Thermodynamics.evaluate(&ctx).unwrap();
        assert_eq!(columns.len(), 6);
        assert_eq!(columns[0].0, FeatureKind::DgDuplex);
        // First window is clamped to the transcript start.
        assert_eq!(columns[0].1, vec![-12.0, -22.0]);
        assert_eq!(columns[2].0, FeatureKind::DgDuplexSeed);
        assert_eq!(columns[2].1, vec![-8.0, -8.0]);
        assert_eq!(columns[4].1, vec![3.0, 3.0]);

        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0], (mirna.to_string(), (1, 12)));
        assert_eq!(requests[1], ("UAGCAGCA".to_string(), (5, 12)));
        assert_eq!(requests[2].1, (19, 40));
    }

    #[test]
    fn test_missing_engine() {
        let engines = EngineSet::none();
        assert!(matches!(
            Thermodynamics.availability(&engines),
            Availability::MissingEngine(_)
        ));
        let store = FeatureStore::new(0);
        let ctx = EvaluationContext {
            target: "ACGU",
            mirna: "ACGU",
            sites: &[],
            min_target_length: 4,
            mirna_start_pairing: 2,
            engines: &engines,
            store: &store,
        };
        assert!(matches!(
            Thermodynamics.evaluate(&ctx),
            Err(MirmapError::MissingEngine(_))
        ));
    }
}
