//! Conservation of site motifs across aligned species.
//!
//! The first alignment row is the transcript. A species supports a site when
//! its ungapped row contains the site motif. With fewer than two supporting
//! species both features fall back to their neutral values (BLS 0, phyloP
//! p-value 1) without any engine call. Every site gets the neutral values
//! when no alignment is configured, and the neutral p-value when no phyloP
//! model file is.

use crate::config::EvolutionConfig;
use crate::constants::*;
use crate::engines::{EngineSet, PhyloEngine, PhyloPRequest, TreeFitRequest};
use crate::features::{
    Availability, EvaluationContext, FeatureColumns, FeatureEvaluator, FeatureKind,
};
use crate::phylogeny::SpeciesTree;
use crate::seed::motif::{motif_coordinates, motif_sequence};
use crate::sequence::alignment::Alignment;
use crate::types::*;
use std::sync::OnceLock;
use tracing::{debug, info};

fn load_alignment(config: &EvolutionConfig) -> Result<Alignment, MirmapError> {
    match (&config.alignment_path, &config.alignment_text) {
        (Some(path), _) => Alignment::from_path(path, config.alignment_format, &config.alphabet),
        (None, Some(text)) => Alignment::from_text(text, config.alignment_format, &config.alphabet),
        (None, None) => Err(MirmapError::Configuration(
            "no alignment configured".to_string(),
        )),
    }
}

/// Target span and DNA motif of every site.
fn site_motifs(
    ctx: &EvaluationContext<'_>,
    config: &EvolutionConfig,
) -> Vec<((usize, usize), String)> {
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
            let motif = String::from_utf8_lossy(motif_sequence(target, span)).replace('U', "T");
            (span, motif)
        })
        .collect()
}

fn phylo_engine<'e>(engines: &'e EngineSet) -> Result<&'e dyn PhyloEngine, MirmapError> {
    engines
        .phylo
        .as_deref()
        .ok_or_else(|| MirmapError::MissingEngine("phylogenetic engine".to_string()))
}

/// Branch length score of the species sharing each site motif.
#[derive(Debug, Default)]
pub struct ConsBls {
    config: EvolutionConfig,
    fitted_tree: OnceLock<String>,
}

impl ConsBls {
    #[must_use]
    pub fn new(config: EvolutionConfig) -> Self {
        Self {
            config,
            fitted_tree: OnceLock::new(),
        }
    }

    fn tree(&self, alignment: &Alignment, engines: &EngineSet) -> Result<SpeciesTree, MirmapError> {
        let newick = self
            .config
            .tree
            .as_deref()
            .ok_or_else(|| MirmapError::Configuration("no species tree configured".to_string()))?;
        if !self.config.fitting_tree {
            return SpeciesTree::parse(newick);
        }
        if let Some(fitted) = self.fitted_tree.get() {
            return SpeciesTree::parse(fitted);
        }
        let engine = phylo_engine(engines)?;
        info!("Fitting branch lengths with {}", engine.name());
        let fitted = engine.fit_tree(&TreeFitRequest {
            alignment: &alignment.to_fasta(),
            tree: newick,
            subst_model: &self.config.subst_model,
            use_em: self.config.use_em,
        })?;
        let tree = SpeciesTree::parse(&fitted)?;
        let _ = self.fitted_tree.set(fitted);
        Ok(tree)
    }
}

impl FeatureEvaluator for ConsBls {
    fn name(&self) -> &'static str {
        "cons_bls"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::ConsBls]
    }

    fn availability(&self, engines: &EngineSet) -> Availability {
        if !self.config.has_alignment() {
            Availability::Ready
        } else if self.config.tree.is_none() {
            Availability::MissingInput("cons_bls needs a species tree".to_string())
        } else if self.config.fitting_tree && !engines.has_phylo() {
            Availability::MissingEngine("phylogenetic engine".to_string())
        } else {
            Availability::Ready
        }
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        if !self.config.has_alignment() {
            return Ok(vec![(FeatureKind::ConsBls, vec![NEUTRAL_BLS; ctx.sites.len()])]);
        }
        let alignment = load_alignment(&self.config)?;
        let mut tree = None;
        let mut values = Vec::with_capacity(ctx.sites.len());

        for (_, motif) in site_motifs(ctx, &self.config) {
            let species = alignment.species_with_motif(&motif);
            if species.len() < MIN_SUPPORTING_SPECIES {
                values.push(NEUTRAL_BLS);
                continue;
            }
            if tree.is_none() {
                tree = Some(self.tree(&alignment, ctx.engines)?);
            }
            let score = tree
                .as_ref()
                .map_or(NEUTRAL_BLS, |t| t.branch_length_score(&species));
            debug!(motif = %motif, species = species.len(), score, "branch length score");
            values.push(score);
        }
        Ok(vec![(FeatureKind::ConsBls, values)])
    }
}

/// phyloP p-value of each site motif over the supporting species.
#[derive(Debug, Clone, Default)]
pub struct SelecPhylop {
    config: EvolutionConfig,
}

impl SelecPhylop {
    #[must_use]
    pub const fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }
}

impl FeatureEvaluator for SelecPhylop {
    fn name(&self) -> &'static str {
        "selec_phylop"
    }

    fn provides(&self) -> &'static [FeatureKind] {
        &[FeatureKind::SelecPhylop]
    }

    fn availability(&self, engines: &EngineSet) -> Availability {
        if !self.config.has_alignment() || self.config.model_file.is_none() {
            Availability::Ready
        } else if !engines.has_phylo() {
            Availability::MissingEngine("phylogenetic engine".to_string())
        } else {
            Availability::Ready
        }
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<FeatureColumns, MirmapError> {
        let model_file = match self.config.model_file.as_deref() {
            Some(path) if self.config.has_alignment() => path,
            _ => {
                return Ok(vec![(
                    FeatureKind::SelecPhylop,
                    vec![NEUTRAL_PHYLOP; ctx.sites.len()],
                )]);
            }
        };
        let alignment = load_alignment(&self.config)?;
        let mut values = Vec::with_capacity(ctx.sites.len());

        for ((start, end), motif) in site_motifs(ctx, &self.config) {
            let species = alignment.species_with_motif(&motif);
            if species.len() < MIN_SUPPORTING_SPECIES {
                values.push(NEUTRAL_PHYLOP);
                continue;
            }
            let engine = phylo_engine(ctx.engines)?;
            let (first, last) = alignment.reference_columns(start, end)?;
            let block = alignment.extract_fasta(&species, first, last);
            let pvalue = engine.phylop(&PhyloPRequest {
                alignment: &block,
                model_file,
                method: &self.config.method,
                mode: &self.config.mode,
            })?;
            debug!(motif = %motif, species = species.len(), pvalue, "phyloP");
            values.push(pvalue);
        }
        Ok(vec![(FeatureKind::SelecPhylop, values)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::EngineError;
    use crate::features::FeatureStore;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const TARGET: &str = "ACGUUGCUGCUAACG";
    // UGCUGC (target 5-10) is shared by hg19, panTro2 and mm9.
    const ALIGNMENT: &str = ">hg19\nACGTTGCTGCTAACG\n>panTro2\nACGTTGC-TGCTAACG\n\
                             >mm9\nACG-TGCTGCTAAC-\n>canFam2\nACGTTGCAGCTAACG\n";
    const TREE: &str = "(((hg19:0.1,panTro2:0.2):0.3,mm9:0.4):0.5,canFam2:0.6);";

    #[derive(Default)]
    struct FakePhylo {
        fits: AtomicUsize,
        blocks: Mutex<Vec<String>>,
    }

    impl PhyloEngine for FakePhylo {
        fn name(&self) -> &str {
            "fake"
        }

        fn fit_tree(&self, request: &TreeFitRequest<'_>) -> Result<String, EngineError> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            assert!(request.alignment.starts_with(">hg19\n"));
            Ok("(((hg19:1,panTro2:1):1,mm9:1):1,canFam2:1);".to_string())
        }

        fn phylop(&self, request: &PhyloPRequest<'_>) -> Result<f64, EngineError> {
            self.blocks
                .lock()
                .unwrap()
                .push(request.alignment.to_string());
            Ok(0.01)
        }
    }

    fn site(end_site: usize) -> CandidateSite {
        CandidateSite {
            end_site,
            seed_length: 6,
            mismatch_count: 0,
            gu_wobble_count: 0,
            pairing: SitePairing {
                mirna_start: 2,
                mirna_end: 7,
                target_start: end_site - 6,
                target_end: end_site - 1,
                pairs: vec![PairClass::WatsonCrick; 6],
            },
        }
    }

    fn config() -> EvolutionConfig {
        EvolutionConfig {
            alignment_text: Some(ALIGNMENT.to_string()),
            tree: Some(TREE.to_string()),
            fitting_tree: false,
            ..Default::default()
        }
    }

    fn evaluate(
        evaluator: &dyn FeatureEvaluator,
        sites: &[CandidateSite],
        engines: &EngineSet,
    ) -> Result<FeatureColumns, MirmapError> {
        let store = FeatureStore::new(sites.len());
        let ctx = EvaluationContext {
            target: TARGET,
            mirna: "UAGCAGCACGUAAAUAUUGGCG",
            sites,
            min_target_length: 22,
            mirna_start_pairing: 2,
            engines,
            store: &store,
        };
        evaluator.evaluate(&ctx)
    }

    #[test]
    fn test_bls_with_given_tree() {
        let sites = vec![site(11), site(15)];
        let columns = evaluate(&ConsBls::new(config()), &sites, &EngineSet::none()).unwrap();
        let values = &columns[0].1;
        assert!((values[0] - (0.1 + 0.2 + 0.3 + 0.4)).abs() < 1e-12);
        // GCUAAC is shared by all four species.
        assert!((values[1] - 2.1).abs() < 1e-12);
    }

    #[test]
    fn test_bls_neutral_without_support() {
        let phylo = Arc::new(FakePhylo::default());
        let engines = EngineSet::none().with_phylo(phylo.clone());
        let single = EvolutionConfig {
            alignment_text: Some(">hg19\nACGTTGCTGCTAACG\n>mm9\nACGTTGGGGGGAACG\n".to_string()),
            fitting_tree: true,
            ..config()
        };
        let columns = evaluate(&ConsBls::new(single), &[site(11)], &engines).unwrap();
        assert_eq!(columns[0].1, vec![NEUTRAL_BLS]);
        assert_eq!(phylo.fits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_neutral_without_alignment() {
        let engines = EngineSet::none();
        let sites = vec![site(11), site(15)];
        let bls = evaluate(&ConsBls::new(EvolutionConfig::default()), &sites, &engines).unwrap();
        assert_eq!(bls, vec![(FeatureKind::ConsBls, vec![0.0, 0.0])]);

        let phylop = SelecPhylop::new(EvolutionConfig::default());
        assert_eq!(phylop.availability(&engines), Availability::Ready);
        let columns = evaluate(&phylop, &sites, &engines).unwrap();
        assert_eq!(columns, vec![(FeatureKind::SelecPhylop, vec![1.0, 1.0])]);

        // Alignment but no phyloP model
        let columns = evaluate(&SelecPhylop::new(config()), &sites, &engines).unwrap();
        assert_eq!(columns[0].1, vec![1.0, 1.0]);
    }

    #[test]
    fn test_tree_fitted_once() {
        let phylo = Arc::new(FakePhylo::default());
        let engines = EngineSet::none().with_phylo(phylo.clone());
        let evaluator = ConsBls::new(EvolutionConfig {
            fitting_tree: true,
            ..config()
        });
        let sites = vec![site(11), site(11)];
        let columns = evaluate(&evaluator, &sites, &engines).unwrap();
        assert_eq!(columns[0].1, vec![4.0, 4.0]);
        evaluate(&evaluator, &sites, &engines).unwrap();
        assert_eq!(phylo.fits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bls_availability() {
        let engines = EngineSet::none();
        assert_eq!(ConsBls::new(config()).availability(&engines), Availability::Ready);
        assert_eq!(
            ConsBls::new(EvolutionConfig::default()).availability(&engines),
            Availability::Ready
        );
        let no_tree = EvolutionConfig {
            tree: None,
            ..config()
        };
        assert!(matches!(
            ConsBls::new(no_tree).availability(&engines),
            Availability::MissingInput(_)
        ));
        let fitting = EvolutionConfig {
            fitting_tree: true,
            ..config()
        };
        assert!(matches!(
            ConsBls::new(fitting).availability(&engines),
            Availability::MissingEngine(_)
        ));
    }

    #[test]
    fn test_phylop_block() {
        let phylo = Arc::new(FakePhylo::default());
        let engines = EngineSet::none().with_phylo(phylo.clone());
        let evaluator = SelecPhylop::new(EvolutionConfig {
            model_file: Some(PathBuf::from("model.mod")),
            ..config()
        });
        let columns = evaluate(&evaluator, &[site(11)], &engines).unwrap();
        assert_eq!(columns[0].1, vec![0.01]);

        let blocks = phylo.blocks.lock().unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with(">hg19\n"));
        assert!(!blocks[0].contains("canFam2"));
        assert!(blocks[0].contains(">mm9\n"));
    }

    #[test]
    fn test_phylop_availability() {
        let phylo = Arc::new(FakePhylo::default());
        let with_engine = EngineSet::none().with_phylo(phylo);
        assert_eq!(
            SelecPhylop::new(config()).availability(&EngineSet::none()),
            Availability::Ready
        );
        let modeled = EvolutionConfig {
            model_file: Some(PathBuf::from("model.mod")),
            ..config()
        };
        assert_eq!(
            SelecPhylop::new(modeled.clone()).availability(&with_engine),
            Availability::Ready
        );
        assert!(matches!(
            SelecPhylop::new(modeled).availability(&EngineSet::none()),
            Availability::MissingEngine(_)
        ));
    }
}
