use crate::constants::{PHAST_FIT, PHAST_PHYLOP};
use crate::engines::{
    EngineError, PhyloEngine, PhyloPRequest, TreeFitRequest, locate_program, run_program,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Phylogenetic engine backed by the PHAST `phyloFit` and `phyloP` programs.
///
/// Alignments are written to a private temporary directory for every call.
#[derive(Debug, Clone)]
pub struct PhastCli {
    phylofit: PathBuf,
    phylop: PathBuf,
    timeout: Option<Duration>,
}

impl PhastCli {
    pub fn locate(dir: Option<&Path>) -> Result<Self, EngineError> {
        Ok(Self {
            phylofit: locate_program(PHAST_FIT, dir)?,
            phylop: locate_program(PHAST_PHYLOP, dir)?,
            timeout: None,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

fn workspace(program: &str, alignment: &str) -> Result<(TempDir, PathBuf), EngineError> {
    let io_failed = |e: std::io::Error| EngineError::Failed {
        program: program.to_string(),
        message: e.to_string(),
    };
    let dir = tempfile::Builder::new()
        .prefix("mirmap-phast")
        .tempdir()
        .map_err(io_failed)?;
    let aln = dir.path().join("aln.fa");
    fs::write(&aln, alignment).map_err(io_failed)?;
    Ok((dir, aln))
}

/// Newick tree stored on the `TREE:` line of a phyloFit model.
#[must_use]
pub fn tree_from_model(model: &str) -> Option<String> {
    let start = model.find("TREE: ")? + "TREE: ".len();
    let end = model[start..].find(';')? + start + 1;
    Some(model[start..end].trim().to_string())
}

/// p-value of a phyloP run, read from the `pval` column of its tabular output.
pub(crate) fn parse_pvalue(output: &str) -> Result<f64, EngineError> {
    let malformed = || EngineError::MalformedOutput {
        program: PHAST_PHYLOP.to_string(),
        output: output.trim().to_string(),
    };
    let mut column = None;
    for line in output.lines() {
        let fields: Vec<&str> = line
            .trim_start_matches('#')
            .split_whitespace()
            .collect();
        if fields.is_empty() {
            continue;
        }
        match column {
            None => column = fields.iter().position(|f| *f == "pval"),
            Some(idx) if !line.starts_with('#') => {
                return fields
                    .get(idx)
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(malformed);
            }
            Some(_) => {}
        }
    }
    Err(malformed())
}

impl PhyloEngine for PhastCli {
    fn name(&self) -> &str {
        "PHAST"
    }

    fn fit_tree(&self, request: &TreeFitRequest<'_>) -> Result<String, EngineError> {
        let (dir, aln) = workspace(PHAST_FIT, request.alignment)?;
        let out_root = dir.path().join("fit");
        let out_root_arg = out_root.to_string_lossy().into_owned();
        let aln_arg = aln.to_string_lossy().into_owned();

        let mut args = vec![
            "--tree",
            request.tree,
            "--subst-mod",
            request.subst_model,
            "--msa-format",
            "FASTA",
            "--out-root",
            out_root_arg.as_str(),
        ];
        if request.use_em {
            args.push("--EM");
        }
        args.push(aln_arg.as_str());
        run_program(&self.phylofit, &args, None, self.timeout)?;

        let model_path = out_root.with_extension("mod");
        let model = fs::read_to_string(&model_path).map_err(|e| EngineError::MalformedOutput {
            program: PHAST_FIT.to_string(),
            output: format!("{}: {e}", model_path.display()),
        })?;
        tree_from_model(&model).ok_or_else(|| EngineError::MalformedOutput {
            program: PHAST_FIT.to_string(),
            output: model,
        })
    }

    fn phylop(&self, request: &PhyloPRequest<'_>) -> Result<f64, EngineError> {
        let (_dir, aln) = workspace(PHAST_PHYLOP, request.alignment)?;
        let model_arg = request.model_file.to_string_lossy().into_owned();
        let aln_arg = aln.to_string_lossy().into_owned();
        let output = run_program(
            &self.phylop,
            &[
                "--method",
                request.method,
                "--mode",
                request.mode,
                "--msa-format",
                "FASTA",
                model_arg.as_str(),
                aln_arg.as_str(),
            ],
            None,
            self.timeout,
        )?;
        parse_pvalue(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "ALPHABET: A C G T \nORDER: 0\nSUBST_MOD: REV\n\
        TREE: ((hg19:0.0064,panTro2:0.0068):0.1,mm9:0.35);\n";

    #[test]
    fn test_tree_from_model() {
        assert_eq!(
            tree_from_model(MODEL).as_deref(),
            Some("((hg19:0.0064,panTro2:0.0068):0.1,mm9:0.35);")
        );
        assert!(tree_from_model("ALPHABET: A C G T\n").is_none());
        assert!(tree_from_model("TREE: (a,b)").is_none());
    }

    #[test]
    fn test_parse_pvalue() {
        let output = "#scale\tlnlratio\tpval\n0.42\t3.10\t0.0123\n";
        assert_eq!(parse_pvalue(output).unwrap(), 0.0123);

        let output = "# phyloP summary\n# scale lnlratio pval\n1.0 0.0 1.0\n";
        assert_eq!(parse_pvalue(output).unwrap(), 1.0);

        assert!(matches!(
            parse_pvalue("no table\n"),
            Err(EngineError::MalformedOutput { .. })
        ));
        assert!(parse_pvalue("#pval\nNaNx\n").is_err());
    }

    #[test]
    fn test_workspace_writes_alignment() {
        let (dir, aln) = workspace(PHAST_PHYLOP, ">a\nACGT\n").unwrap();
        assert!(aln.starts_with(dir.path()));
        assert_eq!(fs::read_to_string(aln).unwrap(), ">a\nACGT\n");
    }
}
