//! # miRmap CLI - Command-Line miRNA Target Prediction
//!
//! Scores every miRNA against every transcript and prints tab-delimited rows.
//!
//! ## Usage
//!
//! ```bash
//! # One miRNA against one transcript
//! mirmap -m UAGCAGCACGUAAAUAUUGGCG -t GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGG...
//!
//! # FASTA inputs, one row per pair
//! mirmap -a mirnas.fa -f utrs.fa -c -o predictions.tsv
//!
//! # Conservation features from per-transcript alignments and models
//! mirmap -a mirnas.fa -f utrs.fa -s alignments/ -d models/ -w 8
//! ```
//!
//! ## Options
//!
//! - `-m, --mirna <SEQ>`: miRNA sequence (repeatable)
//! - `-n, --mirna-id <ID>`: miRNA identifiers (repeatable)
//! - `-a, --mirna-fasta <FILE>`: miRNA FASTA file
//! - `-b, --mirna-tab <FILE>`: miRNA tab-delimited file
//! - `-t, --transcript <SEQ>`: transcript sequence (repeatable)
//! - `-i, --transcript-id <ID>`: transcript identifiers (repeatable)
//! - `-f, --transcript-fasta <FILE>`: transcript FASTA file
//! - `-u, --transcript-tab <FILE>`: transcript tab-delimited file
//! - `-z, --site-id`: add a site index column
//! - `-c, --combine`: one row per miRNA/transcript pair
//! - `-e, --exe <DIR>`: directory holding the ViennaRNA and PHAST programs
//! - `--no-engines`: never call external programs
//! - `-s, --aln <DIR>`: per-transcript alignments (`<id>.fa`)
//! - `-d, --mod <DIR>`: per-transcript phylogenetic models (`<id>.mod`)
//! - `--tree <FILE>`: species tree in Newick format
//! - `-o, --output <FILE>`: output file (default: stdout)
//! - `-w, --workers <N>`: worker threads (default: all cores)
//! - `-g, --logging-level <LEVEL>`: log level (default: info)
//! - `--config <FILE>`: JSON configuration overrides
//!
//! Logs go to stderr. `RUST_LOG` takes precedence over `--logging-level`.
//!
//! With FASTA input, `-n`/`-i` select the records to score. With inline
//! sequences they name them, in order; unnamed sequences are numbered from 1.

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use mirmap_core::config::MirmapConfig;
use mirmap_core::engines::EngineSet;
use mirmap_core::output::{RowOptions, write_outcomes};
use mirmap_core::sequence::io::{NamedSequence, read_fasta_sequences, read_tabular_sequences};
use mirmap_core::MirmapAnalyzer;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Argument names of one sequence source.
struct SequenceArgs {
    label: &'static str,
    inline: &'static str,
    ids: &'static str,
    fasta: &'static str,
    tab: &'static str,
}

const MIRNA_ARGS: SequenceArgs = SequenceArgs {
    label: "miRNA",
    inline: "mirna",
    ids: "mirna-id",
    fasta: "mirna-fasta",
    tab: "mirna-tab",
};

const TRANSCRIPT_ARGS: SequenceArgs = SequenceArgs {
    label: "transcript",
    inline: "transcript",
    ids: "transcript-id",
    fasta: "transcript-fasta",
    tab: "transcript-tab",
};

fn build_cli() -> Command {
    Command::new("mirmap")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Predict miRNA targets")
        .arg(
            Arg::new("mirna")
                .short('m')
                .long("mirna")
                .value_name("SEQ")
                .action(ArgAction::Append)
                .help("miRNA sequence"),
        )
        .arg(
            Arg::new("mirna-id")
                .short('n')
                .long("mirna-id")
                .value_name("ID")
                .action(ArgAction::Append)
                .help("miRNA IDs"),
        )
        .arg(
            Arg::new("mirna-fasta")
                .short('a')
                .long("mirna-fasta")
                .value_name("FILE")
                .help("miRNA FASTA file"),
        )
        .arg(
            Arg::new("mirna-tab")
                .short('b')
                .long("mirna-tab")
                .value_name("FILE")
                .help("miRNA tab-delimited file"),
        )
        .group(
            ArgGroup::new("mirnas")
                .args(["mirna", "mirna-fasta", "mirna-tab"])
                .required(true),
        )
        .arg(
            Arg::new("transcript")
                .short('t')
                .long("transcript")
                .value_name("SEQ")
                .action(ArgAction::Append)
                .help("Transcript sequence"),
        )
        .arg(
            Arg::new("transcript-id")
                .short('i')
                .long("transcript-id")
                .value_name("ID")
                .action(ArgAction::Append)
                .help("Transcript IDs"),
        )
        .arg(
            Arg::new("transcript-fasta")
                .short('f')
                .long("transcript-fasta")
                .value_name("FILE")
                .help("Transcript FASTA file"),
        )
        .arg(
            Arg::new("transcript-tab")
                .short('u')
                .long("transcript-tab")
                .value_name("FILE")
                .help("Transcript tab-delimited file"),
        )
        .group(
            ArgGroup::new("transcripts")
                .args(["transcript", "transcript-fasta", "transcript-tab"])
                .required(true),
        )
        .arg(
            Arg::new("site-id")
                .short('z')
                .long("site-id")
                .action(ArgAction::SetTrue)
                .help("Add a column with site IDs"),
        )
        .arg(
            Arg::new("combine")
                .short('c')
                .long("combine")
                .action(ArgAction::SetTrue)
                .help("One row per miRNA/transcript pair"),
        )
        .arg(
            Arg::new("exe")
                .short('e')
                .long("exe")
                .value_name("DIR")
                .help("External programs path"),
        )
        .arg(
            Arg::new("no-engines")
                .long("no-engines")
                .action(ArgAction::SetTrue)
                .conflicts_with("exe")
                .help("Do not use external programs"),
        )
        .arg(
            Arg::new("aln")
                .short('s')
                .long("aln")
                .value_name("DIR")
                .help("Multiple sequence alignments path"),
        )
        .arg(
            Arg::new("mod")
                .short('d')
                .long("mod")
                .value_name("DIR")
                .help("Phylogenetic models path"),
        )
        .arg(
            Arg::new("tree")
                .long("tree")
                .value_name("FILE")
                .help("Species tree in Newick format"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file (default: stdout)"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Worker threads (default: all cores)"),
        )
        .arg(
            Arg::new("logging-level")
                .short('g')
                .long("logging-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("Logging level"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file"),
        )
}

fn init_logging(level: &str) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| format!("Invalid logging level '{level}': {e}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn load_sequences(
    matches: &ArgMatches,
    args: &SequenceArgs,
) -> Result<Vec<NamedSequence>, Box<dyn Error>> {
    let ids = strings(matches, args.ids);

    if let Some(path) = matches.get_one::<String>(args.fasta) {
        let mut sequences = read_fasta_sequences(path, false)?;
        if !ids.is_empty() {
            sequences.retain(|(name, _)| ids.contains(name));
        }
        return Ok(sequences);
    }
    if let Some(path) = matches.get_one::<String>(args.tab) {
        return Ok(read_tabular_sequences(path)?);
    }

    let sequences = strings(matches, args.inline);
    if ids.is_empty() {
        return Ok((1..)
            .map(|i: usize| i.to_string())
            .zip(sequences)
            .collect());
    }
    if ids.len() != sequences.len() {
        return Err(format!(
            "{} {} IDs given for {} sequences",
            ids.len(),
            args.label,
            sequences.len()
        )
        .into());
    }
    Ok(ids.into_iter().zip(sequences).collect())
}

fn load_config(matches: &ArgMatches) -> Result<MirmapConfig, Box<dyn Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => MirmapConfig::from_json_file(path)?,
        None => MirmapConfig::default(),
    };
    if let Some(&workers) = matches.get_one::<usize>("workers") {
        config.num_threads = Some(workers);
    }
    if let Some(path) = matches.get_one::<String>("tree") {
        config.evolution.tree = Some(fs::read_to_string(path)?.trim().to_string());
    }
    config.validate()?;
    Ok(config)
}

/// Main entry point for the miRmap CLI application.
///
/// Parses command-line arguments, loads the sequences, scores every pair and
/// writes the rows.
fn main() -> Result<(), Box<dyn Error>> {
    let matches = build_cli().get_matches();

    if let Some(level) = matches.get_one::<String>("logging-level") {
        init_logging(level)?;
    }

    let config = load_config(&matches)?;
    let mirnas = load_sequences(&matches, &MIRNA_ARGS)?;
    let transcripts = load_sequences(&matches, &TRANSCRIPT_ARGS)?;
    info!(
        "Starting predictions with {} miRNA(s) and {} transcript(s)",
        mirnas.len(),
        transcripts.len()
    );

    let engines = if matches.get_flag("no-engines") {
        EngineSet::none()
    } else {
        let exe_dir = matches.get_one::<String>("exe").map(Path::new);
        EngineSet::discover(exe_dir, &config.thermodynamics)
    };

    let mut analyzer = MirmapAnalyzer::new(config, engines);
    if let Some(dir) = matches.get_one::<String>("aln") {
        analyzer = analyzer.with_alignment_dir(dir);
    }
    if let Some(dir) = matches.get_one::<String>("mod") {
        analyzer = analyzer.with_model_dir(dir);
    }

    let outcomes = analyzer.analyze_all(&mirnas, &transcripts)?;

    let mut writer: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(path) if path != "-" => Box::new(BufWriter::new(File::create(path)?)),
        _ => Box::new(BufWriter::new(io::stdout())),
    };
    let options = RowOptions {
        combine: matches.get_flag("combine"),
        site_id: matches.get_flag("site-id"),
    };
    write_outcomes(&mut writer, &outcomes, options)?;
    writer.flush()?;

    match mirnas.as_slice() {
        [(id, _)] => info!("Predictions ready for miRNA {id}"),
        _ => info!("Predictions ready"),
    }
    Ok(())
}
