use crate::types::*;
use bio::io::fasta;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Sequence name and sequence, in file order.
pub type NamedSequence = (String, String);

/// Read every record of a FASTA file.
///
/// Multi-line sequences are concatenated; with `upper` the sequences are
/// uppercased.
pub fn read_fasta_sequences<P: AsRef<Path>>(
    path: P,
    upper: bool,
) -> Result<Vec<NamedSequence>, MirmapError> {
    let file = File::open(path)?;
    read_fasta(file, upper)
}

/// Parse FASTA records held in memory.
pub fn parse_fasta_str(text: &str, upper: bool) -> Result<Vec<NamedSequence>, MirmapError> {
    read_fasta(text.as_bytes(), upper)
}

fn read_fasta<R: Read>(source: R, upper: bool) -> Result<Vec<NamedSequence>, MirmapError> {
    let reader = fasta::Reader::new(source);
    let mut sequences = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| MirmapError::ParseError(e.to_string()))?;
        let mut seq = String::from_utf8(record.seq().to_vec())
            .map_err(|e| MirmapError::ParseError(format!("{}: {e}", record.id())))?;
        if upper {
            seq.make_ascii_uppercase();
        }
        sequences.push((record.id().to_string(), seq));
    }

    Ok(sequences)
}

/// Read a two-column `name<TAB>sequence` file. Blank lines are ignored.
pub fn read_tabular_sequences<P: AsRef<Path>>(path: P) -> Result<Vec<NamedSequence>, MirmapError> {
    let text = fs::read_to_string(path)?;
    let mut sequences = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        match line.split_once('\t') {
            Some((name, seq)) if !seq.contains('\t') => {
                sequences.push((name.to_string(), seq.to_string()));
            }
            _ => {
                return Err(MirmapError::ParseError(format!(
                    "line {}: expected two tab-separated columns",
                    number + 1
                )));
            }
        }
    }
    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_fasta_sequences_basic() {
        let dir = tempdir().unwrap();
        let temp_file = dir.path().join("test.fa");
        fs::write(&temp_file, ">test_sequence\nAUCG\nGCUA\n").unwrap();

        let result = read_fasta_sequences(&temp_file, false);
        assert!(result.is_ok());

        let sequences = result.unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].0, "test_sequence");
        assert_eq!(sequences[0].1, "AUCGGCUA");
    }

    #[test]
    fn test_read_fasta_uppercase() {
        let sequences = parse_fasta_str(">mir desc\nuagcagc\n>t2\nAcg\n", true).unwrap();
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0], ("mir".to_string(), "UAGCAGC".to_string()));
        assert_eq!(sequences[1].1, "ACG");

        let kept = parse_fasta_str(">mir\nuagc\n", false).unwrap();
        assert_eq!(kept[0].1, "uagc");
    }

    #[test]
    fn test_read_fasta_empty() {
        let sequences = parse_fasta_str("", false).unwrap();
        assert!(sequences.is_empty());
    }

    #[test]
    fn test_read_fasta_file_not_found() {
        let result = read_fasta_sequences("nonexistent_file.fa", false);
        match result {
            Err(MirmapError::IoError(_)) => {}
            _ => panic!("Expected IoError for missing file"),
        }
    }

    #[test]
    fn test_read_tabular() {
        let dir = tempdir().unwrap();
        let temp_file = dir.path().join("test.tsv");
        fs::write(&temp_file, "mir-1\tUAGC\n\nmir-2\tUUGC\n").unwrap();

        let sequences = read_tabular_sequences(&temp_file).unwrap();
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[1], ("mir-2".to_string(), "UUGC".to_string()));

        fs::write(&temp_file, "mir-1 UAGC\n").unwrap();
        assert!(matches!(
            read_tabular_sequences(&temp_file),
            Err(MirmapError::ParseError(_))
        ));
    }
}
