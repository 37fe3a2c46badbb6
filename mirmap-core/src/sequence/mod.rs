//! Sequence cleaning and manipulation utilities.
//!
//! Transcripts and miRNAs are handled as uppercase RNA byte strings. Aligned
//! rows keep their DNA alphabet and gap symbols.
//!
//! ## Modules
//!
//! - [`io`]: FASTA and tab-delimited sequence loading
//! - [`alignment`]: Multiple sequence alignments for conservation features
//!
//! ## Examples
//!
//! ```rust
//! use mirmap_core::sequence::{normalize_rna, reverse_complement};
//!
//! assert_eq!(normalize_rna("acgT"), "ACGU");
//! assert_eq!(reverse_complement("AUGC"), "GCAU");
//! assert_eq!(reverse_complement("ATGC"), "GCAT");
//! ```

pub mod alignment;
pub mod io;

use bio::alphabets::dna;

/// Symbol marking an alignment gap.
pub const GAP: u8 = b'-';

/// Uppercase a sequence and convert `T` to `U`.
#[must_use]
pub fn normalize_rna(seq: &str) -> String {
    seq.trim()
        .bytes()
        .map(|b| match b.to_ascii_uppercase() {
            b'T' => 'U',
            other => other as char,
        })
        .collect()
}

/// Keep only the symbols found in `alphabet`.
#[must_use]
pub fn clean_sequence(seq: &str, alphabet: &str) -> String {
    seq.chars().filter(|c| alphabet.contains(*c)).collect()
}

/// Reverse complement of an RNA or DNA sequence.
///
/// Sequences containing `U` are complemented with the RNA table, others with
/// the DNA table. Case is preserved.
#[must_use]
pub fn reverse_complement(seq: &str) -> String {
    if seq.bytes().any(|b| b == b'U' || b == b'u') {
        seq.bytes()
            .rev()
            .map(|b| match b {
                b'A' => 'U',
                b'U' => 'A',
                b'G' => 'C',
                b'C' => 'G',
                b'a' => 'u',
                b'u' => 'a',
                b'g' => 'c',
                b'c' => 'g',
                other => other as char,
            })
            .collect()
    } else {
        String::from_utf8_lossy(&dna::revcomp(seq.as_bytes())).into_owned()
    }
}

/// 1-based alignment column of every residue kept by [`clean_sequence`].
#[must_use]
pub fn coordinate_vector(aligned: &str, alphabet: &str) -> Vec<usize> {
    aligned
        .chars()
        .enumerate()
        .filter(|(_, c)| alphabet.contains(*c))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Start index of every occurrence of `needle`, overlaps included.
#[must_use]
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, w)| *w == needle)
        .map(|(i, _)| i)
        .collect()
}

/// Drop the columns that are gaps in every row.
///
/// Rows are expected to share one length; shorter rows are padded with gaps
/// for the purpose of the test.
#[must_use]
pub fn remove_gap_columns(rows: &[(String, String)]) -> Vec<(String, String)> {
    let width = rows.iter().map(|(_, s)| s.len()).max().unwrap_or(0);
    let keep: Vec<usize> = (0..width)
        .filter(|&col| {
            rows.iter()
                .any(|(_, s)| s.as_bytes().get(col).is_some_and(|&b| b != GAP))
        })
        .collect();
    rows.iter()
        .map(|(name, seq)| {
            let bytes = seq.as_bytes();
            let kept: String = keep
                .iter()
                .filter_map(|&col| bytes.get(col).map(|&b| b as char))
                .collect();
            (name.clone(), kept)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rna() {
        assert_eq!(normalize_rna("augcaugc"), "AUGCAUGC");
        assert_eq!(normalize_rna("ACGT\n"), "ACGU");
        assert_eq!(normalize_rna(""), "");
    }

    #[test]
    fn test_clean_sequence() {
        assert_eq!(clean_sequence("AC-GT--N", "ATCG"), "ACGT");
        assert_eq!(clean_sequence("", "ATCG"), "");
    }

    #[test]
    fn test_reverse_complement_rna_and_dna() {
        assert_eq!(reverse_complement("UAGCAGC"), "GCUGCUA");
        assert_eq!(reverse_complement("uagc"), "gcua");
        assert_eq!(reverse_complement("ATTGC"), "GCAAT");
    }

    #[test]
    fn test_coordinate_vector() {
        assert_eq!(coordinate_vector("A-CG--T", "ATCG"), vec![1, 3, 4, 7]);
        assert!(coordinate_vector("---", "ATCG").is_empty());
    }

    #[test]
    fn test_find_all_overlapping() {
        assert_eq!(find_all(b"AAAA", b"AA"), vec![0, 1, 2]);
        assert_eq!(find_all(b"AUGCAUGC", b"AUG"), vec![0, 4]);
        assert!(find_all(b"AUG", b"AUGC").is_empty());
        assert!(find_all(b"AUG", b"").is_empty());
    }

    #[test]
    fn test_remove_gap_columns() {
        let rows = vec![
            ("hg".to_string(), "A-C-G".to_string()),
            ("mm".to_string(), "A-CTG".to_string()),
        ];
        let cleaned = remove_gap_columns(&rows);
        assert_eq!(cleaned[0].1, "AC-G");
        assert_eq!(cleaned[1].1, "ACTG");
        assert_eq!(cleaned[1].0, "mm");
    }
}
