//! Multiple sequence alignments used by the conservation evaluators.

use crate::sequence::io::{parse_fasta_str, read_fasta_sequences};
use crate::sequence::{clean_sequence, coordinate_vector, remove_gap_columns};
use crate::types::MirmapError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentFormat {
    Fasta,
}

impl AlignmentFormat {
    /// Detect the format from a file extension (`.fa`, `.fasta`).
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self, MirmapError> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("fa" | "fasta") => Ok(Self::Fasta),
            _ => Err(MirmapError::Configuration(format!(
                "alignment format undetected for {}",
                path.as_ref().display()
            ))),
        }
    }
}

/// One aligned species.
#[derive(Debug, Clone)]
pub struct AlignedRow {
    pub name: String,
    /// Row as aligned, gaps included.
    pub aligned: String,
    /// Row restricted to the alignment alphabet.
    pub cleaned: String,
    /// Alignment column (1-based) of every residue of `cleaned`.
    pub coords: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Alignment {
    rows: Vec<AlignedRow>,
}

impl Alignment {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        format: Option<AlignmentFormat>,
        alphabet: &str,
    ) -> Result<Self, MirmapError> {
        let format = match format {
            Some(f) => f,
            None => AlignmentFormat::detect(&path)?,
        };
        match format {
            AlignmentFormat::Fasta => {
                Self::from_records(read_fasta_sequences(path, true)?, alphabet)
            }
        }
    }

    pub fn from_text(
        text: &str,
        format: Option<AlignmentFormat>,
        alphabet: &str,
    ) -> Result<Self, MirmapError> {
        match format.unwrap_or(AlignmentFormat::Fasta) {
            AlignmentFormat::Fasta => Self::from_records(parse_fasta_str(text, true)?, alphabet),
        }
    }

    fn from_records(records: Vec<(String, String)>, alphabet: &str) -> Result<Self, MirmapError> {
        if records.is_empty() {
            return Err(MirmapError::ParseError("alignment has no rows".to_string()));
        }
        let rows = records
            .into_iter()
            .map(|(name, aligned)| AlignedRow {
                cleaned: clean_sequence(&aligned, alphabet),
                coords: coordinate_vector(&aligned, alphabet),
                name,
                aligned,
            })
            .collect();
        Ok(Self { rows })
    }

    #[must_use]
    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    /// The first row, expected to be the transcript itself.
    #[must_use]
    pub fn reference(&self) -> &AlignedRow {
        &self.rows[0]
    }

    /// Names of the species whose cleaned row contains `motif`.
    #[must_use]
    pub fn species_with_motif(&self, motif: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| row.cleaned.contains(motif))
            .map(|row| row.name.as_str())
            .collect()
    }

    /// Alignment columns of reference residues `start..=end` (1-based).
    pub fn reference_columns(&self, start: usize, end: usize) -> Result<(usize, usize), MirmapError> {
        let coords = &self.reference().coords;
        match (coords.get(start.wrapping_sub(1)), coords.get(end.wrapping_sub(1))) {
            (Some(&s), Some(&e)) => Ok((s, e)),
            _ => Err(MirmapError::InvalidSequence(format!(
                "motif {start}-{end} lies outside the reference row {} ({} residues)",
                self.reference().name,
                coords.len()
            ))),
        }
    }

    /// Columns `start..=end` of the given species, all-gap columns removed,
    /// rendered as FASTA.
    #[must_use]
    pub fn extract_fasta(&self, species: &[&str], start: usize, end: usize) -> String {
        let partial: Vec<(String, String)> = self
            .rows
            .iter()
            .filter(|row| species.contains(&row.name.as_str()))
            .map(|row| {
                let from = start.saturating_sub(1).min(row.aligned.len());
                let to = end.min(row.aligned.len());
                (
                    row.name.clone(),
                    String::from_utf8_lossy(&row.aligned.as_bytes()[from..to]).into_owned(),
                )
            })
            .collect();
        to_fasta(&remove_gap_columns(&partial))
    }

    /// The whole alignment as FASTA.
    #[must_use]
    pub fn to_fasta(&self) -> String {
        let rows: Vec<(String, String)> = self
            .rows
            .iter()
            .map(|row| (row.name.clone(), row.aligned.clone()))
            .collect();
        to_fasta(&rows)
    }
}

fn to_fasta(rows: &[(String, String)]) -> String {
    rows.iter()
        .map(|(name, seq)| format!(">{name}\n{seq}\n"))
        .collect()
}
