//! Newick species trees and branch length scores.
//!
//! Trees are stored as an arena of nodes; node 0 is the root.
//!
//! ```rust
//! use mirmap_core::phylogeny::SpeciesTree;
//!
//! let tree = SpeciesTree::parse("((hg19:0.1,panTro2:0.2):0.3,mm9:0.4);")?;
//! assert!((tree.branch_length_score(&["hg19", "mm9"]) - 0.8).abs() < 1e-12);
//! # Ok::<(), mirmap_core::types::MirmapError>(())
//! ```

use crate::types::MirmapError;
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct Node {
    label: Option<String>,
    length: f64,
    children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct SpeciesTree {
    nodes: Vec<Node>,
}

struct Parser<'a> {
    text: &'a [u8],
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn error(&self, what: &str) -> MirmapError {
        MirmapError::ParseError(format!("newick: {what} at offset {}", self.pos))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.text.get(self.pos).copied()
    }

    fn subtree(&mut self) -> Result<usize, MirmapError> {
        let id = self.nodes.len();
        self.nodes.push(Node {
            label: None,
            length: 0.0,
            children: Vec::new(),
        });

        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                let child = self.subtree()?;
                self.nodes[id].children.push(child);
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
        }

        self.nodes[id].label = self.label()?;
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.nodes[id].length = self.number()?;
        }
        if self.nodes[id].children.is_empty() && self.nodes[id].label.is_none() {
            return Err(self.error("unnamed leaf"));
        }
        Ok(id)
    }

    fn label(&mut self) -> Result<Option<String>, MirmapError> {
        match self.peek() {
            Some(b'\'') => {
                self.pos += 1;
                let start = self.pos;
                while self.pos < self.text.len() && self.text[self.pos] != b'\'' {
                    self.pos += 1;
                }
                if self.pos >= self.text.len() {
                    return Err(self.error("unterminated quoted label"));
                }
                let label = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();
                self.pos += 1;
                Ok(Some(label))
            }
            _ => {
                let start = self.pos;
                while self.pos < self.text.len()
                    && !b"(),:;[ \t\r\n".contains(&self.text[self.pos])
                {
                    self.pos += 1;
                }
                if self.pos == start {
                    Ok(None)
                } else {
                    Ok(Some(
                        String::from_utf8_lossy(&self.text[start..self.pos]).into_owned(),
                    ))
                }
            }
        }
    }

    fn number(&mut self) -> Result<f64, MirmapError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.text.len()
            && (self.text[self.pos].is_ascii_digit() || b"+-.eE".contains(&self.text[self.pos]))
        {
            self.pos += 1;
        }
        std::str::from_utf8(&self.text[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid branch length"))
    }
}

impl SpeciesTree {
    /// Parse a Newick string. Comments in square brackets are not supported.
    pub fn parse(newick: &str) -> Result<Self, MirmapError> {
        let mut parser = Parser {
            text: newick.trim().as_bytes(),
            pos: 0,
            nodes: Vec::new(),
        };
        parser.subtree()?;
        match parser.peek() {
            Some(b';') => parser.pos += 1,
            None => {}
            Some(_) => return Err(parser.error("trailing characters")),
        }
        if parser.peek().is_some() {
            return Err(parser.error("trailing characters"));
        }
        Ok(Self {
            nodes: parser.nodes,
        })
    }

    /// Labels of all leaves, in file order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.children.is_empty())
            .filter_map(|n| n.label.as_deref())
            .collect()
    }

    /// Total branch length of the subtree spanning the given species.
    ///
    /// A branch counts when the leaves below it include some, but not all,
    /// of the retained species. Species missing from the tree are ignored.
    #[must_use]
    pub fn branch_length_score(&self, species: &[&str]) -> f64 {
        let wanted: HashSet<&str> = species.iter().copied().collect();
        let mut below = vec![0usize; self.nodes.len()];
        // Children always have larger ids than their parent.
        for id in (0..self.nodes.len()).rev() {
            let node = &self.nodes[id];
            below[id] = if node.children.is_empty() {
                usize::from(node.label.as_deref().is_some_and(|l| wanted.contains(l)))
            } else {
                node.children.iter().map(|&c| below[c]).sum()
            };
        }
        let retained = below[0];
        if retained < 2 {
            return 0.0;
        }
        (1..self.nodes.len())
            .filter(|&id| below[id] > 0 && below[id] < retained)
            .map(|id| self.nodes[id].length)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = "(((hg19:0.006,panTro2:0.007):0.002,rheMac2:0.03):0.1,(mm9:0.08,rn4:0.09):0.25,canFam2:0.2);";

    #[test]
    fn test_parse_leaves() {
        let tree = SpeciesTree::parse(TREE).unwrap();
        assert_eq!(
            tree.leaves(),
            vec!["hg19", "panTro2", "rheMac2", "mm9", "rn4", "canFam2"]
        );
    }

    #[test]
    fn test_branch_length_score() {
        let tree = SpeciesTree::parse(TREE).unwrap();
        let close = tree.branch_length_score(&["hg19", "panTro2"]);
        assert!((close - 0.013).abs() < 1e-12);

        let primates_rodent = tree.branch_length_score(&["hg19", "mm9"]);
        assert!((primates_rodent - (0.006 + 0.002 + 0.1 + 0.08 + 0.25)).abs() < 1e-12);

        let all = tree.branch_length_score(&tree.leaves());
        let total = 0.006 + 0.007 + 0.002 + 0.03 + 0.1 + 0.08 + 0.09 + 0.25 + 0.2;
        assert!((all - total).abs() < 1e-12);
    }

    #[test]
    fn test_under_supported_species() {
        let tree = SpeciesTree::parse(TREE).unwrap();
        assert_eq!(tree.branch_length_score(&["hg19"]), 0.0);
        assert_eq!(tree.branch_length_score(&[]), 0.0);
        assert_eq!(tree.branch_length_score(&["hg19", "xenTro2"]), 0.0);
    }

    #[test]
    fn test_labels_and_whitespace() {
        let tree = SpeciesTree::parse(" ('Homo sapiens':1.5, mus_musculus:2)root:0.0 ;\n").unwrap();
        assert_eq!(tree.leaves(), vec!["Homo sapiens", "mus_musculus"]);
        assert_eq!(tree.branch_length_score(&["Homo sapiens", "mus_musculus"]), 3.5);
    }

    #[test]
    fn test_parse_errors() {
        assert!(SpeciesTree::parse("((a:1,b:1);").is_err());
        assert!(SpeciesTree::parse("(a:1,:1);").is_err());
        assert!(SpeciesTree::parse("(a:x,b:1);").is_err());
        assert!(SpeciesTree::parse("(a,b);c").is_err());
    }
}
