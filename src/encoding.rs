use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("unknown {kind} '{label}'")]
    UnknownLabel { kind: String, label: String },
    #[error("{kind} code {code} out of range (0..{len})")]
    CodeOutOfRange {
        kind: String,
        code: usize,
        len: usize,
    },
}

/// Closed label <-> dense code mapping. Classes are kept sorted, so the code of a
/// label is its rank in the training vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    kind: String,
    classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<I, S>(kind: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect::<BTreeSet<_>>();
        Self {
            kind: kind.to_string(),
            classes: set.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    pub fn encode(&self, label: &str) -> Result<usize, EncodeError> {
        self.position(label).ok_or_else(|| EncodeError::UnknownLabel {
            kind: self.kind.clone(),
            label: label.to_string(),
        })
    }

    pub fn decode(&self, code: usize) -> Result<&str, EncodeError> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| EncodeError::CodeOutOfRange {
                kind: self.kind.clone(),
                code,
                len: self.classes.len(),
            })
    }

    /// True when classes are strictly ascending, i.e. the file was not hand-edited
    /// into an order `encode` cannot binary-search.
    pub fn is_canonical(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_sorted_and_deduplicated() {
        let enc = CategoryEncoder::fit("team", ["Mumbai Indians", "Chennai Super Kings", "Mumbai Indians"]);
        assert_eq!(enc.classes(), ["Chennai Super Kings", "Mumbai Indians"]);
        assert_eq!(enc.encode("Chennai Super Kings"), Ok(0));
        assert_eq!(enc.encode("Mumbai Indians"), Ok(1));
        assert!(enc.is_canonical());
    }

    #[test]
    fn unknown_label_is_rejected_not_defaulted() {
        let enc = CategoryEncoder::fit("venue", ["Eden Gardens"]);
        let err = enc.encode("Wankhede Stadium").unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnknownLabel {
                kind: "venue".to_string(),
                label: "Wankhede Stadium".to_string()
            }
        );
        assert_eq!(err.to_string(), "unknown venue 'Wankhede Stadium'");
    }

    #[test]
    fn decode_out_of_range_fails() {
        let enc = CategoryEncoder::fit("team", ["A", "B"]);
        assert_eq!(enc.decode(1), Ok("B"));
        assert!(enc.decode(2).is_err());
    }

    #[test]
    fn errors_name_the_stored_kind() {
        let enc = CategoryEncoder::fit("ground", ["Eden Gardens"]);
        assert_eq!(enc.encode("Lord's").unwrap_err().to_string(), "unknown ground 'Lord's'");
        assert_eq!(
            enc.decode(3).unwrap_err().to_string(),
            "ground code 3 out of range (0..1)"
        );
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let enc = CategoryEncoder::fit("team", ["TeamA"]);
        assert!(enc.encode("teama").is_err());
    }
}
