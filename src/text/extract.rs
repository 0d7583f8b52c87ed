//! Pulls labeled field values out of free-form model output.
//!
//! The model is prompted to answer with `label: value` lines; this
//! module is the tolerant reader for that contract. Unmatched labels
//! resolve to the empty string so a partially filled form is still a
//! valid result.

use std::collections::HashMap;

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::log_debug;

/// Field values keyed by label, preserving the label order they were
/// requested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    labels: Vec<String>,
    values: HashMap<String, String>,
}

impl ExtractedFields {
    /// Value for `label`, or the empty string when the output had no
    /// line for it.
    pub fn get(&self, label: &str) -> &str {
        self.values.get(label).map_or("", String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// True when no requested label matched anything.
    pub fn is_empty(&self) -> bool {
        self.values.values().all(String::is_empty)
    }
}

impl Serialize for ExtractedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.labels.len()))?;
        for label in &self.labels {
            map.serialize_entry(label, self.get(label))?;
        }
        map.end()
    }
}

/// Extracts `label: value` lines for a fixed set of labels.
pub struct FieldExtractor {
    labels: Vec<String>,
    patterns: Vec<Regex>,
}

impl FieldExtractor {
    /// Compile one pattern per label. Labels are matched
    /// case-insensitively at line start, with whitespace tolerated
    /// around the label and the colon.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let patterns = labels
            .iter()
            .map(|label| {
                let pattern = format!(r"(?im)^\s*{}\s*:\s*(.*)$", regex::escape(label));
                // Built from an escaped literal; always compiles.
                Regex::new(&pattern).expect("escaped label pattern compiles")
            })
            .collect();
        Self { labels, patterns }
    }

    /// Scan `output` for each label. First match wins per label;
    /// values are trimmed of surrounding whitespace.
    pub fn extract(&self, output: &str) -> ExtractedFields {
        let mut values = HashMap::with_capacity(self.labels.len());
        for (label, pattern) in self.labels.iter().zip(&self.patterns) {
            let value = pattern
                .captures(output)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            values.insert(label.clone(), value);
        }

        let matched = values.values().filter(|v| !v.is_empty()).count();
        log_debug!(
            "extract",
            "matched {matched} of {} labels in {} output chars",
            self.labels.len(),
            output.len()
        );

        ExtractedFields {
            labels: self.labels.clone(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(["name", "email", "address"])
    }

    #[test]
    fn extracts_fields_from_label_lines() {
        let output = "name: Alice Chen\nemail: alice@example.com\naddress: 1 Main St";
        let fields = extractor().extract(output);

        assert_eq!(fields.get("name"), "Alice Chen");
        assert_eq!(fields.get("email"), "alice@example.com");
        assert_eq!(fields.get("address"), "1 Main St");
    }

    #[test]
    fn labels_match_case_insensitively_with_loose_whitespace() {
        let output = "  Name :  Bob  \nEMAIL:bob@example.com";
        let fields = extractor().extract(output);

        assert_eq!(fields.get("name"), "Bob");
        assert_eq!(fields.get("email"), "bob@example.com");
        assert_eq!(fields.get("address"), "");
    }

    #[test]
    fn missing_labels_resolve_to_empty_string() {
        let fields = extractor().extract("the model rambled instead");
        assert_eq!(fields.get("name"), "");
        assert!(fields.is_empty());
    }

    #[test]
    fn first_match_wins_per_label() {
        let output = "name: first\nname: second";
        let fields = extractor().extract(output);
        assert_eq!(fields.get("name"), "first");
    }

    #[test]
    fn label_text_inside_a_line_does_not_match() {
        let output = "my name: not a field line start? yes it is\nsurname: x";
        let fields = FieldExtractor::new(["name"]).extract(output);
        // "my name:" and "surname:" do not start with the bare label.
        assert_eq!(fields.get("name"), "");
    }

    #[test]
    fn labels_needing_escaping_are_literal() {
        let fields = FieldExtractor::new(["total (usd)"]).extract("total (usd): 42.00");
        assert_eq!(fields.get("total (usd)"), "42.00");
    }

    #[test]
    fn serializes_in_label_order() {
        let output = "email: a@b.c\nname: A";
        let json = serde_json::to_string(&extractor().extract(output)).expect("json");
        assert_eq!(json, r#"{"name":"A","email":"a@b.c","address":""}"#);
    }
}
