//! Language-code → filename suffix table.
//!
//! Detected languages are recorded in the output filename as a short,
//! filesystem-safe suffix (`movie.srt` → `movie-fra.srt`). The mapping is
//! plain data: callers extend or override it through
//! [`crate::config::ConversionConfigBuilder::language_suffix`] or the
//! `--lang-suffix CODE=SUFFIX` CLI flag, never by editing code paths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in entries, keyed by lowercase ISO 639-1 code (with an optional
/// region subtag).
const DEFAULT_SUFFIXES: &[(&str, &str)] = &[
    ("he", "heb"),
    ("en", "eng"),
    ("fr", "fra"),
    ("es", "spa"),
    ("de", "deu"),
    ("ru", "rus"),
    ("ar", "ara"),
    ("zh", "zho"),
    ("zh-cn", "zho"),
    ("zh-tw", "zho_tw"),
    ("ja", "jpn"),
    ("ko", "kor"),
];

/// Mapping from language code to filename suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixTable {
    entries: BTreeMap<String, String>,
}

impl Default for SuffixTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_SUFFIXES
                .iter()
                .map(|(code, suffix)| (code.to_string(), suffix.to_string()))
                .collect(),
        }
    }
}

impl SuffixTable {
    /// An empty table: every code falls back to its sanitised form.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an entry. The code is matched case-insensitively.
    pub fn insert(&mut self, code: impl AsRef<str>, suffix: impl Into<String>) {
        self.entries
            .insert(code.as_ref().trim().to_lowercase(), suffix.into());
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Suffix for `code`.
    ///
    /// Unknown codes are sanitised: separators (`-`, space, path separators,
    /// `.`) become `_` so the result is always safe inside a filename.
    pub fn suffix_for(&self, code: &str) -> String {
        let code = code.trim().to_lowercase();
        match self.entries.get(&code) {
            Some(suffix) => suffix.clone(),
            None => sanitise(&code),
        }
    }

    /// Whether `suffix` could come out of [`Self::suffix_for`]: a value of
    /// this table, or the sanitised form of a plain ISO code such as `it` or
    /// `pt_br`.
    pub fn could_produce(&self, suffix: &str) -> bool {
        if self.entries.values().any(|s| s == suffix) {
            return true;
        }
        let (lang, region) = match suffix.split_once('_') {
            Some((lang, region)) => (lang, Some(region)),
            None => (suffix, None),
        };
        (2..=3).contains(&lang.len())
            && lang.bytes().all(|b| b.is_ascii_lowercase())
            && region.map_or(true, |r| {
                (2..=4).contains(&r.len())
                    && r.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            })
    }
}

fn sanitise(code: &str) -> String {
    code.chars()
        .map(|c| match c {
            '-' | ' ' | '/' | '\\' | '.' | ':' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_entries() {
        let t = SuffixTable::default();
        assert_eq!(t.suffix_for("he"), "heb");
        assert_eq!(t.suffix_for("EN"), "eng");
        assert_eq!(t.suffix_for("zh-TW"), "zho_tw");
    }

    #[test]
    fn unknown_code_is_sanitised() {
        let t = SuffixTable::default();
        assert_eq!(t.suffix_for("pt-br"), "pt_br");
        assert_eq!(t.suffix_for("it"), "it");
        assert_eq!(t.suffix_for("x/y.z"), "x_y_z");
    }

    #[test]
    fn insert_extends_and_overrides() {
        let mut t = SuffixTable::default();
        t.insert("PT", "por");
        t.insert("en", "english");
        assert_eq!(t.suffix_for("pt"), "por");
        assert_eq!(t.suffix_for("en"), "english");
    }

    #[test]
    fn producible_suffixes() {
        let mut t = SuffixTable::default();
        t.insert("pt", "portugues");
        assert!(t.could_produce("zho_tw"));
        assert!(t.could_produce("portugues"));
        assert!(t.could_produce("it"));
        assert!(t.could_produce("pt_br"));
        assert!(!t.could_produce("final"));
        assert!(!t.could_produce("v2"));
        assert!(!t.could_produce(""));
    }

    #[test]
    fn empty_table_only_sanitises() {
        let t = SuffixTable::empty();
        assert!(t.is_empty());
        assert_eq!(t.suffix_for("en"), "en");
    }
}
