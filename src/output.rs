//! Result types produced by the conversion pipeline and the batch runners.

use crate::error::ConvertError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

/// Summary of one successful file conversion.
///
/// Produced exactly once per successful pipeline run; owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The file that was read.
    pub source_path: PathBuf,
    /// Encoding the bytes were decoded with, e.g. `"windows-1252"`.
    pub encoding_used: String,
    /// Confidence in `encoding_used`, always within `[0.0, 1.0]`.
    pub confidence: f64,
    /// Where the UTF-8 content ended up (after any language rename).
    pub final_path: PathBuf,
    /// The `.bak` copy, when one was made.
    pub backup_path: Option<PathBuf>,
    /// Filename suffix for the detected language, when confident enough.
    pub language_tag: Option<String>,
    /// Probability of the best language candidate, present even when it was
    /// too low to tag the file.
    pub language_confidence: Option<f64>,
    /// Number of U+FFFD replacement characters the decoder inserted.
    pub replacements: usize,
}

impl ConversionResult {
    /// Whether the language rename moved the file.
    ///
    /// The pre-rename target always keeps the source's file name, so a
    /// differing name means a suffix was added.
    pub fn was_renamed(&self) -> bool {
        self.language_tag.is_some() && self.final_path.file_name() != self.source_path.file_name()
    }
}

/// The outcome for one submitted file.
#[derive(Debug)]
pub struct FileOutcome {
    /// 0-based position in the submitted list.
    pub index: usize,
    pub source_path: PathBuf,
    pub result: Result<ConversionResult, ConvertError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl Serialize for FileOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FileOutcome", 4)?;
        s.serialize_field("index", &self.index)?;
        s.serialize_field("source_path", &self.source_path)?;
        match &self.result {
            Ok(result) => {
                s.serialize_field("status", "ok")?;
                s.serialize_field("result", result)?;
            }
            Err(e) => {
                s.serialize_field("status", "error")?;
                s.serialize_field(
                    "error",
                    &ErrorReport {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                )?;
            }
        }
        s.end()
    }
}

#[derive(Serialize)]
struct ErrorReport {
    kind: &'static str,
    message: String,
}

/// Outcomes for a whole batch, in submission order.
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub outcomes: Vec<FileOutcome>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Successful results only.
    pub fn successes(&self) -> impl Iterator<Item = &ConversionResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Failed files with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &ConvertError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.source_path, e)))
    }
}

/// Aggregate counters for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub converted_files: usize,
    pub failed_files: usize,
    /// Files renamed with a language suffix.
    pub tagged_files: usize,
    /// `.bak` copies created.
    pub backups: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub(crate) fn from_outcomes(outcomes: &[FileOutcome], total_duration_ms: u64) -> Self {
        let successes: Vec<&ConversionResult> =
            outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
        Self {
            total_files: outcomes.len(),
            converted_files: successes.len(),
            failed_files: outcomes.len() - successes.len(),
            tagged_files: successes.iter().filter(|r| r.was_renamed()).count(),
            backups: successes.iter().filter(|r| r.backup_path.is_some()).count(),
            total_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(source: &str, final_path: &str, backup: bool, tag: Option<&str>) -> ConversionResult {
        ConversionResult {
            source_path: source.into(),
            encoding_used: "windows-1252".into(),
            confidence: 0.9,
            final_path: final_path.into(),
            backup_path: backup.then(|| format!("{source}.bak").into()),
            language_tag: tag.map(str::to_string),
            language_confidence: tag.map(|_| 0.95),
            replacements: 0,
        }
    }

    #[test]
    fn stats_count_outcomes() {
        let outcomes = vec![
            FileOutcome {
                index: 0,
                source_path: "a.txt".into(),
                result: Ok(result("a.txt", "a-fra.txt", true, Some("fra"))),
            },
            FileOutcome {
                index: 1,
                source_path: "b.txt".into(),
                result: Ok(result("b.txt", "b.txt", true, None)),
            },
            FileOutcome {
                index: 2,
                source_path: "c.txt".into(),
                result: Err(ConvertError::SourceNotFound {
                    path: "c.txt".into(),
                }),
            },
        ];
        let stats = BatchStats::from_outcomes(&outcomes, 12);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.converted_files, 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.tagged_files, 1);
        assert_eq!(stats.backups, 2);
        assert_eq!(stats.total_duration_ms, 12);
    }

    #[test]
    fn already_tagged_file_is_not_counted_as_renamed() {
        let r = result("a-eng.txt", "a-eng.txt", true, Some("eng"));
        assert!(!r.was_renamed());
    }

    #[test]
    fn redirected_rename_compares_file_names() {
        let r = result("in/a.txt", "out/a-eng.txt", false, Some("eng"));
        assert!(r.was_renamed());
        let r = result("in/a.txt", "out/a.txt", false, None);
        assert!(!r.was_renamed());
    }

    #[test]
    fn outcome_serialises_error_kind() {
        let outcome = FileOutcome {
            index: 4,
            source_path: "gone.txt".into(),
            result: Err(ConvertError::SourceNotFound {
                path: "gone.txt".into(),
            }),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "source_not_found");
        assert_eq!(json["index"], 4);
    }

    #[test]
    fn outcome_serialises_result() {
        let outcome = FileOutcome {
            index: 0,
            source_path: "a.txt".into(),
            result: Ok(result("a.txt", "a-fra.txt", true, Some("fra"))),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["result"]["language_tag"], "fra");
        assert_eq!(json["result"]["encoding_used"], "windows-1252");
    }
}
