//! Configuration types for batch UTF-8 conversion.
//!
//! All batch behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The config is shared read-only by every
//! worker; each file gets its own immutable [`ConversionRequest`] derived from
//! it with [`ConversionConfig::request_for`].

use crate::error::ConvertError;
use crate::pipeline::language::{LanguageIdentifier, DEFAULT_MIN_PROBABILITY, DEFAULT_SNIPPET_CHARS};
use crate::progress::ProgressCallback;
use crate::suffixes::SuffixTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Extensions picked up when a directory is given as input.
///
/// Files named explicitly are always accepted regardless of extension.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "srt", "ass", "ssa", "sub", "vtt", "lrc", "md", "csv", "tsv", "ini", "log", "json",
    "xml",
];

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Configuration for a batch conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use utf8conv::{ConversionConfig, ForcedEncoding};
///
/// let config = ConversionConfig::builder()
///     .make_backup(false)
///     .forced_encoding(ForcedEncoding::Windows1252)
///     .output_folder("converted")
///     .build()
///     .unwrap();
/// assert!(config.output_folder.is_some());
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Copy the original to `<file>.bak` before an in-place rewrite. Default: true.
    ///
    /// Ignored when `output_folder` is set: redirected output never touches
    /// the source, so there is nothing to protect.
    pub make_backup: bool,

    /// Run the mojibake repair pass on decoded text. Default: true.
    pub auto_fix: bool,

    /// Encoding override. Default: [`ForcedEncoding::AutoDetect`].
    pub forced_encoding: ForcedEncoding,

    /// Write results into this folder instead of rewriting sources in place.
    /// Created (with parents) on first use. Default: None.
    pub output_folder: Option<PathBuf>,

    /// Number of files converted at once. Default: available CPUs.
    pub concurrency: usize,

    /// Detect the text language and tag the filename with it. Default: true.
    pub tag_language: bool,

    /// Characters of trimmed text fed to the language identifier. Default: 5000.
    pub language_snippet_chars: usize,

    /// Minimum probability for a language tag to be applied. Default: 0.60.
    pub min_language_probability: f64,

    /// Language-code → filename suffix mapping.
    pub suffixes: SuffixTable,

    /// Upper bound on `_1`, `_2`, … candidates tried when renaming. Default: 10 000.
    pub max_rename_attempts: usize,

    /// Pre-constructed language identifier. If None, a `lingua` detector over
    /// all supported languages is built once per batch.
    pub language_identifier: Option<Arc<dyn LanguageIdentifier>>,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            make_backup: true,
            auto_fix: true,
            forced_encoding: ForcedEncoding::default(),
            output_folder: None,
            concurrency: default_concurrency(),
            tag_language: true,
            language_snippet_chars: DEFAULT_SNIPPET_CHARS,
            min_language_probability: DEFAULT_MIN_PROBABILITY,
            suffixes: SuffixTable::default(),
            max_rename_attempts: 10_000,
            language_identifier: None,
            progress_callback: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("make_backup", &self.make_backup)
            .field("auto_fix", &self.auto_fix)
            .field("forced_encoding", &self.forced_encoding)
            .field("output_folder", &self.output_folder)
            .field("concurrency", &self.concurrency)
            .field("tag_language", &self.tag_language)
            .field("language_snippet_chars", &self.language_snippet_chars)
            .field("min_language_probability", &self.min_language_probability)
            .field("suffixes", &self.suffixes.len())
            .field("max_rename_attempts", &self.max_rename_attempts)
            .field(
                "language_identifier",
                &self
                    .language_identifier
                    .as_ref()
                    .map(|_| "<dyn LanguageIdentifier>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The immutable request for converting `source` under this config.
    pub fn request_for(&self, source: impl Into<PathBuf>) -> ConversionRequest {
        ConversionRequest {
            source_path: source.into(),
            make_backup: self.make_backup,
            auto_fix: self.auto_fix,
            forced_encoding: self.forced_encoding.as_request(),
            output_folder: self.output_folder.clone(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn make_backup(mut self, v: bool) -> Self {
        self.config.make_backup = v;
        self
    }

    pub fn auto_fix(mut self, v: bool) -> Self {
        self.config.auto_fix = v;
        self
    }

    pub fn forced_encoding(mut self, enc: ForcedEncoding) -> Self {
        self.config.forced_encoding = enc;
        self
    }

    pub fn output_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_folder = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn tag_language(mut self, v: bool) -> Self {
        self.config.tag_language = v;
        self
    }

    pub fn language_snippet_chars(mut self, n: usize) -> Self {
        self.config.language_snippet_chars = n;
        self
    }

    pub fn min_language_probability(mut self, p: f64) -> Self {
        self.config.min_language_probability = p;
        self
    }

    /// Replace the whole suffix table.
    pub fn suffixes(mut self, table: SuffixTable) -> Self {
        self.config.suffixes = table;
        self
    }

    /// Add or override a single suffix entry.
    pub fn language_suffix(mut self, code: impl AsRef<str>, suffix: impl Into<String>) -> Self {
        self.config.suffixes.insert(code, suffix);
        self
    }

    pub fn max_rename_attempts(mut self, n: usize) -> Self {
        self.config.max_rename_attempts = n;
        self
    }

    pub fn language_identifier(mut self, identifier: Arc<dyn LanguageIdentifier>) -> Self {
        self.config.language_identifier = Some(identifier);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.min_language_probability) {
            return Err(ConvertError::InvalidConfig(format!(
                "Minimum language probability must be 0.0–1.0, got {}",
                c.min_language_probability
            )));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.language_snippet_chars == 0 {
            return Err(ConvertError::InvalidConfig(
                "Language snippet length must be ≥ 1".into(),
            ));
        }
        if c.max_rename_attempts == 0 {
            return Err(ConvertError::InvalidConfig(
                "Rename attempts must be ≥ 1".into(),
            ));
        }
        if let Some(ref dir) = c.output_folder {
            if dir.as_os_str().is_empty() {
                return Err(ConvertError::InvalidConfig(
                    "Output folder must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Per-file request ─────────────────────────────────────────────────────

/// Immutable input to one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub make_backup: bool,
    pub auto_fix: bool,
    /// Encoding label to force; `None` (or the "Auto-detect" sentinel) sniffs.
    pub forced_encoding: Option<String>,
    pub output_folder: Option<PathBuf>,
}

impl ConversionRequest {
    /// A request with the default options for `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        ConversionConfig::default().request_for(source)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Label of the auto-detect sentinel.
pub const AUTO_DETECT: &str = "Auto-detect";

/// Encoding override choices.
///
/// The named variants are the fixed set offered to users; [`Other`] carries
/// any other label (e.g. `"koi8-r"`), which is resolved at decode time and
/// degrades to UTF-8 at confidence `0.0` when unknown.
///
/// [`Other`]: ForcedEncoding::Other
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ForcedEncoding {
    #[default]
    AutoDetect,
    Utf8,
    /// UTF-16 with endianness taken from the BOM (little-endian without one).
    Utf16,
    Utf16Le,
    Utf16Be,
    /// True Latin-1: every byte maps to the code point of the same value.
    Iso8859_1,
    Windows1252,
    ShiftJis,
    Gb18030,
    Other(String),
}

impl ForcedEncoding {
    /// The fixed choices, in display order.
    pub const CHOICES: &'static [ForcedEncoding] = &[
        ForcedEncoding::AutoDetect,
        ForcedEncoding::Utf8,
        ForcedEncoding::Utf16,
        ForcedEncoding::Utf16Le,
        ForcedEncoding::Utf16Be,
        ForcedEncoding::Iso8859_1,
        ForcedEncoding::Windows1252,
        ForcedEncoding::ShiftJis,
        ForcedEncoding::Gb18030,
    ];

    /// Display label, e.g. `"UTF-16 LE"`.
    pub fn label(&self) -> &str {
        match self {
            ForcedEncoding::AutoDetect => AUTO_DETECT,
            ForcedEncoding::Utf8 => "UTF-8",
            ForcedEncoding::Utf16 => "UTF-16",
            ForcedEncoding::Utf16Le => "UTF-16 LE",
            ForcedEncoding::Utf16Be => "UTF-16 BE",
            ForcedEncoding::Iso8859_1 => "ISO-8859-1",
            ForcedEncoding::Windows1252 => "Windows-1252",
            ForcedEncoding::ShiftJis => "Shift_JIS",
            ForcedEncoding::Gb18030 => "GB18030",
            ForcedEncoding::Other(s) => s,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, ForcedEncoding::AutoDetect)
    }

    fn as_request(&self) -> Option<String> {
        if self.is_auto() {
            None
        } else {
            Some(self.label().to_string())
        }
    }
}

impl fmt::Display for ForcedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ForcedEncoding {
    type Err = std::convert::Infallible;

    /// Parse a label. Matching ignores case, `-`, `_` and spaces, so
    /// `"utf16le"`, `"UTF-16 LE"` and `"utf_16_le"` are the same choice.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        Ok(match key.as_str() {
            "" | "auto" | "autodetect" => ForcedEncoding::AutoDetect,
            "utf8" => ForcedEncoding::Utf8,
            "utf16" => ForcedEncoding::Utf16,
            "utf16le" => ForcedEncoding::Utf16Le,
            "utf16be" => ForcedEncoding::Utf16Be,
            "iso88591" | "latin1" => ForcedEncoding::Iso8859_1,
            "windows1252" | "cp1252" => ForcedEncoding::Windows1252,
            "shiftjis" | "sjis" => ForcedEncoding::ShiftJis,
            "gb18030" => ForcedEncoding::Gb18030,
            _ => ForcedEncoding::Other(s.trim().to_string()),
        })
    }
}

impl From<String> for ForcedEncoding {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(enc) => enc,
            Err(never) => match never {},
        }
    }
}

impl From<ForcedEncoding> for String {
    fn from(enc: ForcedEncoding) -> Self {
        enc.label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert!(c.make_backup);
        assert!(c.auto_fix);
        assert!(c.forced_encoding.is_auto());
        assert!(c.output_folder.is_none());
        assert!(c.concurrency >= 1);
        assert_eq!(c.language_snippet_chars, 5000);
        assert!((c.min_language_probability - 0.60).abs() < f64::EPSILON);
    }

    #[test]
    fn builder_validates_probability() {
        let err = ConversionConfig::builder()
            .min_language_probability(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_zero_rename_attempts() {
        assert!(ConversionConfig::builder()
            .max_rename_attempts(0)
            .build()
            .is_err());
    }

    #[test]
    fn request_carries_options() {
        let c = ConversionConfig::builder()
            .make_backup(false)
            .auto_fix(false)
            .forced_encoding(ForcedEncoding::ShiftJis)
            .output_folder("out")
            .build()
            .unwrap();
        let r = c.request_for("subs/a.srt");
        assert_eq!(r.source_path, PathBuf::from("subs/a.srt"));
        assert!(!r.make_backup);
        assert!(!r.auto_fix);
        assert_eq!(r.forced_encoding.as_deref(), Some("Shift_JIS"));
        assert_eq!(r.output_folder, Some(PathBuf::from("out")));
    }

    #[test]
    fn auto_detect_request_has_no_forced_encoding() {
        let r = ConversionRequest::new("a.txt");
        assert!(r.forced_encoding.is_none());
        assert!(r.make_backup);
    }

    #[test]
    fn parse_labels() {
        let p = |s: &str| s.parse::<ForcedEncoding>().unwrap();
        assert_eq!(p("Auto-detect"), ForcedEncoding::AutoDetect);
        assert_eq!(p("utf-16 le"), ForcedEncoding::Utf16Le);
        assert_eq!(p("UTF_16BE"), ForcedEncoding::Utf16Be);
        assert_eq!(p("latin1"), ForcedEncoding::Iso8859_1);
        assert_eq!(p("Shift_JIS"), ForcedEncoding::ShiftJis);
        assert_eq!(p("koi8-r"), ForcedEncoding::Other("koi8-r".into()));
    }

    #[test]
    fn choices_round_trip_through_labels() {
        for choice in ForcedEncoding::CHOICES {
            assert_eq!(&choice.label().parse::<ForcedEncoding>().unwrap(), choice);
        }
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported_extension(Path::new("a/b/movie.SRT")));
        assert!(is_supported_extension(Path::new("notes.txt")));
        assert!(!is_supported_extension(Path::new("photo.png")));
        assert!(!is_supported_extension(Path::new("README")));
    }
}
