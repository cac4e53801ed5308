//! Language tagging: decoded text → short filename suffix.
//!
//! Only the first [`crate::config::ConversionConfig::language_snippet_chars`]
//! characters of the trimmed text are examined, which bounds the cost on
//! large files and keeps trailing boilerplate (credits, licence blocks) from
//! skewing the result.
//!
//! Identification sits behind the [`LanguageIdentifier`] trait. The default
//! implementation wraps a `lingua` detector, which is deterministic: the same
//! snippet always yields the same ranked candidates. Tests and embedders can
//! inject their own identifier through the config builder.

use crate::config::ConversionConfig;
use crate::suffixes::SuffixTable;
use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Characters of trimmed text examined by default.
pub const DEFAULT_SNIPPET_CHARS: usize = 5000;
/// Default minimum probability for a tag to be applied.
pub const DEFAULT_MIN_PROBABILITY: f64 = 0.60;

/// One ranked guess from a [`LanguageIdentifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageCandidate {
    /// Lowercase language code, e.g. `"fr"` or `"zh-tw"`.
    pub code: String,
    pub probability: f64,
}

impl LanguageCandidate {
    pub fn new(code: impl Into<String>, probability: f64) -> Self {
        Self {
            code: code.into(),
            probability,
        }
    }
}

/// Probabilistic language identification over a text snippet.
///
/// Implementations must be deterministic and must not panic; an empty vector
/// means identification failed.
pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, snippet: &str) -> Vec<LanguageCandidate>;
}

/// [`LanguageIdentifier`] backed by `lingua`.
pub struct LinguaIdentifier {
    detector: LanguageDetector,
}

impl LinguaIdentifier {
    /// A detector over every language `lingua` ships models for, in
    /// low-accuracy mode (trigram models only, loaded on first use).
    pub fn new() -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_all_languages()
                .with_low_accuracy_mode()
                .build(),
        }
    }

    /// Every language with the full n-gram models. Better on short texts,
    /// much heavier on memory than [`Self::new`].
    pub fn high_accuracy() -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_all_languages().build(),
        }
    }

    /// A detector restricted to `languages`. Faster, and more accurate when
    /// the candidate set is known up front.
    pub fn from_languages(languages: &[Language]) -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_languages(languages).build(),
        }
    }
}

impl Default for LinguaIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageIdentifier for LinguaIdentifier {
    fn identify(&self, snippet: &str) -> Vec<LanguageCandidate> {
        // Values come back sorted by descending confidence; all zeros when
        // the snippet has no usable letters.
        self.detector
            .compute_language_confidence_values(snippet)
            .into_iter()
            .filter(|(_, p)| *p > 0.0)
            .map(|(lang, p)| {
                LanguageCandidate::new(lang.iso_code_639_1().to_string().to_lowercase(), p)
            })
            .collect()
    }
}

/// Outcome of one detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageDecision {
    /// Filename suffix, present only when `probability` met the threshold.
    pub tag: Option<String>,
    /// Probability of the best candidate, present whenever one was found.
    pub probability: Option<f64>,
    /// Raw code of the best candidate.
    pub code: Option<String>,
}

/// Snippet extraction, thresholding, and suffix lookup around an identifier.
pub struct LanguageTagger {
    identifier: Arc<dyn LanguageIdentifier>,
    snippet_chars: usize,
    min_probability: f64,
    suffixes: SuffixTable,
}

impl LanguageTagger {
    /// Tagger with the default snippet length (5000) and threshold (0.60).
    pub fn new(identifier: Arc<dyn LanguageIdentifier>, suffixes: SuffixTable) -> Self {
        Self {
            identifier,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            min_probability: DEFAULT_MIN_PROBABILITY,
            suffixes,
        }
    }

    /// Tagger configured from `config`, building a `lingua` detector unless
    /// one was injected.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let identifier = match config.language_identifier {
            Some(ref id) => Arc::clone(id),
            None => Arc::new(LinguaIdentifier::new()) as Arc<dyn LanguageIdentifier>,
        };
        Self {
            identifier,
            snippet_chars: config.language_snippet_chars,
            min_probability: config.min_language_probability,
            suffixes: config.suffixes.clone(),
        }
    }

    pub fn with_snippet_chars(mut self, n: usize) -> Self {
        self.snippet_chars = n;
        self
    }

    pub fn with_min_probability(mut self, p: f64) -> Self {
        self.min_probability = p;
        self
    }

    /// Detect the dominant language of `text`.
    pub fn detect(&self, text: &str) -> LanguageDecision {
        let snippet = snippet(text, self.snippet_chars);
        if snippet.is_empty() {
            return LanguageDecision::default();
        }

        let candidates = self.identifier.identify(snippet);
        let Some(best) = best_candidate(&candidates) else {
            warn!("Language detection found no candidates");
            return LanguageDecision::default();
        };
        let probability = best.probability.clamp(0.0, 1.0);
        debug!(
            "Best language candidate '{}' at {:.2} ({} candidates)",
            best.code,
            probability,
            candidates.len()
        );

        let tag = if probability < self.min_probability {
            debug!(
                "Language '{}' below threshold {:.2}, not tagging",
                best.code, self.min_probability
            );
            None
        } else {
            Some(self.suffixes.suffix_for(&best.code))
        };

        LanguageDecision {
            tag,
            probability: Some(probability),
            code: Some(best.code.clone()),
        }
    }
}

/// First `max_chars` characters of the trimmed text.
fn snippet(text: &str, max_chars: usize) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((end, _)) => &trimmed[..end],
        None => trimmed,
    }
}

/// Highest probability wins; the earliest candidate wins a tie. Candidates
/// with a non-finite probability are ignored.
fn best_candidate(candidates: &[LanguageCandidate]) -> Option<&LanguageCandidate> {
    let mut best: Option<&LanguageCandidate> = None;
    for c in candidates.iter().filter(|c| c.probability.is_finite()) {
        match best {
            Some(b) if c.probability <= b.probability => {}
            _ => best = Some(c),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed candidate list and records the snippet it was given.
    struct FixedIdentifier {
        candidates: Vec<LanguageCandidate>,
        seen: Mutex<Option<String>>,
    }

    impl FixedIdentifier {
        fn new(candidates: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                candidates: candidates
                    .iter()
                    .map(|&(c, p)| LanguageCandidate::new(c, p))
                    .collect(),
                seen: Mutex::new(None),
            })
        }
    }

    impl LanguageIdentifier for FixedIdentifier {
        fn identify(&self, snippet: &str) -> Vec<LanguageCandidate> {
            *self.seen.lock().unwrap() = Some(snippet.to_string());
            self.candidates.clone()
        }
    }

    fn tagger(id: Arc<FixedIdentifier>) -> LanguageTagger {
        LanguageTagger::new(id, SuffixTable::default())
    }

    #[test]
    fn confident_candidate_is_tagged() {
        let d = tagger(FixedIdentifier::new(&[("en", 0.97)])).detect("Hello there");
        assert_eq!(d.tag.as_deref(), Some("eng"));
        assert_eq!(d.probability, Some(0.97));
        assert_eq!(d.code.as_deref(), Some("en"));
    }

    #[test]
    fn below_threshold_keeps_probability() {
        let d = tagger(FixedIdentifier::new(&[("fr", 0.55), ("es", 0.45)])).detect("texte");
        assert_eq!(d.tag, None);
        assert_eq!(d.probability, Some(0.55));
    }

    #[test]
    fn threshold_is_inclusive() {
        let d = tagger(FixedIdentifier::new(&[("de", 0.60)])).detect("text");
        assert_eq!(d.tag.as_deref(), Some("deu"));
    }

    #[test]
    fn empty_text_is_absent() {
        let id = FixedIdentifier::new(&[("en", 0.99)]);
        let d = tagger(Arc::clone(&id)).detect("   \n\t ");
        assert_eq!(d, LanguageDecision::default());
        assert!(id.seen.lock().unwrap().is_none(), "identifier must not run");
    }

    #[test]
    fn no_candidates_is_absent() {
        let d = tagger(FixedIdentifier::new(&[])).detect("1234 5678");
        assert_eq!(d, LanguageDecision::default());
    }

    #[test]
    fn max_probability_wins_and_ties_keep_first() {
        let d = tagger(FixedIdentifier::new(&[
            ("es", 0.2),
            ("fr", 0.7),
            ("it", 0.7),
        ]))
        .detect("x");
        assert_eq!(d.tag.as_deref(), Some("fra"));
    }

    #[test]
    fn nan_candidates_are_ignored() {
        let d = tagger(FixedIdentifier::new(&[("xx", f64::NAN), ("ru", 0.8)])).detect("x");
        assert_eq!(d.tag.as_deref(), Some("rus"));
        assert_eq!(d.probability, Some(0.8));
    }

    #[test]
    fn unknown_code_is_sanitised() {
        let d = tagger(FixedIdentifier::new(&[("pt-BR", 0.9)])).detect("olá");
        assert_eq!(d.tag.as_deref(), Some("pt_br"));
    }

    #[test]
    fn snippet_is_trimmed_and_bounded() {
        let id = FixedIdentifier::new(&[("en", 0.9)]);
        let t = tagger(Arc::clone(&id)).with_snippet_chars(5);
        t.detect("   héllo world   ");
        assert_eq!(id.seen.lock().unwrap().as_deref(), Some("héllo"));
    }

    #[test]
    fn custom_threshold() {
        let t = tagger(FixedIdentifier::new(&[("en", 0.5)])).with_min_probability(0.4);
        assert_eq!(t.detect("x").tag.as_deref(), Some("eng"));
    }

    #[test]
    fn lingua_tags_french() {
        let id = Arc::new(LinguaIdentifier::from_languages(&[
            Language::English,
            Language::French,
            Language::German,
            Language::Spanish,
        ]));
        let t = LanguageTagger::new(id, SuffixTable::default());
        let text = "Le petit prince s'assit sur une pierre et leva les yeux vers le ciel. \
                    Je me demande, dit-il, si les étoiles sont éclairées afin que chacun \
                    puisse un jour retrouver la sienne. Regarde ma planète, elle est juste \
                    au-dessus de nous, mais comme elle est loin!";
        let first = t.detect(text);
        assert_eq!(first.tag.as_deref(), Some("fra"));
        assert!(first.probability.unwrap() >= 0.60);
        // Deterministic: same input, same answer.
        assert_eq!(t.detect(text), first);
    }

    #[test]
    fn default_detector_ranks_french_first() {
        let id = LinguaIdentifier::new();
        let candidates = id.identify(
            "Le petit prince s'assit sur une pierre et leva les yeux vers le ciel. \
             Je me demande, dit-il, si les étoiles sont éclairées afin que chacun \
             puisse un jour retrouver la sienne.",
        );
        assert_eq!(candidates.first().map(|c| c.code.as_str()), Some("fr"));
    }

    #[test]
    fn lingua_gives_up_on_digits() {
        let id = Arc::new(LinguaIdentifier::from_languages(&[
            Language::English,
            Language::French,
        ]));
        let d = LanguageTagger::new(id, SuffixTable::default()).detect("12345 67890 !!!");
        assert_eq!(d.tag, None);
        assert_eq!(d.probability, None);
    }
}
