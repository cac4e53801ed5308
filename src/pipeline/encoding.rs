//! Encoding resolution: raw bytes → decoded text plus a confidence score.
//!
//! Resolution never fails. A forced label that `encoding_rs` does not know
//! falls back to UTF-8 at confidence `0.0`, and byte sequences that cannot be
//! mapped in the chosen encoding become U+FFFD instead of aborting the decode.
//!
//! ## Auto-detection order
//!
//! 1. Byte-order mark (UTF-8, UTF-16 LE/BE) → confidence `1.0`, BOM stripped.
//! 2. Well-formed UTF-8 (including pure ASCII) → confidence `1.0`.
//! 3. `chardetng` statistical guess. Its high/low assessment sets the base
//!    score, which is then scaled down by the share of replacement characters
//!    the decode produced.
//!
//! Empty input identifies nothing and is reported as UTF-8 at `0.0`.

use crate::config::ForcedEncoding;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::{debug, warn};

/// Name reported when nothing better is known.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Base confidence when chardetng is sure of its guess.
const HIGH_CONFIDENCE: f64 = 0.99;
/// Base confidence when chardetng flags its guess as uncertain.
const LOW_CONFIDENCE: f64 = 0.5;

/// The decoder chosen for one resolve call.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingDecision {
    /// Encoding name, e.g. `"windows-1252"`, `"UTF-16LE"`, `"ISO-8859-1"`.
    pub name: String,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub decoded_text: String,
    /// U+FFFD characters inserted for unmappable byte sequences.
    pub replacements: usize,
}

/// A concrete decoder.
#[derive(Debug, Clone, Copy)]
enum Codec {
    /// Byte value == code point.
    Latin1,
    /// UTF-16 with endianness from the BOM, little-endian otherwise.
    Utf16FromBom,
    Whatwg(&'static Encoding),
}

/// Resolve the encoding of `raw` and decode it.
///
/// `forced` of `None`, `""` or `"Auto-detect"` (any case) runs detection.
pub fn resolve(raw: &[u8], forced: Option<&str>) -> EncodingDecision {
    let forced = forced
        .map(|label| label.parse::<ForcedEncoding>().unwrap_or_default())
        .filter(|enc| !enc.is_auto());

    let decision = match forced {
        Some(enc) => resolve_forced(raw, &enc),
        None => detect(raw),
    };

    if decision.replacements > 0 {
        warn!(
            "{} undecodable sequence(s) replaced with U+FFFD while decoding as {}",
            decision.replacements, decision.name
        );
    }
    debug!(
        "Resolved encoding {} (confidence {:.2})",
        decision.name, decision.confidence
    );
    decision
}

fn resolve_forced(raw: &[u8], enc: &ForcedEncoding) -> EncodingDecision {
    match lookup(enc) {
        Some(codec) => {
            let (name, text, replacements) = decode(raw, codec, false);
            EncodingDecision {
                name,
                confidence: 1.0,
                decoded_text: text,
                replacements,
            }
        }
        None => {
            warn!(
                "Unknown encoding '{}', falling back to {}",
                enc.label(),
                DEFAULT_ENCODING
            );
            let (_, text, replacements) = decode(raw, Codec::Whatwg(encoding_rs::UTF_8), false);
            EncodingDecision {
                name: DEFAULT_ENCODING.to_string(),
                confidence: 0.0,
                decoded_text: text,
                replacements,
            }
        }
    }
}

fn lookup(enc: &ForcedEncoding) -> Option<Codec> {
    let codec = match enc {
        ForcedEncoding::AutoDetect => return None,
        ForcedEncoding::Utf8 => Codec::Whatwg(encoding_rs::UTF_8),
        ForcedEncoding::Utf16 => Codec::Utf16FromBom,
        ForcedEncoding::Utf16Le => Codec::Whatwg(encoding_rs::UTF_16LE),
        ForcedEncoding::Utf16Be => Codec::Whatwg(encoding_rs::UTF_16BE),
        ForcedEncoding::Iso8859_1 => Codec::Latin1,
        ForcedEncoding::Windows1252 => Codec::Whatwg(encoding_rs::WINDOWS_1252),
        ForcedEncoding::ShiftJis => Codec::Whatwg(encoding_rs::SHIFT_JIS),
        ForcedEncoding::Gb18030 => Codec::Whatwg(encoding_rs::GB18030),
        ForcedEncoding::Other(label) => {
            let encoding = Encoding::for_label(label.trim().as_bytes())?;
            // WHATWG maps ISO-2022-KR and friends to a decoder that turns the
            // whole input into a single U+FFFD; treat those as unknown.
            if encoding == encoding_rs::REPLACEMENT {
                return None;
            }
            Codec::Whatwg(encoding)
        }
    };
    Some(codec)
}

fn detect(raw: &[u8]) -> EncodingDecision {
    if raw.is_empty() {
        return EncodingDecision {
            name: DEFAULT_ENCODING.to_string(),
            confidence: 0.0,
            decoded_text: String::new(),
            replacements: 0,
        };
    }

    if let Some((encoding, _bom_len)) = Encoding::for_bom(raw) {
        debug!("Found {} byte-order mark", encoding.name());
        let (name, text, replacements) = decode(raw, Codec::Whatwg(encoding), true);
        return EncodingDecision {
            name,
            confidence: 1.0,
            decoded_text: text,
            replacements,
        };
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        return EncodingDecision {
            name: encoding_rs::UTF_8.name().to_string(),
            confidence: 1.0,
            decoded_text: text.to_string(),
            replacements: 0,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(raw, true);
    // UTF-8 was ruled out above, so don't let chardetng pick it.
    let (encoding, high) = detector.guess_assess(None, false);
    let (name, text, replacements) = decode(raw, Codec::Whatwg(encoding), false);

    let base = if high { HIGH_CONFIDENCE } else { LOW_CONFIDENCE };
    let confidence = score(base, replacements, text.chars().count());
    debug!(
        "chardetng guessed {} ({} confidence)",
        name,
        if high { "high" } else { "low" }
    );

    EncodingDecision {
        name,
        confidence,
        decoded_text: text,
        replacements,
    }
}

/// Scale `base` by the share of characters that decoded cleanly.
fn score(base: f64, replacements: usize, chars: usize) -> f64 {
    if chars == 0 {
        return 0.0;
    }
    let clean = 1.0 - (replacements as f64 / chars as f64);
    let s = base * clean;
    if s.is_finite() {
        s.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Decode `raw` with `codec`, returning `(name, text, replacements)`.
///
/// `strip_bom` removes a BOM matching the codec; forced decodes keep it as
/// U+FEFF so that re-encoding is lossless.
fn decode(raw: &[u8], codec: Codec, strip_bom: bool) -> (String, String, usize) {
    match codec {
        Codec::Latin1 => {
            let text = encoding_rs::mem::decode_latin1(raw).into_owned();
            ("ISO-8859-1".to_string(), text, 0)
        }
        Codec::Utf16FromBom => {
            let encoding = match Encoding::for_bom(raw) {
                Some((enc, _)) if enc == encoding_rs::UTF_16BE => encoding_rs::UTF_16BE,
                _ => encoding_rs::UTF_16LE,
            };
            decode(raw, Codec::Whatwg(encoding), true)
        }
        Codec::Whatwg(encoding) => {
            let (text, had_errors) = if strip_bom {
                encoding.decode_with_bom_removal(raw)
            } else {
                encoding.decode_without_bom_handling(raw)
            };
            let replacements = if had_errors {
                count_replacements(&text)
            } else {
                0
            };
            (encoding.name().to_string(), text.into_owned(), replacements)
        }
    }
}

fn count_replacements(text: &str) -> usize {
    text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count()
}
