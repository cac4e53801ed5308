//! Text repair: reverse common mojibake and clean up decoding debris.
//!
//! Text that was UTF-8 encoded, then read back as Windows-1252 or Latin-1
//! (and often saved again), shows up as `Ã©tÃ©` instead of `été` or `â€™`
//! instead of `’`. The rules below undo that and a few related artefacts.
//! Every rule is a pure `&str → String` pass and is tested on its own.
//!
//! ## Rule Order
//!
//! Mojibake reversal must see the raw C1 characters, so it runs before C1
//! controls are reinterpreted. C1 fixing turns U+0085 into `…`, as a
//! Windows-1252 reader would, so line-break normalisation never sees NEL.
//!
//! Private-use code points (custom glyphs in subtitle fonts, for instance)
//! are left alone unless the caller explicitly opts out of preserving them.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on reversal passes; each pass peels one layer of double encoding.
const MAX_MOJIBAKE_PASSES: usize = 3;

/// Apply the repair pass when `auto_fix` is set; otherwise return `text` as-is.
///
/// The pipeline always preserves private-use characters.
pub fn normalize(text: String, auto_fix: bool) -> String {
    if !auto_fix {
        return text;
    }
    let fixed = fix_text(&text, true);
    if fixed != text {
        debug!("Text repair changed {} → {} bytes", text.len(), fixed.len());
    }
    fixed
}

/// Repair mojibake and related artefacts.
///
/// Rules (applied in order):
/// 1. Remove ANSI terminal escape sequences
/// 2. Reverse UTF-8 → Windows-1252/Latin-1 mojibake (up to three layers)
/// 3. Reinterpret stray C1 controls as the Windows-1252 characters they were
/// 4. Expand Latin ligatures (`ﬁ` → `fi`)
/// 5. Normalise line breaks (CRLF, CR, U+2028, U+2029 → LF)
/// 6. Remove control and formatting characters that have no business in text
/// 7. Compose to Unicode NFC (`e` + U+0301 → `é`)
/// 8. Only if `preserve_private_use` is false: drop supplementary private-use
///    characters (planes 15 and 16)
pub fn fix_text(input: &str, preserve_private_use: bool) -> String {
    let s = remove_terminal_escapes(input);
    let s = fix_mojibake(&s);
    let s = fix_c1_controls(&s);
    let s = fix_latin_ligatures(&s);
    let s = normalise_line_breaks(&s);
    let s = remove_control_chars(&s);
    let s = compose_nfc(&s);
    if preserve_private_use {
        s
    } else {
        remove_private_use(&s)
    }
}

// ── Windows-1252 high half ───────────────────────────────────────────────────

/// Characters for bytes 0x80–0x9F in Windows-1252. The five undefined bytes
/// map to the C1 control of the same value, as WHATWG decoders do.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// The single byte `c` came from if it was decoded as Windows-1252 or Latin-1.
fn cp1252_byte(c: char) -> Option<u8> {
    let cp = c as u32;
    if (0x80..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    CP1252_HIGH
        .iter()
        .position(|&h| h == c)
        .map(|i| 0x80 + i as u8)
}

// ── Rule 1: Terminal escapes ─────────────────────────────────────────────────

static RE_TERMINAL_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

fn remove_terminal_escapes(input: &str) -> String {
    RE_TERMINAL_ESCAPE.replace_all(input, "").into_owned()
}

// ── Rule 2: Mojibake ─────────────────────────────────────────────────────────

/// A run of non-ASCII characters that all have a single-byte Windows-1252 or
/// Latin-1 form. UTF-8 multi-byte sequences consist only of bytes ≥ 0x80, so
/// mojibake always lives inside such runs.
static RE_SINGLE_BYTE_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[\x{80}-\x{FF}\x{152}\x{153}\x{160}\x{161}\x{178}\x{17D}\x{17E}\x{192}",
        r"\x{2C6}\x{2DC}\x{2013}\x{2014}\x{2018}-\x{201A}\x{201C}-\x{201E}",
        r"\x{2020}-\x{2022}\x{2026}\x{2030}\x{2039}\x{203A}\x{20AC}\x{2122}]{2,}",
    ))
    .unwrap()
});

fn fix_mojibake(input: &str) -> String {
    let mut text = input.to_string();
    for _ in 0..MAX_MOJIBAKE_PASSES {
        let next = RE_SINGLE_BYTE_RUN
            .replace_all(&text, |caps: &regex::Captures<'_>| reencode_run(&caps[0]))
            .into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// Re-read one run as the UTF-8 it was probably meant to be.
///
/// Each character of the run is exactly one byte, so byte offsets and
/// character offsets line up. Decoded characters outside the plausible ranges
/// are rejected and the original characters kept.
fn reencode_run(run: &str) -> String {
    let chars: Vec<char> = run.chars().collect();
    let bytes: Vec<u8> = match chars.iter().map(|&c| cp1252_byte(c)).collect() {
        Some(b) => b,
        None => return run.to_string(),
    };

    let mut out = String::with_capacity(run.len());
    let mut pos = 0;
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            let width = c.len_utf8();
            if c.is_ascii() || !is_plausible(c) {
                out.extend(&chars[pos..pos + width]);
            } else {
                out.push(c);
            }
            pos += width;
        }
        let invalid = chunk.invalid().len();
        out.extend(&chars[pos..pos + invalid]);
        pos += invalid;
    }
    out
}

/// Whether `c` is a character real text commonly contains.
///
/// Mojibake reversal only fires when the result lands here, which keeps
/// legitimate pairs like `É’` (would decode to IPA `ɒ`) intact.
fn is_plausible(c: char) -> bool {
    matches!(c as u32,
        0x00A0..=0x017F      // Latin-1 supplement, Latin Extended-A
        | 0x0370..=0x06FF    // Greek, Cyrillic, Armenian, Hebrew, Arabic
        | 0x0900..=0x0DFF    // Indic scripts
        | 0x0E00..=0x0E7F    // Thai
        | 0x1E00..=0x1EFF    // Latin Extended Additional (Vietnamese)
        | 0x2000..=0x206F    // General punctuation
        | 0x20A0..=0x20CF    // Currency symbols
        | 0x2100..=0x214F    // Letterlike symbols
        | 0x2190..=0x21FF    // Arrows
        | 0x2200..=0x22FF    // Mathematical operators
        | 0x2500..=0x27BF    // Box drawing, shapes, dingbats
        | 0x3000..=0x9FFF    // CJK
        | 0xAC00..=0xD7AF    // Hangul
        | 0xFF00..=0xFFEF    // Half/full-width forms
        | 0x1F000..=0x1FAFF  // Emoji
    )
}

// ── Rule 3: C1 controls ──────────────────────────────────────────────────────

fn fix_c1_controls(input: &str) -> String {
    input
        .chars()
        .map(|c| match c as u32 {
            cp @ 0x80..=0x9F => CP1252_HIGH[(cp - 0x80) as usize],
            _ => c,
        })
        .collect()
}

// ── Rule 4: Latin ligatures ──────────────────────────────────────────────────

fn fix_latin_ligatures(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            '\u{0132}' => out.push_str("IJ"),
            '\u{0133}' => out.push_str("ij"),
            c => out.push(c),
        }
    }
    out
}

// ── Rule 5: Line breaks ──────────────────────────────────────────────────────

fn normalise_line_breaks(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(|c: char| matches!(c, '\r' | '\u{2028}' | '\u{2029}'), "\n")
}

// ── Rule 6: Control characters ───────────────────────────────────────────────

fn is_unwanted_control(c: char) -> bool {
    matches!(c as u32,
        0x00..=0x08
        | 0x0B
        | 0x0E..=0x1F
        | 0x7F
        | 0x206A..=0x206F
        | 0xFEFF
        | 0xFFF9..=0xFFFC
        | 0x1D173..=0x1D17A
        | 0xE0000..=0xE007F
    )
}

fn remove_control_chars(input: &str) -> String {
    input.chars().filter(|&c| !is_unwanted_control(c)).collect()
}

// ── Rule 7: NFC ──────────────────────────────────────────────────────────────

fn compose_nfc(input: &str) -> String {
    input.nfc().collect()
}

// ── Rule 8: Private use (opt-in) ─────────────────────────────────────────────

fn remove_private_use(input: &str) -> String {
    input
        .chars()
        .filter(|&c| !(0xF0000..=0x10FFFF).contains(&(c as u32)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_without_auto_fix_is_identity() {
        let s = "Ã©tÃ©\r\n\u{FEFF}".to_string();
        assert_eq!(normalize(s.clone(), false), s);
    }

    #[test]
    fn test_remove_terminal_escapes() {
        assert_eq!(remove_terminal_escapes("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn test_fix_mojibake_latin() {
        assert_eq!(fix_mojibake("Ã©tÃ©"), "été");
        assert_eq!(fix_mojibake("dÃ©jÃ\u{A0} vu"), "déjà vu");
    }

    #[test]
    fn test_fix_mojibake_punctuation() {
        assert_eq!(fix_mojibake("itâ€™s"), "it’s");
        assert_eq!(fix_mojibake("â€œquotedâ€\u{9D}"), "“quoted”");
    }

    #[test]
    fn test_fix_mojibake_cjk_and_emoji() {
        // Every byte read back as Latin-1.
        let garbled: String = "日本 😀".bytes().map(char::from).collect();
        assert_eq!(fix_mojibake(&garbled), "日本 😀");
    }

    #[test]
    fn test_fix_double_encoding() {
        assert_eq!(fix_mojibake("ÃƒÂ©tÃƒÂ©"), "été");
    }

    #[test]
    fn test_legitimate_text_untouched() {
        for s in ["déjà vu", "São Paulo", "CAFÉ’s menu", "Ærøskøbing", "naïve — «ok»"] {
            assert_eq!(fix_mojibake(s), s, "changed {s:?}");
        }
    }

    #[test]
    fn test_fix_c1_controls() {
        assert_eq!(fix_c1_controls("\u{93}hi\u{94}"), "“hi”");
        assert_eq!(fix_c1_controls("\u{81}"), "\u{81}");
    }

    #[test]
    fn test_fix_latin_ligatures() {
        assert_eq!(fix_latin_ligatures("\u{FB01}ne \u{FB02}ow"), "fine flow");
    }

    #[test]
    fn test_normalise_line_breaks() {
        assert_eq!(normalise_line_breaks("a\r\nb\rc\u{2028}d"), "a\nb\nc\nd");
    }

    #[test]
    fn test_remove_control_chars() {
        assert_eq!(remove_control_chars("\u{FEFF}a\u{0}b\tc\n"), "ab\tc\n");
    }

    #[test]
    fn test_compose_nfc() {
        assert_eq!(compose_nfc("cafe\u{301}"), "café");
        assert_eq!(compose_nfc("A\u{30A}ngstro\u{308}m"), "Ångström");
        assert_eq!(fix_text("re\u{301}sume\u{301}", true), "résumé");
    }

    #[test]
    fn private_use_preserved_by_default() {
        let s = "glyph \u{E000} and \u{F0001}";
        assert_eq!(fix_text(s, true), s);
    }

    #[test]
    fn supplementary_private_use_removed_on_request() {
        assert_eq!(fix_text("a\u{F0001}b\u{E000}", false), "ab\u{E000}");
    }

    #[test]
    fn test_fix_text_full_pipeline() {
        let input = "\u{FEFF}Ã‡a va? C\u{2019}est l\u{FB01}n.\r\n\x1b[1mOK\x1b[0m";
        assert_eq!(fix_text(input, true), "Ça va? C’est lfin.\nOK");
    }
}
