//! Repair pass: text-level fixes applied before JSON parsing.
//!
//! Metadata dumps scraped from paper portals routinely contain LaTeX in
//! abstracts (`\alpha`, `\cite{…}`), raw control bytes, and arrays closed
//! with a trailing comma. None of these parse with a strict JSON parser.
//!
//! ## Rule Order
//!
//! 1. Double every backslash that is not immediately followed by `"`
//! 2. Strip C0 and C1 control characters
//! 3. Drop a comma that directly precedes `]` (whitespace allowed between)
//!
//! Rule 1 is a heuristic. It leaves `\"` alone but also turns a valid
//! escape such as `\n` into `\\n`, so the parsed string holds a literal
//! backslash followed by `n`. Existing downstream consumers depend on that
//! output, so the behaviour is kept as is. Rule 1 is also not idempotent and
//! must run exactly once per input; rules 2 and 3 are idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all repair rules to raw input text, in order.
pub fn repair_json_text(input: &str) -> String {
    let s = escape_stray_backslashes(input);
    let s = strip_control_chars(&s);
    remove_trailing_commas(&s)
}

// ── Rule 1: Escape stray backslashes ─────────────────────────────────────────

/// Double each `\` whose next character in the *input* is not `"`.
///
/// The lookahead is against the original text, so `\\"` becomes `\\\"`:
/// the first backslash is followed by a backslash and is doubled, the second
/// is followed by a quote and is kept.
pub fn escape_stray_backslashes(input: &str) -> String {
    let extra = input.bytes().filter(|&b| b == b'\\').count();
    let mut out = String::with_capacity(input.len() + extra);
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() != Some(&'"') {
            out.push_str("\\\\");
        } else {
            out.push(c);
        }
    }
    out
}

// ── Rule 2: Strip control characters ─────────────────────────────────────────

static RE_CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x1F\x7F-\x9F]").unwrap());

/// Remove U+0000–U+001F and U+007F–U+009F, including `\n`, `\r` and `\t`.
pub fn strip_control_chars(input: &str) -> String {
    RE_CONTROL_CHARS.replace_all(input, "").into_owned()
}

// ── Rule 3: Remove trailing commas ───────────────────────────────────────────

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*]").unwrap());

/// `[1, 2, ]` → `[1, 2]`. Trailing commas before `}` are left alone.
pub fn remove_trailing_commas(input: &str) -> String {
    RE_TRAILING_COMMA.replace_all(input, "]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_backslash_before_letter_doubled() {
        let input = r#"{"abstract":"C:\path and \alpha"}"#;
        let out = escape_stray_backslashes(input);
        assert_eq!(out, r#"{"abstract":"C:\\path and \\alpha"}"#);

        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["abstract"], r"C:\path and \alpha");
    }

    #[test]
    fn test_backslash_before_quote_untouched() {
        let input = r#"{"title":"say \"hi\""}"#;
        assert_eq!(escape_stray_backslashes(input), input);
    }

    #[test]
    fn test_lookahead_uses_original_text() {
        // `\\"` → first backslash doubled, second kept.
        assert_eq!(escape_stray_backslashes(r#"\\""#), r#"\\\""#);
    }

    #[test]
    fn test_trailing_backslash_doubled() {
        assert_eq!(escape_stray_backslashes("end\\"), "end\\\\");
    }

    #[test]
    fn test_valid_escape_is_double_escaped() {
        // Known limitation: `\n` becomes a literal backslash + `n`.
        let out = repair_json_text(r#"["line\nbreak"]"#);
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v[0], r"line\nbreak");
    }

    #[test]
    fn test_backslash_doubling_not_idempotent() {
        let once = escape_stray_backslashes(r"\x");
        let twice = escape_stray_backslashes(&once);
        assert_ne!(once, twice);
    }

    #[test]
    fn test_strip_control_chars() {
        let input = "a\u{0000}b\u{001F}c\td\ne\u{007F}f\u{0085}g\u{009F}h";
        assert_eq!(strip_control_chars(input), "abcdefgh");
    }

    #[test]
    fn test_strip_keeps_non_ascii() {
        let input = "Schrödinger — 薛定谔 \u{00A0}";
        assert_eq!(strip_control_chars(input), input);
    }

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(remove_trailing_commas("[1, 2, ]"), "[1, 2]");
        assert_eq!(remove_trailing_commas("[{\"a\":1},\n  ]"), "[{\"a\":1}]");
        assert_eq!(remove_trailing_commas("[[1,],]"), "[[1]]");
        assert_eq!(remove_trailing_commas("{\"a\":1,}"), "{\"a\":1,}");
    }

    #[test]
    fn test_strip_and_comma_rules_idempotent() {
        let input = "[{\"t\":\"x\u{0007}y\"},\r\n ]";
        let once = remove_trailing_commas(&strip_control_chars(input));
        let twice = remove_trailing_commas(&strip_control_chars(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_repair_full_pipeline() {
        let input = "[\n  {\"_id\": \"p1\", \"abstract\": \"uses \\beta\u{0001} decay\"},\n]\n";
        let out = repair_json_text(input);
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 1);
        assert_eq!(v[0]["abstract"], r"uses \beta decay");
    }

    #[test]
    fn test_clean_input_unchanged() {
        let input = r#"[{"_id":"p1","title":"T","abstract":"A B"}]"#;
        assert_eq!(repair_json_text(input), input);
    }
}
