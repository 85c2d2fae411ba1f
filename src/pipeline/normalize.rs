//! Text normalisation: deterministic cleanup of extracted and generated text.
//!
//! pdfium returns page text with `\r\n` line breaks and the odd zero-width
//! character; inference services sometimes wrap JSON in ```json fences despite
//! being told not to. These are pure `&str → String` passes applied in a fixed
//! order; none of them touches the content itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise text read from a document layer or an OCR engine.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 3. Trim trailing whitespace per line
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    trim_trailing_whitespace(&s)
}

/// Strip one outer code fence (```` ``` ```` or ```` ```json ````) if the whole
/// reply is wrapped in it.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```$").unwrap());

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_and_trailing_spaces() {
        assert_eq!(clean_text("a  \r\nb\rc\t"), "a\nb\nc");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(clean_text("\u{FEFF}he\u{200B}llo\u{00AD}"), "hello");
    }

    #[test]
    fn whitespace_only_page_becomes_empty() {
        assert!(clean_text(" \r\n \u{200B}\r\n").trim().is_empty());
    }

    #[test]
    fn json_fence_stripped() {
        let raw = "```json\n{\"intent\":\"summarize\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"intent\":\"summarize\"}");
    }

    #[test]
    fn bare_fence_stripped() {
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
    }

    #[test]
    fn unfenced_text_only_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
