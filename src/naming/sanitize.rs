//! Caption-to-filename sanitization.

use std::sync::LazyLock;

use regex::Regex;

use super::FALLBACK_BASE_NAME;

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap_or_else(|e| panic!("invalid regex: {e}")));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|e| panic!("invalid regex: {e}")));

/// Characters Windows filesystems reject in filenames.
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Quote-like characters are dropped instead of being replaced with `_`.
const QUOTE_CHARS: &[char] = &['"', '«', '»', '“', '”'];

/// Codepoint ranges treated as emoji and stripped from filenames.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F300, 0x1F5FF),
    (0x1F600, 0x1F64F),
    (0x1F680, 0x1F6FF),
    (0x1F900, 0x1F9FF),
    (0x1FA70, 0x1FAFF),
    (0x2600, 0x27BF),
    (0x1F1E6, 0x1F1FF), // regional indicators / flags
];

const VARIATION_SELECTORS: &[u32] = &[0xFE0E, 0xFE0F];

fn is_emoji(cp: u32) -> bool {
    VARIATION_SELECTORS.contains(&cp)
        || EMOJI_RANGES.iter().any(|&(start, end)| (start..=end).contains(&cp))
}

/// Turns free-form caption text into a safe filename base.
///
/// Strips HTML tags and emoji, replaces characters filesystems reject,
/// collapses whitespace, and neutralizes `..` sequences and leading or
/// trailing dots so the result can never escape its directory. Returns
/// [`FALLBACK_BASE_NAME`] when nothing usable remains.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return FALLBACK_BASE_NAME.to_owned();
    }

    let without_tags = HTML_TAG_RE.replace_all(name, " ");

    let mut kept = String::with_capacity(without_tags.len());
    for ch in without_tags.chars() {
        if ch == '\0' || is_emoji(ch as u32) || QUOTE_CHARS.contains(&ch) {
            continue;
        }
        if INVALID_FILENAME_CHARS.contains(&ch) {
            kept.push('_');
            continue;
        }
        if ch.is_whitespace() {
            kept.push(' ');
            continue;
        }
        kept.push(ch);
    }

    let mut sanitized = WHITESPACE_RE.replace_all(&kept, " ").trim().to_owned();
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }
    let sanitized = sanitized
        .trim_start_matches(['.', ' '])
        .trim_end_matches([' ', '.'])
        .to_owned();

    if sanitized.is_empty() {
        FALLBACK_BASE_NAME.to_owned()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(sanitize_name("Holiday video"), "Holiday video");
    }

    #[test]
    fn test_html_tags_stripped() {
        assert_eq!(sanitize_name("<b>Bold</b> title"), "Bold title");
    }

    #[test]
    fn test_invalid_chars_replaced() {
        assert_eq!(sanitize_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_name("what?*"), "what__");
    }

    #[test]
    fn test_quotes_dropped() {
        assert_eq!(sanitize_name("\"quoted\" «name»"), "quoted name");
    }

    #[test]
    fn test_emoji_stripped() {
        assert_eq!(sanitize_name("party 🎉🎊 time"), "party time");
        assert_eq!(sanitize_name("flag 🇩🇪 day"), "flag day");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(sanitize_name("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn test_dot_sequences_neutralized() {
        assert_eq!(sanitize_name("..secret"), "_secret");
        assert!(!sanitize_name("a..b..c").contains(".."));
    }

    #[test]
    fn test_leading_trailing_dots_stripped() {
        assert_eq!(sanitize_name(".hidden"), "hidden");
        assert_eq!(sanitize_name("name. "), "name");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(sanitize_name(""), FALLBACK_BASE_NAME);
        assert_eq!(sanitize_name("🎉🎉"), FALLBACK_BASE_NAME);
        assert_eq!(sanitize_name("<i></i>"), FALLBACK_BASE_NAME);
    }

    #[test]
    fn test_cyrillic_preserved() {
        assert_eq!(sanitize_name("Отчёт за месяц"), "Отчёт за месяц");
    }
}
