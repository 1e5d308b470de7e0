//! Filename heuristics.
//!
//! These helpers guess structure from human-authored file names, so they are
//! kept isolated and tested for their edge cases.

use std::sync::LazyLock;

use regex::Regex;

/// Characters illegal on the most restrictive supported filesystem (Windows),
/// plus the full- and half-width exclamation marks that confuse some players.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '!', '！'];

/// Used when sanitizing leaves nothing.
pub const PLACEHOLDER_NAME: &str = "Unnamed";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TRACK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*-\s*(.+)$").expect("valid regex"));

/// Make `name` safe as a file or directory name.
///
/// Illegal characters and non-whitespace control characters are dropped,
/// whitespace runs (tabs and newlines included) collapse to one space, and
/// trailing dots are removed.
pub fn sanitize_file_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !(c.is_control() && !c.is_whitespace()))
        .collect();
    let collapsed = WHITESPACE.replace_all(&kept, " ");
    let cleaned = collapsed.trim().trim_end_matches('.').trim_end();
    if cleaned.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Normalize a raw track tag: `"03/12"` → `"03"`, `" 1 0 "` → `"10"`.
pub fn parse_track_number(raw: &str) -> Option<String> {
    let head = raw.split('/').next().unwrap_or("");
    let compact: String = head.chars().filter(|c| !c.is_whitespace()).collect();
    (!compact.is_empty()).then_some(compact)
}

/// The part of a stem after its last `"- "`, trimmed.
///
/// - `"Artist - Title"` → `"Title"`
/// - `"A - B - C"` → `"C"` (multiple dashes: the last one wins)
/// - `"AC-DC - Song"` → `"Song"` (a dash without a following space is not a separator)
/// - `"Title"` → `"Title"` (no dash: whole stem)
/// - `"Title - "` → `"Title -"` (nothing after the dash: whole stem, trimmed)
pub fn title_suffix(stem: &str) -> &str {
    match stem.rfind("- ") {
        Some(idx) => {
            let tail = stem[idx + 2..].trim();
            if tail.is_empty() { stem.trim() } else { tail }
        }
        None => stem.trim(),
    }
}

/// Target stem for a numbered track: `"{track} - {title}"`, sanitized.
pub fn track_file_stem(track: &str, title: &str) -> String {
    sanitize_file_name(&format!("{track} - {title}"))
}

/// Drop a leading `"{number} - "`: `"01 - Rain"` → `"Rain"`.
pub fn strip_track_prefix(stem: &str) -> &str {
    match TRACK_PREFIX.captures(stem).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => stem.trim(),
    }
}

/// Split `"Artist - Title"` at the first `" - "`. Without one, the artist is empty.
pub fn split_artist_title(stem: &str) -> (&str, &str) {
    match stem.split_once(" - ") {
        Some((artist, title)) => (artist.trim(), title.trim()),
        None => ("", stem.trim()),
    }
}

/// Case- and whitespace-insensitive comparison key.
pub fn normalize_text(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_illegal_and_collapses_whitespace() {
        assert_eq!(sanitize_file_name("AC/DC: Back  in\tBlack?"), "ACDC Back in Black");
        assert_eq!(sanitize_file_name("Hello!！ World"), "Hello World");
        assert_eq!(sanitize_file_name("  name... "), "name");
        assert_eq!(sanitize_file_name("a\u{0007}b"), "ab");
    }

    #[test]
    fn sanitize_turns_tabs_and_newlines_into_spaces() {
        assert_eq!(sanitize_file_name("Back in\tBlack"), "Back in Black");
        assert_eq!(sanitize_file_name("Rain\r\nfalls \t\u{0000}down"), "Rain falls down");
    }

    #[test]
    fn sanitize_empty_result_uses_placeholder() {
        assert_eq!(sanitize_file_name(""), PLACEHOLDER_NAME);
        assert_eq!(sanitize_file_name("???"), PLACEHOLDER_NAME);
        assert_eq!(sanitize_file_name(" . "), PLACEHOLDER_NAME);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_file_name(" Björk - Homogenic: <Deluxe>  ");
        assert_eq!(sanitize_file_name(&once), once);
    }

    #[test]
    fn parse_track_number_strips_total_and_whitespace() {
        assert_eq!(parse_track_number("03/12").as_deref(), Some("03"));
        assert_eq!(parse_track_number(" 1 0 ").as_deref(), Some("10"));
        assert_eq!(parse_track_number("7").as_deref(), Some("7"));
        assert_eq!(parse_track_number("/12"), None);
        assert_eq!(parse_track_number("   "), None);
    }

    #[test]
    fn title_suffix_edge_cases() {
        assert_eq!(title_suffix("Artist - Title"), "Title");
        assert_eq!(title_suffix("A - B - C"), "C");
        assert_eq!(title_suffix("AC-DC - Song"), "Song");
        assert_eq!(title_suffix("Title"), "Title");
        assert_eq!(title_suffix("  Title  "), "Title");
        assert_eq!(title_suffix("Title - "), "Title -");
        assert_eq!(title_suffix("Artist -Title"), "Artist -Title");
    }

    #[test]
    fn track_file_stem_sanitizes() {
        assert_eq!(track_file_stem("1", "What?"), "1 - What");
        assert_eq!(track_file_stem("02", "Rain"), "02 - Rain");
    }

    #[test]
    fn strip_track_prefix_only_removes_numbers() {
        assert_eq!(strip_track_prefix("01 - Rain"), "Rain");
        assert_eq!(strip_track_prefix("1-Rain"), "Rain");
        assert_eq!(strip_track_prefix("Sam - Rain"), "Sam - Rain");
        assert_eq!(strip_track_prefix("Rain"), "Rain");
    }

    #[test]
    fn split_artist_title_uses_first_separator() {
        assert_eq!(split_artist_title("Sam - Rain"), ("Sam", "Rain"));
        assert_eq!(split_artist_title("Sam - Rain - Live"), ("Sam", "Rain - Live"));
        assert_eq!(split_artist_title("Rain"), ("", "Rain"));
    }

    #[test]
    fn normalize_text_folds_case_and_spaces() {
        assert_eq!(normalize_text("  Hello   World "), "hello world");
        assert_eq!(normalize_text(""), "");
    }
}
