use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::tools::decode_text;

/// Gap between one cue's end and the next cue's start (seconds).
pub const CUE_GAP: f64 = 0.01;
/// Duration of the final cue.
pub const LAST_CUE_SECS: f64 = 3.0;
/// Duration used when the computed one is not positive.
pub const FALLBACK_CUE_SECS: f64 = 2.0;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{1,2}:\d{2}(?:\.\d{1,3})?)\]").expect("valid regex"));
static ANY_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]").expect("valid regex"));
static METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[(ti|ar|al):([^\]]*)\]").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    pub start: f64,
    pub text: String,
}

/// In-band `[ti:]`, `[ar:]` and `[al:]` fields. The first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LrcMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Lyric file bytes as text. A UTF-8 BOM is dropped and GBK files from
/// Chinese sources decode as such.
pub fn decode_lyric_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    decode_text(bytes)
}

/// `mm:ss[.fff]` to seconds. Fractions are read as centiseconds.
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    let (mm, rest) = ts.split_once(':')?;
    let (ss, frac) = rest.split_once('.').unwrap_or((rest, "0"));
    let minutes: u32 = mm.parse().ok()?;
    let seconds: u32 = ss.parse().ok()?;
    let centis: String = frac.chars().chain("00".chars()).take(2).collect();
    let centis: u32 = centis.parse().ok()?;
    Some(f64::from(minutes) * 60.0 + f64::from(seconds) + f64::from(centis) / 100.0)
}

/// Timed lines sorted by start. A line with several timestamps yields one
/// entry per timestamp; lines without text are dropped.
pub fn parse_lines(text: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let stamps: Vec<&str> = TIMESTAMP
            .captures_iter(line)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if stamps.is_empty() {
            continue;
        }
        let body = ANY_BRACKET.replace_all(line, "");
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        lines.extend(stamps.into_iter().filter_map(parse_timestamp).map(|start| LyricLine {
            start,
            text: body.to_string(),
        }));
    }
    lines.sort_by(|a, b| a.start.total_cmp(&b.start));
    lines
}

pub fn parse_metadata(text: &str) -> LrcMetadata {
    let mut meta = LrcMetadata::default();
    for cap in METADATA.captures_iter(text) {
        let value = cap[2].trim().to_string();
        let slot = match cap[1].to_ascii_lowercase().as_str() {
            "ti" => &mut meta.title,
            "ar" => &mut meta.artist,
            _ => &mut meta.album,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    meta
}

/// `HH:MM:SS,mmm`; negative input clamps to zero.
pub fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (h, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, ms) = (rem / 1000, rem % 1000);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Render timed lines as SubRip cues. `None` when there is nothing to show.
pub fn to_srt(lines: &[LyricLine]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut end = match lines.get(i + 1) {
            Some(next) => next.start - CUE_GAP,
            None => line.start + LAST_CUE_SECS,
        };
        if end <= line.start {
            end = line.start + FALLBACK_CUE_SECS;
        }
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}\n",
            i + 1,
            srt_timestamp(line.start),
            srt_timestamp(end),
            line.text
        );
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_read_fractions_as_centiseconds() {
        assert_eq!(parse_timestamp("01:02"), Some(62.0));
        assert_eq!(parse_timestamp("00:01.5"), Some(1.5));
        assert_eq!(parse_timestamp("00:01.25"), Some(1.25));
        assert_eq!(parse_timestamp("00:01.257"), Some(1.25));
        assert_eq!(parse_timestamp("1:00.00"), Some(60.0));
        assert_eq!(parse_timestamp("ab:cd"), None);
        assert_eq!(parse_timestamp("100"), None);
    }

    #[test]
    fn lines_expand_repeated_timestamps_and_sort() {
        let text = "[ti:Rain]\n[00:10.00][00:02.00]chorus\n[00:05.00]verse\n[00:07.00]\nno time\n";
        let lines = parse_lines(text);
        let starts: Vec<f64> = lines.iter().map(|l| l.start).collect();
        assert_eq!(starts, vec![2.0, 5.0, 10.0]);
        assert_eq!(lines[0].text, "chorus");
        assert_eq!(lines[1].text, "verse");
    }

    #[test]
    fn metadata_first_occurrence_wins_case_insensitive() {
        let meta = parse_metadata("[TI: Rain ][ar:Sam][ti:Other]\n[al:Weather]");
        assert_eq!(meta.title.as_deref(), Some("Rain"));
        assert_eq!(meta.artist.as_deref(), Some("Sam"));
        assert_eq!(meta.album.as_deref(), Some("Weather"));
        assert_eq!(parse_metadata("[00:01.00]x"), LrcMetadata::default());
    }

    #[test]
    fn srt_timestamp_formats_and_clamps() {
        assert_eq!(srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(srt_timestamp(3723.456), "01:02:03,456");
        assert_eq!(srt_timestamp(-4.0), "00:00:00,000");
    }

    #[test]
    fn srt_cue_durations() {
        let lines = vec![
            LyricLine { start: 1.0, text: "a".into() },
            LyricLine { start: 4.0, text: "b".into() },
            LyricLine { start: 4.0, text: "c".into() },
        ];
        let srt = to_srt(&lines).unwrap();
        let expected = "1\n00:00:01,000 --> 00:00:03,990\na\n\n\
                        2\n00:00:04,000 --> 00:00:06,000\nb\n\n\
                        3\n00:00:04,000 --> 00:00:07,000\nc\n\n";
        assert_eq!(srt, expected);
        assert_eq!(to_srt(&[]), None);
    }

    #[test]
    fn decode_strips_bom_and_tolerates_bad_bytes() {
        assert_eq!(decode_lyric_bytes(b"\xEF\xBB\xBF[ti:x]"), "[ti:x]");
        assert_eq!(decode_lyric_bytes(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn decode_falls_back_to_gbk() {
        let text = decode_lyric_bytes(b"[ti:\xD3\xEA]\n[00:01.00]\xCF\xC2\xD3\xEA\xC1\xCB\n");
        assert_eq!(parse_metadata(&text).title.as_deref(), Some("雨"));
        assert_eq!(parse_lines(&text)[0].text, "下雨了");
    }
}
