//! Subtitle parser (C1): turns an SRT byte stream into a [`Timeline`].
//!
//! Grounded on the tolerant-grammar approach of `kaegi-subparse`'s SRT
//! reader, rewritten around `regex` (the teacher's parsing tool of choice)
//! instead of a combinator grammar, since the block structure is regular.

mod encoding;
mod language;

pub use language::detect_language;

use crate::error::{ParseError, Result};
use crate::model::{fingerprint_of, Segment, Timeline};
use regex::Regex;
use std::sync::OnceLock;

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:(\d+)\s*\r?\n)?(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})[^\r\n]*\r?\n((?:[^\r\n]+\r?\n?)*)",
        )
        .expect("static SRT block regex is valid")
    })
}

/// Parse an SRT byte stream into a [`Timeline`].
///
/// Accepted syntax, recoverable errors and fatal errors follow spec §4.1:
/// indices are renumbered 1..N regardless of what the input declares;
/// empty-after-trim segments and duplicate-consecutive-identical segments
/// are dropped/merged rather than failing the whole parse; a malformed
/// timestamp or `end <= start` aborts the parse.
pub fn parse_srt(bytes: &[u8]) -> Result<Timeline> {
    let text = encoding::decode(bytes)?;

    let mut segments: Vec<Segment> = Vec::new();
    let mut block_no = 0usize;

    for caps in block_re().captures_iter(&text) {
        block_no += 1;
        let start_ms = parse_timestamp(&caps, 2, block_no, &text)?;
        let end_ms = parse_timestamp(&caps, 6, block_no, &text)?;

        if end_ms <= start_ms {
            return Err(ParseError::NonPositiveDuration {
                block: block_no,
                start: start_ms,
                end: end_ms,
            }
            .into());
        }

        let raw_text = caps.get(10).map(|m| m.as_str()).unwrap_or("");
        let trimmed = raw_text.trim();
        if trimmed.is_empty() {
            // Recoverable: drop segment, continue.
            continue;
        }
        let clean_text = trimmed.lines().collect::<Vec<_>>().join("\n");

        if let Some(last) = segments.last_mut() {
            if last.text == clean_text {
                // Recoverable: merge consecutive identical segments.
                last.end_ms = end_ms;
                continue;
            }
        }

        segments.push(Segment {
            index: segments.len() + 1,
            start_ms,
            end_ms,
            text: clean_text,
        });
    }

    let language = detect_language(&segments);
    let fingerprint = fingerprint_of(&segments);

    Ok(Timeline {
        segments,
        language,
        fingerprint,
    })
}

fn parse_timestamp(caps: &regex::Captures, group: usize, block: usize, text: &str) -> Result<i64> {
    let get = |i: usize| -> Result<i64> {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(|| {
                ParseError::MalformedTimestamp {
                    block,
                    text: text.lines().nth(block.saturating_sub(1)).unwrap_or("").to_string(),
                }
                .into()
            })
    };
    let hours = get(group)?;
    let mins = get(group + 1)?;
    let secs = get(group + 2)?;
    let frac_str = caps
        .get(group + 3)
        .map(|m| m.as_str())
        .unwrap_or("0");
    let ms = parse_fraction_ms(frac_str);
    Ok(ms + 1000 * (secs + 60 * (mins + 60 * hours)))
}

/// Normalizes a 1-3 digit fractional-second field to milliseconds, so both
/// the canonical 3-digit SRT field and looser 1-2 digit variants parse the
/// same way (e.g. "5" -> 500ms, "50" -> 500ms, "500" -> 500ms).
fn parse_fraction_ms(frac: &str) -> i64 {
    let n: i64 = frac.parse().unwrap_or(0);
    match frac.len() {
        1 => n * 100,
        2 => n * 10,
        _ => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    #[test]
    fn parses_minimal_zh_timeline() {
        let srt = "1\n00:00:00,000 --> 00:00:03,000\n今天天气很好\n\n2\n00:00:03,000 --> 00:00:06,000\n我去了公园散步\n\n3\n00:00:06,000 --> 00:00:09,000\n心情变得很愉快\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments.len(), 3);
        assert_eq!(tl.language, Language::Zh);
        assert_eq!(tl.segments[0].start_ms, 0);
        assert_eq!(tl.segments[2].end_ms, 9000);
    }

    #[test]
    fn parses_minimal_en_timeline() {
        let srt = "1\n00:00:00,000 --> 00:00:03,000\nThe weather is great today\n\n2\n00:00:03,000 --> 00:00:06,000\nI went for a walk in the park\n\n3\n00:00:06,000 --> 00:00:09,000\nI felt very happy\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments.len(), 3);
        assert_eq!(tl.language, Language::En);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let tl = parse_srt(b"").unwrap();
        assert_eq!(tl.segments.len(), 0);
        assert_eq!(tl.language, Language::Unknown);
    }

    #[test]
    fn accepts_dot_millisecond_separator() {
        let srt = "1\n00:00:00.000 --> 00:00:01.500\nhi\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments.len(), 1);
        assert_eq!(tl.segments[0].end_ms, 1500);
    }

    #[test]
    fn tolerates_missing_index_and_crlf() {
        let srt = "00:00:00,000 --> 00:00:01,000\r\nhello\r\n\r\n00:00:01,000 --> 00:00:02,000\r\nworld\r\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments.len(), 2);
        assert_eq!(tl.segments[0].index, 1);
        assert_eq!(tl.segments[1].index, 2);
    }

    #[test]
    fn renumbers_non_monotonic_indices() {
        let srt = "99\n00:00:00,000 --> 00:00:01,000\nfirst\n\n2\n00:00:01,000 --> 00:00:02,000\nsecond\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments[0].index, 1);
        assert_eq!(tl.segments[1].index, 2);
    }

    #[test]
    fn drops_empty_after_trim_segments() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\n   \n\n2\n00:00:01,000 --> 00:00:02,000\nreal text\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments.len(), 1);
        assert_eq!(tl.segments[0].text, "real text");
    }

    #[test]
    fn merges_duplicate_consecutive_segments() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\nsame\n\n2\n00:00:01,000 --> 00:00:02,000\nsame\n";
        let tl = parse_srt(srt.as_bytes()).unwrap();
        assert_eq!(tl.segments.len(), 1);
        assert_eq!(tl.segments[0].end_ms, 2000);
    }

    #[test]
    fn rejects_end_before_start() {
        let srt = "1\n00:00:02,000 --> 00:00:01,000\nbad\n";
        let err = parse_srt(srt.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReconstructError::Input(ParseError::NonPositiveDuration { .. })
        ));
    }
}
