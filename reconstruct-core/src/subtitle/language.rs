//! Heuristic language detection (spec §4.1): proportion of CJK-Unified
//! Ideograph codepoints vs. ASCII letters over all text, threshold 0.3.

use crate::model::{Language, Segment};

const ZH_THRESHOLD: f64 = 0.3;

pub fn detect_language(segments: &[Segment]) -> Language {
    let mut cjk = 0u64;
    let mut ascii_letters = 0u64;

    for seg in segments {
        for ch in seg.text.chars() {
            if is_cjk(ch) {
                cjk += 1;
            } else if ch.is_ascii_alphabetic() {
                ascii_letters += 1;
            }
        }
    }

    let total = cjk + ascii_letters;
    if total == 0 {
        return Language::Unknown;
    }

    if cjk as f64 / total as f64 >= ZH_THRESHOLD {
        Language::Zh
    } else if ascii_letters > 0 {
        Language::En
    } else {
        Language::Unknown
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32, 0x4E00..=0x9FFF)
}
