//! The self-scoring optimization loop (spec §4.3): five weighted
//! dimensions on a 0-10 scale, targeted repair when under 8.0, a hard cap
//! of three repair iterations, and a fallback wrap when even repairs
//! can't clear 6.0.

use crate::model::{Language, Provenance, RewrittenSegment, RewrittenTimeline, Segment, TransformTag};

use super::passes::NarrativeFeatures;
use super::phrases::{self, PhraseSet};

const PASS_THRESHOLD: f64 = 8.0;
const FALLBACK_THRESHOLD: f64 = 6.0;
const MAX_REPAIR_ITERATIONS: u32 = 3;

fn joined(segments: &[RewrittenSegment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ")
}

fn length_score(original: &[Segment], transformed: &[RewrittenSegment]) -> f64 {
    let original_len: usize = original.iter().map(|s| s.text.chars().count()).sum();
    let transformed_len: usize = transformed.iter().map(|s| s.text.chars().count()).sum();
    let ratio = if original_len == 0 {
        1.0
    } else {
        transformed_len as f64 / original_len as f64
    };
    (ratio / 1.5).min(1.0) * 2.0
}

fn viral_density_score(phrases: &PhraseSet, transformed_text: &str) -> f64 {
    let lowered = transformed_text.to_lowercase();
    let keywords: Vec<&str> = phrases
        .hooks
        .positive
        .iter()
        .chain(phrases.hooks.negative.iter())
        .chain(phrases.hooks.intense.iter())
        .chain(phrases.hooks.neutral.iter())
        .chain(phrases.triggers.iter())
        .copied()
        .collect();
    let count = keywords.iter().filter(|k| lowered.contains(&k.to_lowercase())).count();
    (count as f64 / 3.0).min(1.0) * 3.0
}

fn emotional_amplification_score(phrases: &PhraseSet, transformed_text: &str) -> f64 {
    let lowered = transformed_text.to_lowercase();
    let words: Vec<&str> = phrases
        .amplifiers
        .high_intensity
        .iter()
        .chain(phrases.amplifiers.medium_intensity.iter())
        .chain(phrases.amplifiers.contextual.iter())
        .copied()
        .collect();
    let count = words.iter().filter(|w| lowered.contains(&w.to_lowercase())).count();
    (count as f64 / 2.0).min(1.0) * 2.5
}

fn structural_completeness_score(phrases: &PhraseSet, transformed: &[RewrittenSegment]) -> f64 {
    let has_hook = transformed.iter().any(|s| s.tags.contains(&TransformTag::Hook));
    let has_amplifier = transformed.iter().any(|s| s.tags.contains(&TransformTag::Amplifier));
    let has_ending = transformed
        .last()
        .map(|s| {
            s.tags.contains(&TransformTag::Trigger)
                || phrases.triggers.iter().any(|t| s.text.contains(t))
                || s.text.ends_with(['!', '?', '！', '？'])
        })
        .unwrap_or(false);
    let count = [has_hook, has_amplifier, has_ending].iter().filter(|b| **b).count();
    (count as f64 / 3.0) * 1.5
}

fn originality_score(original: &[Segment], transformed: &[RewrittenSegment]) -> f64 {
    use std::collections::HashSet;
    let original_words: HashSet<&str> = original.iter().flat_map(|s| s.text.split_whitespace()).collect();
    if original_words.is_empty() {
        return 1.0;
    }
    let transformed_text = joined(transformed);
    let transformed_words: HashSet<&str> = transformed_text.split_whitespace().collect();
    let retained = original_words.intersection(&transformed_words).count();
    retained as f64 / original_words.len() as f64
}

/// Evaluates a candidate rewrite along the five weighted dimensions,
/// returning a 0-10 score.
pub fn evaluate(original: &[Segment], transformed: &[RewrittenSegment], language: Language) -> f64 {
    let phrases = phrases::phrases_for(language);
    let transformed_text = joined(transformed);

    let total = length_score(original, transformed)
        + viral_density_score(phrases, &transformed_text)
        + emotional_amplification_score(phrases, &transformed_text)
        + structural_completeness_score(phrases, transformed)
        + originality_score(original, transformed);

    total.min(10.0)
}

fn repair(transformed: &mut Vec<RewrittenSegment>, phrases: &'static PhraseSet) {
    let has_hook = transformed.iter().any(|s| s.tags.contains(&TransformTag::Hook));
    if !has_hook {
        if let Some(first) = transformed.first_mut() {
            if let Some(hook) = phrases.hooks.neutral.first() {
                first.text = format!("{hook}{}", first.text);
                first.tags.push(TransformTag::Hook);
            }
        }
    }

    let has_amplifier = transformed.iter().any(|s| s.tags.contains(&TransformTag::Amplifier));
    if !has_amplifier {
        if let Some(mid) = transformed.get_mut(transformed.len() / 2) {
            if let Some(amp) = phrases.amplifiers.medium_intensity.first() {
                mid.text = format!("{}, {}", mid.text, amp);
                mid.tags.push(TransformTag::Amplifier);
            }
        }
    }

    let has_trigger = transformed.iter().any(|s| s.tags.contains(&TransformTag::Trigger));
    if !has_trigger {
        if let Some(trigger) = phrases.triggers.first() {
            transformed.push(RewrittenSegment {
                text: trigger.to_string(),
                provenance: Provenance::Pure,
                tags: vec![TransformTag::Trigger],
            });
        }
    }
}

fn fallback_wrap(original: &[Segment], language: Language) -> Vec<RewrittenSegment> {
    let phrases = phrases::phrases_for(language);
    let mut out = Vec::new();
    let hook = phrases.hooks.neutral.first().copied().unwrap_or_default();
    let trigger = phrases.triggers.first().copied().unwrap_or_default();

    for (i, seg) in original.iter().enumerate() {
        let text = if i == 0 {
            format!("{hook}{}", seg.text)
        } else {
            seg.text.clone()
        };
        out.push(RewrittenSegment {
            text,
            provenance: Provenance::Sourced(vec![seg.index]),
            tags: if i == 0 { vec![TransformTag::Hook] } else { Vec::new() },
        });
    }
    out.push(RewrittenSegment {
        text: trigger.to_string(),
        provenance: Provenance::Pure,
        tags: vec![TransformTag::Trigger],
    });
    out
}

/// Scores `candidate`, repairs up to [`MAX_REPAIR_ITERATIONS`] times while
/// under [`PASS_THRESHOLD`], and falls back to a minimal wrap (with a
/// quality warning) if it still can't clear [`FALLBACK_THRESHOLD`].
pub fn score_and_repair(original: &[Segment], mut candidate: Vec<RewrittenSegment>, language: Language) -> RewrittenTimeline {
    let phrases = phrases::phrases_for(language);
    let mut score = evaluate(original, &candidate, language);
    let mut iterations = 0;

    while score < PASS_THRESHOLD && iterations < MAX_REPAIR_ITERATIONS {
        repair(&mut candidate, phrases);
        score = evaluate(original, &candidate, language);
        iterations += 1;
    }

    if score < FALLBACK_THRESHOLD {
        tracing::warn!("rewrite fell back to minimal wrap: score {score:.2} after {iterations} repair iteration(s)");
        let wrapped = fallback_wrap(original, language);
        return RewrittenTimeline {
            segments: wrapped,
            language,
            quality_warning: Some(format!(
                "FallbackRewritten: quality score {score:.2}/10 after {iterations} repair iteration(s)"
            )),
        };
    }

    RewrittenTimeline {
        segments: candidate,
        language,
        quality_warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{passes, rewriter};
    use crate::model::fingerprint_of;
    use crate::model::Timeline;

    fn timeline(texts: &[&str]) -> Timeline {
        let segments: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Segment {
                index: i + 1,
                start_ms: (i as i64) * 2000,
                end_ms: (i as i64) * 2000 + 1500,
                text: t.to_string(),
            })
            .collect();
        let fingerprint = fingerprint_of(&segments);
        Timeline {
            segments,
            language: Language::En,
            fingerprint,
        }
    }

    #[test]
    fn repair_loop_improves_or_matches_initial_score() {
        let t = timeline(&["a quiet opening", "suddenly things changed", "finally it ended"]);
        let features = passes::analyze(&t);
        let candidate = rewriter::rewrite(&t.segments, t.language, &features);
        let before = evaluate(&t.segments, &candidate, t.language);
        let result = score_and_repair(&t.segments, candidate, t.language);
        let after = evaluate(&t.segments, &result.segments, t.language);
        assert!(after >= before - 1e-9);
    }

    #[test]
    fn fallback_never_produces_empty_timeline() {
        let t = timeline(&["x"]);
        let result = score_and_repair(&t.segments, Vec::new(), t.language);
        assert!(!result.is_empty());
    }
}
