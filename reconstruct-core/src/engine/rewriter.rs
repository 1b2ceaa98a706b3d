//! The fixed ordered rewriter pipeline T1-T6 (spec §4.3). Each step
//! mutates a working list of [`RewrittenSegment`]s derived 1:1 from the
//! source timeline, then the self-scoring loop (`scoring.rs`) evaluates
//! and optionally repairs the result.

use crate::model::{Provenance, RewrittenSegment, Segment, TransformTag};
use std::collections::HashSet;

use super::passes::{NarrativeFeatures, StructuralMarker, TurningPoint};
use super::phrases::{self, PhraseSet};
use crate::model::Language;

fn initial_working_set(segments: &[Segment]) -> Vec<RewrittenSegment> {
    segments
        .iter()
        .map(|s| RewrittenSegment {
            text: s.text.clone(),
            provenance: Provenance::Sourced(vec![s.index]),
            tags: Vec::new(),
        })
        .collect()
}

fn engagement_potential(features: &NarrativeFeatures) -> f64 {
    let emotion_score = features.emotional_intensity * 0.4;
    let turning_score = (features.turning_points.len() as f64 / 3.0).min(1.0) * 0.3;
    let arc_score = features.story_arc_strength() * 0.2;
    let character_score = (features.relations.len() as f64 / 4.0).min(1.0) * 0.1;
    (emotion_score + turning_score + arc_score + character_score).min(1.0)
}

fn hook_category(features: &NarrativeFeatures) -> &'static str {
    match (features.dominant_emotion.as_str(), features.emotional_intensity) {
        ("positive", i) if i > 0.3 => "positive",
        ("negative", _) | ("conflict", _) => "negative",
        (_, i) if i > 0.6 => "intense",
        _ => "neutral",
    }
}

/// T1: prepend an attention hook of the chosen category to the first
/// segment, unless it would duplicate an existing opener of the same
/// category (spec tie-break).
fn t1_attention_hook(working: &mut [RewrittenSegment], phrases: &PhraseSet, features: &NarrativeFeatures) {
    let Some(first) = working.first_mut() else { return };
    let category = hook_category(features);
    let candidates = phrases.hooks.category(category);
    let Some(hook) = candidates.first() else { return };

    let already_has_hook = candidates.iter().any(|h| first.text.starts_with(h));
    if already_has_hook {
        return;
    }

    first.text = format!("{hook}{}", first.text);
    first.tags.push(TransformTag::Hook);
}

/// T2: insert a contextual amplifier into every segment whose emotion
/// intensity clears the threshold, at the first clause boundary (comma or
/// sentence-final punctuation) or, failing that, at the start.
fn t2_multilayer_amplification(
    working: &mut [RewrittenSegment],
    phrases: &PhraseSet,
    features: &NarrativeFeatures,
) {
    const HIGH_THRESHOLD: f64 = 0.5;
    const MEDIUM_THRESHOLD: f64 = 0.25;

    for (seg, analysis) in working.iter_mut().zip(features.per_segment.iter()) {
        let intensity = analysis.emotion.intensity();
        let amplifier = if intensity >= HIGH_THRESHOLD {
            phrases.amplifiers.high_intensity.first()
        } else if intensity >= MEDIUM_THRESHOLD {
            phrases.amplifiers.medium_intensity.first()
        } else {
            None
        };
        let Some(amp) = amplifier else { continue };

        seg.text = insert_at_clause_boundary(&seg.text, amp);
        seg.tags.push(TransformTag::Amplifier);
    }
}

fn insert_at_clause_boundary(text: &str, insertion: &str) -> String {
    if let Some(pos) = text.find(['，', ',']) {
        let (head, tail) = text.split_at(pos + head_char_len(text, pos));
        return format!("{head}{insertion}{tail}");
    }
    format!("{insertion} {text}")
}

fn head_char_len(text: &str, byte_pos: usize) -> usize {
    text[byte_pos..].chars().next().map(|c| c.len_utf8()).unwrap_or(0)
}

/// T3: skipped under 3 segments. Otherwise inserts a pure suspense
/// connector at 1/3 and 2/3 positions, scaled toward denser turning-point
/// regions.
fn t3_precision_suspense(
    working: &mut Vec<RewrittenSegment>,
    phrases: &PhraseSet,
    turning_points: &[TurningPoint],
) {
    if working.len() < 3 {
        return;
    }

    let len = working.len();
    let mut positions = vec![len / 3, (2 * len) / 3];
    // `turning_points` is ordered by ascending segment index; `Iterator::max_by`
    // keeps the *last* of equal maxima, so scan in reverse to keep the
    // earliest segment on a tie (spec tie-break).
    if let Some(densest) = turning_points.iter().rev().max_by(|a, b| a.score.partial_cmp(&b.score).unwrap()) {
        let scaled = densest.segment_index.min(len - 1);
        if !positions.contains(&scaled) {
            positions.push(scaled);
        }
    }
    positions.sort_unstable();
    positions.dedup();

    let tension = if turning_points.len() > 2 {
        phrases.suspense.high_tension.first()
    } else {
        phrases.suspense.medium_tension.first()
    };
    let Some(connector) = tension else { return };

    // insert from the back so earlier indices stay valid
    for &pos in positions.iter().rev() {
        if pos == 0 || pos >= working.len() {
            continue;
        }
        working.insert(
            pos,
            RewrittenSegment {
                text: connector.to_string(),
                provenance: Provenance::Pure,
                tags: vec![TransformTag::Suspense],
            },
        );
    }
}

/// T4: append a climax intensifier to the strongest-arc segment, chosen
/// as the climax-tagged segment with highest emotional intensity, falling
/// back to the single most intense segment overall.
fn t4_dynamic_climax(working: &mut [RewrittenSegment], phrases: &PhraseSet, features: &NarrativeFeatures) {
    let target = features
        .per_segment
        .iter()
        .enumerate()
        .filter(|(_, a)| a.structure == StructuralMarker::Climax)
        .max_by(|(_, a), (_, b)| a.emotion.intensity().partial_cmp(&b.emotion.intensity()).unwrap())
        .or_else(|| {
            features
                .per_segment
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.emotion.intensity().partial_cmp(&b.emotion.intensity()).unwrap())
        })
        .map(|(i, _)| i);

    let Some(idx) = target else { return };
    let intensifier = if features.emotional_intensity > 0.6 {
        phrases.climax.dramatic.first()
    } else if features.dominant_emotion == "resolution" {
        phrases.climax.suspenseful.first()
    } else {
        phrases.climax.emotional.first()
    };
    let Some(phrase) = intensifier else { return };

    // Segments after T3 may have shifted: find the working-set entry whose
    // provenance still contains the target source index.
    if let Some(seg) = working.iter_mut().find(|s| provenance_contains(&s.provenance, idx + 1)) {
        seg.text = format!("{}，{}", seg.text, phrase);
        seg.tags.push(TransformTag::Climax);
    }
}

fn provenance_contains(p: &Provenance, source_index: usize) -> bool {
    matches!(p, Provenance::Sourced(ids) if ids.contains(&source_index))
}

/// T5: append an engagement trigger when engagement potential exceeds
/// 0.6, choosing the strongest trigger phrase for high scores.
fn t5_engagement_trigger(working: &mut Vec<RewrittenSegment>, phrases: &PhraseSet, features: &NarrativeFeatures) {
    let score = engagement_potential(features);
    if score <= 0.6 {
        return;
    }
    let trigger = if score > 0.9 {
        phrases.triggers.first()
    } else if score > 0.7 {
        phrases.triggers.get(1).or_else(|| phrases.triggers.first())
    } else {
        phrases.triggers.last()
    };
    let Some(trigger) = trigger else { return };

    working.push(RewrittenSegment {
        text: trigger.to_string(),
        provenance: Provenance::Pure,
        tags: vec![TransformTag::Trigger],
    });
}

/// Segment density below this many sentences-per-minute is treated as
/// slow pacing: T6 prepends a rhythm enhancer to the merged stretch to
/// hold a sense of forward motion, matching the original's low-density
/// rhythm-enhancer table.
const LOW_DENSITY_SPM: f64 = 6.0;

/// T6: skipped under 3 source segments. Merges consecutive runs of
/// low-importance, untagged, singly-sourced segments into one, holding
/// the top-K most important segments (by emotion intensity + turning
/// point score) untouched, so low-density stretches compress while the
/// high-value beats stay verbatim and standalone. When overall pacing is
/// slow, merged stretches are prefixed with a rhythm enhancer.
fn t6_timeline_reallocation(
    working: Vec<RewrittenSegment>,
    features: &NarrativeFeatures,
    phrases: &PhraseSet,
) -> Vec<RewrittenSegment> {
    if features.per_segment.len() < 3 {
        return working;
    }

    let mut importance: Vec<(usize, f64)> = features
        .per_segment
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let tp_score = features
                .turning_points
                .iter()
                .find(|tp| tp.segment_index == i)
                .map(|tp| tp.score)
                .unwrap_or(0.0);
            (i + 1, a.emotion.intensity() + tp_score)
        })
        .collect();
    importance.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let top_k: usize = (importance.len() / 3).max(1);
    let retained: HashSet<usize> = importance.into_iter().take(top_k).map(|(idx, _)| idx).collect();

    let low_density = features.pacing_spm < LOW_DENSITY_SPM;
    let mut out: Vec<RewrittenSegment> = Vec::with_capacity(working.len());
    let mut pending: Option<RewrittenSegment> = None;
    let mut pending_merged = false;

    for seg in working {
        let mergeable = seg.tags.is_empty()
            && match &seg.provenance {
                Provenance::Sourced(ids) if ids.len() == 1 => !retained.contains(&ids[0]),
                _ => false,
            };

        if mergeable {
            match pending.as_mut() {
                Some(acc) => {
                    acc.text.push(' ');
                    acc.text.push_str(&seg.text);
                    if let (Provenance::Sourced(acc_ids), Provenance::Sourced(new_ids)) =
                        (&mut acc.provenance, &seg.provenance)
                    {
                        acc_ids.extend(new_ids);
                    }
                    pending_merged = true;
                }
                None => pending = Some(seg),
            }
        } else {
            if let Some(mut acc) = pending.take() {
                if pending_merged && low_density {
                    prepend_rhythm_enhancer(&mut acc, phrases);
                }
                out.push(acc);
            }
            pending_merged = false;
            out.push(seg);
        }
    }
    if let Some(mut acc) = pending.take() {
        if pending_merged && low_density {
            prepend_rhythm_enhancer(&mut acc, phrases);
        }
        out.push(acc);
    }
    out
}

fn prepend_rhythm_enhancer(seg: &mut RewrittenSegment, phrases: &PhraseSet) {
    let Some(enhancer) = phrases.rhythm_enhancers.first() else { return };
    let separator = if enhancer.is_ascii() { ", " } else { "，" };
    seg.text = format!("{enhancer}{separator}{}", seg.text);
}

/// Runs T1-T6 in spec order and returns the rewritten working set.
pub fn rewrite(segments: &[Segment], language: Language, features: &NarrativeFeatures) -> Vec<RewrittenSegment> {
    let phrases = phrases::phrases_for(language);
    let mut working = initial_working_set(segments);

    t1_attention_hook(&mut working, phrases, features);
    t2_multilayer_amplification(&mut working, phrases, features);
    t3_precision_suspense(&mut working, phrases, &features.turning_points);
    t4_dynamic_climax(&mut working, phrases, features);
    t5_engagement_trigger(&mut working, phrases, features);
    t6_timeline_reallocation(working, features, phrases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::passes;
    use crate::model::{fingerprint_of, Timeline};

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
    fn hook_is_prepended_and_original_text_retained_verbatim() {
        let t = timeline(&["it was a calm morning", "suddenly chaos erupted", "finally peace returned"]);
        let features = passes::analyze(&t);
        let out = rewrite(&t.segments, t.language, &features);
        let joined: String = out.iter().map(|s| s.text.clone()).collect::<Vec<_>>().join(" ");
        assert!(joined.contains("it was a calm morning"));
    }

    #[test]
    fn single_segment_never_produces_empty_output() {
        let t = timeline(&["just one line here"]);
        let features = passes::analyze(&t);
        let out = rewrite(&t.segments, t.language, &features);
        assert!(!out.is_empty());
        assert!(out.iter().any(|s| s.text.contains("just one line here")));
    }

    #[test]
    fn suspense_skipped_under_three_segments() {
        let t = timeline(&["line one here", "line two here"]);
        let features = passes::analyze(&t);
        let out = rewrite(&t.segments, t.language, &features);
        assert!(!out.iter().any(|s| s.tags.contains(&TransformTag::Suspense)));
    }

    #[test]
    fn densest_turning_point_tie_prefers_the_earlier_segment() {
        // Six working segments so neither 1/3 (2) nor 2/3 (4) position
        // collides with the scaled-in turning point the tie-break picks.
        let mut working: Vec<RewrittenSegment> = (0..6)
            .map(|i| RewrittenSegment {
                text: format!("segment {i}"),
                provenance: Provenance::Sourced(vec![i + 1]),
                tags: Vec::new(),
            })
            .collect();
        // Two turning points tie on score; segment_index 1 is earlier than 5.
        let turning_points = vec![
            TurningPoint { segment_index: 1, score: 0.8 },
            TurningPoint { segment_index: 5, score: 0.8 },
        ];
        let phrases = phrases::phrases_for(Language::En);
        t3_precision_suspense(&mut working, phrases, &turning_points);

        // The earlier tied turning point (segment_index 1, "segment 1") gets
        // a suspense connector inserted immediately before it; the later tie
        // (segment_index 5) does not additionally get one.
        let idx = working.iter().position(|s| s.text == "segment 1").unwrap();
        assert!(idx > 0 && working[idx - 1].tags.contains(&TransformTag::Suspense));
    }
}
