//! V1-V8 (spec §4.5). Each is a pure function taking whatever subset of
//! [`SceneContext`], [`CutPlan`] and [`RewrittenTimeline`] it needs and
//! returning a [`ValidationReport`]. They are designed to be run
//! independently and merged by the caller (the coordinator fans them out
//! over a shared executor).

use std::collections::HashMap;

use crate::model::CutPlan;

use super::types::{is_opposite_pair, EventKind, SceneContext, Severity, ValidationReport};

const DEFAULT_GAP_THRESHOLD_MS: i64 = 30_000;
const EMOTION_FLIP_WINDOW_MS: i64 = 10_000;
/// Words at or above this length count as "complex" for V4's
/// vocabulary-vs-education check (counts CJK characters 1:1, since a
/// multi-character CJK word is rarely this long).
const COMPLEX_WORD_LEN: usize = 8;

/// Fraction of complex words in `text`, by whitespace-split word count.
/// Crude by design: V4 is a heuristic gate, not a readability model.
fn vocabulary_complexity(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let complex = words.iter().filter(|w| w.chars().count() >= COMPLEX_WORD_LEN).count();
    complex as f64 / words.len() as f64
}

/// Max tolerated vocabulary complexity per declared education level.
/// Unrecognized levels default to the most permissive ceiling so an
/// unmodeled label never produces a false positive.
fn education_vocabulary_ceiling(level: &str) -> f64 {
    match level.to_lowercase().as_str() {
        "child" | "elementary" => 0.1,
        "teen" | "middle_school" | "high_school" => 0.3,
        "college" | "university" | "graduate" | "adult" => 1.0,
        _ => 1.0,
    }
}

/// V1: spatiotemporal consistency between adjacent scenes.
pub fn v1_spatiotemporal(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    for w in ctx.scenes.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        if b.start_ms < a.end_ms {
            report.push(
                "V1",
                Severity::Critical,
                format!("scene {} overlaps scene {} in time", a.index, b.index),
            );
        }
        let gap = b.start_ms - a.end_ms;
        if a.location != b.location && gap < DEFAULT_GAP_THRESHOLD_MS && !b.has_tag("transport_cue") {
            report.push(
                "V1",
                Severity::Critical,
                format!(
                    "location change {} -> {} in {}ms with no transport cue",
                    a.location, b.location, gap
                ),
            );
        }
    }

    let mut last_emotion: HashMap<&str, (i64, &str)> = HashMap::new();
    for scene in &ctx.scenes {
        for c in &scene.characters {
            let Some(emotion) = c.emotion.as_deref() else { continue };
            if let Some((time_ms, prev_emotion)) = last_emotion.get(c.name.as_str()) {
                if scene.start_ms - time_ms <= EMOTION_FLIP_WINDOW_MS && is_opposite_pair(prev_emotion, emotion) {
                    report.push(
                        "V1",
                        Severity::Critical,
                        format!("{} flips {} -> {} within {}ms", c.name, prev_emotion, emotion, EMOTION_FLIP_WINDOW_MS),
                    );
                }
            }
            last_emotion.insert(&c.name, (scene.start_ms, emotion));
        }
    }
    report
}

/// V2: causality graph (declared plus inferred problem -> resolution
/// links), unresolved problems, dangling clues, temporal paradoxes and
/// isolated high-importance events.
pub fn v2_causality(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    let by_id: HashMap<&str, &super::types::Event> = ctx.events.iter().map(|e| (e.id.as_str(), e)).collect();

    for event in &ctx.events {
        for cause_id in &event.caused_by {
            if let Some(cause) = by_id.get(cause_id.as_str()) {
                if cause.time_ms > event.time_ms {
                    // matches spec S5's literal worked example: temporal_paradox
                    // is severity=high, not critical.
                    report.push(
                        "V2",
                        Severity::High,
                        format!("temporal_paradox: event {} precedes its declared cause {}", event.id, cause.id),
                    );
                }
            }
        }
    }

    for problem in ctx.events.iter().filter(|e| e.kind == EventKind::Problem) {
        let resolved = ctx.events.iter().any(|e| {
            e.kind == EventKind::Resolution
                && e.time_ms >= problem.time_ms
                && e.characters.iter().any(|c| problem.characters.contains(c))
        });
        if !resolved {
            report.push("V2", Severity::Medium, format!("problem {} never resolved", problem.id));
        }
    }

    for clue in ctx.events.iter().filter(|e| e.kind == EventKind::Clue) {
        let has_descendant = ctx.events.iter().any(|e| e.caused_by.contains(&clue.id));
        if !has_descendant {
            report.push("V2", Severity::Medium, format!("clue {} is never followed up", clue.id));
        }
    }

    for event in &ctx.events {
        if event.importance > 0.7 && event.caused_by.is_empty() {
            let has_descendant = ctx.events.iter().any(|e| e.caused_by.contains(&event.id));
            if !has_descendant {
                report.push(
                    "V2",
                    Severity::Medium,
                    format!("high-importance event {} is isolated from the causal graph", event.id),
                );
            }
        }
    }

    report
}

/// V3: prop continuity across scenes.
pub fn v3_prop_continuity(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut last_holder: HashMap<String, (String, usize)> = HashMap::new();

    for scene in &ctx.scenes {
        let is_exempt = scene.has_tag("flashback") || scene.has_tag("dream") || scene.has_tag("montage");
        for prop in &scene.props {
            if !prop.origin_explained && !last_holder.contains_key(&prop.name) {
                report.push(
                    "V3",
                    Severity::Medium,
                    format!("prop '{}' appears in scene {} with no explained origin", prop.name, scene.index),
                );
            }
            if let Some(holder) = &prop.holder {
                if let Some((prev_holder, prev_index)) = last_holder.get(&prop.name) {
                    if prev_holder != holder && !is_exempt && scene.index == prev_index + 1 {
                        report.push(
                            "V3",
                            Severity::High,
                            format!(
                                "prop '{}' jumps from {} to {} between scenes {} and {} without explanation",
                                prop.name, prev_holder, holder, prev_index, scene.index
                            ),
                        );
                    }
                }
                last_holder.insert(prop.name.clone(), (holder.clone(), scene.index));
            } else if last_holder.remove(&prop.name).is_some() && !is_exempt {
                report.push(
                    "V3",
                    Severity::Medium,
                    format!("prop '{}' disappears with no carrier in scene {}", prop.name, scene.index),
                );
            }
        }
    }
    report
}

/// V4: dialogue logic — era-appropriateness, vocabulary-vs-education, and
/// at most one opposite-polarity emotion switch per speaker within a
/// scene.
pub fn v4_dialogue_logic(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    const ANACHRONISMS: &[(&str, i32)] = &[("smartphone", 2007), ("internet", 1990), ("email", 1993)];

    for scene in &ctx.scenes {
        let Some(year) = scene.era_year else { continue };
        for (term, introduced) in ANACHRONISMS {
            if year < *introduced {
                // dialogue text isn't modeled separately here; this check is
                // advisory and only fires when a scene explicitly tags the term.
                if scene.has_tag(term) {
                    report.push_full(
                        "V4",
                        Severity::High,
                        1.0,
                        Some(scene.index),
                        format!("scene {} ({}) references '{}' before it existed ({})", scene.index, year, term, introduced),
                        Some(format!("remove or replace the '{term}' reference")),
                    );
                }
            }
        }

        for c in &scene.characters {
            let (Some(level), Some(dialogue)) = (c.education_level.as_deref(), c.dialogue.as_deref()) else { continue };
            let complexity = vocabulary_complexity(dialogue);
            let ceiling = education_vocabulary_ceiling(level);
            if complexity > ceiling {
                report.push_full(
                    "V4",
                    Severity::Medium,
                    0.6,
                    Some(scene.index),
                    format!(
                        "{}'s dialogue in scene {} has vocabulary complexity {:.2}, above the ceiling {:.2} for education level '{}'",
                        c.name, scene.index, complexity, ceiling, level
                    ),
                    Some("simplify the dialogue or raise the character's declared education level".to_string()),
                );
            }
        }

        let mut switches: HashMap<&str, u32> = HashMap::new();
        let mut prev_emotion: HashMap<&str, &str> = HashMap::new();
        for c in &scene.characters {
            let Some(emotion) = c.emotion.as_deref() else { continue };
            if let Some(prev) = prev_emotion.get(c.name.as_str()) {
                if is_opposite_pair(prev, emotion) {
                    *switches.entry(c.name.as_str()).or_insert(0) += 1;
                }
            }
            prev_emotion.insert(&c.name, emotion);
        }
        for (name, count) in switches {
            if count > 1 {
                report.push("V4", Severity::High, format!("{} switches opposite-polarity emotion {} times in scene {}", name, count, scene.index));
            }
        }
    }
    report
}

/// V5: per-character emotion continuity — consecutive tags must not lie
/// in an opposite pair without an intervening transition scene.
pub fn v5_emotion_continuity(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut last_emotion: HashMap<&str, &str> = HashMap::new();

    for scene in &ctx.scenes {
        let is_transition = scene.has_tag("transition");
        for c in &scene.characters {
            let Some(emotion) = c.emotion.as_deref() else { continue };
            if let Some(prev) = last_emotion.get(c.name.as_str()) {
                if is_opposite_pair(prev, emotion) && !is_transition {
                    report.push(
                        "V5",
                        Severity::Critical,
                        format!("{} jumps {} -> {} in scene {} with no transition", c.name, prev, emotion, scene.index),
                    );
                }
            }
            last_emotion.insert(&c.name, emotion);
        }
    }
    report
}

/// V6: conflict resolution compatibility.
pub fn v6_conflict_resolution(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();

    fn compatible(kind: &str, method: &str, intensity: f64) -> bool {
        match (kind, method) {
            ("interpersonal", "reconciliation") => true,
            ("interpersonal", "mediation") => true,
            ("legal", "arbitration") => true,
            ("legal", "settlement") => true,
            ("physical", "victory") => intensity >= 0.5,
            ("physical", "retreat") => true,
            (_, "avoidance") => intensity < 0.3,
            _ => false,
        }
    }

    for conflict in &ctx.conflicts {
        if !compatible(&conflict.kind, &conflict.resolution_method, conflict.intensity) {
            report.push(
                "V6",
                Severity::Critical,
                format!(
                    "conflict {} ({}, intensity {:.2}) resolved via incompatible method '{}'",
                    conflict.id, conflict.kind, conflict.intensity, conflict.resolution_method
                ),
            );
        }
        if matches!(conflict.resolution_method.as_str(), "mediation" | "arbitration") && conflict.mediator_skill.is_none() {
            report.push(
                "V6",
                Severity::High,
                format!("conflict {} needs a mediator/arbitrator with a matching skill tag", conflict.id),
            );
        }
    }
    report
}

/// V7: multi-thread coordination.
pub fn v7_multi_thread(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    if ctx.threads.is_empty() {
        return report;
    }

    let mean_duration: f64 =
        ctx.threads.iter().map(|t| t.total_duration_ms as f64).sum::<f64>() / ctx.threads.len() as f64;
    let mean_events: f64 = ctx.threads.iter().map(|t| t.event_ids.len() as f64).sum::<f64>() / ctx.threads.len() as f64;

    for thread in &ctx.threads {
        if (thread.total_duration_ms as f64) < mean_duration * 0.3 || (thread.event_ids.len() as f64) < mean_events * 0.3 {
            report.push("V7", Severity::Medium, format!("thread {} is imbalanced relative to the others", thread.id));
        }
        if !thread.concluded && !thread.convergent {
            report.push("V7", Severity::High, format!("thread {} is abandoned (no conclusion, not convergent)", thread.id));
        }
    }

    // time paradox: same character appears in two threads' events at
    // overlapping times.
    let mut appearances: HashMap<&str, Vec<(i64, i64, &str)>> = HashMap::new();
    for thread in &ctx.threads {
        for event_id in &thread.event_ids {
            if let Some(event) = ctx.events.iter().find(|e| &e.id == event_id) {
                for character in &event.characters {
                    appearances
                        .entry(character.as_str())
                        .or_default()
                        .push((event.time_ms, event.time_ms, thread.id.as_str()));
                }
            }
        }
    }
    for (character, spans) in appearances {
        for i in 0..spans.len() {
            for j in (i + 1)..spans.len() {
                if spans[i].2 != spans[j].2 && spans[i].0 == spans[j].0 {
                    report.push(
                        "V7",
                        Severity::Critical,
                        format!("{} appears in threads {} and {} at the same time", character, spans[i].2, spans[j].2),
                    );
                }
            }
        }
    }

    report
}

/// V8: cultural context rules indexed by era/region.
pub fn v8_cultural_context(ctx: &SceneContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    for scene in &ctx.scenes {
        let Some(year) = scene.era_year else { continue };
        let Some(region) = &scene.region else { continue };
        for rule in ctx.cultural_rules.iter().filter(|r| &r.region == region && era_matches(&r.era, year)) {
            for forbidden in &rule.forbidden_elements {
                if scene.has_tag(forbidden) {
                    report.push(
                        "V8",
                        Severity::Critical,
                        format!("scene {} contains forbidden element '{}' for {}/{}", scene.index, forbidden, rule.era, rule.region),
                    );
                }
            }
            for required in &rule.required_elements {
                if !scene.has_tag(required) {
                    report.push(
                        "V8",
                        Severity::Medium,
                        format!("scene {} missing required element '{}' for {}/{}", scene.index, required, rule.era, rule.region),
                    );
                }
            }
            for keyword in &rule.stereotype_keywords {
                if scene.has_tag(keyword) {
                    report.push(
                        "V8",
                        Severity::Medium,
                        format!("scene {} uses stereotype-flagged keyword '{}'", scene.index, keyword),
                    );
                }
            }
        }
    }
    report
}

fn era_matches(rule_era: &str, year: i32) -> bool {
    rule_era
        .split('-')
        .filter_map(|s| s.trim().parse::<i32>().ok())
        .collect::<Vec<_>>()
        .chunks(2)
        .any(|c| matches!(c, [lo, hi] if year >= *lo && year <= *hi))
}

/// Runs all eight validators and merges their reports. `plan` is accepted
/// as part of the signature for API symmetry with the coordinator even
/// though most validators key off `ctx` alone; a future validator that
/// needs cut timing (e.g. cross-checking scene boundaries against output
/// intervals) can read it without changing callers.
pub fn run_all(ctx: &SceneContext, _plan: &CutPlan) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.merge(v1_spatiotemporal(ctx));
    report.merge(v2_causality(ctx));
    report.merge(v3_prop_continuity(ctx));
    report.merge(v4_dialogue_logic(ctx));
    report.merge(v5_emotion_continuity(ctx));
    report.merge(v6_conflict_resolution(ctx));
    report.merge(v7_multi_thread(ctx));
    report.merge(v8_cultural_context(ctx));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::{CharacterState, Event, EventKind, PropState, SceneAnnotation};

    fn scene(index: usize, start: i64, end: i64, location: &str) -> SceneAnnotation {
        SceneAnnotation {
            index,
            start_ms: start,
            end_ms: end,
            location: location.to_string(),
            era_year: None,
            region: None,
            tags: Vec::new(),
            characters: Vec::new(),
            props: Vec::new(),
        }
    }

    #[test]
    fn v1_flags_overlapping_scenes() {
        let ctx = SceneContext {
            scenes: vec![scene(1, 0, 2000, "a"), scene(2, 1000, 3000, "a")],
            ..Default::default()
        };
        let report = v1_spatiotemporal(&ctx);
        assert!(report.has_critical());
    }

    #[test]
    fn v1_flags_location_jump_without_transport_cue() {
        let ctx = SceneContext {
            scenes: vec![scene(1, 0, 1000, "forest"), scene(2, 1500, 2500, "space station")],
            ..Default::default()
        };
        let report = v1_spatiotemporal(&ctx);
        assert!(report.has_critical());
    }

    #[test]
    fn v1_allows_location_jump_with_transport_cue() {
        let mut s2 = scene(2, 1500, 2500, "space station");
        s2.tags.push("transport_cue".to_string());
        let ctx = SceneContext {
            scenes: vec![scene(1, 0, 1000, "forest"), s2],
            ..Default::default()
        };
        let report = v1_spatiotemporal(&ctx);
        assert!(!report.has_critical());
    }

    #[test]
    fn v2_flags_unresolved_problem() {
        let ctx = SceneContext {
            events: vec![Event {
                id: "e1".into(),
                kind: EventKind::Problem,
                time_ms: 0,
                characters: vec!["A".into()],
                caused_by: vec![],
                importance: 0.5,
            }],
            ..Default::default()
        };
        let report = v2_causality(&ctx);
        assert!(!report.issues.is_empty());
    }

    #[test]
    fn v2_flags_temporal_paradox() {
        let ctx = SceneContext {
            events: vec![
                Event { id: "cause".into(), kind: EventKind::Other, time_ms: 1000, characters: vec![], caused_by: vec![], importance: 0.1 },
                Event { id: "effect".into(), kind: EventKind::Other, time_ms: 0, characters: vec![], caused_by: vec!["cause".into()], importance: 0.1 },
            ],
            ..Default::default()
        };
        let report = v2_causality(&ctx);
        assert!(report.issues.iter().any(|i| i.severity == Severity::High && i.message.contains("temporal_paradox")));
    }

    #[test]
    fn v3_flags_unexplained_prop_jump() {
        let mut s1 = scene(1, 0, 1000, "room");
        s1.props.push(PropState { name: "sword".into(), holder: Some("Alice".into()), origin_explained: true });
        let mut s2 = scene(2, 1000, 2000, "room");
        s2.props.push(PropState { name: "sword".into(), holder: Some("Bob".into()), origin_explained: true });
        let ctx = SceneContext { scenes: vec![s1, s2], ..Default::default() };
        let report = v3_prop_continuity(&ctx);
        assert!(report.issues.iter().any(|i| i.validator == "V3" && i.severity == Severity::High));
    }

    #[test]
    fn v4_flags_vocabulary_above_education_ceiling() {
        let mut s1 = scene(1, 0, 1000, "classroom");
        s1.characters.push(CharacterState {
            name: "Timmy".into(),
            emotion: None,
            education_level: Some("elementary".into()),
            dialogue: Some("I absolutely despise incomprehensible philosophical terminology".into()),
        });
        let ctx = SceneContext { scenes: vec![s1], ..Default::default() };
        let report = v4_dialogue_logic(&ctx);
        assert!(report.issues.iter().any(|i| i.validator == "V4" && i.message.contains("Timmy")));
    }

    #[test]
    fn v4_allows_simple_vocabulary_for_low_education_level() {
        let mut s1 = scene(1, 0, 1000, "classroom");
        s1.characters.push(CharacterState {
            name: "Timmy".into(),
            emotion: None,
            education_level: Some("elementary".into()),
            dialogue: Some("I see the dog run".into()),
        });
        let ctx = SceneContext { scenes: vec![s1], ..Default::default() };
        let report = v4_dialogue_logic(&ctx);
        assert!(!report.issues.iter().any(|i| i.validator == "V4"));
    }

    #[test]
    fn v5_flags_unflagged_emotion_whiplash() {
        let mut s1 = scene(1, 0, 1000, "room");
        s1.characters.push(CharacterState { name: "A".into(), emotion: Some("happy".into()), education_level: None, dialogue: None });
        let mut s2 = scene(2, 1000, 2000, "room");
        s2.characters.push(CharacterState { name: "A".into(), emotion: Some("sad".into()), education_level: None, dialogue: None });
        let ctx = SceneContext { scenes: vec![s1, s2], ..Default::default() };
        let report = v5_emotion_continuity(&ctx);
        assert!(report.has_critical());
    }
}
