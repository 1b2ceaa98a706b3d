//! The six analysis passes P1-P6 (spec §4.3). Each is a pure function
//! over a [`Timeline`]; together they produce the [`NarrativeFeatures`]
//! the rewriter consumes. Structure-marker and climax-cue word lists are
//! carried over from the reconstruction engine's own structure-marker
//! table.

use crate::model::{Language, Segment, Timeline};
use crate::router::backend::SemanticSignals;
use std::collections::HashMap;

use super::lexicon;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralMarker {
    Beginning,
    Development,
    Climax,
    Resolution,
    None,
}

struct StructureWords {
    beginning: &'static [&'static str],
    development: &'static [&'static str],
    climax: &'static [&'static str],
    resolution: &'static [&'static str],
}

const ZH_STRUCTURE: StructureWords = StructureWords {
    beginning: &["开始", "起初", "最初", "一开始", "首先", "当时", "那时"],
    development: &["然后", "接着", "随后", "后来", "接下来", "于是", "因此"],
    climax: &["突然", "忽然", "竟然", "没想到", "意外", "惊人", "关键时刻"],
    resolution: &["最后", "最终", "结果", "终于", "结局", "结束"],
};

const EN_STRUCTURE: StructureWords = StructureWords {
    beginning: &["initially", "at first", "in the beginning", "originally", "when", "once"],
    development: &["then", "next", "after", "later", "subsequently", "therefore", "thus"],
    climax: &["suddenly", "unexpectedly", "surprisingly", "shockingly", "at the crucial moment"],
    resolution: &["finally", "eventually", "in the end", "ultimately", "conclusion", "ending"],
};

fn structure_words_for(language: Language) -> &'static StructureWords {
    match language {
        Language::En => &EN_STRUCTURE,
        Language::Zh | Language::Unknown => &ZH_STRUCTURE,
    }
}

/// P2 per-segment structural tag: first matching category wins in the
/// fixed order beginning -> development -> climax -> resolution, since a
/// segment that reverses a beat ("then, suddenly...") is best read as the
/// later beat.
fn classify_structure(text: &str, words: &StructureWords) -> StructuralMarker {
    let lowered = text.to_lowercase();
    if words.resolution.iter().any(|w| lowered.contains(w)) {
        StructuralMarker::Resolution
    } else if words.climax.iter().any(|w| lowered.contains(w)) {
        StructuralMarker::Climax
    } else if words.development.iter().any(|w| lowered.contains(w)) {
        StructuralMarker::Development
    } else if words.beginning.iter().any(|w| lowered.contains(w)) {
        StructuralMarker::Beginning
    } else {
        StructuralMarker::None
    }
}

#[derive(Debug, Clone)]
pub struct SegmentAnalysis {
    pub emotion: SemanticSignals,
    pub structure: StructuralMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Family,
    Interpersonal,
    Antagonistic,
    Supportive,
}

#[derive(Debug, Clone)]
pub struct CharacterRelation {
    pub a: String,
    pub b: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone)]
pub struct TurningPoint {
    pub segment_index: usize,
    pub score: f64,
}

/// Full feature set produced by P1-P6, consumed by the rewriter (T1-T6)
/// and the self-scoring loop.
#[derive(Debug, Clone)]
pub struct NarrativeFeatures {
    pub per_segment: Vec<SegmentAnalysis>,
    pub arc_completeness: f64,
    pub pacing_spm: f64,
    pub characters: Vec<String>,
    pub relations: Vec<CharacterRelation>,
    pub turning_points: Vec<TurningPoint>,
    pub emotion_curve: Vec<f64>,
    pub plot_integrity_ok: bool,
    pub dominant_emotion: String,
    pub emotional_intensity: f64,
}

impl NarrativeFeatures {
    pub fn story_arc_strength(&self) -> f64 {
        // arc strength blends structural completeness with how much of the
        // timeline actually carries a tagged beat, matching the engine's
        // treatment of "story_arc_strength" as a proxy for completeness.
        let tagged = self
            .per_segment
            .iter()
            .filter(|s| s.structure != StructuralMarker::None)
            .count();
        let coverage = if self.per_segment.is_empty() {
            0.0
        } else {
            tagged as f64 / self.per_segment.len() as f64
        };
        (self.arc_completeness * 0.6 + coverage * 0.4).min(1.0)
    }
}

/// P1: per-segment emotion scoring plus aggregate dominant emotion and
/// intensity.
fn p1_semantic_analysis(segments: &[Segment], language: Language) -> Vec<SemanticSignals> {
    segments
        .iter()
        .map(|s| lexicon::score_emotion(&s.text, language))
        .collect()
}

/// Time-thirds fallback: when cue words assign no marker, split the
/// timeline into beginning/development/resolution by position instead of
/// leaving the segment untagged, matching the original's simplified
/// baseline classifier.
fn thirds_fallback(index: usize, total: usize) -> StructuralMarker {
    if total == 0 {
        return StructuralMarker::None;
    }
    let third = total as f64 / 3.0;
    let pos = index as f64;
    if pos < third {
        StructuralMarker::Beginning
    } else if pos < 2.0 * third {
        StructuralMarker::Development
    } else {
        StructuralMarker::Resolution
    }
}

/// P2: structural tagging, arc-completeness (fraction of the four
/// categories present anywhere in the timeline) and pacing in
/// sentences-per-minute.
fn p2_narrative_structure(
    segments: &[Segment],
    language: Language,
) -> (Vec<StructuralMarker>, f64) {
    let words = structure_words_for(language);
    let tags: Vec<StructuralMarker> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let cue_tag = classify_structure(&s.text, words);
            if cue_tag == StructuralMarker::None {
                thirds_fallback(i, segments.len())
            } else {
                cue_tag
            }
        })
        .collect();

    let mut present = [false; 4];
    for tag in &tags {
        match tag {
            StructuralMarker::Beginning => present[0] = true,
            StructuralMarker::Development => present[1] = true,
            StructuralMarker::Climax => present[2] = true,
            StructuralMarker::Resolution => present[3] = true,
            StructuralMarker::None => {}
        }
    }
    let completeness = present.iter().filter(|p| **p).count() as f64 / 4.0;
    (tags, completeness)
}

fn pacing_spm(segments: &[Segment]) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }
    let total_ms = segments.last().unwrap().end_ms - segments.first().unwrap().start_ms;
    if total_ms <= 0 {
        return 0.0;
    }
    let minutes = total_ms as f64 / 60_000.0;
    segments.len() as f64 / minutes
}

/// P3: a lightweight named/pronominal reference extractor. Treats any
/// capitalized (en) or two-to-three character proper-noun-shaped (zh)
/// token as a character candidate, then infers a relation between any
/// pair that co-occurs in a sliding window of segments.
fn p3_character_relations(
    segments: &[Segment],
    language: Language,
) -> (Vec<String>, Vec<CharacterRelation>) {
    const WINDOW: usize = 3;
    let mut mentions: HashMap<String, Vec<usize>> = HashMap::new();

    for (i, seg) in segments.iter().enumerate() {
        for name in extract_names(&seg.text, language) {
            mentions.entry(name).or_default().push(i);
        }
    }

    let mut characters: Vec<String> = mentions.keys().cloned().collect();
    characters.sort();

    let mut relations = Vec::new();
    let names: Vec<&String> = characters.iter().collect();
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let a = names[i];
            let b = names[j];
            let co_occurs = mentions[a].iter().any(|&ia| {
                mentions[b].iter().any(|&ib| (ia as i64 - ib as i64).unsigned_abs() as usize <= WINDOW)
            });
            if co_occurs {
                let kind = infer_relation_kind(segments, a, b);
                relations.push(CharacterRelation {
                    a: a.clone(),
                    b: b.clone(),
                    kind,
                });
            }
        }
    }

    (characters, relations)
}

fn extract_names(text: &str, language: Language) -> Vec<String> {
    match language {
        Language::En => text
            .split_whitespace()
            .filter(|w| {
                w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
                    && w.chars().all(|c| c.is_alphabetic())
                    && w.len() > 1
            })
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect(),
        Language::Zh | Language::Unknown => {
            // crude: any run of 2-3 CJK chars not matching a structure/emotion
            // keyword is treated as a name candidate.
            let chars: Vec<char> = text.chars().collect();
            let mut names = Vec::new();
            let mut i = 0;
            while i < chars.len() {
                if matches!(chars[i] as u32, 0x4E00..=0x9FFF) {
                    let mut j = i + 1;
                    while j < chars.len() && j < i + 3 && matches!(chars[j] as u32, 0x4E00..=0x9FFF) {
                        j += 1;
                    }
                    if j - i >= 2 {
                        names.push(chars[i..j].iter().collect());
                    }
                    i = j;
                } else {
                    i += 1;
                }
            }
            names
        }
    }
}

fn infer_relation_kind(segments: &[Segment], a: &str, b: &str) -> RelationKind {
    let joint_text: String = segments
        .iter()
        .filter(|s| s.text.contains(a) && s.text.contains(b))
        .map(|s| s.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    const FAMILY: &[&str] = &["father", "mother", "brother", "sister", "父亲", "母亲", "兄弟", "姐妹"];
    const ANTAGONISTIC: &[&str] = &["enemy", "rival", "against", "敌人", "对手", "冲突"];
    const SUPPORTIVE: &[&str] = &["friend", "help", "together", "朋友", "帮助", "一起"];

    if FAMILY.iter().any(|w| joint_text.contains(w)) {
        RelationKind::Family
    } else if ANTAGONISTIC.iter().any(|w| joint_text.contains(w)) {
        RelationKind::Antagonistic
    } else if SUPPORTIVE.iter().any(|w| joint_text.contains(w)) {
        RelationKind::Supportive
    } else {
        RelationKind::Interpersonal
    }
}

/// P4: a segment is a turning point if its emotion delta from the
/// previous segment exceeds the threshold, it carries a climax cue word,
/// or it passes the punctuation-based emotional-peak pre-filter. Scored
/// by intensity * local density (count of turning-point-worthy neighbors
/// within a 2-segment window). Ties on score keep the earliest segment
/// first (spec §4.3 tie-break).
fn p4_turning_points(
    segments: &[Segment],
    emotions: &[SemanticSignals],
    structure: &[StructuralMarker],
) -> Vec<TurningPoint> {
    const DELTA_THRESHOLD: f64 = 0.25;
    let mut flagged = vec![false; segments.len()];

    for i in 0..segments.len() {
        let cue = structure[i] == StructuralMarker::Climax;
        let delta = if i == 0 {
            0.0
        } else {
            (emotions[i].intensity() - emotions[i - 1].intensity()).abs()
        };
        if cue || delta >= DELTA_THRESHOLD || is_emotional_peak_candidate(&segments[i].text) {
            flagged[i] = true;
        }
    }

    let mut points = Vec::new();
    for i in 0..segments.len() {
        if !flagged[i] {
            continue;
        }
        let window_start = i.saturating_sub(2);
        let window_end = (i + 2).min(segments.len() - 1);
        let density = flagged[window_start..=window_end].iter().filter(|f| **f).count() as f64;
        let score = emotions[i].intensity() * density;
        points.push(TurningPoint { segment_index: i, score });
    }

    points
}

/// Cheap pre-filter ahead of the full emotion-delta scan: segments ending
/// in an exclamation or question mark (either script) are treated as
/// emotional-peak candidates, matching the original's punctuation
/// heuristic for flagging key moments before scoring them properly.
fn is_emotional_peak_candidate(text: &str) -> bool {
    text.contains(['!', '?', '！', '？'])
}

/// P5: per-segment signed emotion in [-1, 1] (positive+resolution minus
/// negative+conflict, clamped).
fn p5_emotion_curve(emotions: &[SemanticSignals]) -> Vec<f64> {
    emotions
        .iter()
        .map(|e| (e.positive + e.resolution - e.negative - e.conflict).clamp(-1.0, 1.0))
        .collect()
}

/// P6: the output must retain at least one beginning-tagged and one
/// resolution-tagged segment.
fn p6_plot_integrity(structure: &[StructuralMarker]) -> bool {
    let has_beginning = structure.iter().any(|s| *s == StructuralMarker::Beginning);
    let has_resolution = structure.iter().any(|s| *s == StructuralMarker::Resolution);
    has_beginning && has_resolution
}

/// Runs P1-P6 in order and assembles [`NarrativeFeatures`].
pub fn analyze(timeline: &Timeline) -> NarrativeFeatures {
    let emotions = p1_semantic_analysis(&timeline.segments, timeline.language);
    let (structure, arc_completeness) = p2_narrative_structure(&timeline.segments, timeline.language);
    let (characters, relations) = p3_character_relations(&timeline.segments, timeline.language);
    let turning_points = p4_turning_points(&timeline.segments, &emotions, &structure);
    let emotion_curve = p5_emotion_curve(&emotions);
    let plot_integrity_ok = p6_plot_integrity(&structure);

    let per_segment: Vec<SegmentAnalysis> = emotions
        .iter()
        .cloned()
        .zip(structure.iter().cloned())
        .map(|(emotion, structure)| SegmentAnalysis { emotion, structure })
        .collect();

    let aggregate = aggregate_signals(&emotions);
    let dominant_emotion = aggregate.dominant().to_string();
    let emotional_intensity = aggregate.intensity();

    NarrativeFeatures {
        per_segment,
        arc_completeness,
        pacing_spm: pacing_spm(&timeline.segments),
        characters,
        relations,
        turning_points,
        emotion_curve,
        plot_integrity_ok,
        dominant_emotion,
        emotional_intensity,
    }
}

fn aggregate_signals(emotions: &[SemanticSignals]) -> SemanticSignals {
    let n = emotions.len().max(1) as f64;
    let mut acc = SemanticSignals::default();
    for e in emotions {
        acc.positive += e.positive;
        acc.negative += e.negative;
        acc.intense += e.intense;
        acc.conflict += e.conflict;
        acc.resolution += e.resolution;
    }
    acc.positive /= n;
    acc.negative /= n;
    acc.intense /= n;
    acc.conflict /= n;
    acc.resolution /= n;
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fingerprint_of;

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
    fn plot_integrity_requires_beginning_and_resolution() {
        let t = timeline(&["initially things were calm", "finally it was over"]);
        let features = analyze(&t);
        assert!(features.plot_integrity_ok);
    }

    #[test]
    fn plot_integrity_fails_without_resolution() {
        let t = timeline(&["initially things were calm", "then more happened"]);
        let features = analyze(&t);
        assert!(!features.plot_integrity_ok);
    }

    #[test]
    fn turning_point_detected_on_climax_cue() {
        let t = timeline(&["it was a normal day", "suddenly everything changed", "then it ended"]);
        let features = analyze(&t);
        assert!(features.turning_points.iter().any(|tp| tp.segment_index == 1));
    }

    #[test]
    fn empty_timeline_has_no_turning_points_and_fails_integrity() {
        let t = Timeline::empty();
        let features = analyze(&t);
        assert!(features.turning_points.is_empty());
        assert!(!features.plot_integrity_ok);
    }

    #[test]
    fn thirds_fallback_tags_segments_with_no_cue_words() {
        let t = timeline(&["a plain sentence here", "another plain one", "yet another one here"]);
        let features = analyze(&t);
        assert_eq!(features.per_segment[0].structure, StructuralMarker::Beginning);
        assert_eq!(features.per_segment[2].structure, StructuralMarker::Resolution);
    }

    #[test]
    fn exclamation_mark_flags_a_turning_point_candidate() {
        let t = timeline(&["a calm sentence", "wait, really?!", "a calm ending here"]);
        let features = analyze(&t);
        assert!(features.turning_points.iter().any(|tp| tp.segment_index == 1));
    }
}
