//! Scene annotations and supporting domain types consumed by V1-V8
//! (spec §4.5). These are authored alongside a [`crate::model::CutPlan`]
//! by whatever produced the source material; the engine itself never
//! invents annotations.

use serde::{Deserialize, Serialize};

/// Four-level issue severity (spec §3). Only `Critical` gates plan
/// acceptance (spec §4.5: "accepted iff no validator reports a
/// critical-severity issue"); the others are surfaced alongside an
/// otherwise-accepted plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One finding from a validator (spec §3: kind, severity, confidence,
/// location, message, optional suggested fix).
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub validator: &'static str,
    pub severity: Severity,
    /// How sure the check is that this is a genuine defect, in [0, 1].
    /// Rule-based checks emit 1.0; heuristic ones (era/stereotype
    /// keyword matches) emit less.
    pub confidence: f64,
    /// Scene or segment index the issue anchors to, when applicable.
    pub location: Option<usize>,
    pub message: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn push(&mut self, validator: &'static str, severity: Severity, message: impl Into<String>) {
        self.push_full(validator, severity, 1.0, None, message, None);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_full(
        &mut self,
        validator: &'static str,
        severity: Severity,
        confidence: f64,
        location: Option<usize>,
        message: impl Into<String>,
        suggested_fix: Option<String>,
    ) {
        self.issues.push(ValidationIssue {
            validator,
            severity,
            confidence,
            location,
            message: message.into(),
            suggested_fix,
        });
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterState {
    pub name: String,
    pub emotion: Option<String>,
    pub education_level: Option<String>,
    /// Lines spoken by this character in this scene, used by V4's
    /// vocabulary-vs-education check.
    pub dialogue: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropState {
    pub name: String,
    pub holder: Option<String>,
    pub origin_explained: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnnotation {
    pub index: usize,
    pub start_ms: i64,
    pub end_ms: i64,
    pub location: String,
    pub era_year: Option<i32>,
    pub region: Option<String>,
    /// e.g. "flashback", "dream", "montage", "transport_cue"
    pub tags: Vec<String>,
    pub characters: Vec<CharacterState>,
    pub props: Vec<PropState>,
}

impl SceneAnnotation {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Problem,
    Resolution,
    Clue,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub time_ms: i64,
    pub characters: Vec<String>,
    /// IDs of events this one is a declared effect of.
    pub caused_by: Vec<String>,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub kind: String,
    pub intensity: f64,
    pub resolution_method: String,
    pub mediator_skill: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeThread {
    pub id: String,
    pub event_ids: Vec<String>,
    pub total_duration_ms: i64,
    pub convergent: bool,
    pub concluded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CulturalRule {
    pub era: String,
    pub region: String,
    pub forbidden_elements: Vec<String>,
    pub required_elements: Vec<String>,
    pub stereotype_keywords: Vec<String>,
}

/// Everything the validators need beyond the [`crate::model::CutPlan`]
/// and [`crate::model::RewrittenTimeline`] themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneContext {
    pub scenes: Vec<SceneAnnotation>,
    pub events: Vec<Event>,
    pub conflicts: Vec<Conflict>,
    pub threads: Vec<NarrativeThread>,
    pub cultural_rules: Vec<CulturalRule>,
}

/// The opposite-emotion pairs used by V1 and V5 (spec Open Question,
/// resolved as the union of the two source tables this engine replaces).
pub const OPPOSITE_EMOTION_PAIRS: &[(&str, &str)] = &[
    ("happy", "sad"),
    ("happy", "angry"),
    ("sad", "angry"),
    ("angry", "fearful"),
    ("fearful", "happy"),
    ("angry", "calm"),
    ("fear", "confidence"),
    ("positive", "negative"),
];

pub fn is_opposite_pair(a: &str, b: &str) -> bool {
    OPPOSITE_EMOTION_PAIRS
        .iter()
        .any(|(x, y)| (x == &a && y == &b) || (x == &b && y == &a))
}
