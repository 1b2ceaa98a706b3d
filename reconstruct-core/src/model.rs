//! Core data model shared by every stage: [`Segment`], [`Timeline`],
//! [`RewrittenTimeline`], [`CutPlan`] and their invariants (spec §3).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Detected (or forced) dominant language of a [`Timeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    Unknown,
}

/// One subtitle unit. Indices are unique and monotonic within a timeline
/// after renumbering (spec §3, P1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

impl Segment {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Ordered, non-overlapping (except at shared boundaries) subtitle
/// segments plus a detected language and content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub segments: Vec<Segment>,
    pub language: Language,
    pub fingerprint: String,
}

impl Timeline {
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            language: Language::Unknown,
            fingerprint: fingerprint_of(&[]),
        }
    }

    /// Recomputes the fingerprint from the current segments, matching the
    /// normalization used when the timeline was first built (P7: the
    /// fingerprint is a pure function of normalized text + timing).
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = fingerprint_of(&self.segments);
    }

    pub fn total_duration_ms(&self) -> i64 {
        self.segments.last().map(|s| s.end_ms).unwrap_or(0)
    }
}

/// SHA-256 over normalized `"{start}-{end}:{trimmed text}"` lines, one per
/// segment, joined with `\n`. Normalization = trim + collapse internal
/// whitespace, so two byte-different-but-equivalent SRT files fingerprint
/// identically (spec §3).
pub fn fingerprint_of(segments: &[Segment]) -> String {
    let mut hasher = Sha256::new();
    for seg in segments {
        let normalized = seg.text.split_whitespace().collect::<Vec<_>>().join(" ");
        hasher.update(format!("{}-{}:{}\n", seg.start_ms, seg.end_ms, normalized));
    }
    format!("{:x}", hasher.finalize())
}

/// A transformation tag applied by the rewriter (C3, T1-T6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformTag {
    Hook,
    Amplifier,
    Suspense,
    Climax,
    Trigger,
}

/// Which source segment(s) a rewritten segment derives from.
///
/// `Pure` segments carry no source (e.g. a hook-only insertion) and must
/// be spliced onto a neighboring cut by the planner without consuming
/// source media (spec §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Provenance {
    Sourced(Vec<usize>),
    Pure,
}

/// A [`Timeline`] after C3: provenance back to source segments plus
/// transformation tags. Timings here are tentative; C4 re-derives them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrittenSegment {
    pub text: String,
    pub provenance: Provenance,
    pub tags: Vec<TransformTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrittenTimeline {
    pub segments: Vec<RewrittenSegment>,
    pub language: Language,
    /// Set when the optimization loop could not reach the minimum
    /// acceptable score and fell back to a minimal wrap (spec §4.3).
    pub quality_warning: Option<String>,
}

impl RewrittenTimeline {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// One entry in a [`CutPlan`]: a source interval mapped to an output
/// interval plus the text to display (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cut {
    pub src_start_ms: i64,
    pub src_end_ms: i64,
    pub out_start_ms: i64,
    pub out_end_ms: i64,
    pub text: String,
    pub provenance_ids: Vec<usize>,
}

impl Cut {
    pub fn src_duration_ms(&self) -> i64 {
        self.src_end_ms - self.src_start_ms
    }

    pub fn out_duration_ms(&self) -> i64 {
        self.out_end_ms - self.out_start_ms
    }
}

/// The final edit-decision list (spec §3). `total_duration_ms` equals the
/// sum of cut output durations (P2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutPlan {
    pub cuts: Vec<Cut>,
    pub total_duration_ms: i64,
    pub source_duration_ms: i64,
    pub quality_warning: Option<String>,
}

impl CutPlan {
    /// Output/input duration ratio used by T6's target band and P12.
    pub fn duration_ratio(&self) -> f64 {
        if self.source_duration_ms == 0 {
            return 0.0;
        }
        self.total_duration_ms as f64 / self.source_duration_ms as f64
    }

    /// Concatenated cut text, in emission order, used as the comparison
    /// text for the diversity gate (spec §4.6).
    pub fn joined_text(&self) -> String {
        self.cuts.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ")
    }
}
