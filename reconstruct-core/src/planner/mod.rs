//! Alignment & Splicing Planner (C4, spec §4.4): turns a
//! [`RewrittenTimeline`] plus the source [`Timeline`] into a [`CutPlan`]
//! the downstream editor can execute.

mod similarity;

use crate::error::{PlannerError, Result};
use crate::model::{Cut, CutPlan, Provenance, RewrittenSegment, Timeline};

const ALIGNMENT_ERROR_BUDGET_MS: f64 = 500.0;

struct SourceInterval {
    start_ms: i64,
    end_ms: i64,
}

/// Computes the union-hull source interval for a rewritten segment's
/// provenance, or one interval per maximal contiguous run when the
/// source indices aren't all contiguous in the original timeline.
fn source_intervals(source: &Timeline, provenance: &Provenance) -> Vec<SourceInterval> {
    let ids = match provenance {
        Provenance::Pure => return Vec::new(),
        Provenance::Sourced(ids) => ids,
    };
    if ids.is_empty() {
        return Vec::new();
    }

    let mut sorted_ids = ids.clone();
    sorted_ids.sort_unstable();

    let mut runs: Vec<Vec<usize>> = Vec::new();
    for id in sorted_ids {
        match runs.last_mut() {
            Some(run) if *run.last().unwrap() + 1 == id => run.push(id),
            _ => runs.push(vec![id]),
        }
    }

    runs.into_iter()
        .filter_map(|run| {
            let first = *run.first().unwrap();
            let last = *run.last().unwrap();
            let start = source.segments.iter().find(|s| s.index == first)?.start_ms;
            let end = source.segments.iter().find(|s| s.index == last)?.end_ms;
            Some(SourceInterval { start_ms: start, end_ms: end })
        })
        .collect()
}

fn mean_alignment_error(cuts: &[Cut]) -> f64 {
    if cuts.is_empty() {
        return 0.0;
    }
    let total: f64 = cuts
        .iter()
        .map(|c| (c.src_start_ms - c.out_start_ms).unsigned_abs() as f64)
        .sum();
    total / cuts.len() as f64
}

/// Lays source intervals end-to-end in emission order with zero gap and
/// zero overlap, attaching `Pure` (insertion-only) segments to the
/// neighboring cut's output interval without consuming source media.
fn lay_out_cuts(source: &Timeline, rewritten: &[RewrittenSegment]) -> Vec<Cut> {
    let mut cuts = Vec::new();
    let mut cursor_ms: i64 = 0;

    for seg in rewritten {
        let intervals = source_intervals(source, &seg.provenance);
        let provenance_ids = match &seg.provenance {
            Provenance::Sourced(ids) => ids.clone(),
            Provenance::Pure => Vec::new(),
        };

        if intervals.is_empty() {
            // pure insertion: splice onto the previous cut's output interval,
            // or (if first) create a zero-source-duration cut at the start.
            let duration_ms = estimate_pure_insertion_duration_ms(&seg.text);
            if let Some(prev) = cuts.last_mut() {
                // rides on the previous cut's existing output interval
                prev.text.push(' ');
                prev.text.push_str(&seg.text);
            } else {
                cuts.push(Cut {
                    src_start_ms: 0,
                    src_end_ms: 0,
                    out_start_ms: cursor_ms,
                    out_end_ms: cursor_ms + duration_ms,
                    text: seg.text.clone(),
                    provenance_ids,
                });
                cursor_ms += duration_ms;
            }
            continue;
        }

        for interval in intervals {
            let duration_ms = interval.end_ms - interval.start_ms;
            cuts.push(Cut {
                src_start_ms: interval.start_ms,
                src_end_ms: interval.end_ms,
                out_start_ms: cursor_ms,
                out_end_ms: cursor_ms + duration_ms,
                text: seg.text.clone(),
                provenance_ids: provenance_ids.clone(),
            });
            cursor_ms += duration_ms;
        }
    }

    cuts
}

fn estimate_pure_insertion_duration_ms(text: &str) -> i64 {
    // ~12 chars/sec reading speed, floor of 400ms so even short inserts are
    // watchable.
    ((text.chars().count() as f64 / 12.0) * 1000.0).round().max(400.0) as i64
}

fn retry_with_similarity_matcher(
    source: &Timeline,
    rewritten: &[RewrittenSegment],
) -> Result<Vec<Cut>> {
    let mut cuts = Vec::new();
    let mut cursor_ms: i64 = 0;

    for seg in rewritten {
        if matches!(seg.provenance, Provenance::Pure) {
            let duration_ms = estimate_pure_insertion_duration_ms(&seg.text);
            if let Some(prev) = cuts.last_mut() {
                let prev: &mut Cut = prev;
                prev.text.push(' ');
                prev.text.push_str(&seg.text);
            } else {
                cuts.push(Cut {
                    src_start_ms: 0,
                    src_end_ms: 0,
                    out_start_ms: cursor_ms,
                    out_end_ms: cursor_ms + duration_ms,
                    text: seg.text.clone(),
                    provenance_ids: Vec::new(),
                });
                cursor_ms += duration_ms;
            }
            continue;
        }

        let best = source
            .segments
            .iter()
            .map(|s| (s, similarity::text_similarity(&seg.text, &s.text)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap());

        match best {
            Some((matched, score)) if score >= similarity::ACCEPT_THRESHOLD => {
                let duration_ms = matched.duration_ms();
                cuts.push(Cut {
                    src_start_ms: matched.start_ms,
                    src_end_ms: matched.end_ms,
                    out_start_ms: cursor_ms,
                    out_end_ms: cursor_ms + duration_ms,
                    text: seg.text.clone(),
                    provenance_ids: vec![matched.index],
                });
                cursor_ms += duration_ms;
            }
            _ => return Err(PlannerError::UnresolvedProvenance(seg_index_hint(seg)).into()),
        }
    }

    Ok(cuts)
}

fn seg_index_hint(seg: &RewrittenSegment) -> usize {
    match &seg.provenance {
        Provenance::Sourced(ids) => ids.first().copied().unwrap_or(0),
        Provenance::Pure => 0,
    }
}

/// Produces a [`CutPlan`] from the source timeline and a rewritten
/// timeline's segments. Retries with a text-similarity matcher if the
/// primary layout's mean alignment error exceeds the 0.5s budget;
/// persistent failure yields a [`PlannerError`].
pub fn plan(source: &Timeline, rewritten: &[RewrittenSegment], quality_warning: Option<String>) -> Result<CutPlan> {
    let mut cuts = lay_out_cuts(source, rewritten);

    if mean_alignment_error(&cuts) > ALIGNMENT_ERROR_BUDGET_MS {
        tracing::debug!("contiguous-run alignment exceeded budget, retrying with similarity matcher");
        cuts = retry_with_similarity_matcher(source, rewritten)?;
        if mean_alignment_error(&cuts) > ALIGNMENT_ERROR_BUDGET_MS {
            let mean_error_ms = mean_alignment_error(&cuts);
            tracing::warn!("alignment failed even after similarity fallback: mean error {mean_error_ms}ms");
            return Err(PlannerError::AlignmentFailed { mean_error_ms }.into());
        }
    }

    for window in cuts.windows(2) {
        if window[1].out_start_ms < window[0].out_end_ms {
            return Err(PlannerError::OverlappingOutput.into());
        }
    }

    let total_duration_ms = cuts.last().map(|c| c.out_end_ms).unwrap_or(0);
    Ok(CutPlan {
        cuts,
        total_duration_ms,
        source_duration_ms: source.total_duration_ms(),
        quality_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{fingerprint_of, Language, Segment, TransformTag};

    fn source(texts: &[(i64, i64, &str)]) -> Timeline {
        let segments: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(i, (start, end, text))| Segment {
                index: i + 1,
                start_ms: *start,
                end_ms: *end,
                text: text.to_string(),
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
    fn output_intervals_are_contiguous_and_zero_gap() {
        let src = source(&[(0, 1000, "a"), (1000, 2500, "b"), (2500, 4000, "c")]);
        let rewritten = vec![
            RewrittenSegment { text: "a".into(), provenance: Provenance::Sourced(vec![1]), tags: vec![] },
            RewrittenSegment { text: "b".into(), provenance: Provenance::Sourced(vec![2]), tags: vec![] },
            RewrittenSegment { text: "c".into(), provenance: Provenance::Sourced(vec![3]), tags: vec![] },
        ];
        let plan = plan(&src, &rewritten, None).unwrap();
        for w in plan.cuts.windows(2) {
            assert_eq!(w[0].out_end_ms, w[1].out_start_ms);
        }
        assert_eq!(plan.total_duration_ms, plan.cuts.last().unwrap().out_end_ms);
    }

    #[test]
    fn pure_insertion_rides_on_previous_cut_without_consuming_source() {
        let src = source(&[(0, 1000, "a"), (1000, 2000, "b")]);
        let rewritten = vec![
            RewrittenSegment { text: "HOOK!".into(), provenance: Provenance::Sourced(vec![1]), tags: vec![TransformTag::Hook] },
            RewrittenSegment { text: "trigger!".into(), provenance: Provenance::Pure, tags: vec![TransformTag::Trigger] },
        ];
        let plan = plan(&src, &rewritten, None).unwrap();
        assert_eq!(plan.cuts.len(), 1);
        assert!(plan.cuts[0].text.contains("trigger!"));
    }

    #[test]
    fn contiguous_run_collapses_into_one_cut() {
        let src = source(&[(0, 1000, "a"), (1000, 2000, "b"), (5000, 6000, "c")]);
        let rewritten = vec![RewrittenSegment {
            text: "ab".into(),
            provenance: Provenance::Sourced(vec![1, 2]),
            tags: vec![],
        }];
        let plan = plan(&src, &rewritten, None).unwrap();
        assert_eq!(plan.cuts.len(), 1);
        assert_eq!(plan.cuts[0].src_start_ms, 0);
        assert_eq!(plan.cuts[0].src_end_ms, 2000);
    }
}
