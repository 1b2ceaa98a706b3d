//! Diversity gate (spec §4.6): before accepting a new snapshot, compares
//! it against the K most recent leaf snapshots with a hybrid similarity
//! score (cosine 0.5, sequence-match ratio 0.3, line-diff ratio 0.2) and
//! tags — never silently rejects — near-duplicates at or above the
//! threshold.

use crate::router::backend::GenerationBackend;

pub const DEFAULT_THRESHOLD: f64 = 0.65;
pub const DEFAULT_RECENT_K: usize = 5;

#[derive(Debug, Clone)]
pub struct DiversityVerdict {
    pub max_similarity: f64,
    pub most_similar_id: Option<String>,
    pub is_near_duplicate: bool,
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

/// A Ratcliff/Obershelp-style match ratio: twice the length of matching
/// runs over the combined length, computed by a simple longest-common-
/// subsequence-of-words approximation (good enough to rank similarity,
/// not a general diff algorithm).
fn sequence_match_ratio(a: &str, b: &str) -> f64 {
    let wa: Vec<&str> = a.split_whitespace().collect();
    let wb: Vec<&str> = b.split_whitespace().collect();
    if wa.is_empty() && wb.is_empty() {
        return 1.0;
    }
    let lcs = lcs_len(&wa, &wb);
    (2.0 * lcs as f64) / (wa.len() + wb.len()).max(1) as f64
}

fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn line_diff_ratio(a: &str, b: &str) -> f64 {
    let la: Vec<&str> = a.lines().collect();
    let lb: Vec<&str> = b.lines().collect();
    if la.is_empty() && lb.is_empty() {
        return 1.0;
    }
    let common = lcs_len(&la, &lb);
    (2.0 * common as f64) / (la.len() + lb.len()).max(1) as f64
}

fn hybrid_similarity(backend: &dyn GenerationBackend, candidate_text: &str, other_text: &str) -> f64 {
    let vectors = backend.embed(&[candidate_text.to_string(), other_text.to_string()]);
    let cosine_score = if vectors.len() == 2 { cosine(&vectors[0], &vectors[1]) } else { 0.0 };
    let seq_score = sequence_match_ratio(candidate_text, other_text);
    let line_score = line_diff_ratio(candidate_text, other_text);
    cosine_score * 0.5 + seq_score * 0.3 + line_score * 0.2
}

/// Compares `candidate_text` against `recent`, a slice of `(id, text)`
/// pairs for the most recent leaf snapshots, and returns a verdict.
/// Callers decide what "tag as near-duplicate" means for storage (spec:
/// never a silent rejection).
pub fn check(
    backend: &dyn GenerationBackend,
    candidate_text: &str,
    recent: &[(String, String)],
    threshold: f64,
) -> DiversityVerdict {
    let mut max_similarity = 0.0;
    let mut most_similar_id = None;

    for (id, text) in recent {
        let score = hybrid_similarity(backend, candidate_text, text);
        if score > max_similarity {
            max_similarity = score;
            most_similar_id = Some(id.clone());
        }
    }

    DiversityVerdict {
        max_similarity,
        most_similar_id,
        is_near_duplicate: max_similarity >= threshold,
    }
}
