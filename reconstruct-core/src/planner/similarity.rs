//! Text-similarity fallback matcher used when the primary alignment
//! exceeds its error budget (spec §4.4): character-set overlap 30%,
//! word-set overlap 40%, length ratio 20%, 3-gram substring score 10%.

use std::collections::HashSet;

pub const ACCEPT_THRESHOLD: f64 = 0.2;

fn char_set_overlap(a: &str, b: &str) -> f64 {
    let sa: HashSet<char> = a.chars().collect();
    let sb: HashSet<char> = b.chars().collect();
    jaccard(&sa, &sb)
}

fn word_set_overlap(a: &str, b: &str) -> f64 {
    let sa: HashSet<&str> = a.split_whitespace().collect();
    let sb: HashSet<&str> = b.split_whitespace().collect();
    jaccard(&sa, &sb)
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn length_ratio(a: &str, b: &str) -> f64 {
    let la = a.chars().count();
    let lb = b.chars().count();
    if la == 0 && lb == 0 {
        return 1.0;
    }
    let (short, long) = if la < lb { (la, lb) } else { (lb, la) };
    if long == 0 {
        0.0
    } else {
        short as f64 / long as f64
    }
}

fn trigram_score(a: &str, b: &str) -> f64 {
    let grams_a = trigrams(a);
    let grams_b = trigrams(b);
    jaccard(&grams_a, &grams_b)
}

fn trigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return HashSet::from([s.to_string()]);
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Weighted combination (30/40/20/10) of the four component scores,
/// each normalized to [0, 1].
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    char_set_overlap(&a_lower, &b_lower) * 0.3
        + word_set_overlap(&a_lower, &b_lower) * 0.4
        + length_ratio(&a_lower, &b_lower) * 0.2
        + trigram_score(&a_lower, &b_lower) * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_near_one() {
        let s = text_similarity("hello world", "hello world");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_text_scores_below_threshold() {
        let s = text_similarity("hello world", "completely unrelated content here");
        assert!(s < ACCEPT_THRESHOLD);
    }

    #[test]
    fn partial_overlap_scores_between_bounds() {
        let s = text_similarity("the quick brown fox", "the quick brown dog");
        assert!(s > 0.0 && s < 1.0);
    }
}
