//! Per-language emotion lexicons used by P1 (deep semantic analysis) and,
//! via [`crate::router::backend::LexiconBackend`], by the stub generation
//! backends' `analyze`. Word lists and the score/len(words) normalization
//! are carried verbatim from the reconstruction engine this crate
//! replaces (zh/en only; any other language falls back to zh, matching
//! that engine's own default).

use crate::model::Language;
use crate::router::backend::SemanticSignals;

struct Lexicon {
    positive: &'static [&'static str],
    negative: &'static [&'static str],
    intense: &'static [&'static str],
    conflict: &'static [&'static str],
    resolution: &'static [&'static str],
}

const ZH: Lexicon = Lexicon {
    positive: &["开心", "快乐", "幸福", "成功", "胜利", "美好", "温暖", "感动", "惊喜", "满足"],
    negative: &["痛苦", "悲伤", "失败", "绝望", "愤怒", "恐惧", "焦虑", "失望", "孤独", "痛苦"],
    intense: &["震撼", "惊人", "不可思议", "令人震惊", "史无前例", "前所未有", "惊天动地"],
    conflict: &["冲突", "矛盾", "对立", "争斗", "战斗", "竞争", "较量", "对抗", "斗争"],
    resolution: &["解决", "化解", "和解", "团圆", "成功", "完成", "实现", "达成", "克服"],
};

const EN: Lexicon = Lexicon {
    positive: &["happy", "joy", "success", "victory", "beautiful", "warm", "touching", "surprise", "satisfied"],
    negative: &["pain", "sad", "failure", "despair", "anger", "fear", "anxiety", "disappointed", "lonely"],
    intense: &["shocking", "amazing", "incredible", "stunning", "unprecedented", "extraordinary"],
    conflict: &["conflict", "contradiction", "opposition", "fight", "battle", "competition", "struggle"],
    resolution: &["solve", "resolve", "reconcile", "reunion", "success", "complete", "achieve", "overcome"],
};

fn lexicon_for(language: Language) -> &'static Lexicon {
    match language {
        Language::En => &EN,
        Language::Zh | Language::Unknown => &ZH,
    }
}

fn axis_score(lowered: &str, words: &[&str]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let hits = words.iter().filter(|w| lowered.contains(*w)).count();
    hits as f64 / words.len() as f64
}

/// Scores `text` against the emotion lexicon for `language`. Matching is
/// substring-based against the lowercased text, same as the reference
/// `word in plot.lower()` check; each axis is normalized by its own word
/// count so axes with fewer entries aren't penalized.
pub fn score_emotion(text: &str, language: Language) -> SemanticSignals {
    let lowered = text.to_lowercase();
    let lex = lexicon_for(language);
    SemanticSignals {
        positive: axis_score(&lowered, lex.positive),
        negative: axis_score(&lowered, lex.negative),
        intense: axis_score(&lowered, lex.intense),
        conflict: axis_score(&lowered, lex.conflict),
        resolution: axis_score(&lowered, lex.resolution),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zh_positive_word_scores_nonzero() {
        let s = score_emotion("今天真是开心的一天", Language::Zh);
        assert!(s.positive > 0.0);
        assert_eq!(s.negative, 0.0);
    }

    #[test]
    fn en_conflict_and_resolution_words_score() {
        let s = score_emotion("after the battle they finally reconcile", Language::En);
        assert!(s.conflict > 0.0);
        assert!(s.resolution > 0.0);
    }

    #[test]
    fn unknown_language_falls_back_to_zh_lexicon() {
        let s = score_emotion("震撼人心的胜利", Language::Unknown);
        assert!(s.intense > 0.0);
    }

    #[test]
    fn neutral_text_scores_all_zero() {
        let s = score_emotion("the cat sat on the mat", Language::En);
        assert_eq!(s, SemanticSignals::default());
    }
}
