//! Per-language phrase banks for T1-T5, carried over from the
//! reconstruction engine's own `viral_features` template tables.

use crate::model::Language;

pub struct HookBank {
    pub positive: &'static [&'static str],
    pub negative: &'static [&'static str],
    pub intense: &'static [&'static str],
    pub neutral: &'static [&'static str],
}

pub struct AmplifierBank {
    pub high_intensity: &'static [&'static str],
    pub medium_intensity: &'static [&'static str],
    pub contextual: &'static [&'static str],
}

pub struct SuspenseBank {
    pub high_tension: &'static [&'static str],
    pub medium_tension: &'static [&'static str],
    pub revelation: &'static [&'static str],
}

pub struct ClimaxBank {
    pub dramatic: &'static [&'static str],
    pub emotional: &'static [&'static str],
    pub suspenseful: &'static [&'static str],
}

pub struct PhraseSet {
    pub hooks: HookBank,
    pub amplifiers: AmplifierBank,
    pub suspense: SuspenseBank,
    pub climax: ClimaxBank,
    pub triggers: &'static [&'static str],
    pub rhythm_enhancers: &'static [&'static str],
}

const ZH: PhraseSet = PhraseSet {
    hooks: HookBank {
        positive: &["震撼！", "太棒了！", "史上最佳", "绝对精彩"],
        negative: &["不敢相信！", "太离谱了！", "简直不可思议", "这也太"],
        intense: &["惊天动地！", "史无前例！", "前所未有", "震撼全场"],
        neutral: &["你绝对想不到", "必看", "精彩绝伦", "不容错过"],
    },
    amplifiers: AmplifierBank {
        high_intensity: &["竟然", "居然", "简直", "完全"],
        medium_intensity: &["真的是", "确实", "实在", "非常"],
        contextual: &["没想到", "原来", "结果", "最终"],
    },
    suspense: SuspenseBank {
        high_tension: &["但是", "然而", "突然", "就在这时"],
        medium_tension: &["接着", "随后", "紧接着", "这时候"],
        revelation: &["关键时刻", "真相时刻", "决定性瞬间", "转折点"],
    },
    climax: ClimaxBank {
        dramatic: &["惊人反转", "震撼结局", "意想不到的结果", "真相大白"],
        emotional: &["感人至深", "催人泪下", "激动人心", "震撼心灵"],
        suspenseful: &["悬念揭晓", "谜底揭开", "真相浮出水面", "一切水落石出"],
    },
    triggers: &["你觉得呢？", "太精彩了！", "必须看到最后！", "结局绝了！", "简直神了！"],
    rhythm_enhancers: &["迅速", "紧接着", "刹那间", "转眼间"],
};

const EN: PhraseSet = PhraseSet {
    hooks: HookBank {
        positive: &["AMAZING!", "INCREDIBLE!", "BEST EVER", "ABSOLUTELY STUNNING"],
        negative: &["UNBELIEVABLE!", "SHOCKING!", "This is INSANE!", "NO WAY!"],
        intense: &["MIND-BLOWING!", "EARTH-SHATTERING!", "UNPRECEDENTED", "GAME-CHANGING"],
        neutral: &["You won't believe", "Must see", "Absolutely epic", "Don't miss this"],
    },
    amplifiers: AmplifierBank {
        high_intensity: &["actually", "literally", "absolutely", "completely"],
        medium_intensity: &["really", "truly", "definitely", "certainly"],
        contextual: &["surprisingly", "unexpectedly", "ultimately", "finally"],
    },
    suspense: SuspenseBank {
        high_tension: &["but then", "however", "suddenly", "at that moment"],
        medium_tension: &["next", "then", "after that", "meanwhile"],
        revelation: &["the crucial moment", "the turning point", "the revelation", "the climax"],
    },
    climax: ClimaxBank {
        dramatic: &["plot twist", "shocking ending", "unexpected outcome", "truth revealed"],
        emotional: &["heart-wrenching", "tear-jerking", "thrilling", "soul-stirring"],
        suspenseful: &["mystery solved", "truth unveiled", "secrets exposed", "all revealed"],
    },
    triggers: &["What do you think?", "AMAZING!", "Must watch till the end!", "Epic ending!", "Mind blown!"],
    rhythm_enhancers: &["quickly", "in a flash", "right away", "before long"],
};

pub fn phrases_for(language: Language) -> &'static PhraseSet {
    match language {
        Language::En => &EN,
        Language::Zh | Language::Unknown => &ZH,
    }
}

impl HookBank {
    pub fn category(&self, name: &str) -> &'static [&'static str] {
        match name {
            "positive" => self.positive,
            "negative" => self.negative,
            "intense" => self.intense,
            _ => self.neutral,
        }
    }
}
