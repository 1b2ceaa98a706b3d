//! `reconstruct <srt> --lang auto|zh|en --style viral|formal` — the
//! end-to-end pipeline, CutPlan JSON to stdout (spec §6).

use reconstruct_core::{Coordinator, Language, ReconstructConfig};
use tokio_util::sync::CancellationToken;

use crate::cli::{LanguageArg, StyleArg};
use crate::error::{CliError, Result};

pub async fn run(config: &ReconstructConfig, path: &str, lang: LanguageArg, style: StyleArg, snapshot: bool) -> Result<i32> {
    let bytes = std::fs::read(path).map_err(|source| CliError::InputFile { path: path.to_string(), source })?;

    let coordinator = Coordinator::new(config)?;
    let cancel = CancellationToken::new();
    let params = reconstruct_core::RewriteParams {
        style: style_tag(style).to_string(),
        forced_language: forced_language(lang),
    };

    let output = coordinator.run_job(&bytes, params, None, cancel).await?;

    let json = serde_json::json!({
        "cuts": output.plan.cuts,
        "total_duration_ms": output.plan.total_duration_ms,
        "source_duration_ms": output.plan.source_duration_ms,
        "quality_warning": output.plan.quality_warning,
        "snapshot_id": if snapshot { Some(output.snapshot_id.clone()) } else { None },
    });
    println!("{}", serde_json::to_string_pretty(&json).expect("Value always serializes"));

    // A critical validation issue already fails `run_job` with
    // `ReconstructError::ValidationRejected` (mapped to exit 1 below), so
    // `output` here is always an accepted plan.
    Ok(0)
}

fn forced_language(lang: LanguageArg) -> Option<Language> {
    match lang {
        LanguageArg::Auto => None,
        LanguageArg::Zh => Some(Language::Zh),
        LanguageArg::En => Some(Language::En),
    }
}

fn style_tag(style: StyleArg) -> &'static str {
    match style {
        StyleArg::Viral => "viral",
        StyleArg::Formal => "formal",
    }
}
