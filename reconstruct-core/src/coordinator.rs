//! The per-job pipeline coordinator (spec §5): bounded-parallelism job
//! pool over a [`tokio::sync::Semaphore`], sequential C1->C6 per job,
//! validator fan-out/fan-in via `JoinSet`, cancellation propagation, and
//! retry-with-backoff for retriable (memory) errors.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ReconstructConfig;
use crate::engine;
use crate::error::{ReconstructError, Result};
use crate::model::{CutPlan, Timeline};
use crate::planner;
use crate::router::governor::MemoryGovernor;
use crate::router::RewriteParams;
use crate::subtitle;
use crate::validators::types::SceneContext;
use crate::validators::{checks, ValidationReport};
use crate::versioning::diversity;
use crate::versioning::{AnchorStore, VersionTree};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const JOB_TIMEOUT: Duration = Duration::from_secs(180);
const MAX_MEMORY_RETRIES: u32 = 3;

pub struct JobOutput {
    pub plan: CutPlan,
    pub validation: ValidationReport,
    pub snapshot_id: String,
}

/// Process-wide pipeline state shared by every job: the memory governor,
/// the job-worker semaphore, and the version tree the last stage writes
/// into.
pub struct Coordinator {
    governor: Arc<MemoryGovernor>,
    semaphore: Arc<Semaphore>,
    tree: VersionTree,
    anchors: AnchorStore,
}

impl Coordinator {
    /// Opens the version tree and anchor store at `config.snapshot_dir` /
    /// `config.anchor_dir`, replaying whatever snapshots already exist on
    /// disk from a prior process.
    pub fn new(config: &ReconstructConfig) -> Result<Self> {
        let workers = config.job_workers.max(1);
        Ok(Self {
            governor: Arc::new(MemoryGovernor::new(config.max_resident_memory_mib)),
            semaphore: Arc::new(Semaphore::new(workers)),
            tree: VersionTree::open(&config.snapshot_dir, config.secret_key.clone())?,
            anchors: AnchorStore::open(&config.anchor_dir)?,
        })
    }

    pub fn tree(&self) -> &VersionTree {
        &self.tree
    }

    pub fn anchors(&self) -> &AnchorStore {
        &self.anchors
    }

    /// Runs one job end-to-end: parse -> acquire backend -> reconstruct ->
    /// plan -> validate -> snapshot. Acquires a worker-pool permit first,
    /// so at most `job_workers` jobs execute stage C1-C6 concurrently.
    pub async fn run_job(
        &self,
        srt_bytes: &[u8],
        style: RewriteParams,
        scene_context: Option<SceneContext>,
        cancel: CancellationToken,
    ) -> Result<JobOutput> {
        let _permit = tokio::select! {
            permit = self.semaphore.acquire() => permit.map_err(|_| ReconstructError::Internal("semaphore closed".into()))?,
            _ = tokio::time::sleep(STARTUP_TIMEOUT) => return Err(ReconstructError::Internal("timed out waiting for a free job worker".into())),
            _ = cancel.cancelled() => return Err(ReconstructError::Cancelled),
        };

        tokio::time::timeout(JOB_TIMEOUT, self.run_job_inner(srt_bytes, style, scene_context, cancel.clone()))
            .await
            .map_err(|_| ReconstructError::Internal("job exceeded the 180s end-to-end timeout".into()))?
    }

    async fn run_job_inner(
        &self,
        srt_bytes: &[u8],
        style: RewriteParams,
        scene_context: Option<SceneContext>,
        cancel: CancellationToken,
    ) -> Result<JobOutput> {
        tracing::info!("job started: {} bytes of subtitle input", srt_bytes.len());

        // C1
        let mut timeline: Timeline = subtitle::parse_srt(srt_bytes)?;
        if let Some(forced) = style.forced_language {
            timeline.language = forced;
        }
        tracing::debug!("parsed {} segments, language {:?}", timeline.segments.len(), timeline.language);

        // C2, with retry-with-backoff for retriable memory errors.
        let lease = self.acquire_with_retry(timeline.language, &cancel).await?;
        let backend = lease.backend();
        tracing::debug!("acquired backend {:?} for language {:?}", backend.kind(), timeline.language);
        let _ = style; // threaded through for rewrite params in a fuller backend; lexicon backend ignores it.

        // C3
        let rewritten = engine::reconstruct(&timeline);

        // C4
        let plan = planner::plan(&timeline, &rewritten.segments, rewritten.quality_warning.clone())?;
        tracing::debug!("planned {} cuts covering {}ms", plan.cuts.len(), plan.total_duration_ms);

        // C5: validators fan out over a shared executor and join before
        // snapshot. No scene context (e.g. a bare reconstruct run with no
        // annotated scenes) means an empty, always-passing report.
        let validation = match scene_context {
            Some(ctx) => self.run_validators(ctx, &plan, &cancel).await?,
            None => ValidationReport::default(),
        };

        if validation.has_critical() {
            let critical_count = validation.issues.iter().filter(|i| i.severity == crate::validators::Severity::Critical).count();
            tracing::warn!("plan rejected: {} critical validation issue(s)", critical_count);
            return Err(ReconstructError::ValidationRejected(critical_count));
        }

        // Diversity gate (spec §4.6): compare against the most recent leaf
        // snapshots while the backend is still resident, then release.
        let tags = self.diversity_tags(&plan, backend.as_ref());
        if tags.iter().any(|t| t == "near_duplicate") {
            tracing::info!("plan tagged near_duplicate against recent snapshots");
        }
        drop(lease);

        // C6
        let content = serde_json::to_value(&plan).map_err(crate::error::VersioningError::from)?;
        let snapshot_id = self.tree.take(
            content,
            "reconstruct",
            "draft",
            None,
            tags,
            None,
            Utc::now(),
        )?;
        tracing::info!("job finished: snapshot {}", snapshot_id);

        Ok(JobOutput { plan, validation, snapshot_id })
    }

    /// Compares `plan` against the `DEFAULT_RECENT_K` most recently created
    /// leaf snapshots and returns the tag set to store with it. Never
    /// rejects outright (spec §9's resolved Open Question): a near-duplicate
    /// is tagged, not dropped.
    fn diversity_tags(&self, plan: &CutPlan, backend: &dyn crate::router::backend::GenerationBackend) -> Vec<String> {
        let mut leaves = self.tree.leaves();
        leaves.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let recent: Vec<(String, String)> = leaves
            .into_iter()
            .take(diversity::DEFAULT_RECENT_K)
            .filter_map(|node| {
                let other: CutPlan = serde_json::from_value(node.content).ok()?;
                Some((node.id, other.joined_text()))
            })
            .collect();

        let verdict = diversity::check(backend, &plan.joined_text(), &recent, diversity::DEFAULT_THRESHOLD);
        if verdict.is_near_duplicate {
            vec!["near_duplicate".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn acquire_with_retry(
        &self,
        language: crate::model::Language,
        cancel: &CancellationToken,
    ) -> Result<crate::router::governor::Lease> {
        let mut attempt = 0;
        loop {
            match self.governor.acquire(language, cancel).await {
                Ok(lease) => return Ok(lease),
                Err(e) if e.is_retriable() && attempt < MAX_MEMORY_RETRIES => {
                    attempt += 1;
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                    tracing::warn!("backend acquire failed ({e}), retrying in {}ms (attempt {attempt}/{MAX_MEMORY_RETRIES})", backoff.as_millis());
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fans V1-V8 out over `JoinSet`, joining before returning. A
    /// cancellation during the fan-in discards partial results, per the
    /// suspension-point contract (spec §5).
    async fn run_validators(
        &self,
        ctx: SceneContext,
        _plan: &CutPlan,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        let ctx = Arc::new(ctx);

        let validator_fns: Vec<fn(&SceneContext) -> ValidationReport> = vec![
            checks::v1_spatiotemporal,
            checks::v2_causality,
            checks::v3_prop_continuity,
            checks::v4_dialogue_logic,
            checks::v5_emotion_continuity,
            checks::v6_conflict_resolution,
            checks::v7_multi_thread,
            checks::v8_cultural_context,
        ];

        let mut joinset: JoinSet<ValidationReport> = JoinSet::new();
        for check in validator_fns {
            let ctx = ctx.clone();
            joinset.spawn(async move { check(&ctx) });
        }

        let mut merged = ValidationReport::default();
        loop {
            tokio::select! {
                joined = joinset.join_next() => {
                    match joined {
                        Some(Ok(report)) => merged.merge(report),
                        Some(Err(e)) => return Err(ReconstructError::Internal(format!("validator task panicked: {e}"))),
                        None => break,
                    }
                }
                _ = cancel.cancelled() => {
                    joinset.abort_all();
                    return Err(ReconstructError::Cancelled);
                }
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_srt() -> &'static [u8] {
        b"1\n00:00:00,000 --> 00:00:02,000\ninitially calm\n\n2\n00:00:02,000 --> 00:00:04,000\nsuddenly chaos\n\n3\n00:00:04,000 --> 00:00:06,000\nfinally resolved\n"
    }

    fn test_config(dir: &tempfile::TempDir, job_workers: usize) -> ReconstructConfig {
        ReconstructConfig {
            max_resident_memory_mib: 3800,
            job_workers,
            snapshot_dir: dir.path().join("snapshots").to_string_lossy().into_owned(),
            anchor_dir: dir.path().join("anchors").to_string_lossy().into_owned(),
            secret_key: None,
        }
    }

    #[tokio::test]
    async fn end_to_end_job_without_scene_context_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 2);
        let coordinator = Coordinator::new(&config).unwrap();
        let cancel = CancellationToken::new();
        let output = coordinator
            .run_job(sample_srt(), RewriteParams::default(), None, cancel)
            .await
            .unwrap();
        assert!(!output.plan.cuts.is_empty());
        assert!(!output.validation.has_critical());
    }

    #[tokio::test]
    async fn identical_rerun_is_tagged_near_duplicate_not_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 2);
        let coordinator = Coordinator::new(&config).unwrap();

        let first = coordinator
            .run_job(sample_srt(), RewriteParams::default(), None, CancellationToken::new())
            .await
            .unwrap();
        let second = coordinator
            .run_job(sample_srt(), RewriteParams::default(), None, CancellationToken::new())
            .await
            .unwrap();

        let second_node = coordinator.tree().node(&second.snapshot_id).unwrap();
        assert!(second_node.tags.contains(&"near_duplicate".to_string()));
        // both snapshots remain queryable: diversity tags, never drops.
        assert!(coordinator.tree().node(&first.snapshot_id).is_some());
    }

    #[tokio::test]
    async fn critical_validation_issue_rejects_the_job_with_exit_code_one() {
        use crate::validators::types::SceneAnnotation;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 2);
        let coordinator = Coordinator::new(&config).unwrap();

        // Two overlapping scenes: V1 flags this as a critical spatiotemporal
        // issue (spec §4.5), which must gate acceptance and surface as the
        // CLI's "validation rejection" exit code (spec §6), not a generic
        // internal error.
        let scene_context = SceneContext {
            scenes: vec![
                SceneAnnotation {
                    index: 0,
                    start_ms: 0,
                    end_ms: 5000,
                    location: "park".into(),
                    era_year: None,
                    region: None,
                    tags: vec![],
                    characters: vec![],
                    props: vec![],
                },
                SceneAnnotation {
                    index: 1,
                    start_ms: 3000,
                    end_ms: 8000,
                    location: "park".into(),
                    era_year: None,
                    region: None,
                    tags: vec![],
                    characters: vec![],
                    props: vec![],
                },
            ],
            ..Default::default()
        };

        let err = coordinator
            .run_job(sample_srt(), RewriteParams::default(), Some(scene_context), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconstructError::ValidationRejected(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_acquire_is_reported_as_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 1);
        let coordinator = Coordinator::new(&config).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = coordinator
            .run_job(sample_srt(), RewriteParams::default(), None, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconstructError::Cancelled) || err.exit_code() == 4);
    }
}
