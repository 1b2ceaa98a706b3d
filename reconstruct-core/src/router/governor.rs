//! Memory governor (spec §4.2, §5): `Acquire`/`Release` lease semantics
//! over resident backends, a hard memory ceiling, LRU eviction among
//! non-leased backends, and an EMA-smoothed RSS feedback loop.
//!
//! Grounded on the teacher's `SegmentCache` (LRU eviction under a single
//! lock, atomic byte accounting) generalized from bytes-of-segment to
//! MiB-of-resident-backend.

use crate::error::{GovernorError, Result};
use crate::model::Language;
use crate::router::backend::{BackendKind, GenerationBackend, LexiconBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct Resident {
    backend: Arc<dyn GenerationBackend>,
    refcount: usize,
    last_used: Instant,
}

struct State {
    resident: HashMap<Language, Resident>,
}

/// Process-wide memory governor. One instance is shared by every job in
/// the coordinator's worker pool.
pub struct MemoryGovernor {
    state: Mutex<State>,
    notify: Notify,
    budget_mib: u64,
    ema_rss_mib: AtomicU64,
}

impl MemoryGovernor {
    pub fn new(budget_mib: u64) -> Self {
        Self {
            state: Mutex::new(State {
                resident: HashMap::new(),
            }),
            notify: Notify::new(),
            budget_mib,
            ema_rss_mib: AtomicU64::new(0),
        }
    }

    pub fn budget_mib(&self) -> u64 {
        self.budget_mib
    }

    /// Current EMA of observed resident-set size, used to throttle future
    /// loads (spec §4.2). Seeded by the first sample.
    pub fn ema_rss_mib(&self) -> u64 {
        self.ema_rss_mib.load(Ordering::Relaxed)
    }

    fn feed_rss_sample(&self, sample_mib: u64) {
        const ALPHA: f64 = 0.2;
        let prev = self.ema_rss_mib.load(Ordering::Relaxed);
        let updated = if prev == 0 {
            sample_mib
        } else {
            ((1.0 - ALPHA) * prev as f64 + ALPHA * sample_mib as f64).round() as u64
        };
        self.ema_rss_mib.store(updated, Ordering::Relaxed);
    }

    fn resident_total_mib(state: &State) -> u64 {
        state.resident.values().map(|r| r.backend.working_set_mib()).sum()
    }

    /// Attempts to evict enough non-leased resident backends to fit
    /// `needed_mib` more. Returns true if, after eviction, the budget has
    /// room; false if even evicting everything evictable wouldn't help.
    fn make_room(state: &mut State, needed_mib: u64, budget_mib: u64) -> bool {
        let mut total = Self::resident_total_mib(state);
        if total + needed_mib <= budget_mib {
            return true;
        }

        let mut candidates: Vec<Language> = state
            .resident
            .iter()
            .filter(|(_, r)| r.refcount == 0)
            .map(|(lang, _)| *lang)
            .collect();
        candidates.sort_by_key(|lang| state.resident[lang].last_used);

        for lang in candidates {
            if total + needed_mib <= budget_mib {
                break;
            }
            if let Some(r) = state.resident.remove(&lang) {
                total -= r.backend.working_set_mib();
                tracing::debug!("evicted idle backend for {:?} to free {}MiB", lang, r.backend.working_set_mib());
            }
        }

        total + needed_mib <= budget_mib
    }

    /// Blocks until a backend matching `lang` is resident and leased to
    /// the caller, or memory permits loading one. Returns
    /// `InsufficientMemory` if no amount of eviction among non-leased
    /// backends would free enough room even once all holders release.
    pub async fn acquire(
        self: &Arc<Self>,
        lang: Language,
        cancel: &CancellationToken,
    ) -> Result<Lease> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(resident) = state.resident.get_mut(&lang) {
                    resident.refcount += 1;
                    resident.last_used = Instant::now();
                    return Ok(Lease {
                        governor: self.clone(),
                        lang,
                    });
                }

                let needed = declared_working_set(lang);
                if Self::make_room(&mut state, needed, self.budget_mib) {
                    let backend: Arc<dyn GenerationBackend> = Arc::new(load_backend(lang)?);
                    self.feed_rss_sample(backend.working_set_mib());
                    tracing::info!("loaded backend {:?} ({}MiB, ema rss {}MiB)", lang, needed, self.ema_rss_mib());
                    state.resident.insert(
                        lang,
                        Resident {
                            backend,
                            refcount: 1,
                            last_used: Instant::now(),
                        },
                    );
                    return Ok(Lease {
                        governor: self.clone(),
                        lang,
                    });
                }

                // Nothing evictable will ever make this fit: if there are no
                // leased backends left to wait on, fail fast rather than
                // blocking forever.
                let any_leased = state.resident.values().any(|r| r.refcount > 0);
                if !any_leased {
                    tracing::warn!("insufficient memory for {:?}: need {}MiB of {}MiB budget, nothing evictable", lang, needed, self.budget_mib);
                    return Err(GovernorError::InsufficientMemory {
                        lang,
                        needed_mib: needed,
                        budget_mib: self.budget_mib,
                    }
                    .into());
                }
            }

            tokio::select! {
                _ = self.notify.notified() => continue,
                _ = cancel.cancelled() => return Err(GovernorError::Cancelled.into()),
            }
        }
    }

    fn release(&self, lang: Language) {
        let mut state = self.state.lock();
        if let Some(resident) = state.resident.get_mut(&lang) {
            resident.refcount = resident.refcount.saturating_sub(1);
            resident.last_used = Instant::now();
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Number of distinct languages currently resident (for diagnostics/tests).
    pub fn resident_count(&self) -> usize {
        self.state.lock().resident.len()
    }
}

fn declared_working_set(lang: Language) -> u64 {
    match lang {
        Language::Unknown => 64,
        Language::Zh | Language::En => 128,
    }
}

fn load_backend(lang: Language) -> Result<LexiconBackend> {
    let kind = match lang {
        Language::Zh => BackendKind::QuantizedZh,
        Language::En => BackendKind::QuantizedEn,
        Language::Unknown => BackendKind::Stub,
    };
    Ok(LexiconBackend::new(kind, lang, declared_working_set(lang)))
}

/// A scoped handle that keeps a backend resident until dropped. Release is
/// therefore automatic on every exit path (spec §4.2).
pub struct Lease {
    governor: Arc<MemoryGovernor>,
    lang: Language,
}

impl Lease {
    pub fn backend(&self) -> Arc<dyn GenerationBackend> {
        let state = self.governor.state.lock();
        state
            .resident
            .get(&self.lang)
            .expect("lease implies residency")
            .backend
            .clone()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.governor.release(self.lang);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release_round_trips() {
        let gov = Arc::new(MemoryGovernor::new(3800));
        let cancel = CancellationToken::new();
        let lease = gov.acquire(Language::En, &cancel).await.unwrap();
        assert_eq!(gov.resident_count(), 1);
        drop(lease);
        assert_eq!(gov.resident_count(), 1); // stays resident until evicted
    }

    #[tokio::test]
    async fn concurrent_acquires_share_one_resident_instance() {
        let gov = Arc::new(MemoryGovernor::new(3800));
        let cancel = CancellationToken::new();
        let l1 = gov.acquire(Language::Zh, &cancel).await.unwrap();
        let l2 = gov.acquire(Language::Zh, &cancel).await.unwrap();
        assert_eq!(gov.resident_count(), 1);
        drop(l1);
        drop(l2);
    }

    #[tokio::test]
    async fn insufficient_memory_when_budget_too_small() {
        let gov = Arc::new(MemoryGovernor::new(64));
        let cancel = CancellationToken::new();
        let err = gov.acquire(Language::En, &cancel).await.unwrap_err();
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn lru_eviction_frees_room_for_a_new_language() {
        // budget fits exactly one of the two 128 MiB backends at a time.
        let gov = Arc::new(MemoryGovernor::new(128));
        let cancel = CancellationToken::new();
        let l1 = gov.acquire(Language::Zh, &cancel).await.unwrap();
        drop(l1); // now unleased, evictable
        let _l2 = gov.acquire(Language::En, &cancel).await.unwrap();
        assert_eq!(gov.resident_count(), 1);
    }
}
