//! Concurrency controller (C4, §4.4): one sync per `(account, resource)` pair at a time,
//! with orphan detection for locks whose owning process died without releasing them.
//! Grounded on the teacher's `RateLimiter` cleanup-loop shape (`auth/rate_limit.rs`):
//! a `DashMap` of live state plus a `tokio::spawn`ed background sweeper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::{AppError, ErrorKind};
use crate::models::product::Account;
use crate::models::sync_log::Resource;

#[derive(Debug, Clone)]
struct LockEntry {
    sync_log_id: i64,
    actor: String,
    acquired_at: Instant,
}

/// Held by whoever owns the lock; releases it on drop regardless of how the sync ends
/// (success, failure, or cancellation), matching §4.4's "always released" invariant.
pub struct SyncLockGuard {
    controller: Arc<ConcurrencyControllerInner>,
    key: (Account, Resource),
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        self.controller.locks.remove(&self.key);
        info!(account = %self.key.0, resource = ?self.key.1, "sync lock released");
    }
}

struct ConcurrencyControllerInner {
    locks: DashMap<(Account, Resource), LockEntry>,
    lock_ttl: Duration,
}

#[derive(Clone)]
pub struct ConcurrencyController {
    inner: Arc<ConcurrencyControllerInner>,
}

impl ConcurrencyController {
    pub fn new(lock_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(ConcurrencyControllerInner {
                locks: DashMap::new(),
                lock_ttl,
            }),
        }
    }

    /// Attempts to claim the `(account, resource)` lock for `sync_log_id`. Returns
    /// `ErrorKind::Busy` if another sync already owns it (§4.4 "one sync at a time").
    pub fn submit(
        &self,
        account: Account,
        resource: Resource,
        sync_log_id: i64,
        actor: &str,
    ) -> Result<SyncLockGuard, AppError> {
        let key = (account, resource);
        let entry = self.inner.locks.entry(key);
        match entry {
            dashmap::mapref::entry::Entry::Occupied(occupied) => Err(AppError::new(
                ErrorKind::Busy,
                format!(
                    "a sync is already running for {account}/{resource:?} (sync_log {})",
                    occupied.get().sync_log_id
                ),
            )),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(LockEntry {
                    sync_log_id,
                    actor: actor.to_string(),
                    acquired_at: Instant::now(),
                });
                Ok(SyncLockGuard {
                    controller: self.inner.clone(),
                    key,
                })
            }
        }
    }

    pub fn is_running(&self, account: Account, resource: Resource) -> bool {
        self.inner.locks.contains_key(&(account, resource))
    }

    /// Sweeps locks held past their TTL without release — the process that held them
    /// likely crashed. Returns the `sync_log_id`s that were forcibly released so the
    /// caller can mark the corresponding `SyncLog` rows failed.
    pub fn sweep_orphans(&self) -> Vec<i64> {
        let now = Instant::now();
        let mut orphaned = Vec::new();
        self.inner.locks.retain(|key, entry| {
            if now.duration_since(entry.acquired_at) >= self.inner.lock_ttl {
                warn!(account = %key.0, resource = ?key.1, sync_log_id = entry.sync_log_id, actor = %entry.actor, "sweeping orphaned sync lock");
                orphaned.push(entry.sync_log_id);
                false
            } else {
                true
            }
        });
        orphaned
    }

    /// Spawns the periodic background sweeper. Mirrors the teacher's rate-limiter
    /// cleanup task (`tokio::spawn` loop with `interval`). Releasing the in-memory lock
    /// alone would leave the `sync_logs` row stuck `running` forever, so each swept id
    /// is also marked `failed` in the database, same as `reconcile_boot`'s boot-time pass.
    pub fn spawn_sweeper(self: Arc<Self>, pool: sqlx::PgPool, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let orphaned = self.sweep_orphans();
                if orphaned.is_empty() {
                    continue;
                }
                warn!(count = orphaned.len(), "orphaned sync locks swept");
                crate::metrics::record_orphans_swept(orphaned.len() as u64);
                for sync_log_id in orphaned {
                    if let Err(err) = sqlx::query(
                        "UPDATE sync_logs SET status = 'failed', finished_at = now(), \
                         error_message = 'orphaned: lock held past its TTL with no owning process' \
                         WHERE id = $1 AND status = 'running'",
                    )
                    .bind(sync_log_id)
                    .execute(&pool)
                    .await
                    {
                        warn!(sync_log_id, error = %err, "failed to persist orphaned sync log as failed");
                    }
                }
            }
        })
    }
}
