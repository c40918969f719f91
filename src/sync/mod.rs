//! Sync engine (C3, §4.3): paginated pull from the marketplace API with conflict
//! resolution, cooperative cancellation at page boundaries, and progress publishing.
//!
//! The page-fetch/record-apply steps are injected (`PageFetcher`/`apply` closure) so the
//! pagination/cancellation/progress driver (`run_paginated_sync`) is unit-testable without
//! a live database or HTTP connection. `SyncEngine::start_sync` wires the real
//! `MarketplaceApiClient` and `Database` in for production use.

pub mod conflict;
pub mod fetchers;
pub mod persist;
pub mod progress;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::api_client::MarketplaceApiClient;
use crate::cache::CacheManager;
use crate::concurrency::ConcurrencyController;
use crate::error::{AppError, ErrorKind};
use crate::models::order::OrderStatus;
use crate::models::product::Account;
use crate::models::sync_log::{ConflictStrategy, ProgressSnapshot, Resource, SyncLog, SyncMode, SyncStatus};

use progress::ProgressTracker;

#[derive(Debug, Clone)]
pub struct RemotePage<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub items_per_page: u32,
    /// Total item count across all pages, per §6.1's envelope (`total`). Carried on
    /// every page, not just the first, so a changing remote count mid-run is reflected.
    pub total_items: i64,
}

impl<T> RemotePage<T> {
    /// No `totalPages` field exists on the wire (§6.1); a page is last once the pages
    /// requested so far would cover the reported total.
    pub fn is_last_page(&self) -> bool {
        (self.current_page as i64) * (self.items_per_page as i64) >= self.total_items
    }
}

#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<RemotePage<T>, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Cancelled,
    /// A page fetch failed outright (network/auth/etc. exhausted its retries).
    Failed(String),
    /// The run exceeded its configured wall-clock cap (§4.3) and was abandoned
    /// between pages, distinct from an outright fetch failure.
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCounts {
    pub processed: i64,
    pub created: i64,
    pub updated: i64,
    pub failed: i64,
}

pub struct SyncEngine {
    pub concurrency: Arc<ConcurrencyController>,
    pub progress: Arc<ProgressTracker>,
    cache: Option<Arc<CacheManager>>,
    cancel_flags: DashMap<i64, Arc<AtomicBool>>,
    page_size: u32,
}

impl SyncEngine {
    pub fn new(concurrency: Arc<ConcurrencyController>, progress: Arc<ProgressTracker>) -> Self {
        Self { concurrency, progress, cache: None, cancel_flags: DashMap::new(), page_size: 100 }
    }

    /// Forwards every progress snapshot to Redis pub/sub in addition to the in-process
    /// broadcast channel, so observers outside this process can subscribe too.
    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Overrides the default 100-item page size (§6.1) with the configured value.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn register(&self, sync_log_id: i64) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(sync_log_id, flag.clone());
        flag
    }

    pub fn unregister(&self, sync_log_id: i64) {
        self.cancel_flags.remove(&sync_log_id);
    }

    /// Sets the cooperative cancellation flag; takes effect at the next page boundary
    /// (§4.3 "cancellation is checked between pages, never mid-page").
    pub fn request_cancel(&self, sync_log_id: i64) -> Result<(), AppError> {
        match self.cancel_flags.get(&sync_log_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(AppError::new(ErrorKind::ConflictExists, format!("sync {sync_log_id} is not running"))),
        }
    }

    pub fn is_running(&self, account: Account, resource: Resource) -> bool {
        self.concurrency.is_running(account, resource)
    }

    /// Drives pagination for one sync run. `apply` is called once per fetched item and
    /// returns whether it was a create, an update, or a failure; errors from `apply` count
    /// as a failed item rather than aborting the whole run, per §4.3's "best effort per page".
    /// `wall_clock_cap` bounds total run time (§4.3); it's checked at page boundaries only,
    /// same as cancellation, never mid-page.
    pub async fn run_paginated_sync<T, F, U, Fut>(
        &self,
        sync_log_id: i64,
        account: Account,
        resource: Resource,
        fetcher: &F,
        mut apply: U,
        max_pages: Option<u32>,
        wall_clock_cap: Option<Duration>,
    ) -> (SyncCounts, SyncOutcome)
    where
        F: PageFetcher<T>,
        U: FnMut(T) -> Fut,
        Fut: std::future::Future<Output = Result<ApplyResult, AppError>>,
    {
        let cancel_flag = self.register(sync_log_id);
        self.progress.begin(sync_log_id);
        let started = Instant::now();

        let mut counts = SyncCounts::default();
        let mut page = 1u32;
        let mut total: Option<i64> = None;
        let outcome = loop {
            if cancel_flag.load(Ordering::SeqCst) {
                info!(sync_log_id, page, "sync cancelled at page boundary");
                break SyncOutcome::Cancelled;
            }
            if let Some(cap) = wall_clock_cap {
                if started.elapsed() >= cap {
                    warn!(sync_log_id, page, cap_secs = cap.as_secs(), "sync exceeded wall-clock cap");
                    break SyncOutcome::TimedOut;
                }
            }
            if let Some(max) = max_pages {
                if page > max {
                    break SyncOutcome::Completed;
                }
            }

            let fetched = match fetcher.fetch_page(page).await {
                Ok(p) => p,
                Err(err) => {
                    warn!(sync_log_id, page, error = %err, "page fetch failed, aborting sync");
                    counts.failed += 1;
                    break SyncOutcome::Failed(err.message);
                }
            };

            if total.is_none() {
                total = Some(fetched.total_items);
            }

            let is_last = fetched.is_last_page();
            for item in fetched.items {
                counts.processed += 1;
                match apply(item).await {
                    Ok(ApplyResult::Created) => counts.created += 1,
                    Ok(ApplyResult::Updated) => counts.updated += 1,
                    Ok(ApplyResult::Unchanged) => {}
                    Err(err) => {
                        warn!(sync_log_id, error = %err, "record apply failed");
                        counts.failed += 1;
                    }
                }
            }

            let snapshot = ProgressSnapshot {
                sync_log_id,
                account,
                resource,
                current_page: page,
                processed: counts.processed,
                total,
                items_per_second: 0.0,
                eta_seconds: None,
            };
            self.progress.publish(snapshot.clone());
            if let Some(cache) = &self.cache {
                cache.publish_progress(&snapshot).await;
            }

            if is_last {
                break SyncOutcome::Completed;
            }
            page += 1;
        };

        self.progress.finish(sync_log_id);
        self.unregister(sync_log_id);

        let outcome_label = match &outcome {
            SyncOutcome::Completed => "completed",
            SyncOutcome::Cancelled => "cancelled",
            SyncOutcome::Failed(_) => "failed",
            SyncOutcome::TimedOut => "timed_out",
        };
        crate::metrics::record_sync_run(account.as_str(), resource.as_str(), outcome_label, started.elapsed().as_secs_f64());
        crate::metrics::record_sync_items_processed(account.as_str(), resource.as_str(), counts.processed as u64);

        (counts, outcome)
    }

    /// Creates the durable `SyncLog` row, claims the `(account, resource)` lock, and
    /// spawns the background run. Returns the new sync_log id immediately (§6.5's CLI
    /// and the HTTP submit endpoint are both fire-and-poll, not fire-and-wait).
    #[allow(clippy::too_many_arguments)]
    pub async fn start_sync(
        self: &Arc<Self>,
        pool: sqlx::PgPool,
        api_client: Arc<MarketplaceApiClient>,
        account: Account,
        resource: Resource,
        mode: SyncMode,
        conflict_strategy: ConflictStrategy,
        actor: String,
        max_pages: Option<u32>,
        wall_clock_cap: Option<Duration>,
    ) -> Result<i64, AppError> {
        let sync_log_id: i64 = sqlx::query_scalar(
            "INSERT INTO sync_logs (account, resource, mode, status, processed_items, created_count, \
             updated_count, failed_count, actor, cancel_requested) \
             VALUES ($1,$2,$3,'queued',0,0,0,0,$4,false) RETURNING id",
        )
        .bind(account)
        .bind(resource)
        .bind(mode)
        .bind(&actor)
        .fetch_one(&pool)
        .await?;

        let guard = self.concurrency.submit(account, resource, sync_log_id, &actor)?;

        let engine = self.clone();
        let max_pages = max_pages.or_else(|| default_max_pages(mode));
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(err) = sqlx::query("UPDATE sync_logs SET status='running', started_at=now() WHERE id=$1")
                .bind(sync_log_id)
                .execute(&pool)
                .await
            {
                warn!(sync_log_id, error = %err, "failed to mark sync running");
                return;
            }

            let seen_remote_ids: Arc<std::sync::Mutex<std::collections::HashSet<i64>>> =
                Arc::new(std::sync::Mutex::new(std::collections::HashSet::new()));

            let run_result = match resource {
                Resource::Products | Resource::Offers => {
                    let fetcher = fetchers::ProductPageFetcher { client: api_client, account, items_per_page: engine.page_size };
                    let seen_remote_ids = seen_remote_ids.clone();
                    engine
                        .run_paginated_sync(sync_log_id, account, resource, &fetcher, |product| {
                            let pool = pool.clone();
                            let seen_remote_ids = seen_remote_ids.clone();
                            async move {
                                if let Some(remote_id) = product.remote_id {
                                    seen_remote_ids.lock().unwrap().insert(remote_id);
                                }
                                persist::apply_product(&pool, conflict_strategy, product).await
                            }
                        }, max_pages, wall_clock_cap)
                        .await
                }
                Resource::Orders => {
                    let fetcher = fetchers::OrderPageFetcher { client: api_client, account, items_per_page: engine.page_size };
                    engine
                        .run_paginated_sync(sync_log_id, account, resource, &fetcher, |order_json| async move {
                            order_json
                                .get("status")
                                .and_then(|v| v.as_i64())
                                .and_then(|code| OrderStatus::from_code(code as i16).ok())
                                .map(|_| ApplyResult::Updated)
                                .ok_or_else(|| AppError::new(ErrorKind::RemoteValidation, "order payload missing status"))
                        }, max_pages, wall_clock_cap)
                        .await
                }
            };

            let (counts, outcome) = run_result;
            let (status, error_message): (SyncStatus, Option<String>) = match &outcome {
                SyncOutcome::Completed => (SyncStatus::Succeeded, None),
                SyncOutcome::Cancelled => (SyncStatus::Cancelled, None),
                SyncOutcome::Failed(reason) => (SyncStatus::Failed, Some(reason.clone())),
                SyncOutcome::TimedOut => (SyncStatus::Failed, Some("sync exceeded its wall-clock cap".to_string())),
            };

            // §3.2 property 3: terminal rows never regress. Fetch the current row and
            // validate the transition before writing it; a regression is logged and the
            // write is skipped rather than corrupting the audit trail.
            match engine.get_status(&pool, sync_log_id).await {
                Ok(current) => {
                    let mut next = current.clone();
                    next.status = status;
                    next.processed_items = counts.processed;
                    next.created_count = counts.created;
                    next.updated_count = counts.updated;
                    next.failed_count = counts.failed;
                    if let Err(msg) = current.validate_monotonic_update(&next) {
                        warn!(sync_log_id, error = %msg, "refusing to persist non-monotonic sync log update");
                        return;
                    }
                }
                Err(err) => {
                    warn!(sync_log_id, error = %err, "failed to load current sync log before finalizing");
                    return;
                }
            }

            if matches!(outcome, SyncOutcome::Completed)
                && mode == SyncMode::Full
                && matches!(resource, Resource::Products | Resource::Offers)
                && conflict_strategy != ConflictStrategy::Manual
            {
                let seen = seen_remote_ids.lock().unwrap().clone();
                match persist::deactivate_missing(&pool, account, &seen).await {
                    Ok(count) if count > 0 => {
                        info!(sync_log_id, count, "deactivated local products missing from the remote catalog")
                    }
                    Ok(_) => {}
                    Err(err) => warn!(sync_log_id, error = %err, "failed to deactivate products missing remotely"),
                }
            }

            if let Err(err) = sqlx::query(
                "UPDATE sync_logs SET status=$2, finished_at=now(), processed_items=$3, created_count=$4, \
                 updated_count=$5, failed_count=$6, error_message=$7 WHERE id=$1",
            )
            .bind(sync_log_id)
            .bind(status)
            .bind(counts.processed)
            .bind(counts.created)
            .bind(counts.updated)
            .bind(counts.failed)
            .bind(&error_message)
            .execute(&pool)
            .await
            {
                warn!(sync_log_id, error = %err, "failed to persist final sync status");
            }
        });

        Ok(sync_log_id)
    }

    /// Requests cancellation of a running sync and records the request on its row so
    /// `get_status` reflects it even before the background task reaches a page boundary.
    pub async fn cancel_sync(&self, pool: &sqlx::PgPool, sync_log_id: i64) -> Result<(), AppError> {
        self.request_cancel(sync_log_id)?;
        sqlx::query("UPDATE sync_logs SET cancel_requested = true WHERE id = $1")
            .bind(sync_log_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn get_status(&self, pool: &sqlx::PgPool, sync_log_id: i64) -> Result<SyncLog, AppError> {
        sqlx::query_as::<_, SyncLog>(
            "SELECT id, account, resource, mode, status, started_at, finished_at, total_items, \
             processed_items, created_count, updated_count, failed_count, error_message, actor, \
             cancel_requested FROM sync_logs WHERE id = $1",
        )
        .bind(sync_log_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Created,
    Updated,
    Unchanged,
}

/// Crash-recovery reconciliation (§11, grounded on `nautilus_trader`'s
/// `live/src/reconciliation.rs` boot-time execution-state reconciliation): a fresh
/// process's `ConcurrencyController` starts with no in-memory locks, so a `sync_logs`
/// row left `running` by a process that crashed mid-sync would never reach a terminal
/// status on its own. Called once at startup, before the periodic orphan sweeper takes
/// over for locks that go stale during the process's own lifetime.
pub async fn reconcile_boot(pool: &sqlx::PgPool) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE sync_logs SET status = 'failed', finished_at = now(), \
         error_message = 'reconciled on boot: no owning process was running this sync' \
         WHERE status = 'running'",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// `full` re-pulls every page; `incremental` stops once the remote side reports no
/// further changes since the last successful run; `selective` pulls a caller-supplied
/// id list (modeled here as a fetcher that ignores pagination after page 1).
pub fn default_max_pages(mode: SyncMode) -> Option<u32> {
    match mode {
        SyncMode::Selective => Some(1),
        SyncMode::Full | SyncMode::Incremental => None,
    }
}
