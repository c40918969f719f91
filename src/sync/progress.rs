//! Live progress fan-out (§4.3, §11 supplemental): a `broadcast` channel per process,
//! mirroring the teacher's `broadcast::channel::<OrderUpdateEvent>(1000)` in `main.rs`.
//! `SyncEngine` also forwards each snapshot to `cache::CacheManager::publish_progress`
//! when a cache is configured, so observers outside this process can subscribe too.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::models::sync_log::ProgressSnapshot;

const CHANNEL_CAPACITY: usize = 1000;

pub struct ProgressTracker {
    sender: broadcast::Sender<ProgressSnapshot>,
    started_at: DashMap<i64, Instant>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, started_at: DashMap::new() }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }

    pub fn begin(&self, sync_log_id: i64) {
        self.started_at.insert(sync_log_id, Instant::now());
    }

    pub fn finish(&self, sync_log_id: i64) {
        self.started_at.remove(&sync_log_id);
    }

    /// Computes throughput/ETA from elapsed wall time and publishes a snapshot.
    /// A publish with no subscribers is not an error (`send` just reports 0 receivers).
    pub fn publish(&self, mut snapshot: ProgressSnapshot) {
        if let Some(started) = self.started_at.get(&snapshot.sync_log_id) {
            let elapsed = started.elapsed().as_secs_f64().max(0.001);
            snapshot.items_per_second = snapshot.processed as f64 / elapsed;
            snapshot.eta_seconds = snapshot.total.map(|total| {
                let remaining = (total - snapshot.processed).max(0) as f64;
                if snapshot.items_per_second > 0.0 {
                    remaining / snapshot.items_per_second
                } else {
                    0.0
                }
            });
        }
        let _ = self.sender.send(snapshot);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgressTracker = Arc<ProgressTracker>;
