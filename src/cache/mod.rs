//! Optional Redis-backed progress fan-out (§11 supplemental). Grounded on the teacher's
//! `cache/redis_client.rs`: a `ConnectionManager` behind a lock, a `with_retry` wrapper,
//! and "absence of Redis degrades gracefully" rather than failing startup.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::models::sync_log::ProgressSnapshot;

const PROGRESS_CHANNEL_PREFIX: &str = "emag_sync:progress";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

pub struct CacheManager {
    config: CacheConfig,
    client: Option<Client>,
    connection: Arc<RwLock<Option<ConnectionManager>>>,
}

impl CacheManager {
    pub async fn new(config: CacheConfig) -> Self {
        let client = config.redis_url.as_deref().and_then(|url| Client::open(url).ok());
        let manager = Self { config, client, connection: Arc::new(RwLock::new(None)) };
        manager.ensure_connected().await;
        manager
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn ensure_connected(&self) {
        let Some(client) = &self.client else {
            return;
        };
        if self.connection.read().await.is_some() {
            return;
        }
        match client.get_connection_manager().await {
            Ok(conn) => {
                info!("Redis connection established for progress fan-out");
                *self.connection.write().await = Some(conn);
            }
            Err(err) => {
                warn!(error = %err, "Redis unavailable, progress fan-out will run in-process only");
            }
        }
    }

    /// Publishes a progress snapshot to `emag_sync:progress:{account}:{resource}`.
    /// A missing/broken Redis connection is logged and swallowed — Redis is a fan-out
    /// convenience, never a dependency of the sync engine's correctness.
    pub async fn publish_progress(&self, snapshot: &ProgressSnapshot) {
        if !self.is_available() {
            return;
        }
        self.ensure_connected().await;

        let Some(payload) = serde_json::to_string(snapshot).ok() else {
            return;
        };
        let channel = format!("{PROGRESS_CHANNEL_PREFIX}:{}:{}", snapshot.account, snapshot.resource.as_str());

        for attempt in 0..self.config.max_retries {
            let mut guard = self.connection.write().await;
            let Some(conn) = guard.as_mut() else {
                break;
            };
            match conn.publish::<_, _, i64>(&channel, &payload).await {
                Ok(_) => return,
                Err(err) => {
                    drop(guard);
                    error!(attempt, error = %err, "Redis publish failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms * (attempt as u64 + 1))).await;
                }
            }
        }
        warn!(channel, "Redis publish exhausted retries, dropping progress update");
    }
}
