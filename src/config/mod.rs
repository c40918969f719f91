//! Process configuration (§9 ambient concerns), loaded from environment variables
//! via `dotenvy` the way the teacher's `AppConfig::load()` is invoked from `main.rs`.
//! The teacher's own `config.rs` was not present in the retrieved source; this is
//! reconstructed from `main.rs`'s field usage (`config.environment`, `config.database_url`)
//! and `cache/redis_client.rs::RedisConfig`'s from-env struct shape.

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};

use crate::api_client::AccountCredentials;
use crate::models::product::Account;
use crate::rate_limiter::{RateLimitSpec, ResourceClass};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub accounts: HashMap<Account, AccountCredentials>,
    pub rate_limit_overrides: HashMap<(Account, ResourceClass), RateLimitSpec>,
    pub max_concurrent_syncs_per_account: usize,
    pub orphan_sweep_interval_secs: u64,
    pub sync_lock_ttl_secs: u64,
    pub matching_similarity_threshold: f64,
    pub sync_page_size: u32,
    pub sync_max_pages: Option<u32>,
    pub sync_wall_clock_cap_secs: u64,
    pub cny_exchange_rate: rust_decimal::Decimal,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .context("PORT must be a valid u16")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url = env::var("REDIS_URL").ok();

        let mut accounts = HashMap::new();
        accounts.insert(
            Account::Main,
            AccountCredentials {
                username: env::var("EMAG_MAIN_USERNAME").context("EMAG_MAIN_USERNAME must be set")?,
                password: env::var("EMAG_MAIN_PASSWORD").context("EMAG_MAIN_PASSWORD must be set")?,
                base_url: env::var("EMAG_MAIN_BASE_URL")
                    .unwrap_or_else(|_| "https://marketplace-api.emag.ro/api-3".into()),
            },
        );
        accounts.insert(
            Account::Fbe,
            AccountCredentials {
                username: env::var("EMAG_FBE_USERNAME").context("EMAG_FBE_USERNAME must be set")?,
                password: env::var("EMAG_FBE_PASSWORD").context("EMAG_FBE_PASSWORD must be set")?,
                base_url: env::var("EMAG_FBE_BASE_URL")
                    .unwrap_or_else(|_| "https://marketplace-fbe.emag.ro/api-3".into()),
            },
        );

        // §9 open question: resource-class rate limits beyond the two documented
        // classes are resolved via optional per-(account, class) env overrides.
        let rate_limit_overrides = Self::load_rate_limit_overrides();

        let max_concurrent_syncs_per_account = env::var("MAX_CONCURRENT_SYNCS_PER_ACCOUNT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .context("MAX_CONCURRENT_SYNCS_PER_ACCOUNT must be a usize")?;
        let orphan_sweep_interval_secs = env::var("ORPHAN_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .context("ORPHAN_SWEEP_INTERVAL_SECS must be a u64")?;
        let sync_lock_ttl_secs = env::var("SYNC_LOCK_TTL_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .context("SYNC_LOCK_TTL_SECS must be a u64")?;
        let matching_similarity_threshold = env::var("MATCHING_SIMILARITY_THRESHOLD")
            .unwrap_or_else(|_| "0.75".into())
            .parse()
            .context("MATCHING_SIMILARITY_THRESHOLD must be an f64")?;
        let sync_page_size = env::var("SYNC_PAGE_SIZE")
            .unwrap_or_else(|_| "100".into())
            .parse()
            .context("SYNC_PAGE_SIZE must be a u32")?;
        let sync_max_pages = env::var("SYNC_MAX_PAGES").ok().and_then(|v| v.parse().ok());
        let sync_wall_clock_cap_secs = env::var("SYNC_WALL_CLOCK_CAP_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .context("SYNC_WALL_CLOCK_CAP_SECS must be a u64")?;
        let cny_exchange_rate = env::var("CNY_EXCHANGE_RATE")
            .unwrap_or_else(|_| "0.65".into())
            .parse()
            .context("CNY_EXCHANGE_RATE must be a decimal")?;

        Ok(Self {
            environment,
            port,
            database_url,
            redis_url,
            accounts,
            rate_limit_overrides,
            max_concurrent_syncs_per_account,
            orphan_sweep_interval_secs,
            sync_lock_ttl_secs,
            matching_similarity_threshold,
            sync_page_size,
            sync_max_pages,
            sync_wall_clock_cap_secs,
            cny_exchange_rate,
        })
    }

    fn load_rate_limit_overrides() -> HashMap<(Account, ResourceClass), RateLimitSpec> {
        let mut overrides = HashMap::new();
        for (account, prefix) in [(Account::Main, "EMAG_MAIN"), (Account::Fbe, "EMAG_FBE")] {
            for (class, class_env) in [(ResourceClass::Orders, "ORDERS"), (ResourceClass::Other, "OTHER")] {
                let per_second = env::var(format!("{prefix}_{class_env}_RPS")).ok().and_then(|v| v.parse().ok());
                let per_minute = env::var(format!("{prefix}_{class_env}_RPM")).ok().and_then(|v| v.parse().ok());
                if let (Some(per_second), Some(per_minute)) = (per_second, per_minute) {
                    overrides.insert((account, class), RateLimitSpec { per_second, per_minute });
                }
            }
        }
        overrides
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
