//! Marketplace synchronization core: rate limiter, API client, sync engine,
//! concurrency controller, matching engine, and reorder engine for a dual-account
//! (`main`/`fbe`) integration. See `main.rs` for the HTTP/worker bootstrap and
//! `cli.rs` for the batch entrypoint.

pub mod api;
pub mod api_client;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod db;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod rate_limiter;
pub mod reorder;
pub mod state;
pub mod sync;
pub mod utils;
