//! Prometheus metric names and recording helpers (§10.5). Grounded directly on the
//! teacher's `metrics/mod.rs`: constants modules for names/labels, an `init_metrics()`
//! that configures histogram buckets and installs the recorder, and thin `record_*`
//! wrapper functions so call sites never hardcode a metric name.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";

    pub const RATE_LIMITER_ADMITTED_TOTAL: &str = "rate_limiter_admitted_total";
    pub const RATE_LIMITER_WAITED_TOTAL: &str = "rate_limiter_waited_total";
    pub const RATE_LIMITER_WAIT_SECONDS: &str = "rate_limiter_wait_seconds";

    pub const API_CLIENT_CALLS_TOTAL: &str = "api_client_calls_total";
    pub const API_CLIENT_RETRIES_TOTAL: &str = "api_client_retries_total";
    pub const API_CLIENT_CIRCUIT_TRIPS_TOTAL: &str = "api_client_circuit_trips_total";

    pub const SYNC_RUNS_TOTAL: &str = "sync_runs_total";
    pub const SYNC_ITEMS_PROCESSED_TOTAL: &str = "sync_items_processed_total";
    pub const SYNC_RUN_DURATION_SECONDS: &str = "sync_run_duration_seconds";
    pub const SYNC_ORPHANS_SWEPT_TOTAL: &str = "sync_orphans_swept_total";

    pub const MATCHING_AUTO_MATCHES_TOTAL: &str = "matching_auto_matches_total";
    pub const REORDER_DRAFT_POS_TOTAL: &str = "reorder_draft_pos_total";
}

pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const ACCOUNT: &str = "account";
    pub const RESOURCE: &str = "resource";
    pub const OUTCOME: &str = "outcome";
}

pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .expect("static bucket config is valid")
        .set_buckets_for_metric(
            Matcher::Full(names::SYNC_RUN_DURATION_SECONDS.to_string()),
            &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0],
        )
        .expect("static bucket config is valid")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str.clone()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str
    )
    .record(duration_secs);
}

pub fn set_http_requests_in_flight(delta: i64) {
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).set(delta as f64);
}

pub fn record_sync_run(account: &str, resource: &str, outcome: &str, duration_secs: f64) {
    counter!(
        names::SYNC_RUNS_TOTAL,
        labels::ACCOUNT => account.to_string(),
        labels::RESOURCE => resource.to_string(),
        labels::OUTCOME => outcome.to_string()
    )
    .increment(1);
    histogram!(
        names::SYNC_RUN_DURATION_SECONDS,
        labels::ACCOUNT => account.to_string(),
        labels::RESOURCE => resource.to_string()
    )
    .record(duration_secs);
}

pub fn record_sync_items_processed(account: &str, resource: &str, count: u64) {
    counter!(
        names::SYNC_ITEMS_PROCESSED_TOTAL,
        labels::ACCOUNT => account.to_string(),
        labels::RESOURCE => resource.to_string()
    )
    .increment(count);
}

pub fn record_orphans_swept(count: u64) {
    counter!(names::SYNC_ORPHANS_SWEPT_TOTAL).increment(count);
}

pub fn record_rate_limiter_admitted(account: &str) {
    counter!(names::RATE_LIMITER_ADMITTED_TOTAL, labels::ACCOUNT => account.to_string()).increment(1);
}

pub fn record_api_client_retry(endpoint: &str) {
    counter!(names::API_CLIENT_RETRIES_TOTAL, labels::ENDPOINT => endpoint.to_string()).increment(1);
}

pub fn record_circuit_trip(endpoint: &str) {
    counter!(names::API_CLIENT_CIRCUIT_TRIPS_TOTAL, labels::ENDPOINT => endpoint.to_string()).increment(1);
}

pub fn record_auto_match(account: &str) {
    counter!(names::MATCHING_AUTO_MATCHES_TOTAL, labels::ACCOUNT => account.to_string()).increment(1);
}

pub fn record_draft_po() {
    counter!(names::REORDER_DRAFT_POS_TOTAL).increment(1);
}
