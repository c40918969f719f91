//! Authenticated marketplace API client (C2, §4.2).
//!
//! Wraps a `reqwest::Client` with per-`(account, resource_class)` rate limiting,
//! a circuit breaker, and exponential-backoff retry. Grounded on the teacher's
//! `cache/redis_client.rs::with_retry` wrapper shape, adapted from Redis commands
//! to outbound HTTP calls.

pub mod circuit;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, ErrorKind};
use crate::models::product::Account;
use crate::rate_limiter::{RateLimiter, ResourceClass};

use circuit::CircuitBreaker;
use retry::{BackoffRng, RetryPolicy, ThreadRng};

#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub username: String,
    pub password: String,
    pub base_url: String,
}

/// eMAG's response envelope (§6.4): every endpoint returns this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct EmagEnvelope<T> {
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub results: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// §6.1's real envelope shape: a total item count, the page just returned, and the
/// page size requested. There is no `totalPages` field — callers derive page-completion
/// from `total` vs. `page * itemsPerPage`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: u32,
}

pub struct MarketplaceApiClient {
    http: Client,
    credentials: HashMap<Account, AccountCredentials>,
    rate_limiter: Arc<RateLimiter>,
    breakers: dashmap::DashMap<(Account, &'static str), Arc<CircuitBreaker>>,
    retry_policy: RetryPolicy,
    rng: Arc<dyn BackoffRng>,
}

impl MarketplaceApiClient {
    pub fn new(credentials: HashMap<Account, AccountCredentials>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with static config"),
            credentials,
            rate_limiter,
            breakers: dashmap::DashMap::new(),
            retry_policy: RetryPolicy::default(),
            rng: Arc::new(ThreadRng),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_rng(mut self, rng: Arc<dyn BackoffRng>) -> Self {
        self.rng = rng;
        self
    }

    fn breaker_for(&self, account: Account, endpoint: &'static str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry((account, endpoint))
            .or_insert_with(|| Arc::new(CircuitBreaker::new()))
            .clone()
    }

    fn auth_header(&self, account: Account) -> Result<String, AppError> {
        let creds = self.credentials.get(&account).ok_or_else(|| {
            AppError::new(ErrorKind::Auth, format!("no credentials configured for account {account}"))
        })?;
        let raw = format!("{}:{}", creds.username, creds.password);
        Ok(format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw)))
    }

    /// Calls `resource/action`, retrying retryable failures with backoff, honoring the
    /// per-account-and-resource-class rate limit and circuit breaker. `body` is sent as
    /// the JSON payload when present; `query` is appended as query-string pairs.
    pub async fn call<B, R>(
        &self,
        method: Method,
        endpoint: &'static str,
        account: Account,
        class: ResourceClass,
        body: Option<&B>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<EmagEnvelope<R>, AppError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let creds = self
            .credentials
            .get(&account)
            .ok_or_else(|| AppError::new(ErrorKind::Auth, format!("no credentials configured for account {account}")))?;
        let url = format!("{}/{}", creds.base_url.trim_end_matches('/'), endpoint);
        let auth = self.auth_header(account)?;
        let breaker = self.breaker_for(account, endpoint);

        let mut attempt = 0u32;
        loop {
            if !breaker.try_acquire() {
                return Err(AppError::new(ErrorKind::CircuitOpen, format!("circuit open for {account}/{endpoint}")));
            }

            self.rate_limiter.acquire(account, class).await;
            crate::metrics::record_rate_limiter_admitted(account.as_str());

            let mut request = self.http.request(method.clone(), &url).header("Authorization", &auth);
            if let Some(query) = query {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let result = request.send().await;

            match self.classify(result).await {
                Ok(envelope) => {
                    breaker.record_success();
                    return Ok(envelope);
                }
                Err(err) => {
                    // Rate limiting and plain network hiccups are expected noise the retry
                    // loop absorbs; they shouldn't themselves count against the breaker.
                    // A bare timeout is a sign the upstream is struggling even if we go on
                    // to retry it, so it counts every time (§4.2).
                    if !err.kind.is_retryable() || err.kind == ErrorKind::Timeout {
                        let trips_before = breaker.trips();
                        breaker.record_failure();
                        if breaker.trips() > trips_before {
                            crate::metrics::record_circuit_trip(endpoint);
                        }
                    }

                    if !self.retry_policy.should_retry(err.kind, attempt) {
                        return Err(err);
                    }

                    let delay = err.retry_after.unwrap_or_else(|| self.retry_policy.delay_for(attempt, self.rng.as_ref()));
                    warn!(account = %account, endpoint, attempt, delay_ms = delay.as_millis() as u64, "retrying marketplace call");
                    crate::metrics::record_api_client_retry(endpoint);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn classify<R: DeserializeOwned>(
        &self,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<EmagEnvelope<R>, AppError> {
        let response = result.map_err(AppError::from)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let mut err = AppError::new(ErrorKind::RateLimited, "marketplace returned 429");
            if let Some(retry_after) = parse_retry_after(&response) {
                err = err.with_retry_after(retry_after);
            }
            return Err(err);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::new(ErrorKind::Auth, format!("marketplace returned {status}")));
        }
        if status.is_server_error() {
            return Err(AppError::new(ErrorKind::Network, format!("marketplace returned {status}")));
        }

        let envelope: EmagEnvelope<R> = response
            .json()
            .await
            .map_err(|e| AppError::new(ErrorKind::RemoteValidation, format!("malformed envelope: {e}")))?;

        if envelope.is_error {
            return Err(AppError::new(
                ErrorKind::RemoteValidation,
                envelope.messages.join("; "),
            ));
        }

        info!(results = envelope.results.len(), "marketplace call succeeded");
        Ok(envelope)
    }
}

/// `Retry-After` is specified in whole seconds (RFC 9110 §10.2.3's delay-seconds form;
/// the HTTP-date form isn't used by this API).
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basic_auth_header() {
        let mut creds = HashMap::new();
        creds.insert(
            Account::Main,
            AccountCredentials {
                username: "user".into(),
                password: "pass".into(),
                base_url: "https://marketplace-api.example.com/api-3".into(),
            },
        );
        let client = MarketplaceApiClient::new(creds, Arc::new(RateLimiter::with_default_jitter()));
        let header = client.auth_header(Account::Main).unwrap();
        assert!(header.starts_with("Basic "));
    }

    #[test]
    fn missing_credentials_is_auth_error() {
        let client = MarketplaceApiClient::new(HashMap::new(), Arc::new(RateLimiter::with_default_jitter()));
        let err = client.auth_header(Account::Fbe).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
    }
}
