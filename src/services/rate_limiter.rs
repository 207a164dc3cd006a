//! Rate limiting and retry logic for external API calls
//!
//! The metadata provider and the indexer proxy both sit behind a
//! [`RateLimitedClient`]; transient failures go through [`retry_async`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, Response};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    /// Requests allowed in a short burst above the rate
    pub burst_size: u32,
    pub timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst_size: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// An HTTP client that waits for a permit before every request
#[derive(Clone)]
pub struct RateLimitedClient {
    client: Client,
    limiter: Arc<DirectLimiter>,
    name: String,
}

impl RateLimitedClient {
    pub fn new(name: &str, config: RateLimitConfig) -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .build()
            .with_context(|| format!("Failed to create HTTP client for {}", name))?;

        Ok(Self::with_client(name, client, &config))
    }

    /// Wrap an already configured client
    pub fn with_client(name: &str, client: Client, config: &RateLimitConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
            name: name.to_string(),
        }
    }

    pub fn for_tmdb() -> Result<Self> {
        // TMDB allows ~40 requests per 10 seconds
        Self::new(
            "tmdb",
            RateLimitConfig {
                requests_per_second: 4,
                burst_size: 10,
                ..Default::default()
            },
        )
    }

    pub fn for_indexer() -> Result<Self> {
        // A Jackett search fans out to every configured tracker
        Self::new(
            "indexer",
            RateLimitConfig {
                requests_per_second: 1,
                burst_size: 3,
                timeout: Duration::from_secs(90),
            },
        )
    }

    pub async fn get_with_query<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        query: &T,
    ) -> Result<Response> {
        self.wait_for_permit().await;
        debug!(client = %self.name, url = %url, "Making rate-limited GET request with query");

        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .context("HTTP request failed")
    }

    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        }
    }
}

/// Run `operation` until it succeeds, `is_retryable` rejects the error, or
/// the retry budget is spent
pub async fn retry_async<T, E, Fut, F, R>(
    operation: F,
    is_retryable: R,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    let mut backoff = config.to_backoff();

    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                if attempts >= config.max_retries {
                    warn!(
                        operation = %operation_name,
                        attempts = attempts,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let Some(duration) = backoff.next_backoff() else {
                    return Err(e);
                };
                warn!(
                    operation = %operation_name,
                    attempt = attempts,
                    error = %e,
                    retry_in_ms = duration.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

/// 429, 408 or any 5xx
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || status == 408 || (500..600).contains(&status)
}
