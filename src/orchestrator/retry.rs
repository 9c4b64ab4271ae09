//! Retry and timeout wrappers for feed calls

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

/// Retries only unavailable-data failures; anything else returns immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
    context: &str,
) -> EngineResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_data_unavailable() || attempt >= config.max_attempts => return Err(e),
            Err(e) => {
                warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                    attempt, config.max_attempts, context, e, delay
                );

                tokio::time::sleep(Duration::from_millis(delay)).await;

                delay = next_delay(delay, config, rand::random::<f64>());
            }
        }
    }
}

/// Grows `delay` by the backoff base, caps it, then applies ±5% jitter.
/// `unit` is a uniform draw from `[0, 1)`.
fn next_delay(delay: u64, config: &RetryConfig, unit: f64) -> u64 {
    let grown = ((delay as f64 * config.exponential_base) as u64).min(config.max_delay_ms);
    let jitter = (grown as f64 * 0.1 * (unit - 0.5)) as i64;
    grown.saturating_add_signed(jitter)
}

/// Bounds a feed call; an elapsed deadline becomes [`EngineError::Timeout`].
pub async fn fetch_with_timeout<T, F>(
    operation: &'static str,
    symbol: &str,
    limit: Duration,
    fetch: F,
) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            operation,
            symbol: symbol.to_string(),
            after: limit,
        }),
    }
}
