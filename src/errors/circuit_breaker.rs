//! Circuit breaker over consecutive failed cycles
//!
//! Counts cycles that failed outright (no signal, no positions, sink
//! errors). Reaching the limit opens the breaker; it closes again on the
//! first check after the cooldown, or on any successful cycle.

use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info};
use crate::config::Config;
use super::EngineError;

#[derive(Debug, Default)]
struct BreakerState {
    failed_cycles: u32,
    opened_at: Option<Instant>,
}

/// Point-in-time view for the session summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerStatus {
    pub open: bool,
    pub failed_cycles: u32,
    pub cooldown_remaining: Duration,
}

pub struct CircuitBreaker {
    state: RwLock<BreakerState>,
    max_failed_cycles: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(max_failed_cycles: u32, cooldown_secs: u64) -> Self {
        Self {
            state: RwLock::new(BreakerState::default()),
            max_failed_cycles: max_failed_cycles.max(1),
            cooldown: Duration::from_secs(cooldown_secs),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_consecutive_errors, config.circuit_breaker_cooldown_secs)
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if state.opened_at.is_some() {
            info!("Circuit breaker closed by a successful cycle");
        }
        *state = BreakerState::default();
    }

    /// Returns true when this failure tripped the breaker.
    pub async fn record_error(&self) -> bool {
        let mut state = self.state.write().await;
        state.failed_cycles = state.failed_cycles.saturating_add(1);

        // Already open: keep the original cooldown start
        if state.opened_at.is_some() || state.failed_cycles < self.max_failed_cycles {
            return false;
        }
        state.opened_at = Some(Instant::now());
        error!(
            failed_cycles = state.failed_cycles,
            cooldown_secs = self.cooldown.as_secs(),
            "Circuit breaker OPEN"
        );
        true
    }

    pub async fn can_proceed(&self) -> bool {
        let mut state = self.state.write().await;
        let Some(opened_at) = state.opened_at else {
            return true;
        };
        if opened_at.elapsed() <= self.cooldown {
            return false;
        }
        info!(failed_cycles = state.failed_cycles, "Circuit breaker cooldown complete, resetting");
        *state = BreakerState::default();
        true
    }

    pub async fn ensure_closed(&self) -> Result<(), EngineError> {
        if self.can_proceed().await {
            return Ok(());
        }
        let status = self.status().await;
        Err(EngineError::CircuitBreakerOpen {
            reason: format!("{} consecutive failed cycles", status.failed_cycles),
            cooldown_remaining: status.cooldown_remaining,
        })
    }

    pub async fn status(&self) -> BreakerStatus {
        let state = self.state.read().await;
        let cooldown_remaining = state
            .opened_at
            .map(|t| self.cooldown.saturating_sub(t.elapsed()))
            .unwrap_or_default();
        BreakerStatus {
            open: state.opened_at.is_some(),
            failed_cycles: state.failed_cycles,
            cooldown_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_and_resets_on_success() {
        let breaker = CircuitBreaker::new(2, 300);
        assert!(!breaker.record_error().await);
        assert!(breaker.record_error().await);
        assert!(!breaker.can_proceed().await);
        assert!(matches!(
            breaker.ensure_closed().await,
            Err(EngineError::CircuitBreakerOpen { .. })
        ));

        breaker.record_success().await;
        assert!(breaker.can_proceed().await);
        assert_eq!(breaker.status().await.failed_cycles, 0);
    }

    #[tokio::test]
    async fn further_failures_do_not_restart_the_cooldown() {
        let breaker = CircuitBreaker::new(1, 300);
        assert!(breaker.record_error().await);
        let first = breaker.status().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!breaker.record_error().await);
        let second = breaker.status().await;
        assert!(second.open);
        assert_eq!(second.failed_cycles, 2);
        assert!(second.cooldown_remaining < first.cooldown_remaining);
    }

    #[tokio::test]
    async fn zero_cooldown_closes_on_next_check() {
        let breaker = CircuitBreaker::new(1, 0);
        assert!(breaker.record_error().await);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(breaker.can_proceed().await);
        assert!(!breaker.status().await.open);
    }

    #[test]
    fn limit_comes_from_config() {
        let mut config = Config::default();
        config.max_consecutive_errors = 0;
        let breaker = CircuitBreaker::from_config(&config);
        assert_eq!(breaker.max_failed_cycles, 1);
        assert_eq!(breaker.cooldown, Duration::from_secs(config.circuit_breaker_cooldown_secs));
    }
}
