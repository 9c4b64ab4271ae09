//! Custom error types for the engine

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Data unavailable from {source_name} for {symbol}: {message}")]
    DataUnavailable {
        source_name: &'static str,
        symbol: String,
        message: String,
    },

    #[error("{operation} for {symbol} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        symbol: String,
        after: Duration,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration {
        field: &'static str,
        reason: String,
    },

    #[error("Cycle evaluation failed for {} symbol(s): {}", failed_symbols.len(), failed_symbols.join(", "))]
    PartialCycleFailure {
        failed_symbols: Vec<String>,
    },

    #[error("Snapshot error: {context}")]
    Snapshot {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Circuit breaker active: {reason}")]
    CircuitBreakerOpen {
        reason: String,
        cooldown_remaining: Duration,
    },
}

impl EngineError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    /// Feed failures the cycle degrades around instead of aborting.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(
            self,
            EngineError::DataUnavailable { .. } | EngineError::Timeout { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_lists_symbols() {
        let err = EngineError::PartialCycleFailure {
            failed_symbols: vec!["AAPL".to_string(), "TSLA".to_string()],
        };
        assert_eq!(err.to_string(), "Cycle evaluation failed for 2 symbol(s): AAPL, TSLA");
    }

    #[test]
    fn timeouts_count_as_unavailable_data() {
        let err = EngineError::Timeout {
            operation: "chain snapshot",
            symbol: "SPY".to_string(),
            after: Duration::from_millis(250),
        };
        assert!(err.is_data_unavailable());
        assert!(!EngineError::invalid_config("base_delta", "must be in (0, 1)").is_data_unavailable());
    }
}
