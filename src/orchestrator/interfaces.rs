//! Boundary contracts consumed and exposed by the engine
//!
//! Adapters own transport, caching and retries. The engine only sees a
//! value or a typed [`EngineError`] within the fetch timeout it applies.

use async_trait::async_trait;
use std::sync::Arc;
use crate::{
    errors::EngineResult,
    types::{Contract, CycleReport, EarningsWindow, MarketSignal, OptionRight, Position},
};

#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn current_signal(&self) -> EngineResult<MarketSignal>;
}

#[async_trait]
pub trait CalendarAdapter: Send + Sync {
    /// `Ok(None)` means no known upcoming earnings.
    async fn next_earnings(&self, symbol: &str) -> EngineResult<Option<EarningsWindow>>;
}

#[async_trait]
impl<T: CalendarAdapter + ?Sized> CalendarAdapter for Arc<T> {
    async fn next_earnings(&self, symbol: &str) -> EngineResult<Option<EarningsWindow>> {
        (**self).next_earnings(symbol).await
    }
}

#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn snapshot(&self, symbol: &str, side: OptionRight) -> EngineResult<Vec<Contract>>;

    /// Underlying change versus the previous close, in percent, when known.
    async fn underlying_change_pct(&self, _symbol: &str) -> EngineResult<Option<f64>> {
        Ok(None)
    }
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn open_positions(&self) -> EngineResult<Vec<Position>>;
}

#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn emit(&self, report: &CycleReport) -> anyhow::Result<()>;
}
