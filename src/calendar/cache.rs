//! Memoising wrapper around a calendar adapter

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use crate::{
    errors::EngineResult,
    orchestrator::CalendarAdapter,
    types::EarningsWindow,
};

/// Caches found earnings windows per symbol. Misses are not cached so a
/// newly announced date is picked up on the next cycle.
pub struct CachedCalendar<C> {
    inner: C,
    windows: Arc<RwLock<HashMap<String, EarningsWindow>>>,
}

impl<C: CalendarAdapter> CachedCalendar<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drops windows whose earnings date is already behind `today`.
    pub async fn evict_passed(&self, today: NaiveDate) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| !w.has_passed(today));
        before - windows.len()
    }

    pub async fn cached_symbols(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[async_trait]
impl<C: CalendarAdapter> CalendarAdapter for CachedCalendar<C> {
    async fn next_earnings(&self, symbol: &str) -> EngineResult<Option<EarningsWindow>> {
        if let Some(window) = self.windows.read().await.get(symbol) {
            return Ok(Some(window.clone()));
        }

        let found = self.inner.next_earnings(symbol).await?;
        match &found {
            Some(window) => {
                debug!(symbol, earnings = %window.earnings_date, "Caching earnings window");
                self.windows.write().await.insert(symbol.to_string(), window.clone());
            }
            None => debug!(symbol, "No earnings date found"),
        }
        Ok(found)
    }
}
