//! File-backed adapters reading a JSON market snapshot
//!
//! A single snapshot file carries everything one cycle consumes: the
//! volatility index reading (or a ready-made signal), benchmark closes,
//! open positions, option chains, earnings dates and the underlying's
//! change on the day. An external collector rewrites the file; the binary
//! calls [`SnapshotFeed::refresh`] at the top of every cycle. Once the last
//! good load is older than the configured age limit every read reports
//! unavailable data.

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use crate::{
    errors::{EngineError, EngineResult},
    orchestrator::{CalendarAdapter, ChainProvider, MarketDataFeed, PositionStore},
    types::{Contract, EarningsWindow, MarketSignal, OptionRight, Position},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotFile {
    /// Precomputed signal; wins over `market` when both are present
    #[serde(default)]
    pub signal: Option<MarketSignal>,
    #[serde(default)]
    pub market: Option<MarketInputs>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub chains: HashMap<String, Vec<Contract>>,
    #[serde(default)]
    pub earnings: HashMap<String, NaiveDate>,
    #[serde(default)]
    pub underlying_change_pct: HashMap<String, f64>,
}

/// Raw inputs the signal is derived from.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketInputs {
    pub vix: f64,
    /// Benchmark daily closes, oldest first
    pub benchmark_closes: Vec<f64>,
}

impl SnapshotFile {
    pub fn market_signal(&self) -> Option<MarketSignal> {
        if let Some(signal) = self.signal {
            return Some(signal);
        }
        self.market
            .as_ref()
            .filter(|m| m.vix.is_finite())
            .map(|m| MarketSignal::from_closes(m.vix, &m.benchmark_closes))
    }
}

pub async fn load_snapshot(path: &Path) -> anyhow::Result<SnapshotFile> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: SnapshotFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    Ok(snapshot)
}

struct LoadedSnapshot {
    loaded_at: Instant,
    snapshot: Arc<SnapshotFile>,
}

impl LoadedSnapshot {
    fn now(snapshot: SnapshotFile) -> Self {
        Self {
            loaded_at: Instant::now(),
            snapshot: Arc::new(snapshot),
        }
    }
}

/// Serves the last successfully loaded snapshot to every consumed seam.
pub struct SnapshotFeed {
    path: Option<PathBuf>,
    max_age: Option<Duration>,
    current: RwLock<Option<LoadedSnapshot>>,
}

impl SnapshotFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            max_age: None,
            current: RwLock::new(None),
        }
    }

    /// Feed pinned to an in-memory snapshot; `refresh` is a no-op.
    pub fn from_snapshot(snapshot: SnapshotFile) -> Self {
        Self {
            path: None,
            max_age: None,
            current: RwLock::new(Some(LoadedSnapshot::now(snapshot))),
        }
    }

    /// Stops serving a snapshot once its last successful load is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Reloads the file. On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> EngineResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        match load_snapshot(path).await {
            Ok(snapshot) => {
                info!(
                    path = %path.display(),
                    positions = snapshot.positions.len(),
                    chains = snapshot.chains.len(),
                    earnings = snapshot.earnings.len(),
                    "📥 Loaded market snapshot"
                );
                *self.current.write().await = Some(LoadedSnapshot::now(snapshot));
                Ok(())
            }
            Err(e) => {
                let stale = self.current.read().await.is_some();
                warn!(path = %path.display(), stale, "Snapshot reload failed: {:#}", e);
                Err(EngineError::Snapshot {
                    context: format!("reloading {}", path.display()),
                    source: e,
                })
            }
        }
    }

    async fn loaded(&self, symbol: &str) -> EngineResult<Arc<SnapshotFile>> {
        let current = self.current.read().await;
        let Some(loaded) = current.as_ref() else {
            return Err(EngineError::DataUnavailable {
                source_name: "snapshot",
                symbol: symbol.to_string(),
                message: "no snapshot loaded".to_string(),
            });
        };

        let age = loaded.loaded_at.elapsed();
        if let Some(max_age) = self.max_age.filter(|max| age > *max) {
            return Err(EngineError::DataUnavailable {
                source_name: "snapshot",
                symbol: symbol.to_string(),
                message: format!("snapshot is stale ({}s old, limit {}s)", age.as_secs(), max_age.as_secs()),
            });
        }
        Ok(loaded.snapshot.clone())
    }
}

#[async_trait]
impl MarketDataFeed for SnapshotFeed {
    async fn current_signal(&self) -> EngineResult<MarketSignal> {
        let snapshot = self.loaded("VIX").await?;
        snapshot.market_signal().ok_or_else(|| EngineError::DataUnavailable {
            source_name: "snapshot",
            symbol: "VIX".to_string(),
            message: "snapshot carries neither a signal nor market inputs".to_string(),
        })
    }
}

#[async_trait]
impl CalendarAdapter for SnapshotFeed {
    async fn next_earnings(&self, symbol: &str) -> EngineResult<Option<EarningsWindow>> {
        let snapshot = self.loaded(symbol).await?;
        Ok(snapshot
            .earnings
            .get(symbol)
            .map(|date| EarningsWindow::for_earnings(symbol, *date)))
    }
}

#[async_trait]
impl ChainProvider for SnapshotFeed {
    async fn snapshot(&self, symbol: &str, side: OptionRight) -> EngineResult<Vec<Contract>> {
        let snapshot = self.loaded(symbol).await?;
        let Some(chain) = snapshot.chains.get(symbol) else {
            return Err(EngineError::DataUnavailable {
                source_name: "snapshot",
                symbol: symbol.to_string(),
                message: "no option chain in snapshot".to_string(),
            });
        };
        let contracts: Vec<Contract> = chain.iter().filter(|c| c.side == side).cloned().collect();
        debug!(symbol, side = side.label(), contracts = contracts.len(), "Chain snapshot");
        Ok(contracts)
    }

    async fn underlying_change_pct(&self, symbol: &str) -> EngineResult<Option<f64>> {
        let snapshot = self.loaded(symbol).await?;
        Ok(snapshot
            .underlying_change_pct
            .get(symbol)
            .copied()
            .filter(|pct| pct.is_finite()))
    }
}

#[async_trait]
impl PositionStore for SnapshotFeed {
    async fn open_positions(&self) -> EngineResult<Vec<Position>> {
        let snapshot = self.loaded("*").await?;
        Ok(snapshot.positions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"{
        "market": { "vix": 22.0, "benchmark_closes": [100, 101, 102, 103, 104, 105, 106, 107, 108, 109,
                                                       110, 111, 112, 113, 114, 115, 116, 117, 118, 119] },
        "positions": [{
            "symbol": "AAPL", "side": "Put", "strike": "180", "expiry": "2026-01-30",
            "open_premium": "2.00", "current_price": "0.95", "quantity": -1
        }],
        "chains": {
            "AAPL": [
                { "symbol": "AAPL", "side": "Put", "strike": "175", "expiry": "2026-02-20", "delta": -0.30,
                  "bid_price": "1.90", "ask_price": "2.00", "open_interest": 1200 },
                { "symbol": "AAPL", "side": "Call", "strike": "200", "expiry": "2026-02-20", "delta": 0.30,
                  "bid_price": "1.70", "ask_price": "1.80", "open_interest": 900 }
            ]
        },
        "earnings": { "AAPL": "2026-01-29" },
        "underlying_change_pct": { "AAPL": -1.4 }
    }"#;

    fn feed() -> SnapshotFeed {
        SnapshotFeed::from_snapshot(serde_json::from_str(SAMPLE).unwrap())
    }

    #[tokio::test]
    async fn derives_signal_from_closes() {
        let signal = feed().current_signal().await.unwrap();
        assert_eq!(signal.volatility_index_level, 22.0);
        assert!(signal.benchmark_trend_percent > 0.0);
    }

    #[tokio::test]
    async fn serves_positions_and_filtered_chains() {
        let feed = feed();
        let positions = feed.open_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].current_price, dec!(0.95));
        assert_eq!(positions[0].cost_basis, None);

        let puts = ChainProvider::snapshot(&feed, "AAPL", OptionRight::Put).await.unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].strike, dec!(175));
        assert_eq!(feed.underlying_change_pct("AAPL").await.unwrap(), Some(-1.4));
    }

    #[tokio::test]
    async fn earnings_window_lands_on_that_friday() {
        let window = feed().next_earnings("AAPL").await.unwrap().unwrap();
        assert_eq!(window.same_week_friday_expiry, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
        assert!(feed().next_earnings("MSFT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_chain_is_unavailable_data() {
        let err = ChainProvider::snapshot(&feed(), "MSFT", OptionRight::Put).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn aged_out_snapshot_is_unavailable() {
        let fresh = feed().with_max_age(Duration::from_secs(60));
        assert!(fresh.open_positions().await.is_ok());

        let aged = feed().with_max_age(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(aged.current_signal().await.unwrap_err().is_data_unavailable());
        assert!(aged.open_positions().await.unwrap_err().is_data_unavailable());
        let chain = ChainProvider::snapshot(&aged, "AAPL", OptionRight::Put).await;
        assert!(chain.unwrap_err().is_data_unavailable());
    }

    #[tokio::test]
    async fn unloaded_file_reports_snapshot_error() {
        let feed = SnapshotFeed::new("/nonexistent/theta-engine/snapshot.json");
        assert!(matches!(feed.refresh().await, Err(EngineError::Snapshot { .. })));
        assert!(feed.current_signal().await.unwrap_err().is_data_unavailable());
    }
}
