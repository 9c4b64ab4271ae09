//! One evaluation cycle across the symbol universe
//!
//! The market signal is fetched and classified once, then every symbol is
//! evaluated on its own task with the same assessment. A semaphore bounds
//! how many symbols hit the feeds at once. Each feed call carries its own
//! timeout, so a slow symbol degrades to `DataUnavailable` instead of
//! stalling the cycle, and a task that panics is reported as a failed
//! symbol while the rest of the cycle completes.

use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::{
    config::Config,
    engine::{DecisionEngine, EntryRequest},
    errors::{EngineError, EngineResult},
    regime::RegimeClassifier,
    types::{CycleReport, Decision, DecisionRecord, OptionRight, Position, ReasonCode, RegimeAssessment},
};
use super::{
    fetch_with_timeout, retry_with_backoff, CalendarAdapter, ChainProvider, DecisionSink,
    MarketDataFeed, PositionStore, RetryConfig,
};

/// Adapters the cycle reads from.
#[derive(Clone)]
pub struct CycleSources {
    pub market: Arc<dyn MarketDataFeed>,
    pub calendar: Arc<dyn CalendarAdapter>,
    pub chains: Arc<dyn ChainProvider>,
    pub positions: Arc<dyn PositionStore>,
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub symbols: Vec<String>,
    pub sides: Vec<OptionRight>,
    pub max_concurrent_symbols: usize,
    pub fetch_timeout: Duration,
    pub retry: RetryConfig,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            symbols: config.symbols.clone(),
            sides: config.sides(),
            max_concurrent_symbols: config.max_concurrent_symbols.max(1),
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms),
            retry: RetryConfig::default(),
        }
    }
}

pub struct CycleRunner {
    sources: CycleSources,
    classifier: RegimeClassifier,
    engine: Arc<DecisionEngine>,
    settings: CycleSettings,
}

/// Everything a per-symbol task needs, cloned into the task.
#[derive(Clone)]
struct SymbolEvaluator {
    calendar: Arc<dyn CalendarAdapter>,
    chains: Arc<dyn ChainProvider>,
    engine: Arc<DecisionEngine>,
    sides: Vec<OptionRight>,
    fetch_timeout: Duration,
}

impl CycleRunner {
    pub fn new(
        sources: CycleSources,
        classifier: RegimeClassifier,
        engine: DecisionEngine,
        settings: CycleSettings,
    ) -> Self {
        Self {
            sources,
            classifier,
            engine: Arc::new(engine),
            settings,
        }
    }

    pub fn from_config(config: &Config, sources: CycleSources) -> Self {
        Self::new(
            sources,
            RegimeClassifier::new(config.regime.clone()),
            DecisionEngine::new(config.policy.clone()),
            CycleSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Runs one cycle as of `now`.
    ///
    /// Fails only when the market signal or the position list cannot be
    /// read; per-symbol feed failures are folded into the report.
    pub async fn run_cycle(&self, now: NaiveDate) -> EngineResult<CycleReport> {
        let cycle_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let limit = self.settings.fetch_timeout;

        let market = self.sources.market.clone();
        let signal = retry_with_backoff(
            || {
                let market = market.clone();
                async move {
                    fetch_with_timeout("market signal", "*", limit, market.current_signal()).await
                }
            },
            &self.settings.retry,
            "market signal",
        )
        .await?;

        let assessment = self.classifier.assess(&signal);
        info!(
            cycle_id = %cycle_id,
            regime = assessment.regime.label(),
            vix = signal.volatility_index_level,
            trend_pct = signal.benchmark_trend_percent,
            confidence = assessment.confidence,
            "Regime assessed"
        );

        let positions = fetch_with_timeout(
            "open positions",
            "*",
            limit,
            self.sources.positions.open_positions(),
        )
        .await?;

        let mut held_by_symbol = group_by_symbol(positions);
        let universe: BTreeSet<String> = self
            .settings
            .symbols
            .iter()
            .cloned()
            .chain(held_by_symbol.keys().cloned())
            .collect();

        let evaluator = SymbolEvaluator {
            calendar: self.sources.calendar.clone(),
            chains: self.sources.chains.clone(),
            engine: self.engine.clone(),
            sides: self.settings.sides.clone(),
            fetch_timeout: limit,
        };
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_symbols.max(1)));

        let mut handles = Vec::with_capacity(universe.len());
        for symbol in universe {
            let held = held_by_symbol.remove(&symbol).unwrap_or_default();
            // Held-only symbols are managed but never receive new entries
            let configured = self.settings.symbols.contains(&symbol);
            let evaluator = evaluator.clone();
            let semaphore = semaphore.clone();
            let task_symbol = symbol.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is dropped
                let _permit = semaphore.acquire_owned().await.ok();
                evaluator.evaluate(&task_symbol, configured, held, assessment, now).await
            });
            handles.push((symbol, handle));
        }

        let mut records = Vec::new();
        let mut failed_symbols = Vec::new();
        for (symbol, handle) in handles {
            match handle.await {
                Ok(symbol_records) => records.extend(symbol_records),
                Err(e) => {
                    error!(symbol = %symbol, "Symbol evaluation task failed: {}", e);
                    failed_symbols.push(symbol);
                }
            }
        }

        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        if !failed_symbols.is_empty() {
            let err = EngineError::PartialCycleFailure {
                failed_symbols: failed_symbols.clone(),
            };
            warn!(cycle_id = %cycle_id, "{}", err);
        }

        let report = CycleReport {
            cycle_id,
            started_at,
            assessment,
            records,
            failed_symbols,
        };
        info!(
            cycle_id = %report.cycle_id,
            records = report.records.len(),
            actionable = report.actionable().count(),
            failed = report.failed_symbols.len(),
            "Cycle complete"
        );
        Ok(report)
    }

    /// Runs a cycle and hands the report to `sink`.
    pub async fn run_and_emit(&self, sink: &dyn DecisionSink, now: NaiveDate) -> anyhow::Result<CycleReport> {
        let report = self.run_cycle(now).await?;
        sink.emit(&report).await?;
        Ok(report)
    }
}

fn group_by_symbol(positions: Vec<Position>) -> BTreeMap<String, Vec<Position>> {
    let mut grouped: BTreeMap<String, Vec<Position>> = BTreeMap::new();
    for position in positions {
        grouped.entry(position.symbol.clone()).or_default().push(position);
    }
    grouped
}

impl SymbolEvaluator {
    async fn evaluate(
        &self,
        symbol: &str,
        configured: bool,
        held: Vec<Position>,
        assessment: RegimeAssessment,
        now: NaiveDate,
    ) -> Vec<DecisionRecord> {
        let scaling = assessment.scaling;
        let open_sides: Vec<OptionRight> = self
            .sides
            .iter()
            .copied()
            .filter(|side| configured && !held.iter().any(|p| p.side == *side))
            .collect();

        // Nothing below can act while trading is paused, so skip the feeds
        if scaling.trading_paused {
            let mut records: Vec<DecisionRecord> = held
                .iter()
                .map(|p| {
                    let decision = self.engine.decide(p, assessment.regime, &scaling, None, now);
                    DecisionRecord::held(p, decision)
                })
                .collect();
            records.extend(open_sides.into_iter().map(|side| {
                DecisionRecord::candidate(symbol, side, Decision::Skip { reason: ReasonCode::RegimePaused })
            }));
            return records;
        }

        let earnings = match fetch_with_timeout(
            "earnings lookup",
            symbol,
            self.fetch_timeout,
            self.calendar.next_earnings(symbol),
        )
        .await
        {
            Ok(window) => window,
            Err(e) => {
                warn!(symbol, "Earnings unavailable, holding symbol: {}", e);
                return unavailable(symbol, &held, &open_sides);
            }
        };

        let mut records: Vec<DecisionRecord> = held
            .iter()
            .map(|p| {
                let decision = self
                    .engine
                    .decide(p, assessment.regime, &scaling, earnings.as_ref(), now);
                DecisionRecord::held(p, decision)
            })
            .collect();

        if open_sides.is_empty() {
            return records;
        }

        let contracts_held: u32 = held
            .iter()
            .map(|p| p.quantity.unsigned_abs())
            .sum::<u64>()
            .min(u32::MAX as u64) as u32;

        let change_pct = match fetch_with_timeout(
            "underlying change",
            symbol,
            self.fetch_timeout,
            self.chains.underlying_change_pct(symbol),
        )
        .await
        {
            Ok(change) => change,
            Err(e) => {
                debug!(symbol, "Underlying change unknown: {}", e);
                None
            }
        };

        for side in open_sides {
            let chain = match fetch_with_timeout(
                "chain snapshot",
                symbol,
                self.fetch_timeout,
                self.chains.snapshot(symbol, side),
            )
            .await
            {
                Ok(chain) => chain,
                Err(e) => {
                    warn!(symbol, side = side.label(), "Chain unavailable: {}", e);
                    records.push(DecisionRecord::candidate(
                        symbol,
                        side,
                        Decision::Skip { reason: ReasonCode::DataUnavailable },
                    ));
                    continue;
                }
            };

            let request = EntryRequest {
                symbol,
                side,
                chain: &chain,
                earnings: earnings.as_ref(),
                underlying_change_pct: change_pct,
                contracts_held,
            };
            let decision = self.engine.decide_entry(&request, &scaling, now);
            records.push(DecisionRecord::candidate(symbol, side, decision));
        }

        records
    }
}

fn unavailable(symbol: &str, held: &[Position], open_sides: &[OptionRight]) -> Vec<DecisionRecord> {
    held.iter()
        .map(|p| DecisionRecord::held(p, Decision::Hold { reason: ReasonCode::DataUnavailable }))
        .chain(open_sides.iter().map(|side| {
            DecisionRecord::candidate(symbol, *side, Decision::Skip { reason: ReasonCode::DataUnavailable })
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use crate::{
        engine::EnginePolicy,
        types::{Contract, EarningsWindow, MarketSignal, Subject},
    };

    struct FixedSignal(MarketSignal);

    #[async_trait]
    impl MarketDataFeed for FixedSignal {
        async fn current_signal(&self) -> EngineResult<MarketSignal> {
            Ok(self.0)
        }
    }

    struct NoSignal;

    #[async_trait]
    impl MarketDataFeed for NoSignal {
        async fn current_signal(&self) -> EngineResult<MarketSignal> {
            Err(EngineError::DataUnavailable {
                source_name: "test",
                symbol: "VIX".to_string(),
                message: "offline".to_string(),
            })
        }
    }

    /// Calendar that stalls for one symbol and panics for another.
    struct ScriptedCalendar {
        slow: Option<&'static str>,
        panicking: Option<&'static str>,
    }

    #[async_trait]
    impl CalendarAdapter for ScriptedCalendar {
        async fn next_earnings(&self, symbol: &str) -> EngineResult<Option<EarningsWindow>> {
            if self.slow == Some(symbol) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.panicking == Some(symbol) {
                panic!("calendar adapter bug for {symbol}");
            }
            Ok(None)
        }
    }

    struct StaticChains(HashMap<String, Vec<Contract>>);

    #[async_trait]
    impl ChainProvider for StaticChains {
        async fn snapshot(&self, symbol: &str, side: OptionRight) -> EngineResult<Vec<Contract>> {
            Ok(self
                .0
                .get(symbol)
                .map(|chain| chain.iter().filter(|c| c.side == side).cloned().collect())
                .unwrap_or_default())
        }
    }

    struct StaticPositions(Vec<Position>);

    #[async_trait]
    impl PositionStore for StaticPositions {
        async fn open_positions(&self) -> EngineResult<Vec<Position>> {
            Ok(self.0.clone())
        }
    }

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn chain_for(symbol: &str) -> Vec<Contract> {
        vec![Contract {
            symbol: symbol.to_string(),
            side: OptionRight::Put,
            strike: dec!(100),
            expiry: NaiveDate::from_ymd_opt(2026, 2, 13).unwrap(),
            delta: -0.30,
            bid_price: dec!(1.50),
            ask_price: dec!(1.60),
            open_interest: 1_000,
        }]
    }

    fn position(symbol: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            side: OptionRight::Put,
            strike: dec!(95),
            expiry: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            open_premium: dec!(2.00),
            current_price: dec!(1.50),
            quantity: -2,
            cost_basis: None,
        }
    }

    fn runner(
        market: Arc<dyn MarketDataFeed>,
        calendar: ScriptedCalendar,
        symbols: &[&str],
        held: Vec<Position>,
    ) -> CycleRunner {
        let chains = symbols
            .iter()
            .map(|s| (s.to_string(), chain_for(s)))
            .collect();
        let sources = CycleSources {
            market,
            calendar: Arc::new(calendar),
            chains: Arc::new(StaticChains(chains)),
            positions: Arc::new(StaticPositions(held)),
        };
        let settings = CycleSettings {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            sides: vec![OptionRight::Put],
            max_concurrent_symbols: 2,
            fetch_timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                exponential_base: 2.0,
            },
        };
        CycleRunner::new(
            sources,
            RegimeClassifier::default(),
            DecisionEngine::new(EnginePolicy::default()),
            settings,
        )
    }

    fn calm() -> Arc<dyn MarketDataFeed> {
        Arc::new(FixedSignal(MarketSignal::new(18.0, 0.2, 12.0)))
    }

    #[tokio::test]
    async fn every_symbol_is_decided_once() {
        let runner = runner(
            calm(),
            ScriptedCalendar { slow: None, panicking: None },
            &["AAPL", "MSFT", "SPY"],
            vec![position("TSLA")],
        );
        let report = runner.run_cycle(now()).await.unwrap();

        let symbols: Vec<&str> = report.records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "SPY", "TSLA"]);
        assert!(!report.is_partial());

        let tsla = &report.records[3];
        assert!(matches!(tsla.subject, Subject::Held { .. }));
        assert_eq!(tsla.decision, Decision::Hold { reason: ReasonCode::WithinThresholds });
        assert!(matches!(report.records[0].decision, Decision::Open { .. }));
    }

    #[tokio::test]
    async fn held_only_symbol_gets_no_new_entries() {
        let mut covered_call = position("TSLA");
        covered_call.side = OptionRight::Call;
        let chains = HashMap::from([
            ("SPY".to_string(), chain_for("SPY")),
            ("TSLA".to_string(), chain_for("TSLA")),
        ]);
        let sources = CycleSources {
            market: calm(),
            calendar: Arc::new(ScriptedCalendar { slow: None, panicking: None }),
            chains: Arc::new(StaticChains(chains)),
            positions: Arc::new(StaticPositions(vec![covered_call])),
        };
        let settings = CycleSettings {
            symbols: vec!["SPY".to_string()],
            sides: vec![OptionRight::Put, OptionRight::Call],
            max_concurrent_symbols: 2,
            fetch_timeout: Duration::from_millis(50),
            retry: RetryConfig::default(),
        };
        let runner = CycleRunner::new(sources, RegimeClassifier::default(), DecisionEngine::default(), settings);
        let report = runner.run_cycle(now()).await.unwrap();

        let tsla: Vec<&DecisionRecord> = report.records.iter().filter(|r| r.symbol == "TSLA").collect();
        assert_eq!(tsla.len(), 1);
        assert!(matches!(tsla[0].subject, Subject::Held { .. }));
        assert!(!matches!(tsla[0].decision, Decision::Open { .. }));

        let spy_puts = report
            .records
            .iter()
            .filter(|r| r.symbol == "SPY" && matches!(r.decision, Decision::Open { .. }))
            .count();
        assert_eq!(spy_puts, 1);
    }

    #[tokio::test]
    async fn slow_calendar_degrades_only_that_symbol() {
        let runner = runner(
            calm(),
            ScriptedCalendar { slow: Some("MSFT"), panicking: None },
            &["AAPL", "MSFT"],
            vec![position("MSFT")],
        );
        let report = runner.run_cycle(now()).await.unwrap();

        let msft: Vec<&DecisionRecord> = report.records.iter().filter(|r| r.symbol == "MSFT").collect();
        assert_eq!(msft.len(), 1);
        assert_eq!(msft[0].decision, Decision::Hold { reason: ReasonCode::DataUnavailable });

        let aapl = report.records.iter().find(|r| r.symbol == "AAPL").unwrap();
        assert!(matches!(aapl.decision, Decision::Open { .. }));
    }

    #[tokio::test]
    async fn panicking_symbol_is_reported_as_failed() {
        let runner = runner(
            calm(),
            ScriptedCalendar { slow: None, panicking: Some("AAPL") },
            &["AAPL", "SPY"],
            vec![],
        );
        let report = runner.run_cycle(now()).await.unwrap();

        assert_eq!(report.failed_symbols, vec!["AAPL".to_string()]);
        assert!(report.records.iter().all(|r| r.symbol != "AAPL"));
        assert!(report.records.iter().any(|r| r.symbol == "SPY"));
    }

    #[tokio::test]
    async fn paused_regime_holds_and_skips_without_feeds() {
        let panicky = ScriptedCalendar { slow: None, panicking: Some("SPY") };
        let runner = runner(
            Arc::new(FixedSignal(MarketSignal::new(45.0, -3.0, 40.0))),
            panicky,
            &["SPY"],
            vec![position("SPY")],
        );
        let report = runner.run_cycle(now()).await.unwrap();

        assert!(!report.is_partial());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].decision, Decision::Hold { reason: ReasonCode::TradingPaused });
    }

    #[tokio::test]
    async fn paused_regime_skips_new_entries() {
        let runner = runner(
            Arc::new(FixedSignal(MarketSignal::new(45.0, 0.0, 30.0))),
            ScriptedCalendar { slow: None, panicking: None },
            &["QQQ"],
            vec![],
        );
        let report = runner.run_cycle(now()).await.unwrap();
        assert_eq!(report.records[0].decision, Decision::Skip { reason: ReasonCode::RegimePaused });
    }

    #[tokio::test]
    async fn missing_signal_fails_the_cycle() {
        let runner = runner(
            Arc::new(NoSignal),
            ScriptedCalendar { slow: None, panicking: None },
            &["SPY"],
            vec![],
        );
        let err = runner.run_cycle(now()).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }
}
