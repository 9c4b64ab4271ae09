//! Console summaries of cycle results

use std::time::Instant;
use tracing::{error, info, warn};
use crate::{
    errors::CircuitBreaker,
    types::{CycleReport, Decision, DecisionRecord, Regime, Subject},
};

/// Running totals across cycles, printed periodically and on shutdown.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub partial_cycles: u64,
    pub opens: u64,
    pub closes: u64,
    pub rolls: u64,
    pub paused_cycles: u64,
}

impl SessionStats {
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.is_partial() {
            self.partial_cycles += 1;
        }
        if report.assessment.regime == Regime::Paused {
            self.paused_cycles += 1;
        }
        for record in &report.records {
            match record.decision {
                Decision::Open { .. } => self.opens += 1,
                Decision::Close { .. } => self.closes += 1,
                Decision::Roll { .. } => self.rolls += 1,
                Decision::Hold { .. } | Decision::Skip { .. } => {}
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_cycles += 1;
    }
}

fn regime_icon(regime: Regime) -> &'static str {
    match regime {
        Regime::Bull => "🐂",
        Regime::Bear => "🐻",
        Regime::Sideways => "↔️ ",
        Regime::HighVolatility => "🌪️ ",
        Regime::Paused => "⏸️ ",
    }
}

fn describe(record: &DecisionRecord) -> String {
    let subject = match &record.subject {
        Subject::Held { position } => format!(
            "{} {}{} {} x{}",
            position.symbol,
            position.strike,
            position.side.label(),
            position.expiry,
            position.quantity
        ),
        Subject::Candidate { side } => format!("{} new {}", record.symbol, side.label()),
    };

    match &record.decision {
        Decision::Open { contract, quantity } => format!(
            "{} → OPEN {} x {}{} {} (Δ {:.2}, mid ${:.2})",
            subject,
            quantity,
            contract.strike,
            contract.side.label(),
            contract.expiry,
            contract.delta,
            contract.mid_price().unwrap_or_default()
        ),
        Decision::Roll { new_expiry, reason } => {
            format!("{} → ROLL to {} ({:?})", subject, new_expiry, reason)
        }
        Decision::Close { reason } => format!("{} → CLOSE ({:?})", subject, reason),
        Decision::Hold { reason } => format!("{} → hold ({:?})", subject, reason),
        Decision::Skip { reason } => format!("{} → skip ({:?})", subject, reason),
    }
}

pub fn print_cycle_report(report: &CycleReport) {
    let assessment = &report.assessment;
    info!(
        "\n{} Regime: {} | VIX {:.2} | Trend {:+.2}% | RV {:.1}% | Confidence {:.0}%",
        regime_icon(assessment.regime),
        assessment.regime.label().to_uppercase(),
        assessment.signal.volatility_index_level,
        assessment.signal.benchmark_trend_percent,
        assessment.signal.realized_volatility_percent,
        assessment.confidence * 100.0
    );
    info!(
        "   Size x{:.2} | Delta adj {:+.2}{}",
        assessment.scaling.position_size_multiplier,
        assessment.scaling.delta_adjustment,
        if assessment.scaling.trading_paused { " | ⚠️  TRADING PAUSED" } else { "" }
    );

    for record in &report.records {
        if record.decision.is_actionable() {
            warn!("🎯 {}", describe(record));
        } else {
            info!("   {}", describe(record));
        }
    }

    if report.is_partial() {
        error!("❌ Evaluation failed for: {}", report.failed_symbols.join(", "));
    }
}

pub async fn print_session_stats(start_time: Instant, stats: &SessionStats, circuit_breaker: &CircuitBreaker) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   🔁 CYCLES:");
    info!("     Completed: {}", stats.cycles);
    info!("     Failed: {}", stats.failed_cycles);
    info!("     Partial: {}", stats.partial_cycles);
    info!("     Paused regime: {}", stats.paused_cycles);

    info!("   🎯 DECISIONS:");
    info!("     Opens: {}", stats.opens);
    info!("     Closes: {}", stats.closes);
    info!("     Rolls: {}", stats.rolls);

    info!("   ⚙️  SYSTEM:");
    let breaker = circuit_breaker.status().await;
    if breaker.open {
        info!("     Circuit breaker: OPEN ({} failed cycles, {}s cooldown left)",
            breaker.failed_cycles,
            breaker.cooldown_remaining.as_secs()
        );
    } else {
        info!("     Circuit breaker: CLOSED");
    }
    info!("");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use crate::{
        regime::RegimeClassifier,
        types::{Contract, MarketSignal, OptionRight, Position, ReasonCode},
    };

    #[test]
    fn stats_count_actionable_decisions() {
        let position = Position {
            symbol: "AAPL".to_string(),
            side: OptionRight::Put,
            strike: dec!(180),
            expiry: NaiveDate::from_ymd_opt(2026, 1, 25).unwrap(),
            open_premium: dec!(2.00),
            current_price: dec!(1.50),
            quantity: -1,
            cost_basis: None,
        };
        let contract = Contract {
            symbol: "SPY".to_string(),
            side: OptionRight::Put,
            strike: dec!(450),
            expiry: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            delta: -0.30,
            bid_price: dec!(3.0),
            ask_price: dec!(3.2),
            open_interest: 500,
        };
        let report = CycleReport {
            cycle_id: "c1".to_string(),
            started_at: Utc::now(),
            assessment: RegimeClassifier::default().assess(&MarketSignal::new(22.0, 1.5, 18.0)),
            records: vec![
                DecisionRecord::held(&position, Decision::Roll {
                    new_expiry: NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(),
                    reason: ReasonCode::DteRoll,
                }),
                DecisionRecord::candidate("SPY", OptionRight::Put, Decision::Open { contract, quantity: 5 }),
                DecisionRecord::candidate("QQQ", OptionRight::Put, Decision::Skip {
                    reason: ReasonCode::NoEligibleContract,
                }),
            ],
            failed_symbols: vec!["TSLA".to_string()],
        };

        let mut stats = SessionStats::default();
        stats.record(&report);
        assert_eq!((stats.opens, stats.rolls, stats.closes), (1, 1, 0));
        assert_eq!(stats.partial_cycles, 1);
        assert!(describe(&report.records[1]).contains("OPEN 5 x 450P"));
    }
}
