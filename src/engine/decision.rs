//! Position decision engine
//!
//! Each held position runs through ordered checks and the first that fires
//! decides: trading pause, pre-earnings de-risk, profit target, DTE roll,
//! expiry. Everything else holds. Entries for empty slots go through the
//! chain selector and the regime-scaled size cap.
//!
//! The engine is a pure function of its inputs. It never mutates a position
//! and never fails; malformed inputs come back as `Hold`/`Skip` with a reason.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, trace};
use crate::{
    calendar::friday_on_or_after,
    selector::{select, SelectionCriteria},
    types::{
        days_to_expiry, Contract, Decision, EarningsWindow, OptionRight, Position, ReasonCode,
        Regime, RiskScaling,
    },
};
use super::EnginePolicy;

/// Inputs for evaluating an empty (symbol, side) slot.
#[derive(Debug, Clone, Copy)]
pub struct EntryRequest<'a> {
    pub symbol: &'a str,
    pub side: OptionRight,
    pub chain: &'a [Contract],
    pub earnings: Option<&'a EarningsWindow>,
    pub underlying_change_pct: Option<f64>,
    /// Contracts already held on this symbol across both sides
    pub contracts_held: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    policy: EnginePolicy,
}

/// Fraction of the opening premium captured so far; positive is profit.
/// `None` when the opening premium is not positive or the ratio overflows.
pub fn pnl_ratio(position: &Position) -> Option<Decimal> {
    if position.open_premium <= Decimal::ZERO {
        return None;
    }
    position
        .open_premium
        .checked_sub(position.current_price)?
        .checked_div(position.open_premium)
}

impl DecisionEngine {
    pub fn new(policy: EnginePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    pub fn decide(
        &self,
        position: &Position,
        regime: Regime,
        scaling: &RiskScaling,
        earnings: Option<&EarningsWindow>,
        now: NaiveDate,
    ) -> Decision {
        let decision = self.evaluate_held(position, scaling, earnings, now);
        debug!(
            symbol = %position.symbol,
            side = position.side.label(),
            strike = %position.strike,
            expiry = %position.expiry,
            regime = regime.label(),
            reason = ?decision.reason(),
            "Evaluated held position"
        );
        decision
    }

    fn evaluate_held(
        &self,
        position: &Position,
        scaling: &RiskScaling,
        earnings: Option<&EarningsWindow>,
        now: NaiveDate,
    ) -> Decision {
        let policy = &self.policy;

        // No new risk and no regime-driven closes while paused
        if scaling.trading_paused {
            return Decision::Hold { reason: ReasonCode::TradingPaused };
        }

        let Some(pnl) = pnl_ratio(position).filter(|_| position.quantity != 0) else {
            return Decision::Hold { reason: ReasonCode::InvalidPosition };
        };

        if policy.close_before_earnings {
            if let Some(window) = earnings {
                let days_until = window.days_until_earnings(now);
                if (0..=policy.days_before_earnings).contains(&days_until) {
                    return Decision::Close { reason: ReasonCode::PreEarningsDerisk };
                }
            }
        }

        if pnl >= policy.profit_target_ratio {
            return Decision::Close { reason: ReasonCode::ProfitTarget };
        }

        let dte = days_to_expiry(position.expiry, now);
        trace!(symbol = %position.symbol, %pnl, dte, "Position metrics");

        if dte <= policy.roll_dte_threshold && pnl >= policy.min_roll_pnl {
            return Decision::Roll {
                new_expiry: self.roll_target(position, earnings, now),
                reason: ReasonCode::DteRoll,
            };
        }

        if dte <= 0 {
            return Decision::Close { reason: ReasonCode::Expired };
        }

        Decision::Hold { reason: ReasonCode::WithinThresholds }
    }

    /// Earnings-week Friday when it is later than the current expiry and within
    /// the DTE range, otherwise the first Friday after the standard target DTE.
    pub fn roll_target(
        &self,
        position: &Position,
        earnings: Option<&EarningsWindow>,
        now: NaiveDate,
    ) -> NaiveDate {
        if let Some(friday) = self.earnings_expiry(earnings, now) {
            let dte = days_to_expiry(friday, now);
            if friday > position.expiry && dte <= self.policy.dte_range.max {
                return friday;
            }
        }
        friday_on_or_after(now + Duration::days(self.policy.target_dte))
    }

    fn earnings_expiry(&self, earnings: Option<&EarningsWindow>, now: NaiveDate) -> Option<NaiveDate> {
        if !self.policy.earnings_expiry_override {
            return None;
        }
        // Entries take the earnings Friday wherever it falls ahead of today.
        let friday = earnings?.same_week_friday_expiry;
        (days_to_expiry(friday, now) >= 0).then_some(friday)
    }

    pub fn decide_entry(&self, request: &EntryRequest<'_>, scaling: &RiskScaling, now: NaiveDate) -> Decision {
        let decision = self.evaluate_entry(request, scaling, now);
        debug!(
            symbol = request.symbol,
            side = request.side.label(),
            chain_len = request.chain.len(),
            reason = ?decision.reason(),
            "Evaluated entry candidate"
        );
        decision
    }

    fn evaluate_entry(&self, request: &EntryRequest<'_>, scaling: &RiskScaling, now: NaiveDate) -> Decision {
        let policy = &self.policy;

        if scaling.trading_paused {
            return Decision::Skip { reason: ReasonCode::RegimePaused };
        }

        if !policy.write_when.permits(request.side, request.underlying_change_pct) {
            return Decision::Skip { reason: ReasonCode::WriteConditionNotMet };
        }

        let criteria = SelectionCriteria {
            side: request.side,
            target_delta: policy.base_delta + scaling.delta_adjustment,
            dte_range: policy.dte_range,
            min_open_interest: policy.min_open_interest,
            min_credit: policy.min_credit,
            forced_expiry: self.earnings_expiry(request.earnings, now),
        };

        let Some(contract) = select(request.chain, &criteria, now) else {
            return Decision::Skip { reason: ReasonCode::NoEligibleContract };
        };

        match self.allowed_contracts(scaling, request.contracts_held) {
            Ok(quantity) => Decision::Open { contract, quantity },
            Err(reason) => Decision::Skip { reason },
        }
    }

    /// Regime-scaled base cap, limited per trade and by the room left on the symbol.
    pub fn allowed_contracts(&self, scaling: &RiskScaling, contracts_held: u32) -> Result<u32, ReasonCode> {
        let policy = &self.policy;
        let multiplier = scaling.position_size_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ReasonCode::ZeroSize);
        }

        // Epsilon keeps 5 x 1.2 from landing at 5.999...
        let scaled = (policy.base_position_cap as f64 * multiplier + 1e-9).floor();
        let per_trade = (scaled.min(u32::MAX as f64) as u32).min(policy.max_contracts_per_trade);
        if per_trade == 0 {
            return Err(ReasonCode::ZeroSize);
        }

        let room = policy.max_contracts_per_symbol.saturating_sub(contracts_held);
        if room == 0 {
            return Err(ReasonCode::SymbolCapReached);
        }
        Ok(per_trade.min(room))
    }
}
