//! Position management policy values

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use crate::{
    errors::{EngineError, EngineResult},
    selector::DteRange,
    types::OptionRight,
};

#[derive(Debug, Clone, PartialEq)]
pub struct EnginePolicy {
    pub profit_target_ratio: Decimal,
    pub roll_dte_threshold: i64,
    pub min_roll_pnl: Decimal,
    pub base_delta: f64,
    pub target_dte: i64,
    pub dte_range: DteRange,
    pub min_open_interest: u64,
    pub min_credit: Decimal,
    pub base_position_cap: u32,
    pub max_contracts_per_trade: u32,
    pub max_contracts_per_symbol: u32,
    pub close_before_earnings: bool,
    pub days_before_earnings: i64,
    /// Target the earnings-week Friday for entries and rolls when a window is known
    pub earnings_expiry_override: bool,
    pub write_when: WriteWhen,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            profit_target_ratio: dec!(0.5),
            roll_dte_threshold: 15,
            min_roll_pnl: dec!(0.0),
            base_delta: 0.30,
            target_dte: 45,
            dte_range: DteRange { min: 7, max: 60 },
            min_open_interest: 10,
            min_credit: dec!(0.05),
            base_position_cap: 5,
            max_contracts_per_trade: 5,
            max_contracts_per_symbol: 10,
            close_before_earnings: false,
            days_before_earnings: 1,
            earnings_expiry_override: true,
            write_when: WriteWhen::default(),
        }
    }
}

impl EnginePolicy {
    pub fn validate(&self) -> EngineResult<()> {
        if self.profit_target_ratio <= Decimal::ZERO || self.profit_target_ratio > Decimal::ONE {
            return Err(EngineError::invalid_config(
                "profit_target_ratio",
                format!("must be in (0, 1], got {}", self.profit_target_ratio),
            ));
        }
        if !(self.base_delta > 0.0 && self.base_delta < 1.0) {
            return Err(EngineError::invalid_config(
                "base_delta",
                format!("must be in (0, 1), got {}", self.base_delta),
            ));
        }
        if self.dte_range.min < 0 || self.dte_range.min > self.dte_range.max {
            return Err(EngineError::invalid_config(
                "dte_range",
                format!("expected 0 <= min <= max, got {}..{}", self.dte_range.min, self.dte_range.max),
            ));
        }
        if self.target_dte <= 0 {
            return Err(EngineError::invalid_config("target_dte", "must be positive"));
        }
        if self.roll_dte_threshold < 0 {
            return Err(EngineError::invalid_config("roll_dte_threshold", "must not be negative"));
        }
        if self.days_before_earnings < 0 {
            return Err(EngineError::invalid_config("days_before_earnings", "must not be negative"));
        }
        // A zero cap would turn every entry into a ZeroSize skip
        if self.base_position_cap == 0 {
            return Err(EngineError::invalid_config("base_position_cap", "must be at least 1"));
        }
        if self.max_contracts_per_trade == 0 {
            return Err(EngineError::invalid_config("max_contracts_per_trade", "must be at least 1"));
        }
        if self.max_contracts_per_symbol == 0 {
            return Err(EngineError::invalid_config("max_contracts_per_symbol", "must be at least 1"));
        }
        if self.min_credit < Decimal::ZERO {
            return Err(EngineError::invalid_config("min_credit", "must not be negative"));
        }
        if !self.write_when.threshold_pct.is_finite() || self.write_when.threshold_pct < 0.0 {
            return Err(EngineError::invalid_config("write_when_threshold_pct", "must be >= 0"));
        }
        Ok(())
    }
}

/// Only write puts on down days and calls on up days.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteWhen {
    pub puts_on_red: bool,
    pub calls_on_green: bool,
    pub threshold_pct: f64,
}

impl Default for WriteWhen {
    fn default() -> Self {
        Self {
            puts_on_red: false,
            calls_on_green: false,
            threshold_pct: 1.0,
        }
    }
}

impl WriteWhen {
    /// Unknown price change fails a gated side.
    pub fn permits(&self, side: OptionRight, change_pct: Option<f64>) -> bool {
        let gated = match side {
            OptionRight::Put => self.puts_on_red,
            OptionRight::Call => self.calls_on_green,
        };
        if !gated {
            return true;
        }
        match (side, change_pct) {
            (_, None) => false,
            (OptionRight::Put, Some(pct)) => pct < -self.threshold_pct,
            (OptionRight::Call, Some(pct)) => pct > self.threshold_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        assert!(EnginePolicy::default().validate().is_ok());
    }

    #[test]
    fn zero_contract_caps_are_rejected() {
        let zero_base = EnginePolicy {
            base_position_cap: 0,
            ..EnginePolicy::default()
        };
        assert!(matches!(
            zero_base.validate(),
            Err(EngineError::InvalidConfiguration { field: "base_position_cap", .. })
        ));

        let zero_trade = EnginePolicy {
            max_contracts_per_trade: 0,
            ..EnginePolicy::default()
        };
        assert!(matches!(
            zero_trade.validate(),
            Err(EngineError::InvalidConfiguration { field: "max_contracts_per_trade", .. })
        ));

        let zero_symbol = EnginePolicy {
            max_contracts_per_symbol: 0,
            ..EnginePolicy::default()
        };
        assert!(zero_symbol.validate().is_err());
    }

    #[test]
    fn profit_target_bounds() {
        let mut policy = EnginePolicy::default();
        policy.profit_target_ratio = dec!(0);
        assert!(policy.validate().is_err());
        policy.profit_target_ratio = dec!(1.0);
        assert!(policy.validate().is_ok());
        policy.profit_target_ratio = dec!(1.01);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn write_when_gates_each_side_independently() {
        let gate = WriteWhen {
            puts_on_red: true,
            calls_on_green: false,
            threshold_pct: 1.0,
        };
        assert!(gate.permits(OptionRight::Put, Some(-1.5)));
        assert!(!gate.permits(OptionRight::Put, Some(-0.5)));
        assert!(!gate.permits(OptionRight::Put, None));
        assert!(gate.permits(OptionRight::Call, None));
    }
}
