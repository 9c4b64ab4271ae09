//! Engine configuration settings and environment variable handling

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use crate::{
    engine::{EnginePolicy, WriteWhen},
    errors::{EngineError, EngineResult},
    regime::RegimeConfig,
    selector::DteRange,
};

// Volatility index thresholds
pub const DEFAULT_VIX_PAUSE: f64 = 40.0;
pub const DEFAULT_VIX_HIGH: f64 = 30.0;
pub const DEFAULT_VIX_LOW: f64 = 25.0;

// Position management constants
pub const DEFAULT_PROFIT_TARGET: Decimal = dec!(0.5);
pub const DEFAULT_ROLL_DTE: i64 = 15;
pub const DEFAULT_TARGET_DTE: i64 = 45;
pub const DEFAULT_BASE_DELTA: f64 = 0.30;
pub const MAX_CONTRACTS_HARD_CAP: u32 = 100;

// Cycle constants
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
pub const MAX_CONCURRENT_SYMBOLS_CAP: usize = 64;
pub const MIN_CYCLE_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAX_SNAPSHOT_AGE_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub trade_puts: bool,
    pub trade_calls: bool,
    pub regime: RegimeConfig,
    pub policy: EnginePolicy,
    // Cycle execution
    pub max_concurrent_symbols: usize,
    pub fetch_timeout_ms: u64,
    pub cycle_interval_secs: u64,
    pub snapshot_path: String,
    /// Older snapshots are treated as unavailable data
    pub max_snapshot_age_secs: u64,
    pub output_dir: String,
    // Failure containment
    pub max_consecutive_errors: u32,
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".to_string(), "QQQ".to_string()],
            trade_puts: true,
            trade_calls: false,
            regime: RegimeConfig::default(),
            policy: EnginePolicy::default(),
            max_concurrent_symbols: 4,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            cycle_interval_secs: 60,
            snapshot_path: "snapshot.json".to_string(),
            max_snapshot_age_secs: DEFAULT_MAX_SNAPSHOT_AGE_SECS,
            output_dir: "output".to_string(),
            max_consecutive_errors: 5,
            circuit_breaker_cooldown_secs: 300, // 5 minutes
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_decimal(key: &str) -> Option<Decimal> {
    env::var(key).ok().and_then(|s| Decimal::from_str(s.trim()).ok())
}

impl Config {
    pub fn load() -> Self {
        let defaults = Self::default();
        let regime_defaults = RegimeConfig::default();
        let policy_defaults = EnginePolicy::default();

        let regime = RegimeConfig {
            pause_threshold: env_parse("VIX_PAUSE_THRESHOLD").unwrap_or(DEFAULT_VIX_PAUSE),
            high_vol_threshold: env_parse("VIX_HIGH_THRESHOLD").unwrap_or(DEFAULT_VIX_HIGH),
            low_vol_threshold: env_parse("VIX_LOW_THRESHOLD").unwrap_or(DEFAULT_VIX_LOW),
            bull_size_multiplier: env_parse("BULL_SIZE_MULTIPLIER")
                .unwrap_or(regime_defaults.bull_size_multiplier),
            bear_size_multiplier: env_parse("BEAR_SIZE_MULTIPLIER")
                .unwrap_or(regime_defaults.bear_size_multiplier),
            high_vol_size_multiplier: env_parse("HIGH_VOL_SIZE_MULTIPLIER")
                .unwrap_or(regime_defaults.high_vol_size_multiplier),
            bull_delta_adjustment: env_parse("BULL_DELTA_ADJUSTMENT")
                .unwrap_or(regime_defaults.bull_delta_adjustment),
            bear_delta_adjustment: env_parse("BEAR_DELTA_ADJUSTMENT")
                .unwrap_or(regime_defaults.bear_delta_adjustment),
            high_vol_delta_adjustment: env_parse("HIGH_VOL_DELTA_ADJUSTMENT")
                .unwrap_or(regime_defaults.high_vol_delta_adjustment),
        };

        let policy = EnginePolicy {
            profit_target_ratio: env_decimal("PROFIT_TARGET_RATIO").unwrap_or(DEFAULT_PROFIT_TARGET),
            roll_dte_threshold: env_parse("ROLL_DTE_THRESHOLD").unwrap_or(DEFAULT_ROLL_DTE),
            min_roll_pnl: env_decimal("MIN_ROLL_PNL").unwrap_or(policy_defaults.min_roll_pnl),
            base_delta: env_parse("BASE_DELTA").unwrap_or(DEFAULT_BASE_DELTA),
            target_dte: env_parse("TARGET_DTE").unwrap_or(DEFAULT_TARGET_DTE),
            dte_range: DteRange {
                min: env_parse("DTE_MIN").unwrap_or(policy_defaults.dte_range.min),
                max: env_parse("DTE_MAX").unwrap_or(policy_defaults.dte_range.max),
            },
            min_open_interest: env_parse("MIN_OPEN_INTEREST")
                .unwrap_or(policy_defaults.min_open_interest),
            min_credit: env_decimal("MIN_CREDIT").unwrap_or(policy_defaults.min_credit),
            base_position_cap: env_parse("BASE_POSITION_CAP")
                .unwrap_or(policy_defaults.base_position_cap)
                .min(MAX_CONTRACTS_HARD_CAP),
            max_contracts_per_trade: env_parse("MAX_CONTRACTS_PER_TRADE")
                .unwrap_or(policy_defaults.max_contracts_per_trade)
                .min(MAX_CONTRACTS_HARD_CAP),
            max_contracts_per_symbol: env_parse("MAX_CONTRACTS_PER_SYMBOL")
                .unwrap_or(policy_defaults.max_contracts_per_symbol)
                .min(MAX_CONTRACTS_HARD_CAP),
            close_before_earnings: env_parse("CLOSE_BEFORE_EARNINGS")
                .unwrap_or(policy_defaults.close_before_earnings),
            days_before_earnings: env_parse("DAYS_BEFORE_EARNINGS")
                .unwrap_or(policy_defaults.days_before_earnings),
            earnings_expiry_override: env_parse("EARNINGS_EXPIRY_OVERRIDE")
                .unwrap_or(policy_defaults.earnings_expiry_override),
            write_when: WriteWhen {
                puts_on_red: env_parse("WRITE_PUTS_WHEN_RED").unwrap_or(false),
                calls_on_green: env_parse("WRITE_CALLS_WHEN_GREEN").unwrap_or(false),
                threshold_pct: env_parse("WRITE_WHEN_THRESHOLD_PCT")
                    .unwrap_or(policy_defaults.write_when.threshold_pct),
            },
        };

        Self {
            symbols: env::var("SYMBOLS")
                .ok()
                .map(|s| parse_symbols(&s))
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.symbols),
            trade_puts: env_parse("TRADE_PUTS").unwrap_or(defaults.trade_puts),
            trade_calls: env_parse("TRADE_CALLS").unwrap_or(defaults.trade_calls),
            regime,
            policy,
            max_concurrent_symbols: env_parse("MAX_CONCURRENT_SYMBOLS")
                .unwrap_or(defaults.max_concurrent_symbols)
                .min(MAX_CONCURRENT_SYMBOLS_CAP),
            fetch_timeout_ms: env_parse("FETCH_TIMEOUT_MS").unwrap_or(defaults.fetch_timeout_ms),
            cycle_interval_secs: env_parse("CYCLE_INTERVAL_SECS")
                .unwrap_or(defaults.cycle_interval_secs)
                .max(MIN_CYCLE_INTERVAL_SECS),
            snapshot_path: env::var("SNAPSHOT_PATH").unwrap_or(defaults.snapshot_path),
            max_snapshot_age_secs: env_parse("MAX_SNAPSHOT_AGE_SECS")
                .unwrap_or(defaults.max_snapshot_age_secs),
            output_dir: env::var("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            max_consecutive_errors: env_parse("MAX_CONSECUTIVE_ERRORS")
                .unwrap_or(defaults.max_consecutive_errors)
                .max(1),
            circuit_breaker_cooldown_secs: env_parse("CIRCUIT_BREAKER_COOLDOWN_SECS")
                .unwrap_or(defaults.circuit_breaker_cooldown_secs),
        }
    }

    /// Rejects inverted or out-of-range settings. Called once at startup.
    pub fn validate(&self) -> EngineResult<()> {
        self.regime.validate()?;
        self.policy.validate()?;

        if !self.trade_puts && !self.trade_calls {
            return Err(EngineError::invalid_config(
                "trade_puts/trade_calls",
                "at least one side must be enabled",
            ));
        }
        if self.max_concurrent_symbols == 0 {
            return Err(EngineError::invalid_config("max_concurrent_symbols", "must be at least 1"));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(EngineError::invalid_config("fetch_timeout_ms", "must be positive"));
        }
        if self.max_snapshot_age_secs == 0 {
            return Err(EngineError::invalid_config("max_snapshot_age_secs", "must be positive"));
        }
        Ok(())
    }

    pub fn sides(&self) -> Vec<crate::types::OptionRight> {
        use crate::types::OptionRight;
        let mut sides = Vec::with_capacity(2);
        if self.trade_puts {
            sides.push(OptionRight::Put);
        }
        if self.trade_calls {
            sides.push(OptionRight::Call);
        }
        sides
    }
}

pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}
