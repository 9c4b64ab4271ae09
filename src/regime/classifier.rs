//! Market regime classification
//!
//! Turns one [`MarketSignal`] into exactly one [`Regime`] plus the risk
//! scaling every position evaluation in the cycle shares. Rules are checked
//! in priority order and the first match wins:
//!
//! 1. volatility index above the pause threshold: `Paused`
//! 2. volatility index above the high-vol threshold: `HighVolatility`
//! 3. positive benchmark trend with volatility below the low threshold: `Bull`
//! 4. negative benchmark trend with volatility above the low threshold: `Bear`
//! 5. anything else: `Sideways`
//!
//! High volatility moves the delta target further out of the money (a
//! negative adjustment), as does a bear regime.

use tracing::debug;
use crate::{
    config::{DEFAULT_VIX_HIGH, DEFAULT_VIX_LOW, DEFAULT_VIX_PAUSE},
    errors::{EngineError, EngineResult},
    types::{MarketSignal, Regime, RegimeAssessment, RiskScaling},
};

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub pause_threshold: f64,
    pub high_vol_threshold: f64,
    pub low_vol_threshold: f64,
    pub bull_size_multiplier: f64,
    pub bear_size_multiplier: f64,
    pub high_vol_size_multiplier: f64,
    pub bull_delta_adjustment: f64,
    pub bear_delta_adjustment: f64,
    pub high_vol_delta_adjustment: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            pause_threshold: DEFAULT_VIX_PAUSE,
            high_vol_threshold: DEFAULT_VIX_HIGH,
            low_vol_threshold: DEFAULT_VIX_LOW,
            bull_size_multiplier: 1.2,
            bear_size_multiplier: 0.7,
            high_vol_size_multiplier: 0.5,
            bull_delta_adjustment: 0.02,
            bear_delta_adjustment: -0.03,
            high_vol_delta_adjustment: -0.05,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let thresholds = [self.low_vol_threshold, self.high_vol_threshold, self.pause_threshold];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(EngineError::invalid_config("vix thresholds", "must be finite"));
        }
        if !(self.low_vol_threshold < self.high_vol_threshold
            && self.high_vol_threshold < self.pause_threshold)
        {
            return Err(EngineError::invalid_config(
                "vix thresholds",
                format!(
                    "expected low < high < pause, got {} / {} / {}",
                    self.low_vol_threshold, self.high_vol_threshold, self.pause_threshold
                ),
            ));
        }

        let multipliers = [
            ("bull_size_multiplier", self.bull_size_multiplier),
            ("bear_size_multiplier", self.bear_size_multiplier),
            ("high_vol_size_multiplier", self.high_vol_size_multiplier),
        ];
        for (field, value) in multipliers {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::invalid_config(field, format!("must be > 0, got {}", value)));
            }
        }
        Ok(())
    }

    fn scaling_for(&self, regime: Regime) -> RiskScaling {
        match regime {
            Regime::Paused => RiskScaling::paused(),
            Regime::HighVolatility => RiskScaling {
                position_size_multiplier: self.high_vol_size_multiplier,
                delta_adjustment: self.high_vol_delta_adjustment,
                trading_paused: false,
            },
            Regime::Bull => RiskScaling {
                position_size_multiplier: self.bull_size_multiplier,
                delta_adjustment: self.bull_delta_adjustment,
                trading_paused: false,
            },
            Regime::Bear => RiskScaling {
                position_size_multiplier: self.bear_size_multiplier,
                delta_adjustment: self.bear_delta_adjustment,
                trading_paused: false,
            },
            Regime::Sideways => RiskScaling::neutral(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn classify(&self, signal: &MarketSignal) -> (Regime, RiskScaling) {
        let regime = self.regime_for(signal);
        (regime, self.config.scaling_for(regime))
    }

    pub fn assess(&self, signal: &MarketSignal) -> RegimeAssessment {
        let (regime, scaling) = self.classify(signal);
        let confidence = confidence(signal);

        debug!(
            regime = regime.label(),
            vix = signal.volatility_index_level,
            trend_pct = signal.benchmark_trend_percent,
            realized_vol_pct = signal.realized_volatility_percent,
            confidence,
            "Classified market regime"
        );

        RegimeAssessment {
            regime,
            scaling,
            confidence,
            signal: *signal,
        }
    }

    fn regime_for(&self, signal: &MarketSignal) -> Regime {
        let vix = signal.volatility_index_level;
        let trend = signal.benchmark_trend_percent;
        let cfg = &self.config;

        if vix > cfg.pause_threshold {
            Regime::Paused
        } else if vix > cfg.high_vol_threshold {
            Regime::HighVolatility
        } else if trend > 0.0 && vix < cfg.low_vol_threshold {
            Regime::Bull
        } else if trend < 0.0 && vix > cfg.low_vol_threshold {
            Regime::Bear
        } else {
            Regime::Sideways
        }
    }
}

/// Convenience wrapper over [`RegimeClassifier::classify`].
pub fn classify(signal: &MarketSignal, config: &RegimeConfig) -> (Regime, RiskScaling) {
    RegimeClassifier::new(config.clone()).classify(signal)
}

/// Agreement of the inputs with a non-neutral reading, 0.0 to 1.0.
fn confidence(signal: &MarketSignal) -> f64 {
    let vix_confidence = ((signal.volatility_index_level - 20.0).abs() / 20.0).min(1.0);
    let trend_confidence = (signal.benchmark_trend_percent.abs() / 2.0).min(1.0);
    let confidence = (vix_confidence + trend_confidence) / 2.0;
    if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 }
}
