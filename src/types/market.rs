//! Market signal and regime types

use serde::{Deserialize, Serialize};

/// Raw market inputs sampled once per decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    pub volatility_index_level: f64,
    /// Benchmark price vs its moving average, in percent (1.5 == +1.5%)
    pub benchmark_trend_percent: f64,
    pub realized_volatility_percent: f64,
}

impl MarketSignal {
    pub fn new(vix: f64, trend_pct: f64, realized_vol_pct: f64) -> Self {
        Self {
            volatility_index_level: vix,
            benchmark_trend_percent: trend_pct,
            realized_volatility_percent: realized_vol_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Bull,
    Bear,
    Sideways,
    HighVolatility,
    Paused,
}

impl Regime {
    pub fn label(&self) -> &'static str {
        match self {
            Regime::Bull => "bull",
            Regime::Bear => "bear",
            Regime::Sideways => "sideways",
            Regime::HighVolatility => "high_volatility",
            Regime::Paused => "paused",
        }
    }
}

/// Risk knobs attached 1:1 to a regime for the duration of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScaling {
    pub position_size_multiplier: f64,
    /// Added to the base delta magnitude before chain selection
    pub delta_adjustment: f64,
    pub trading_paused: bool,
}

impl RiskScaling {
    pub fn neutral() -> Self {
        Self {
            position_size_multiplier: 1.0,
            delta_adjustment: 0.0,
            trading_paused: false,
        }
    }

    pub fn paused() -> Self {
        Self {
            position_size_multiplier: 0.0,
            delta_adjustment: 0.0,
            trading_paused: true,
        }
    }
}

/// Classifier output shared read-only by every per-symbol evaluation in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeAssessment {
    pub regime: Regime,
    pub scaling: RiskScaling,
    /// 0.0 to 1.0, higher when the inputs sit far from neutral levels
    pub confidence: f64,
    pub signal: MarketSignal,
}
