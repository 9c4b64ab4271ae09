//! Market signal derivation from benchmark closes

use std::collections::VecDeque;
use tracing::warn;
use crate::types::MarketSignal;

const SHORT_MA: usize = 10;
const LONG_MA: usize = 20;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Bounded window of daily benchmark closes, oldest first.
pub struct PriceWindow {
    closes: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        PriceWindow {
            closes: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
        }
    }

    pub fn from_closes(closes: &[f64], capacity: usize) -> Self {
        let mut window = Self::new(capacity);
        for close in closes {
            window.add_close(*close);
        }
        window
    }

    pub fn add_close(&mut self, close: f64) {
        if !close.is_finite() || close <= 0.0 {
            warn!("Ignoring invalid benchmark close: {}", close);
            return;
        }
        self.closes.push_back(close);
        while self.closes.len() > self.capacity {
            self.closes.pop_front();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.closes.len()
    }

    fn tail_mean(&self, n: usize) -> Option<f64> {
        let len = self.closes.len();
        if len == 0 {
            return None;
        }
        let take = n.min(len);
        let sum: f64 = self.closes.iter().skip(len - take).sum();
        Some(sum / take as f64)
    }

    /// Short moving average against the long one, in percent. Zero with fewer than ten closes.
    pub fn trend_percent(&self) -> f64 {
        if self.closes.len() < SHORT_MA {
            return 0.0;
        }
        match (self.tail_mean(SHORT_MA), self.tail_mean(LONG_MA)) {
            (Some(short), Some(long)) if long > 0.0 => (short - long) / long * 100.0,
            _ => 0.0,
        }
    }

    /// Annualised standard deviation of daily log returns, in percent.
    pub fn realized_volatility_percent(&self) -> f64 {
        if self.closes.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = self
            .closes
            .iter()
            .zip(self.closes.iter().skip(1))
            .map(|(prev, next)| (next / prev).ln())
            .collect();
        let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance: f64 =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;

        variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
    }
}

impl MarketSignal {
    /// Builds a signal from the volatility index and recent benchmark closes.
    pub fn from_closes(volatility_index_level: f64, closes: &[f64]) -> Self {
        let window = PriceWindow::from_closes(closes, LONG_MA.max(closes.len()));
        MarketSignal {
            volatility_index_level,
            benchmark_trend_percent: window.trend_percent(),
            realized_volatility_percent: window.realized_volatility_percent(),
        }
    }
}
