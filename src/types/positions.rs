//! Held position and earnings calendar types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::OptionRight;

/// Snapshot of a short option position as reported by the position store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: OptionRight,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    /// Premium received per contract when the position was opened
    pub open_premium: Decimal,
    /// Current price to buy the position back, per contract
    pub current_price: Decimal,
    pub quantity: i64,
    /// Share cost basis if the underlying was assigned
    #[serde(default)]
    pub cost_basis: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsWindow {
    pub symbol: String,
    pub earnings_date: NaiveDate,
    pub same_week_friday_expiry: NaiveDate,
}
