//! Option contract types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionRight {
    Put,
    Call,
}

impl OptionRight {
    pub fn label(&self) -> &'static str {
        match self {
            OptionRight::Put => "P",
            OptionRight::Call => "C",
        }
    }
}

/// One line of an option chain snapshot. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub symbol: String,
    pub side: OptionRight,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub delta: f64,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub open_interest: u64,
}

impl Contract {
    /// `None` when the quote is too large to average.
    pub fn mid_price(&self) -> Option<Decimal> {
        self.bid_price.checked_add(self.ask_price)?.checked_div(dec!(2))
    }

    pub fn days_to_expiry(&self, now: NaiveDate) -> i64 {
        days_to_expiry(self.expiry, now)
    }
}

/// Calendar days from `now` until `expiry`; negative once expired.
pub fn days_to_expiry(expiry: NaiveDate, now: NaiveDate) -> i64 {
    (expiry - now).num_days()
}
