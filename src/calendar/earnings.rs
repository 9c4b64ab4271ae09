//! Earnings window construction

use chrono::{Datelike, Duration, NaiveDate};
use crate::types::EarningsWindow;

const EARNINGS_WEEK_DAYS: i64 = 7;

/// Friday of the week containing `date`. Weekend dates roll forward to the next Friday.
pub fn same_week_friday(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().num_days_from_monday() as i64;
    let offset = (4 - weekday).rem_euclid(7);
    date + Duration::days(offset)
}

/// First Friday on or after `date`.
pub fn friday_on_or_after(date: NaiveDate) -> NaiveDate {
    same_week_friday(date)
}

impl EarningsWindow {
    pub fn for_earnings(symbol: &str, earnings_date: NaiveDate) -> Self {
        EarningsWindow {
            symbol: symbol.to_string(),
            earnings_date,
            same_week_friday_expiry: same_week_friday(earnings_date),
        }
    }

    pub fn days_until_earnings(&self, now: NaiveDate) -> i64 {
        (self.earnings_date - now).num_days()
    }

    pub fn is_earnings_week(&self, now: NaiveDate) -> bool {
        (0..=EARNINGS_WEEK_DAYS).contains(&self.days_until_earnings(now))
    }

    pub fn has_passed(&self, now: NaiveDate) -> bool {
        self.earnings_date < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn midweek_earnings_use_that_friday() {
        // 2026-01-28 is a Wednesday
        assert_eq!(same_week_friday(date(2026, 1, 28)), date(2026, 1, 30));
    }

    #[test]
    fn friday_earnings_keep_their_date() {
        assert_eq!(same_week_friday(date(2026, 1, 30)), date(2026, 1, 30));
    }

    #[test]
    fn weekend_earnings_roll_to_next_friday() {
        assert_eq!(same_week_friday(date(2026, 1, 31)), date(2026, 2, 6));
        assert_eq!(same_week_friday(date(2026, 2, 1)), date(2026, 2, 6));
    }

    #[test]
    fn earnings_week_spans_seven_days_ahead() {
        let window = EarningsWindow::for_earnings("AAPL", date(2026, 1, 29));
        assert!(window.is_earnings_week(date(2026, 1, 22)));
        assert!(window.is_earnings_week(date(2026, 1, 29)));
        assert!(!window.is_earnings_week(date(2026, 1, 21)));
        assert!(!window.is_earnings_week(date(2026, 1, 30)));
        assert!(window.has_passed(date(2026, 1, 30)));
    }
}
