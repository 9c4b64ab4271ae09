//! Option chain contract selection
//!
//! Filters a chain snapshot down to eligible contracts and picks the one
//! whose delta magnitude is closest to the target. Ties go to the higher
//! open interest, then to the richer mid price.
//!
//! A forced expiry (the earnings-week override) replaces DTE targeting
//! entirely, even when that expiry falls outside the DTE range.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::trace;
use crate::types::{Contract, OptionRight};

/// Delta distances are compared at this resolution so quotes like 0.25 and
/// 0.35 sit at the same distance from 0.30.
const DELTA_RESOLUTION: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DteRange {
    pub min: i64,
    pub max: i64,
}

impl DteRange {
    pub fn contains(&self, dte: i64) -> bool {
        dte >= self.min && dte <= self.max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionCriteria {
    pub side: OptionRight,
    /// Positive delta magnitude; compared against |contract.delta|
    pub target_delta: f64,
    pub dte_range: DteRange,
    pub min_open_interest: u64,
    pub min_credit: Decimal,
    pub forced_expiry: Option<NaiveDate>,
}

pub fn select(chain: &[Contract], criteria: &SelectionCriteria, now: NaiveDate) -> Option<Contract> {
    let survivors: Vec<&Contract> = chain
        .iter()
        .filter(|c| is_eligible(c, criteria, now))
        .collect();

    if survivors.is_empty() {
        trace!(side = ?criteria.side, chain_len = chain.len(), "No eligible contracts");
        return None;
    }

    let target = clamp_target(criteria.target_delta, &survivors);

    survivors
        .into_iter()
        .min_by(|a, b| rank(a, b, target))
        .cloned()
}

fn is_eligible(contract: &Contract, criteria: &SelectionCriteria, now: NaiveDate) -> bool {
    if contract.side != criteria.side {
        return false;
    }
    if !contract.delta.is_finite() || contract.delta.abs() > 1.0 {
        return false;
    }
    if contract.bid_price < Decimal::ZERO || contract.ask_price < contract.bid_price {
        return false;
    }

    let dte = contract.days_to_expiry(now);
    if dte < 0 {
        return false;
    }
    let expiry_ok = match criteria.forced_expiry {
        Some(forced) => contract.expiry == forced,
        None => criteria.dte_range.contains(dte),
    };
    if !expiry_ok {
        return false;
    }

    contract.open_interest >= criteria.min_open_interest
        && contract.mid_price().is_some_and(|mid| mid >= criteria.min_credit)
}

/// Pulls the target into the delta span actually on offer instead of extrapolating past it.
fn clamp_target(target: f64, survivors: &[&Contract]) -> f64 {
    let (lo, hi) = survivors.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
        let d = c.delta.abs();
        (lo.min(d), hi.max(d))
    });
    if !target.is_finite() {
        return lo;
    }
    target.clamp(lo, hi)
}

fn delta_distance(contract: &Contract, target: f64) -> i64 {
    ((contract.delta.abs() - target).abs() * DELTA_RESOLUTION).round() as i64
}

fn rank(a: &Contract, b: &Contract, target: f64) -> Ordering {
    delta_distance(a, target)
        .cmp(&delta_distance(b, target))
        .then_with(|| b.open_interest.cmp(&a.open_interest))
        .then_with(|| b.mid_price().cmp(&a.mid_price()))
        .then_with(|| a.expiry.cmp(&b.expiry))
        .then_with(|| a.strike.cmp(&b.strike))
}
