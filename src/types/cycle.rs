//! Per-cycle aggregate handed to the decision sink

use chrono::{DateTime, Utc};
use serde::Serialize;
use super::{DecisionRecord, RegimeAssessment};

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub started_at: DateTime<Utc>,
    pub assessment: RegimeAssessment,
    pub records: Vec<DecisionRecord>,
    /// Symbols whose evaluation failed outright; none of their decisions are in `records`
    pub failed_symbols: Vec<String>,
}

impl CycleReport {
    pub fn actionable(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.records.iter().filter(|r| r.decision.is_actionable())
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_symbols.is_empty()
    }
}
