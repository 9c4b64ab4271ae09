//! Decision types emitted by the engine

use chrono::NaiveDate;
use serde::Serialize;
use super::{Contract, OptionRight, Position};

/// Machine-readable reason attached to every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReasonCode {
    ProfitTarget,
    PreEarningsDerisk,
    DteRoll,
    Expired,
    TradingPaused,
    RegimePaused,
    WithinThresholds,
    InvalidPosition,
    NoEligibleContract,
    ZeroSize,
    SymbolCapReached,
    WriteConditionNotMet,
    DataUnavailable,
    NewEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Hold { reason: ReasonCode },
    Close { reason: ReasonCode },
    Roll { new_expiry: NaiveDate, reason: ReasonCode },
    Open { contract: Contract, quantity: u32 },
    Skip { reason: ReasonCode },
}

impl Decision {
    pub fn reason(&self) -> ReasonCode {
        match self {
            Decision::Hold { reason }
            | Decision::Close { reason }
            | Decision::Roll { reason, .. }
            | Decision::Skip { reason } => *reason,
            Decision::Open { .. } => ReasonCode::NewEntry,
        }
    }

    /// True for decisions the order layer has to act on.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Decision::Close { .. } | Decision::Roll { .. } | Decision::Open { .. }
        )
    }
}

/// What a decision was made about: a held position or an empty slot for a new entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Held { position: Position },
    Candidate { side: OptionRight },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub symbol: String,
    pub subject: Subject,
    pub decision: Decision,
}

impl DecisionRecord {
    pub fn held(position: &Position, decision: Decision) -> Self {
        Self {
            symbol: position.symbol.clone(),
            subject: Subject::Held { position: position.clone() },
            decision,
        }
    }

    pub fn candidate(symbol: &str, side: OptionRight, decision: Decision) -> Self {
        Self {
            symbol: symbol.to_string(),
            subject: Subject::Candidate { side },
            decision,
        }
    }
}
