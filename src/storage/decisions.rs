//! Cycle report storage

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use crate::{
    orchestrator::DecisionSink,
    types::{CycleReport, Decision, DecisionRecord},
};

/// One line per actionable decision, for the order layer to consume.
#[derive(Debug, Serialize)]
struct ActionLine<'a> {
    cycle_id: &'a str,
    decided_at: DateTime<Utc>,
    regime: &'a str,
    #[serde(flatten)]
    record: &'a DecisionRecord,
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    writeln!(file, "{}", line)?;
    Ok(())
}

/// Appends the full report to `cycles_<date>.jsonl` and each actionable
/// decision to `actions_<date>.jsonl` under `dir`.
pub fn save_cycle_report(dir: &Path, report: &CycleReport) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let day = report.started_at.format("%Y-%m-%d");

    let cycles = dir.join(format!("cycles_{}.jsonl", day));
    append_line(&cycles, &serde_json::to_string(report)?)?;

    let actions = dir.join(format!("actions_{}.jsonl", day));
    let mut actionable = 0;
    for record in report.actionable() {
        let line = ActionLine {
            cycle_id: &report.cycle_id,
            decided_at: report.started_at,
            regime: report.assessment.regime.label(),
            record,
        };
        append_line(&actions, &serde_json::to_string(&line)?)?;
        actionable += 1;
    }

    let opens = report
        .records
        .iter()
        .filter(|r| matches!(r.decision, Decision::Open { .. }))
        .count();

    info!(
        cycle_id = %report.cycle_id,
        records = report.records.len(),
        actionable,
        opens,
        "Saved cycle report"
    );

    Ok(cycles)
}

/// Decision sink writing JSON lines under `<output_dir>/decisions`.
pub struct JsonlDecisionSink {
    dir: PathBuf,
}

impl JsonlDecisionSink {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: output_dir.as_ref().join("decisions"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DecisionSink for JsonlDecisionSink {
    async fn emit(&self, report: &CycleReport) -> Result<()> {
        save_cycle_report(&self.dir, report)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;
    use crate::{
        regime::RegimeClassifier,
        types::{MarketSignal, OptionRight, Position, ReasonCode},
    };

    fn report() -> CycleReport {
        let position = Position {
            symbol: "SPY".to_string(),
            side: OptionRight::Put,
            strike: dec!(450),
            expiry: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            open_premium: dec!(4.00),
            current_price: dec!(1.90),
            quantity: -3,
            cost_basis: None,
        };
        CycleReport {
            cycle_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            assessment: RegimeClassifier::default().assess(&MarketSignal::new(22.0, 1.5, 18.0)),
            records: vec![
                DecisionRecord::held(&position, Decision::Close { reason: ReasonCode::ProfitTarget }),
                DecisionRecord::candidate("QQQ", OptionRight::Put, Decision::Skip {
                    reason: ReasonCode::NoEligibleContract,
                }),
            ],
            failed_symbols: vec![],
        }
    }

    #[tokio::test]
    async fn sink_appends_reports_and_actions() {
        let root = std::env::temp_dir().join(format!("theta-engine-{}", Uuid::new_v4()));
        let sink = JsonlDecisionSink::new(&root);

        let report = report();
        sink.emit(&report).await.unwrap();
        sink.emit(&report).await.unwrap();

        let day = report.started_at.format("%Y-%m-%d").to_string();
        let cycles = fs::read_to_string(sink.dir().join(format!("cycles_{}.jsonl", day))).unwrap();
        assert_eq!(cycles.lines().count(), 2);

        let actions = fs::read_to_string(sink.dir().join(format!("actions_{}.jsonl", day))).unwrap();
        assert_eq!(actions.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(actions.lines().next().unwrap()).unwrap();
        assert_eq!(first["symbol"], "SPY");
        assert_eq!(first["regime"], "bull");
        assert_eq!(first["decision"]["action"], "close");
        assert_eq!(first["decision"]["reason"], "ProfitTarget");

        fs::remove_dir_all(&root).ok();
    }
}
