//! Run records: per-step logs and the final verdict

use crate::core::condition::ConditionKind;
use crate::core::rule::Outcome;
use crate::core::step::StepType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Key under which a risk-scoring step reports its score
pub const RISK_SCORE_KEY: &str = "risk_score";

/// Result of executing one configured step against one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    pub step_type: StepType,
    pub order: u32,
    pub passed: bool,
    /// Step-specific structured data
    pub details: Value,
    pub executed_at: DateTime<Utc>,
}

impl StepLog {
    pub fn new(step_type: StepType, order: u32, passed: bool, details: Value) -> Self {
        Self {
            step_type,
            order,
            passed,
            details,
            executed_at: Utc::now(),
        }
    }

    /// Numeric risk score reported by this log, if any
    pub fn risk_score(&self) -> Option<f64> {
        self.details.get(RISK_SCORE_KEY).and_then(Value::as_f64)
    }
}

/// The run-level risk score: the last risk-scoring log that reported one
pub fn risk_score_from_logs(step_logs: &[StepLog]) -> Option<f64> {
    step_logs
        .iter()
        .rev()
        .filter(|log| log.step_type == StepType::RiskScoring)
        .find_map(StepLog::risk_score)
}

/// Which terminal rule decided a run, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Order of the rule that matched
    pub rule_order: u32,
    pub condition: ConditionKind,
    pub reason: String,
}

/// One execution of a pipeline definition against one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub application_id: i64,
    /// Stored pipeline id, 0 for a definition that was never stored
    pub pipeline_id: i64,
    pub status: Outcome,
    pub step_logs: Vec<StepLog>,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Run {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepLog> {
        self.step_logs.iter().filter(|log| !log.passed)
    }

    pub fn risk_score(&self) -> Option<f64> {
        risk_score_from_logs(&self.step_logs)
    }
}
