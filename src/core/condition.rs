//! Terminal-rule condition model

use crate::core::run::StepLog;
use crate::core::step::StepType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Comparison applied between a run's risk score and a rule's threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "==")]
    Equal,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::Equal => "==",
        }
    }

    /// Evaluate `lhs <op> rhs`
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            ComparisonOperator::LessOrEqual => lhs <= rhs,
            ComparisonOperator::GreaterOrEqual => lhs >= rhs,
            ComparisonOperator::Less => lhs < rhs,
            ComparisonOperator::Greater => lhs > rhs,
            ComparisonOperator::Equal => lhs == rhs,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<=" => Ok(ComparisonOperator::LessOrEqual),
            ">=" => Ok(ComparisonOperator::GreaterOrEqual),
            "<" => Ok(ComparisonOperator::Less),
            ">" => Ok(ComparisonOperator::Greater),
            "==" => Ok(ComparisonOperator::Equal),
            other => Err(format!("Unknown operator: {}", other)),
        }
    }
}

/// Variant tag of a [`RuleCondition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    StepFailed,
    RiskThreshold,
    Default,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConditionKind::StepFailed => "step_failed",
            ConditionKind::RiskThreshold => "risk_threshold",
            ConditionKind::Default => "default",
        })
    }
}

/// When a terminal rule applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Any executed step of one of these types failed
    StepFailed {
        #[serde(default)]
        step_types: BTreeSet<StepType>,
    },
    /// The run's risk score compares true against `value`
    RiskThreshold {
        operator: ComparisonOperator,
        value: f64,
    },
    /// Always applies
    Default,
}

/// Result of checking one condition against a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionCheck {
    Matched,
    NotMatched,
    /// The condition needs a signal the run did not produce
    MissingSignal,
}

impl ConditionCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, ConditionCheck::Matched)
    }

    fn from_bool(matched: bool) -> Self {
        if matched {
            ConditionCheck::Matched
        } else {
            ConditionCheck::NotMatched
        }
    }
}

impl RuleCondition {
    /// A fresh condition of `kind` with that kind's default fields
    pub fn default_for(kind: ConditionKind) -> Self {
        match kind {
            ConditionKind::StepFailed => RuleCondition::StepFailed {
                step_types: BTreeSet::new(),
            },
            ConditionKind::RiskThreshold => RuleCondition::RiskThreshold {
                operator: ComparisonOperator::LessOrEqual,
                value: 0.0,
            },
            ConditionKind::Default => RuleCondition::Default,
        }
    }

    pub fn step_failed<I: IntoIterator<Item = StepType>>(step_types: I) -> Self {
        RuleCondition::StepFailed {
            step_types: step_types.into_iter().collect(),
        }
    }

    pub fn risk_threshold(operator: ComparisonOperator, value: f64) -> Self {
        RuleCondition::RiskThreshold { operator, value }
    }

    pub fn kind(&self) -> ConditionKind {
        match self {
            RuleCondition::StepFailed { .. } => ConditionKind::StepFailed,
            RuleCondition::RiskThreshold { .. } => ConditionKind::RiskThreshold,
            RuleCondition::Default => ConditionKind::Default,
        }
    }

    /// True when the condition matches every run
    pub fn is_unconditional(&self) -> bool {
        matches!(self, RuleCondition::Default)
    }

    /// Check the condition against a run's step logs and risk score
    pub fn check(&self, step_logs: &[StepLog], risk_score: Option<f64>) -> ConditionCheck {
        match self {
            RuleCondition::StepFailed { step_types } => ConditionCheck::from_bool(
                step_logs
                    .iter()
                    .any(|log| !log.passed && step_types.contains(&log.step_type)),
            ),
            RuleCondition::RiskThreshold { operator, value } => match risk_score {
                Some(score) => ConditionCheck::from_bool(operator.compare(score, *value)),
                None => ConditionCheck::MissingSignal,
            },
            RuleCondition::Default => ConditionCheck::Matched,
        }
    }

    /// Short human-readable description, used in verdict reasons
    pub fn describe(&self) -> String {
        match self {
            RuleCondition::StepFailed { step_types } => {
                let names: Vec<&str> = step_types.iter().map(StepType::as_str).collect();
                format!("step failed: any of [{}]", names.join(", "))
            }
            RuleCondition::RiskThreshold { operator, value } => {
                format!("risk score {} {}", operator, value)
            }
            RuleCondition::Default => "default".to_string(),
        }
    }
}
