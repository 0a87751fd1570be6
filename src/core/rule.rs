//! Terminal rules: prioritized condition → outcome rows

use crate::core::condition::{ConditionKind, RuleCondition};
use crate::core::sequence::Sequenced;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final decision of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Approved,
    Rejected,
    NeedsReview,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "APPROVED",
            Outcome::Rejected => "REJECTED",
            Outcome::NeedsReview => "NEEDS_REVIEW",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Outcome::Approved),
            "REJECTED" => Ok(Outcome::Rejected),
            "NEEDS_REVIEW" => Ok(Outcome::NeedsReview),
            other => Err(format!("Unknown outcome: {}", other)),
        }
    }
}

/// One row of the decision table; lower `order` is tried first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRule {
    pub order: u32,
    pub condition: RuleCondition,
    pub outcome: Outcome,
}

impl TerminalRule {
    pub fn new(order: u32, condition: RuleCondition, outcome: Outcome) -> Self {
        Self {
            order,
            condition,
            outcome,
        }
    }

    /// The row a freshly added rule starts as: default → NEEDS_REVIEW
    pub fn placeholder(order: u32) -> Self {
        Self::new(order, RuleCondition::Default, Outcome::NeedsReview)
    }

    /// Merge the supplied fields of `patch` into this rule
    pub fn apply(&mut self, patch: RulePatch) {
        match patch.condition {
            Some(ConditionUpdate::Kind(kind)) if kind != self.condition.kind() => {
                self.condition = RuleCondition::default_for(kind);
            }
            Some(ConditionUpdate::Kind(_)) => {}
            Some(ConditionUpdate::Replace(condition)) => self.condition = condition,
            None => {}
        }
        if let Some(outcome) = patch.outcome {
            self.outcome = outcome;
        }
    }
}

impl Sequenced for TerminalRule {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// How a patch changes a rule's condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionUpdate {
    /// Switch to this kind; a different kind starts from its defaults
    Kind(ConditionKind),
    /// Install this exact condition
    Replace(RuleCondition),
}

/// Partial update for a terminal rule; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePatch {
    pub condition: Option<ConditionUpdate>,
    pub outcome: Option<Outcome>,
}

impl RulePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: ConditionKind) -> Self {
        self.condition = Some(ConditionUpdate::Kind(kind));
        self
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.condition = Some(ConditionUpdate::Replace(condition));
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.outcome.is_none()
    }
}
