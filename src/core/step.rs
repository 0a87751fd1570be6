//! Step domain model

use crate::core::sequence::Sequenced;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of check a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Debt-to-income ratio check
    DtiRule,
    /// Country-specific loan amount caps
    AmountPolicy,
    /// Numeric risk score from DTI and amount
    RiskScoring,
    /// Loan purpose screening
    SentimentCheck,
}

impl StepType {
    pub const ALL: [StepType; 4] = [
        StepType::DtiRule,
        StepType::AmountPolicy,
        StepType::RiskScoring,
        StepType::SentimentCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::DtiRule => "dti_rule",
            StepType::AmountPolicy => "amount_policy",
            StepType::RiskScoring => "risk_scoring",
            StepType::SentimentCheck => "sentiment_check",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown step type: {}", s))
    }
}

/// Parameters for the debt-to-income check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtiRuleParams {
    /// Maximum allowed ratio, exclusive
    pub max_dti: f64,
}

impl Default for DtiRuleParams {
    fn default() -> Self {
        Self { max_dti: 0.4 }
    }
}

/// Per-country amount caps; `OTHER` is the fallback entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmountPolicyParams {
    pub caps: BTreeMap<String, f64>,
}

impl AmountPolicyParams {
    pub const FALLBACK_KEY: &'static str = "OTHER";
}

impl Default for AmountPolicyParams {
    fn default() -> Self {
        let caps = [
            ("DE", 35000.0),
            ("ES", 30000.0),
            ("FR", 25000.0),
            (Self::FALLBACK_KEY, 20000.0),
        ]
        .into_iter()
        .map(|(country, cap)| (country.to_string(), cap))
        .collect();
        Self { caps }
    }
}

/// Parameters for risk scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskScoringParams {
    /// Highest risk score that still passes
    pub approve_threshold: f64,
}

impl Default for RiskScoringParams {
    fn default() -> Self {
        Self {
            approve_threshold: 45.0,
        }
    }
}

/// Parameters for loan purpose screening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentCheckParams {
    pub risky_keywords: Vec<String>,
}

impl Default for SentimentCheckParams {
    fn default() -> Self {
        Self {
            risky_keywords: ["gambling", "crypto", "cryptocurrency", "betting", "casino"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Typed parameters, one variant per step type
#[derive(Debug, Clone, PartialEq)]
pub enum StepParams {
    DtiRule(DtiRuleParams),
    AmountPolicy(AmountPolicyParams),
    RiskScoring(RiskScoringParams),
    SentimentCheck(SentimentCheckParams),
}

impl StepParams {
    /// Declared defaults for a step type
    pub fn defaults_for(step_type: StepType) -> Self {
        match step_type {
            StepType::DtiRule => StepParams::DtiRule(DtiRuleParams::default()),
            StepType::AmountPolicy => StepParams::AmountPolicy(AmountPolicyParams::default()),
            StepType::RiskScoring => StepParams::RiskScoring(RiskScoringParams::default()),
            StepType::SentimentCheck => StepParams::SentimentCheck(SentimentCheckParams::default()),
        }
    }

    pub fn step_type(&self) -> StepType {
        match self {
            StepParams::DtiRule(_) => StepType::DtiRule,
            StepParams::AmountPolicy(_) => StepType::AmountPolicy,
            StepParams::RiskScoring(_) => StepType::RiskScoring,
            StepParams::SentimentCheck(_) => StepType::SentimentCheck,
        }
    }

    /// Decode untyped parameters according to `step_type`.
    ///
    /// `null` yields the step type's defaults.
    pub fn from_value(step_type: StepType, value: Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::defaults_for(step_type));
        }
        Ok(match step_type {
            StepType::DtiRule => StepParams::DtiRule(serde_json::from_value(value)?),
            StepType::AmountPolicy => StepParams::AmountPolicy(serde_json::from_value(value)?),
            StepType::RiskScoring => StepParams::RiskScoring(serde_json::from_value(value)?),
            StepType::SentimentCheck => StepParams::SentimentCheck(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Value {
        let encoded = match self {
            StepParams::DtiRule(p) => serde_json::to_value(p),
            StepParams::AmountPolicy(p) => serde_json::to_value(p),
            StepParams::RiskScoring(p) => serde_json::to_value(p),
            StepParams::SentimentCheck(p) => serde_json::to_value(p),
        };
        encoded.unwrap_or(Value::Null)
    }

    /// Schema checks; an empty list means the parameters are usable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match self {
            StepParams::DtiRule(p) => {
                if !(p.max_dti > 0.0 && p.max_dti <= 1.0) {
                    problems.push(format!("max_dti must be in (0, 1], got {}", p.max_dti));
                }
            }
            StepParams::AmountPolicy(p) => {
                for (country, cap) in &p.caps {
                    if !(cap.is_finite() && *cap > 0.0) {
                        problems.push(format!("cap for {} must be positive, got {}", country, cap));
                    }
                }
            }
            StepParams::RiskScoring(p) => {
                if !(p.approve_threshold.is_finite() && p.approve_threshold >= 0.0) {
                    problems.push(format!(
                        "approve_threshold must be non-negative, got {}",
                        p.approve_threshold
                    ));
                }
            }
            StepParams::SentimentCheck(p) => {
                if p.risky_keywords.iter().any(|k| k.trim().is_empty()) {
                    problems.push("risky_keywords must not contain blank entries".to_string());
                }
            }
        }
        problems
    }
}

/// A configured step inside a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepConfigRecord", into = "StepConfigRecord")]
pub struct StepConfig {
    /// 1-based position within the pipeline
    pub order: u32,

    /// Typed parameters; also determine the step type
    pub params: StepParams,
}

impl StepConfig {
    /// A step of `step_type` with its default parameters
    pub fn new(step_type: StepType, order: u32) -> Self {
        Self {
            order,
            params: StepParams::defaults_for(step_type),
        }
    }

    pub fn with_params(order: u32, params: StepParams) -> Self {
        Self { order, params }
    }

    pub fn step_type(&self) -> StepType {
        self.params.step_type()
    }
}

impl Sequenced for StepConfig {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Wire shape of a step: `{ step_type, order, params }`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepConfigRecord {
    step_type: StepType,
    order: u32,
    #[serde(default)]
    params: Value,
}

impl TryFrom<StepConfigRecord> for StepConfig {
    type Error = String;

    fn try_from(record: StepConfigRecord) -> Result<Self, Self::Error> {
        let params = StepParams::from_value(record.step_type, record.params).map_err(|e| {
            format!(
                "invalid params for step {} ({}): {}",
                record.order, record.step_type, e
            )
        })?;
        Ok(StepConfig {
            order: record.order,
            params,
        })
    }
}

impl From<StepConfig> for StepConfigRecord {
    fn from(step: StepConfig) -> Self {
        StepConfigRecord {
            step_type: step.step_type(),
            order: step.order,
            params: step.params.to_value(),
        }
    }
}
