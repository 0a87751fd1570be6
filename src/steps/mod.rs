//! Step evaluators
//!
//! The execution engine does not know how a step reaches its verdict; it
//! hands each configured step to a [`StepEvaluator`]. [`BuiltinEvaluator`]
//! implements the four catalog step types with plain arithmetic and keyword
//! matching. Hosts with other needs plug in their own evaluator.

pub mod amount;
pub mod dti;
pub mod risk;
pub mod sentiment;

use crate::core::{Application, StepConfig, StepLog, StepParams, StepType};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors an evaluator can raise instead of a pass/fail result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("{step_type} cannot evaluate this application: {message}")]
    InvalidInput { step_type: StepType, message: String },

    #[error("{step_type} params are unusable: {message}")]
    InvalidParams { step_type: StepType, message: String },

    #[error("evaluator unavailable: {0}")]
    Unavailable(String),
}

/// Pass/fail verdict of one step plus the data that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub passed: bool,
    pub details: Value,
}

impl StepOutcome {
    pub fn new(passed: bool, details: Value) -> Self {
        Self { passed, details }
    }
}

/// Trait for step evaluation - allows for different implementations
#[async_trait]
pub trait StepEvaluator: Send + Sync {
    /// Evaluate one step; `prior_logs` holds the logs of the steps already run
    async fn evaluate(
        &self,
        step: &StepConfig,
        application: &Application,
        prior_logs: &[StepLog],
    ) -> Result<StepOutcome, StepError>;
}

/// Deterministic evaluators for every catalog step type
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEvaluator;

impl BuiltinEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepEvaluator for BuiltinEvaluator {
    async fn evaluate(
        &self,
        step: &StepConfig,
        application: &Application,
        prior_logs: &[StepLog],
    ) -> Result<StepOutcome, StepError> {
        match &step.params {
            StepParams::DtiRule(params) => Ok(dti::evaluate(params, application)),
            StepParams::AmountPolicy(params) => Ok(amount::evaluate(params, application)),
            StepParams::RiskScoring(params) => risk::evaluate(params, application, prior_logs),
            StepParams::SentimentCheck(params) => sentiment::evaluate(params, application),
        }
    }
}

/// Debt-to-income ratio; a non-positive income counts as fully indebted
pub(crate) fn debt_to_income(application: &Application) -> f64 {
    if application.monthly_income > 0.0 {
        application.declared_debts / application.monthly_income
    } else {
        1.0
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(41.666666, 2), 41.67);
    }

    #[tokio::test]
    async fn test_builtin_dispatches_on_params() {
        let evaluator = BuiltinEvaluator::new();
        let app = fixtures::application(10000.0, 5000.0, 500.0, "ES");

        for step_type in StepType::ALL {
            let step = StepConfig::new(step_type, 1);
            let outcome = evaluator.evaluate(&step, &app, &[]).await.unwrap();
            assert!(outcome.passed, "{} should pass for a healthy application", step_type);
        }
    }
}
