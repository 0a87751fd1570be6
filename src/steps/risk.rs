//! Risk scoring
//!
//! `risk = dti * 100 + amount / max_allowed * 20`, where `max_allowed` is
//! the cap reported by an earlier amount-policy step, or the built-in
//! country cap when the pipeline has no such step.

use super::{debt_to_income, round_to, StepError, StepOutcome};
use crate::core::{step::RiskScoringParams, Application, StepLog, StepType};
use serde_json::{json, Value};

fn builtin_cap(country: &str) -> f64 {
    match country {
        "ES" => 30000.0,
        "FR" => 25000.0,
        "DE" => 35000.0,
        _ => 20000.0,
    }
}

/// Cap to score against: last amount-policy log's `cap`, else built-in
fn max_allowed(application: &Application, prior_logs: &[StepLog]) -> f64 {
    prior_logs
        .iter()
        .rev()
        .find(|log| log.step_type == StepType::AmountPolicy)
        .and_then(|log| log.details.get("cap").and_then(Value::as_f64))
        .unwrap_or_else(|| builtin_cap(&application.country))
}

/// Passes when the score is at or below `approve_threshold`
pub fn evaluate(
    params: &RiskScoringParams,
    application: &Application,
    prior_logs: &[StepLog],
) -> Result<StepOutcome, StepError> {
    let max_allowed = max_allowed(application, prior_logs);
    if !(max_allowed > 0.0) {
        return Err(StepError::InvalidInput {
            step_type: StepType::RiskScoring,
            message: format!("amount cap must be positive, got {}", max_allowed),
        });
    }

    let dti = debt_to_income(application);
    let risk = dti * 100.0 + application.amount / max_allowed * 20.0;

    Ok(StepOutcome::new(
        risk <= params.approve_threshold,
        json!({
            "risk_score": round_to(risk, 2),
            "approve_threshold": params.approve_threshold,
            "dti": round_to(dti, 4),
            "amount": application.amount,
            "max_allowed": max_allowed,
        }),
    ))
}
