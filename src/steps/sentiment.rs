//! Loan purpose screening by keyword

use super::{StepError, StepOutcome};
use crate::core::{step::SentimentCheckParams, Application, StepType};
use regex::RegexBuilder;
use serde_json::json;

/// Fails when the loan purpose mentions any risky keyword, ignoring case
pub fn evaluate(
    params: &SentimentCheckParams,
    application: &Application,
) -> Result<StepOutcome, StepError> {
    let mut found = Vec::new();
    for keyword in &params.risky_keywords {
        let pattern = RegexBuilder::new(&regex::escape(keyword.trim()))
            .case_insensitive(true)
            .build()
            .map_err(|e| StepError::InvalidParams {
                step_type: StepType::SentimentCheck,
                message: format!("keyword '{}': {}", keyword, e),
            })?;
        if pattern.is_match(&application.loan_purpose) {
            found.push(keyword.clone());
        }
    }

    let outcome = if found.is_empty() {
        StepOutcome::new(
            true,
            json!({
                "method": "keyword_check",
                "loan_purpose": application.loan_purpose,
                "found_keywords": found,
                "reason": "no risky keywords detected",
            }),
        )
    } else {
        StepOutcome::new(
            false,
            json!({
                "method": "keyword_match",
                "loan_purpose": application.loan_purpose,
                "found_keywords": found,
                "reason": "loan purpose mentions risky keywords",
            }),
        )
    };
    Ok(outcome)
}
