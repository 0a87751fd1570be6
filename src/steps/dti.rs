//! Debt-to-income check

use super::{debt_to_income, round_to, StepOutcome};
use crate::core::{step::DtiRuleParams, Application};
use serde_json::json;

/// Passes when `debts / income` is strictly below `max_dti`
pub fn evaluate(params: &DtiRuleParams, application: &Application) -> StepOutcome {
    let dti = debt_to_income(application);

    StepOutcome::new(
        dti < params.max_dti,
        json!({
            "dti": round_to(dti, 4),
            "max_dti": params.max_dti,
            "declared_debts": application.declared_debts,
            "monthly_income": application.monthly_income,
        }),
    )
}
