//! Country amount caps

use super::StepOutcome;
use crate::core::{step::AmountPolicyParams, Application};
use serde_json::json;

/// Cap used when neither the country nor `OTHER` has an entry
pub const FALLBACK_CAP: f64 = 20000.0;

/// Cap that applies to `country` under `params`
pub fn cap_for(params: &AmountPolicyParams, country: &str) -> f64 {
    params
        .caps
        .get(country)
        .or_else(|| params.caps.get(AmountPolicyParams::FALLBACK_KEY))
        .copied()
        .unwrap_or(FALLBACK_CAP)
}

/// Passes when the requested amount does not exceed the country's cap
pub fn evaluate(params: &AmountPolicyParams, application: &Application) -> StepOutcome {
    let cap = cap_for(params, &application.country);

    StepOutcome::new(
        application.amount <= cap,
        json!({
            "amount": application.amount,
            "country": application.country,
            "cap": cap,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::fixtures::application;
    use std::collections::BTreeMap;

    #[test]
    fn test_country_cap_applies() {
        let params = AmountPolicyParams::default();
        assert!(evaluate(&params, &application(35000.0, 5000.0, 0.0, "DE")).passed);
        assert!(!evaluate(&params, &application(35000.0, 5000.0, 0.0, "ES")).passed);
    }

    #[test]
    fn test_unknown_country_uses_other() {
        let params = AmountPolicyParams::default();
        let outcome = evaluate(&params, &application(21000.0, 5000.0, 0.0, "PT"));
        assert!(!outcome.passed);
        assert_eq!(outcome.details["cap"], 20000.0);
    }

    #[test]
    fn test_no_fallback_entry_uses_builtin_cap() {
        let params = AmountPolicyParams {
            caps: BTreeMap::from([("DE".to_string(), 50000.0)]),
        };
        assert_eq!(cap_for(&params, "IT"), FALLBACK_CAP);
    }
}
