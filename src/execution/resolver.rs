//! Outcome resolver - turns step logs into a verdict
//!
//! Terminal rules are tried strictly by ascending `order`; the first rule
//! whose condition matches decides the run. A condition that needs a signal
//! the run never produced (a risk threshold without a risk score) does not
//! match. When nothing matches the caller gets [`ResolveError::NoMatchingRule`]
//! rather than a made-up outcome.
//!
//! Resolution is pure: no I/O and no shared state, so it can be called from
//! any number of tasks at once.

use crate::core::{
    run::risk_score_from_logs, ConditionCheck, StepLog, TerminalRule, Verdict,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("no terminal rule matched ({rules_checked} checked); add a trailing default rule")]
    NoMatchingRule { rules_checked: usize },
}

/// Pick the first matching rule for a set of step logs
pub fn resolve(
    step_logs: &[StepLog],
    rules: &[TerminalRule],
    risk_score: Option<f64>,
) -> Result<Verdict, ResolveError> {
    let mut ordered: Vec<&TerminalRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.order);

    for rule in &ordered {
        match rule.condition.check(step_logs, risk_score) {
            ConditionCheck::Matched => {
                debug!(order = rule.order, outcome = %rule.outcome, "terminal rule matched");
                return Ok(Verdict {
                    outcome: rule.outcome,
                    rule_order: rule.order,
                    condition: rule.condition.kind(),
                    reason: format!("rule {}: {}", rule.order, rule.condition.describe()),
                });
            }
            ConditionCheck::MissingSignal => {
                debug!(
                    order = rule.order,
                    "terminal rule skipped: run produced no risk score"
                );
            }
            ConditionCheck::NotMatched => {}
        }
    }

    Err(ResolveError::NoMatchingRule {
        rules_checked: ordered.len(),
    })
}

/// [`resolve`] with the risk score read from the logs themselves
pub fn resolve_run(step_logs: &[StepLog], rules: &[TerminalRule]) -> Result<Verdict, ResolveError> {
    resolve(step_logs, rules, risk_score_from_logs(step_logs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ComparisonOperator, ConditionKind, Outcome, RuleCondition, StepType,
    };
    use serde_json::json;

    fn log(step_type: StepType, order: u32, passed: bool) -> StepLog {
        StepLog::new(step_type, order, passed, json!({}))
    }

    fn standard_rules() -> Vec<TerminalRule> {
        vec![
            TerminalRule::new(
                1,
                RuleCondition::step_failed([StepType::DtiRule, StepType::AmountPolicy]),
                Outcome::Rejected,
            ),
            TerminalRule::new(
                2,
                RuleCondition::risk_threshold(ComparisonOperator::LessOrEqual, 45.0),
                Outcome::Approved,
            ),
            TerminalRule::new(3, RuleCondition::Default, Outcome::NeedsReview),
        ]
    }

    #[test]
    fn test_first_match_wins() {
        let logs = vec![log(StepType::DtiRule, 1, false)];
        let verdict = resolve(&logs, &standard_rules(), Some(10.0)).unwrap();

        assert_eq!(verdict.outcome, Outcome::Rejected);
        assert_eq!(verdict.rule_order, 1);
        assert_eq!(verdict.condition, ConditionKind::StepFailed);
    }

    #[test]
    fn test_rules_are_tried_by_order_not_position() {
        let mut rules = standard_rules();
        rules.reverse();
        let logs = vec![log(StepType::DtiRule, 1, false)];

        let verdict = resolve(&logs, &rules, None).unwrap();
        assert_eq!(verdict.rule_order, 1);
    }

    #[test]
    fn test_missing_risk_score_falls_through() {
        let logs = vec![log(StepType::DtiRule, 1, true)];
        let verdict = resolve(&logs, &standard_rules(), None).unwrap();

        assert_eq!(verdict.outcome, Outcome::NeedsReview);
        assert_eq!(verdict.rule_order, 3);
    }

    #[test]
    fn test_no_match_is_an_error() {
        let mut rules = standard_rules();
        rules.pop();
        let logs = vec![log(StepType::DtiRule, 1, true)];

        assert_eq!(
            resolve(&logs, &rules, Some(80.0)),
            Err(ResolveError::NoMatchingRule { rules_checked: 2 })
        );
        assert_eq!(
            resolve(&logs, &[], None),
            Err(ResolveError::NoMatchingRule { rules_checked: 0 })
        );
    }

    #[test]
    fn test_resolve_run_reads_score_from_logs() {
        let logs = vec![
            log(StepType::DtiRule, 1, true),
            StepLog::new(StepType::RiskScoring, 2, true, json!({"risk_score": 30.5})),
        ];
        let verdict = resolve_run(&logs, &standard_rules()).unwrap();

        assert_eq!(verdict.outcome, Outcome::Approved);
        assert_eq!(verdict.reason, "rule 2: risk score <= 45");
    }
}
