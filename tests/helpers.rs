//! Test utility functions for loanflow

#![allow(dead_code)]

use async_trait::async_trait;
use loanflow::builder::{BuilderCommand, DefinitionBuilder};
use loanflow::core::{
    Application, ComparisonOperator, Outcome, PipelineDefinition, RuleCondition, Run,
    Sequenced, StepConfig, StepLog, StepType, TerminalRule,
};
use loanflow::execution::{ExecutionEngine, ExecutionError, ExecutionEvent};
use loanflow::steps::{StepError, StepEvaluator, StepOutcome};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What a scripted step returns
#[derive(Debug, Clone)]
pub enum Scripted {
    Pass(Value),
    Fail(Value),
    Error(String),
}

/// Evaluator that returns predefined results per step type and records
/// every call; unscripted step types pass with empty details
#[derive(Clone, Default)]
pub struct ScriptedEvaluator {
    script: HashMap<StepType, Scripted>,
    calls: Arc<Mutex<Vec<(u32, StepType)>>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, step_type: StepType) -> Self {
        self.script.insert(step_type, Scripted::Fail(json!({})));
        self
    }

    pub fn passing_with(mut self, step_type: StepType, details: Value) -> Self {
        self.script.insert(step_type, Scripted::Pass(details));
        self
    }

    pub fn erroring(mut self, step_type: StepType, message: &str) -> Self {
        self.script.insert(step_type, Scripted::Error(message.to_string()));
        self
    }

    /// Steps evaluated so far, in call order
    pub fn calls(&self) -> Vec<(u32, StepType)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        step: &StepConfig,
        _application: &Application,
        _prior_logs: &[StepLog],
    ) -> Result<StepOutcome, StepError> {
        self.calls.lock().unwrap().push((step.order, step.step_type()));

        match self.script.get(&step.step_type()) {
            Some(Scripted::Pass(details)) => Ok(StepOutcome::new(true, details.clone())),
            Some(Scripted::Fail(details)) => Ok(StepOutcome::new(false, details.clone())),
            Some(Scripted::Error(message)) => Err(StepError::Unavailable(message.clone())),
            None => Ok(StepOutcome::new(true, json!({}))),
        }
    }
}

/// Result of running a definition with event capture
pub struct RunTestResult {
    pub result: Result<Run, ExecutionError>,
    pub events: Vec<ExecutionEvent>,
}

/// Run `definition` against `application` and capture every event
pub async fn run_with_evaluator<E: StepEvaluator + 'static>(
    evaluator: E,
    definition: &PipelineDefinition,
    application: &Application,
) -> RunTestResult {
    let engine = ExecutionEngine::new(evaluator);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let result = engine.execute(definition, application, 0).await;
    let events = events.lock().unwrap().clone();
    RunTestResult { result, events }
}

// Fixtures

pub fn application(amount: f64, monthly_income: f64, declared_debts: f64, country: &str) -> Application {
    Application {
        id: 1,
        applicant_name: "Maria Lopez".to_string(),
        amount,
        monthly_income,
        declared_debts,
        country: country.to_string(),
        loan_purpose: "home renovation".to_string(),
    }
}

pub fn log(step_type: StepType, order: u32, passed: bool) -> StepLog {
    StepLog::new(step_type, order, passed, json!({}))
}

pub fn scored_log(order: u32, risk_score: f64) -> StepLog {
    StepLog::new(
        StepType::RiskScoring,
        order,
        true,
        json!({ "risk_score": risk_score }),
    )
}

pub fn rule(order: u32, condition: RuleCondition, outcome: Outcome) -> TerminalRule {
    TerminalRule::new(order, condition, outcome)
}

/// DTI and amount cap; DTI failure rejects, everything else approves
pub fn two_step_definition() -> PipelineDefinition {
    PipelineDefinition {
        name: "Two Step".to_string(),
        description: String::new(),
        steps: vec![
            StepConfig::new(StepType::DtiRule, 1),
            StepConfig::new(StepType::AmountPolicy, 2),
        ],
        terminal_rules: vec![
            rule(1, RuleCondition::step_failed([StepType::DtiRule]), Outcome::Rejected),
            rule(2, RuleCondition::Default, Outcome::Approved),
        ],
    }
}

/// All four catalog steps with the usual three-tier decision table
pub fn standard_definition() -> PipelineDefinition {
    PipelineDefinition {
        name: "Standard Loan Check".to_string(),
        description: "DTI, caps, risk and purpose".to_string(),
        steps: vec![
            StepConfig::new(StepType::DtiRule, 1),
            StepConfig::new(StepType::AmountPolicy, 2),
            StepConfig::new(StepType::RiskScoring, 3),
            StepConfig::new(StepType::SentimentCheck, 4),
        ],
        terminal_rules: vec![
            rule(
                1,
                RuleCondition::step_failed([
                    StepType::DtiRule,
                    StepType::AmountPolicy,
                    StepType::SentimentCheck,
                ]),
                Outcome::Rejected,
            ),
            rule(
                2,
                RuleCondition::risk_threshold(ComparisonOperator::LessOrEqual, 45.0),
                Outcome::Approved,
            ),
            rule(3, RuleCondition::Default, Outcome::NeedsReview),
        ],
    }
}

// Operation generator for builder property tests

/// Seeded command generator so property runs are reproducible
pub struct OpGen {
    rng: StdRng,
}

impl OpGen {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform value in `1..=max`, or 1 when `max` is 0
    pub fn order(&mut self, max: usize) -> u32 {
        self.rng.gen_range(1..=max.max(1) as u32)
    }

    /// A random builder command; orders may point one past the end so
    /// NotFound paths are exercised too
    pub fn command(&mut self, steps: usize, rules: usize) -> BuilderCommand {
        let step_type = *StepType::ALL
            .choose(&mut self.rng)
            .unwrap_or(&StepType::DtiRule);
        match self.rng.gen_range(0..6) {
            0 | 1 => BuilderCommand::AddStep(step_type),
            2 => BuilderCommand::RemoveStep(self.order(steps + 1)),
            3 => BuilderCommand::ReorderSteps {
                from: self.order(steps + 1),
                to: self.order(steps + 1),
            },
            4 => match self.rng.gen_range(0..3) {
                0 => BuilderCommand::AddTerminalRule,
                1 => BuilderCommand::RemoveTerminalRule(self.order(rules + 1)),
                _ => BuilderCommand::ReorderTerminalRules {
                    from: self.order(rules + 1),
                    to: self.order(rules + 1),
                },
            },
            _ => BuilderCommand::AddTerminalRule,
        }
    }
}

// Assertions

/// Orders are exactly `1..=N`
pub fn assert_dense<T: Sequenced>(items: &[T]) {
    let orders: Vec<u32> = items.iter().map(Sequenced::order).collect();
    let expected: Vec<u32> = (1..=items.len() as u32).collect();
    assert_eq!(orders, expected, "orders are not dense");
}

pub fn assert_builder_dense(builder: &DefinitionBuilder) {
    assert_dense(builder.steps());
    assert_dense(builder.terminal_rules());
}

pub fn assert_verdict(run: &Run, outcome: Outcome, rule_order: u32) {
    assert_eq!(
        run.status, outcome,
        "expected {} but run ended {} ({})",
        outcome, run.status, run.verdict.reason
    );
    assert_eq!(run.verdict.rule_order, rule_order);
}

pub fn step_types(steps: &[StepConfig]) -> Vec<StepType> {
    steps.iter().map(StepConfig::step_type).collect()
}
