//! Definition builder - the editable working copy of a pipeline
//!
//! A [`DefinitionBuilder`] owns one working copy of a pipeline definition
//! and exposes the edit operations. Every operation leaves both the step
//! sequence and the terminal-rule sequence dense and 1-based. Edits mark
//! the working copy dirty; loading, resetting or marking it saved makes it
//! clean again.
//!
//! The builder is single-writer. Hosts that need to share it wrap it in an
//! [`EditSession`], which applies [`BuilderCommand`]s one at a time.

pub mod session;

pub use session::{EditSession, SessionWorker};

use crate::core::{
    catalog::step_definition, DefinitionError, PipelineDefinition, RulePatch, Sequence,
    StepConfig, StepParams, StepType, TerminalRule,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Which of the two ordered sequences an edit addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Step,
    TerminalRule,
}

impl fmt::Display for EditTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditTarget::Step => "step",
            EditTarget::TerminalRule => "terminal rule",
        })
    }
}

/// Builder errors. None of them change the working copy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuilderError {
    #[error("no {target} at order {order}")]
    NotFound { target: EditTarget, order: u32 },

    #[error("step {order} is a {expected} step, params are for {found}")]
    ParamsMismatch {
        order: u32,
        expected: StepType,
        found: StepType,
    },

    #[error("cannot load definition: {0}")]
    InvalidTransition(#[from] DefinitionError),

    #[error("edit session is closed")]
    SessionClosed,
}

/// What changed in the working copy; passed to change handlers
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderChange {
    StepAdded { order: u32, step_type: StepType },
    StepRemoved { order: u32, step_type: StepType },
    StepParamsUpdated { order: u32 },
    StepsReordered { from: u32, to: u32 },
    RuleAdded { order: u32 },
    RuleRemoved { order: u32 },
    RuleUpdated { order: u32 },
    RulesReordered { from: u32, to: u32 },
    NameChanged,
    DescriptionChanged,
    Loaded,
    Reset,
    Saved,
}

/// Builder operations as data, for queued or scripted editing
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderCommand {
    AddStep(StepType),
    RemoveStep(u32),
    UpdateStepParams { order: u32, params: StepParams },
    ReorderSteps { from: u32, to: u32 },
    AddTerminalRule,
    RemoveTerminalRule(u32),
    UpdateTerminalRule { order: u32, patch: RulePatch },
    ReorderTerminalRules { from: u32, to: u32 },
    SetName(String),
    SetDescription(String),
    Load(PipelineDefinition),
    Reset,
    MarkSaved,
}

/// Type for change handlers
pub type ChangeHandler = Arc<dyn Fn(&BuilderChange) + Send + Sync>;

/// Editable working copy of one pipeline definition
#[derive(Default)]
pub struct DefinitionBuilder {
    name: String,
    description: String,
    steps: Sequence<StepConfig>,
    rules: Sequence<TerminalRule>,
    dirty: bool,
    handlers: Vec<ChangeHandler>,
}

impl fmt::Debug for DefinitionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("steps", &self.steps)
            .field("rules", &self.rules)
            .field("dirty", &self.dirty)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl DefinitionBuilder {
    /// An empty, clean working copy
    pub fn new() -> Self {
        Self::default()
    }

    /// A clean working copy holding `definition`
    pub fn from_definition(definition: PipelineDefinition) -> Result<Self, BuilderError> {
        let mut builder = Self::new();
        builder.load_definition(definition)?;
        Ok(builder)
    }

    /// Register a handler called after every successful change
    pub fn on_change<F>(&mut self, handler: F)
    where
        F: Fn(&BuilderChange) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[StepConfig] {
        self.steps.as_slice()
    }

    pub fn terminal_rules(&self) -> &[TerminalRule] {
        self.rules.as_slice()
    }

    pub fn step(&self, order: u32) -> Option<&StepConfig> {
        self.steps.get(order)
    }

    pub fn terminal_rule(&self, order: u32) -> Option<&TerminalRule> {
        self.rules.get(order)
    }

    /// True when the working copy has edits not yet loaded or saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Copy of the working copy as a definition value
    pub fn snapshot(&self) -> PipelineDefinition {
        PipelineDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            steps: self.steps.as_slice().to_vec(),
            terminal_rules: self.rules.as_slice().to_vec(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.changed(BuilderChange::NameChanged);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.changed(BuilderChange::DescriptionChanged);
    }

    /// Append a step of `step_type` with its catalog defaults; returns its order
    pub fn add_step(&mut self, step_type: StepType) -> u32 {
        let defaults = step_definition(step_type).default_params;
        let order = self
            .steps
            .push_with(|order| StepConfig::with_params(order, defaults));
        self.changed(BuilderChange::StepAdded { order, step_type });
        order
    }

    /// Remove the step at `order`, compacting the orders after it
    pub fn remove_step(&mut self, order: u32) -> Result<StepConfig, BuilderError> {
        let removed = self
            .steps
            .remove(order)
            .ok_or(BuilderError::NotFound {
                target: EditTarget::Step,
                order,
            })?;
        self.changed(BuilderChange::StepRemoved {
            order,
            step_type: removed.step_type(),
        });
        Ok(removed)
    }

    /// Replace the params of the step at `order` wholesale
    pub fn update_step_params(&mut self, order: u32, params: StepParams) -> Result<(), BuilderError> {
        let step = self.steps.get_mut(order).ok_or(BuilderError::NotFound {
            target: EditTarget::Step,
            order,
        })?;
        if step.step_type() != params.step_type() {
            return Err(BuilderError::ParamsMismatch {
                order,
                expected: step.step_type(),
                found: params.step_type(),
            });
        }
        step.params = params;
        self.changed(BuilderChange::StepParamsUpdated { order });
        Ok(())
    }

    /// Move the step at `from` to position `to` and renumber
    pub fn reorder_steps(&mut self, from: u32, to: u32) -> Result<(), BuilderError> {
        if !self.steps.move_item(from, to) {
            return Err(self.missing(EditTarget::Step, from, to));
        }
        self.changed(BuilderChange::StepsReordered { from, to });
        Ok(())
    }

    /// Append a default → NEEDS_REVIEW rule; returns its order
    pub fn add_terminal_rule(&mut self) -> u32 {
        let order = self.rules.push_with(TerminalRule::placeholder);
        self.changed(BuilderChange::RuleAdded { order });
        order
    }

    /// Remove the rule at `order`, compacting the orders after it
    pub fn remove_terminal_rule(&mut self, order: u32) -> Result<TerminalRule, BuilderError> {
        let removed = self.rules.remove(order).ok_or(BuilderError::NotFound {
            target: EditTarget::TerminalRule,
            order,
        })?;
        self.changed(BuilderChange::RuleRemoved { order });
        Ok(removed)
    }

    /// Merge `patch` into the rule at `order`
    pub fn update_terminal_rule(&mut self, order: u32, patch: RulePatch) -> Result<(), BuilderError> {
        let rule = self.rules.get_mut(order).ok_or(BuilderError::NotFound {
            target: EditTarget::TerminalRule,
            order,
        })?;
        rule.apply(patch);
        self.changed(BuilderChange::RuleUpdated { order });
        Ok(())
    }

    /// Move the rule at `from` to position `to` and renumber
    pub fn reorder_terminal_rules(&mut self, from: u32, to: u32) -> Result<(), BuilderError> {
        if !self.rules.move_item(from, to) {
            return Err(self.missing(EditTarget::TerminalRule, from, to));
        }
        self.changed(BuilderChange::RulesReordered { from, to });
        Ok(())
    }

    /// Replace the whole working copy; the result is clean.
    ///
    /// A definition whose orders are not dense is rejected and the working
    /// copy is left as it was.
    pub fn load_definition(&mut self, definition: PipelineDefinition) -> Result<(), BuilderError> {
        definition.validate()?;
        let steps = Sequence::from_vec(definition.steps).map_err(DefinitionError::Steps)?;
        let rules = Sequence::from_vec(definition.terminal_rules).map_err(DefinitionError::Rules)?;

        self.name = definition.name;
        self.description = definition.description;
        self.steps = steps;
        self.rules = rules;
        self.dirty = false;
        self.notify(BuilderChange::Loaded);
        Ok(())
    }

    /// Back to the empty working copy; the result is clean
    pub fn reset(&mut self) {
        self.name.clear();
        self.description.clear();
        self.steps = Sequence::new();
        self.rules = Sequence::new();
        self.dirty = false;
        self.notify(BuilderChange::Reset);
    }

    /// Record that the current working copy has been persisted
    pub fn mark_saved(&mut self) {
        self.dirty = false;
        self.notify(BuilderChange::Saved);
    }

    /// Problems that would stop the working copy from executing
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("pipeline name is empty".to_string());
        }
        if self.steps.is_empty() {
            problems.push("pipeline has no steps".to_string());
        }
        for step in &self.steps {
            for problem in step.params.validate() {
                problems.push(format!("step {} ({}): {}", step.order, step.step_type(), problem));
            }
        }

        match self
            .rules
            .iter()
            .find(|rule| rule.condition.is_unconditional())
        {
            None => problems.push("no default terminal rule; runs may end without a verdict".to_string()),
            Some(catch_all) => {
                for rule in self.rules.iter().filter(|r| r.order > catch_all.order) {
                    problems.push(format!(
                        "terminal rule {} is unreachable after default rule {}",
                        rule.order, catch_all.order
                    ));
                }
            }
        }

        problems
    }

    /// Apply one operation given as data
    pub fn apply(&mut self, command: BuilderCommand) -> Result<(), BuilderError> {
        match command {
            BuilderCommand::AddStep(step_type) => {
                self.add_step(step_type);
            }
            BuilderCommand::RemoveStep(order) => {
                self.remove_step(order)?;
            }
            BuilderCommand::UpdateStepParams { order, params } => {
                self.update_step_params(order, params)?;
            }
            BuilderCommand::ReorderSteps { from, to } => self.reorder_steps(from, to)?,
            BuilderCommand::AddTerminalRule => {
                self.add_terminal_rule();
            }
            BuilderCommand::RemoveTerminalRule(order) => {
                self.remove_terminal_rule(order)?;
            }
            BuilderCommand::UpdateTerminalRule { order, patch } => {
                self.update_terminal_rule(order, patch)?;
            }
            BuilderCommand::ReorderTerminalRules { from, to } => {
                self.reorder_terminal_rules(from, to)?;
            }
            BuilderCommand::SetName(name) => self.set_name(name),
            BuilderCommand::SetDescription(description) => self.set_description(description),
            BuilderCommand::Load(definition) => self.load_definition(definition)?,
            BuilderCommand::Reset => self.reset(),
            BuilderCommand::MarkSaved => self.mark_saved(),
        }
        Ok(())
    }

    fn missing(&self, target: EditTarget, from: u32, to: u32) -> BuilderError {
        let exists = |order| match target {
            EditTarget::Step => self.steps.get(order).is_some(),
            EditTarget::TerminalRule => self.rules.get(order).is_some(),
        };
        let order = if exists(from) { to } else { from };
        BuilderError::NotFound { target, order }
    }

    fn changed(&mut self, change: BuilderChange) {
        self.dirty = true;
        self.notify(change);
    }

    fn notify(&self, change: BuilderChange) {
        debug!(?change, dirty = self.dirty, "pipeline working copy changed");
        for handler in &self.handlers {
            handler(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        condition::{ComparisonOperator, ConditionKind, RuleCondition},
        rule::Outcome,
        sequence::check_dense,
        step::DtiRuleParams,
    };
    use std::sync::Mutex;

    fn types(builder: &DefinitionBuilder) -> Vec<StepType> {
        builder.steps().iter().map(StepConfig::step_type).collect()
    }

    fn orders(builder: &DefinitionBuilder) -> Vec<u32> {
        builder.steps().iter().map(|s| s.order).collect()
    }

    fn three_steps() -> DefinitionBuilder {
        let mut builder = DefinitionBuilder::new();
        builder.add_step(StepType::DtiRule);
        builder.add_step(StepType::AmountPolicy);
        builder.add_step(StepType::RiskScoring);
        builder
    }

    #[test]
    fn test_new_builder_is_empty_and_clean() {
        let builder = DefinitionBuilder::new();
        assert!(builder.steps().is_empty());
        assert!(builder.terminal_rules().is_empty());
        assert_eq!(builder.name(), "");
        assert!(!builder.is_dirty());
    }

    #[test]
    fn test_add_step_appends_with_defaults() {
        let mut builder = DefinitionBuilder::new();
        let order = builder.add_step(StepType::DtiRule);

        assert_eq!(order, 1);
        assert_eq!(
            builder.step(1).unwrap().params,
            StepParams::DtiRule(DtiRuleParams { max_dti: 0.4 })
        );
        assert!(builder.is_dirty());

        assert_eq!(builder.add_step(StepType::AmountPolicy), 2);
        assert_eq!(orders(&builder), vec![1, 2]);
    }

    #[test]
    fn test_remove_step_compacts() {
        let mut builder = three_steps();
        let removed = builder.remove_step(2).unwrap();

        assert_eq!(removed.step_type(), StepType::AmountPolicy);
        assert_eq!(types(&builder), vec![StepType::DtiRule, StepType::RiskScoring]);
        assert_eq!(orders(&builder), vec![1, 2]);
    }

    #[test]
    fn test_remove_missing_step_leaves_state_unchanged() {
        let mut builder = three_steps();
        builder.mark_saved();
        let before = builder.snapshot();

        let err = builder.remove_step(9).unwrap_err();
        assert_eq!(
            err,
            BuilderError::NotFound {
                target: EditTarget::Step,
                order: 9
            }
        );
        assert_eq!(builder.snapshot(), before);
        assert!(!builder.is_dirty());
    }

    #[test]
    fn test_update_step_params_replaces_wholesale() {
        let mut builder = three_steps();
        let params = StepParams::DtiRule(DtiRuleParams { max_dti: 0.5 });
        builder.update_step_params(1, params.clone()).unwrap();

        assert_eq!(builder.step(1).unwrap().params, params);
        assert_eq!(builder.step(1).unwrap().order, 1);
    }

    #[test]
    fn test_update_step_params_rejects_other_step_type() {
        let mut builder = three_steps();
        let before = builder.snapshot();
        let err = builder
            .update_step_params(2, StepParams::defaults_for(StepType::DtiRule))
            .unwrap_err();

        assert_eq!(
            err,
            BuilderError::ParamsMismatch {
                order: 2,
                expected: StepType::AmountPolicy,
                found: StepType::DtiRule
            }
        );
        assert_eq!(builder.snapshot(), before);
    }

    #[test]
    fn test_reorder_steps() {
        let mut builder = three_steps();
        builder.reorder_steps(1, 3).unwrap();

        assert_eq!(
            types(&builder),
            vec![StepType::AmountPolicy, StepType::RiskScoring, StepType::DtiRule]
        );
        assert_eq!(orders(&builder), vec![1, 2, 3]);
    }

    #[test]
    fn test_reorder_with_missing_order_is_noop() {
        let mut builder = three_steps();
        let before = builder.snapshot();

        let err = builder.reorder_steps(1, 5).unwrap_err();
        assert_eq!(
            err,
            BuilderError::NotFound {
                target: EditTarget::Step,
                order: 5
            }
        );
        assert_eq!(builder.snapshot(), before);
    }

    #[test]
    fn test_terminal_rule_lifecycle() {
        let mut builder = DefinitionBuilder::new();
        builder.add_terminal_rule();
        builder.add_terminal_rule();
        builder.add_terminal_rule();

        builder
            .update_terminal_rule(
                3,
                RulePatch::new()
                    .with_condition(RuleCondition::step_failed([StepType::DtiRule]))
                    .with_outcome(Outcome::Rejected),
            )
            .unwrap();
        builder.reorder_terminal_rules(3, 1).unwrap();
        builder.remove_terminal_rule(2).unwrap();

        let rules = builder.terminal_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].order, 1);
        assert_eq!(rules[0].outcome, Outcome::Rejected);
        assert_eq!(rules[1].order, 2);
        assert_eq!(rules[1].condition, RuleCondition::Default);
        assert!(check_dense(rules).is_ok());
    }

    #[test]
    fn test_switching_rule_kind_resets_fields() {
        let mut builder = DefinitionBuilder::new();
        builder.add_terminal_rule();
        builder
            .update_terminal_rule(
                1,
                RulePatch::new().with_condition(RuleCondition::step_failed([StepType::DtiRule])),
            )
            .unwrap();
        builder
            .update_terminal_rule(1, RulePatch::new().with_kind(ConditionKind::RiskThreshold))
            .unwrap();

        assert_eq!(
            builder.terminal_rule(1).unwrap().condition,
            RuleCondition::risk_threshold(ComparisonOperator::LessOrEqual, 0.0)
        );
    }

    #[test]
    fn test_step_and_rule_orders_are_independent() {
        let mut builder = DefinitionBuilder::new();
        builder.add_terminal_rule();
        assert_eq!(builder.add_step(StepType::DtiRule), 1);
        builder.remove_step(1).unwrap();
        assert_eq!(builder.terminal_rules().len(), 1);
    }

    #[test]
    fn test_load_definition_is_clean() {
        let mut builder = three_steps();
        builder.set_name("Draft");
        assert!(builder.is_dirty());

        let mut definition = PipelineDefinition::new("Loaded");
        definition.steps = vec![
            StepConfig::new(StepType::SentimentCheck, 2),
            StepConfig::new(StepType::DtiRule, 1),
        ];
        builder.load_definition(definition).unwrap();

        assert!(!builder.is_dirty());
        assert_eq!(builder.name(), "Loaded");
        assert_eq!(types(&builder), vec![StepType::DtiRule, StepType::SentimentCheck]);
    }

    #[test]
    fn test_load_malformed_definition_is_rejected() {
        let mut builder = three_steps();
        let before = builder.snapshot();

        let mut definition = PipelineDefinition::new("Broken");
        definition.steps = vec![
            StepConfig::new(StepType::DtiRule, 1),
            StepConfig::new(StepType::AmountPolicy, 1),
        ];
        let err = builder.load_definition(definition).unwrap_err();

        assert!(matches!(err, BuilderError::InvalidTransition(_)));
        assert_eq!(builder.snapshot(), before);
        assert!(builder.is_dirty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut builder = three_steps();
        builder.set_name("Test");
        builder.add_terminal_rule();
        builder.reset();

        assert!(builder.steps().is_empty());
        assert!(builder.terminal_rules().is_empty());
        assert_eq!(builder.name(), "");
        assert!(!builder.is_dirty());
    }

    #[test]
    fn test_change_handlers_see_every_edit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut builder = DefinitionBuilder::new();
        builder.on_change(move |change| sink.lock().unwrap().push(change.clone()));
        builder.add_step(StepType::DtiRule);
        let _ = builder.remove_step(4);
        builder.reset();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                BuilderChange::StepAdded {
                    order: 1,
                    step_type: StepType::DtiRule
                },
                BuilderChange::Reset,
            ]
        );
    }

    #[test]
    fn test_validate_reports_missing_default_and_unreachable_rules() {
        let mut builder = three_steps();
        builder.set_name("Check");
        builder.add_terminal_rule();
        builder
            .update_terminal_rule(1, RulePatch::new().with_kind(ConditionKind::StepFailed))
            .unwrap();
        assert!(builder
            .validate()
            .iter()
            .any(|p| p.contains("no default terminal rule")));

        builder.add_terminal_rule();
        builder.add_terminal_rule();
        builder.reorder_terminal_rules(3, 1).unwrap();
        let problems = builder.validate();
        assert_eq!(problems.len(), 2, "{:?}", problems);
        assert!(problems.iter().all(|p| p.contains("unreachable")));
    }

    #[test]
    fn test_apply_dispatches_commands() {
        let mut builder = DefinitionBuilder::new();
        builder.apply(BuilderCommand::AddStep(StepType::DtiRule)).unwrap();
        builder.apply(BuilderCommand::AddStep(StepType::RiskScoring)).unwrap();
        builder
            .apply(BuilderCommand::ReorderSteps { from: 2, to: 1 })
            .unwrap();
        builder.apply(BuilderCommand::SetName("Scripted".into())).unwrap();

        assert_eq!(types(&builder), vec![StepType::RiskScoring, StepType::DtiRule]);
        assert_eq!(builder.name(), "Scripted");
        assert!(builder.apply(BuilderCommand::RemoveTerminalRule(1)).is_err());
    }
}
