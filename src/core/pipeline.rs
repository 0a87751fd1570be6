//! Pipeline definition model

use crate::core::{
    rule::TerminalRule,
    sequence::{check_dense, SequenceError},
    step::{StepConfig, StepType},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a definition cannot be loaded or executed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("step orders are invalid: {0}")]
    Steps(SequenceError),

    #[error("terminal rule orders are invalid: {0}")]
    Rules(SequenceError),

    #[error("pipeline name must not be empty")]
    EmptyName,

    #[error("no unconditional terminal rule; add a trailing default rule")]
    MissingDefaultRule,

    #[error("step {order} ({step_type}) has invalid params: {problems}")]
    InvalidParams {
        order: u32,
        step_type: StepType,
        problems: String,
    },
}

/// The named, ordered combination of steps and terminal rules.
///
/// Treated as a value: once handed to persistence or execution it is
/// copied, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub steps: Vec<StepConfig>,

    #[serde(default)]
    pub terminal_rules: Vec<TerminalRule>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Both sequences carry exactly the orders `1..=N`
    pub fn validate(&self) -> Result<(), DefinitionError> {
        check_dense(&self.steps).map_err(DefinitionError::Steps)?;
        check_dense(&self.terminal_rules).map_err(DefinitionError::Rules)?;
        Ok(())
    }

    /// Structural validity plus everything execution relies on
    pub fn check_executable(&self) -> Result<(), DefinitionError> {
        self.validate()?;

        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        for step in self.ordered_steps() {
            let problems = step.params.validate();
            if !problems.is_empty() {
                return Err(DefinitionError::InvalidParams {
                    order: step.order,
                    step_type: step.step_type(),
                    problems: problems.join("; "),
                });
            }
        }

        if !self
            .terminal_rules
            .iter()
            .any(|rule| rule.condition.is_unconditional())
        {
            return Err(DefinitionError::MissingDefaultRule);
        }

        Ok(())
    }

    /// Steps in ascending order, regardless of storage order
    pub fn ordered_steps(&self) -> Vec<&StepConfig> {
        let mut steps: Vec<&StepConfig> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.order);
        steps
    }

    /// Terminal rules in ascending order, regardless of storage order
    pub fn ordered_rules(&self) -> Vec<&TerminalRule> {
        let mut rules: Vec<&TerminalRule> = self.terminal_rules.iter().collect();
        rules.sort_by_key(|rule| rule.order);
        rules
    }
}
