//! Core domain models for loan decision pipelines
//!
//! This module defines the fundamental data structures: step
//! configurations, terminal rules and their conditions, pipeline
//! definitions, applications and run records.

pub mod application;
pub mod catalog;
pub mod condition;
pub mod config;
pub mod pipeline;
pub mod rule;
pub mod run;
pub mod sequence;
pub mod step;

pub use application::Application;
pub use condition::{ComparisonOperator, ConditionCheck, ConditionKind, RuleCondition};
pub use pipeline::{DefinitionError, PipelineDefinition};
pub use rule::{ConditionUpdate, Outcome, RulePatch, TerminalRule};
pub use run::{Run, StepLog, Verdict};
pub use sequence::{Sequence, SequenceError, Sequenced};
pub use step::{StepConfig, StepParams, StepType};
