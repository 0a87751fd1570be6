//! loanflow - loan decision pipelines
//!
//! Ordered decision steps plus prioritized terminal rules, assembled into
//! reusable pipeline definitions and applied to loan applications for a
//! deterministic `APPROVED` / `REJECTED` / `NEEDS_REVIEW` verdict.

pub mod builder;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod steps;

// Re-export commonly used types
pub use builder::{BuilderChange, BuilderCommand, BuilderError, DefinitionBuilder, EditSession};
pub use core::{
    Application, ComparisonOperator, ConditionKind, Outcome, PipelineDefinition, RuleCondition,
    RulePatch, Run, StepConfig, StepLog, StepParams, StepType, TerminalRule, Verdict,
};
pub use execution::{resolve, resolve_run, ExecutionEngine, ExecutionError, ExecutionEvent, ResolveError};
pub use steps::{BuiltinEvaluator, StepError, StepEvaluator, StepOutcome};
