//! CLI command definitions

use crate::builder::{BuilderCommand, DefinitionBuilder};
use crate::core::{
    ComparisonOperator, ConditionKind, Outcome, RuleCondition, RulePatch, StepParams, StepType,
};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Validate a pipeline definition file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run a pipeline against an application
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long, conflicts_with = "pipeline", required_unless_present = "pipeline")]
    pub file: Option<PathBuf>,

    /// Id of a stored pipeline
    #[arg(short, long)]
    pub pipeline: Option<i64>,

    /// Path to application YAML or JSON file
    #[arg(short, long)]
    pub application: PathBuf,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the run record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Apply one edit to a pipeline file
#[derive(Debug, Args, Clone)]
pub struct EditCommand {
    /// Path to pipeline YAML or JSON file; created if missing
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(subcommand)]
    pub action: EditAction,
}

/// Edits, one per builder operation
#[derive(Debug, Subcommand, Clone)]
pub enum EditAction {
    /// Append a step with its default params
    AddStep {
        #[arg(value_enum)]
        step_type: StepTypeArg,
    },

    /// Remove a step; later steps move up
    RemoveStep { order: u32 },

    /// Move a step to another position
    MoveStep { from: u32, to: u32 },

    /// Replace a step's params
    SetParams {
        order: u32,

        /// New params as JSON, e.g. '{"max_dti": 0.35}'
        #[arg(long)]
        json: String,
    },

    /// Append a default → NEEDS_REVIEW terminal rule
    AddRule,

    /// Remove a terminal rule; later rules move up
    RemoveRule { order: u32 },

    /// Move a terminal rule to another position
    MoveRule { from: u32, to: u32 },

    /// Change a terminal rule's condition and/or outcome
    SetRule {
        order: u32,

        /// Condition kind; switching kind starts from that kind's defaults
        #[arg(long, value_enum)]
        kind: Option<ConditionKindArg>,

        /// Step types for a step-failed condition
        #[arg(long, value_enum, value_delimiter = ',')]
        steps: Vec<StepTypeArg>,

        /// Operator for a risk-threshold condition
        #[arg(long, value_parser = parse_operator)]
        operator: Option<ComparisonOperator>,

        /// Threshold for a risk-threshold condition
        #[arg(long)]
        value: Option<f64>,

        #[arg(long, value_enum)]
        outcome: Option<OutcomeArg>,
    },

    /// Rename the pipeline
    SetName { name: String },

    /// Change the pipeline description
    SetDescription { description: String },
}

impl EditAction {
    /// Translate into a builder command against the current working copy
    pub fn to_command(&self, builder: &DefinitionBuilder) -> Result<BuilderCommand> {
        let command = match self {
            EditAction::AddStep { step_type } => BuilderCommand::AddStep((*step_type).into()),
            EditAction::RemoveStep { order } => BuilderCommand::RemoveStep(*order),
            EditAction::MoveStep { from, to } => BuilderCommand::ReorderSteps { from: *from, to: *to },
            EditAction::SetParams { order, json } => {
                let step = builder
                    .step(*order)
                    .with_context(|| format!("No step at order {}", order))?;
                let value: serde_json::Value =
                    serde_json::from_str(json).context("Params are not valid JSON")?;
                let params = StepParams::from_value(step.step_type(), value)
                    .with_context(|| format!("Params do not fit a {} step", step.step_type()))?;
                BuilderCommand::UpdateStepParams { order: *order, params }
            }
            EditAction::AddRule => BuilderCommand::AddTerminalRule,
            EditAction::RemoveRule { order } => BuilderCommand::RemoveTerminalRule(*order),
            EditAction::MoveRule { from, to } => {
                BuilderCommand::ReorderTerminalRules { from: *from, to: *to }
            }
            EditAction::SetRule {
                order,
                kind,
                steps,
                operator,
                value,
                outcome,
            } => {
                let current = builder
                    .terminal_rule(*order)
                    .with_context(|| format!("No terminal rule at order {}", order))?;
                let mut patch = rule_patch(
                    &current.condition,
                    kind.map(Into::into),
                    steps,
                    *operator,
                    *value,
                )?;
                if let Some(outcome) = outcome {
                    patch = patch.with_outcome((*outcome).into());
                }
                if patch.is_empty() {
                    anyhow::bail!("Nothing to change: pass --kind, --steps, --operator, --value or --outcome");
                }
                BuilderCommand::UpdateTerminalRule { order: *order, patch }
            }
            EditAction::SetName { name } => BuilderCommand::SetName(name.clone()),
            EditAction::SetDescription { description } => {
                BuilderCommand::SetDescription(description.clone())
            }
        };
        Ok(command)
    }
}

/// Condition part of a `set-rule` edit.
///
/// The kind is the explicit `--kind`, else implied by the fields given.
/// Risk-threshold fields not given keep their current value when the rule
/// already is a risk threshold. Field flags the kind does not use are an
/// error rather than being dropped.
fn rule_patch(
    current: &RuleCondition,
    kind: Option<ConditionKind>,
    steps: &[StepTypeArg],
    operator: Option<ComparisonOperator>,
    value: Option<f64>,
) -> Result<RulePatch> {
    let step_flags: Vec<&str> = if steps.is_empty() { vec![] } else { vec!["--steps"] };
    let threshold_flags: Vec<&str> = [
        operator.is_some().then_some("--operator"),
        value.is_some().then_some("--value"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let kind = match kind {
        Some(kind) => Some(kind),
        None if !step_flags.is_empty() && !threshold_flags.is_empty() => anyhow::bail!(
            "--steps cannot be combined with {}; pass --kind to pick one condition",
            threshold_flags.join(", ")
        ),
        None if !step_flags.is_empty() => Some(ConditionKind::StepFailed),
        None if !threshold_flags.is_empty() => Some(ConditionKind::RiskThreshold),
        None => None,
    };

    let unused: Vec<&str> = match kind {
        Some(ConditionKind::StepFailed) => threshold_flags,
        Some(ConditionKind::RiskThreshold) => step_flags,
        Some(ConditionKind::Default) => step_flags.into_iter().chain(threshold_flags).collect(),
        None => vec![],
    };
    if let Some(kind) = kind.filter(|_| !unused.is_empty()) {
        anyhow::bail!(
            "--kind {} does not use {}",
            kind.to_string().replace('_', "-"),
            unused.join(", ")
        );
    }

    let patch = match kind {
        Some(ConditionKind::StepFailed) if !steps.is_empty() => RulePatch::new()
            .with_condition(RuleCondition::step_failed(steps.iter().map(|s| (*s).into()))),
        Some(ConditionKind::RiskThreshold) if operator.is_some() || value.is_some() => {
            let (current_op, current_value) = match current {
                RuleCondition::RiskThreshold { operator, value } => (*operator, *value),
                _ => (ComparisonOperator::LessOrEqual, 0.0),
            };
            RulePatch::new().with_condition(RuleCondition::risk_threshold(
                operator.unwrap_or(current_op),
                value.unwrap_or(current_value),
            ))
        }
        Some(kind) => RulePatch::new().with_kind(kind),
        None => RulePatch::new(),
    };
    Ok(patch)
}

/// List step types with their defaults and params
#[derive(Debug, Args, Clone)]
pub struct CatalogCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Manage stored pipelines
#[derive(Debug, Args, Clone)]
pub struct PipelinesCommand {
    #[command(subcommand)]
    pub action: PipelinesAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum PipelinesAction {
    /// Store a pipeline file, or replace a stored one with --id
    Save {
        #[arg(short, long)]
        file: PathBuf,

        /// Replace the pipeline stored under this id
        #[arg(long)]
        id: Option<i64>,
    },

    /// Delete a stored pipeline; its runs stay in history
    Delete {
        #[arg(long)]
        id: i64,
    },

    /// List stored pipelines
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Stored pipeline id to filter by
    #[arg(short, long)]
    pub pipeline: Option<i64>,

    /// Application id to filter by
    #[arg(short, long)]
    pub application: Option<i64>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show one run in full
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Step type argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StepTypeArg {
    DtiRule,
    AmountPolicy,
    RiskScoring,
    SentimentCheck,
}

impl From<StepTypeArg> for StepType {
    fn from(arg: StepTypeArg) -> Self {
        match arg {
            StepTypeArg::DtiRule => StepType::DtiRule,
            StepTypeArg::AmountPolicy => StepType::AmountPolicy,
            StepTypeArg::RiskScoring => StepType::RiskScoring,
            StepTypeArg::SentimentCheck => StepType::SentimentCheck,
        }
    }
}

/// Condition kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConditionKindArg {
    StepFailed,
    RiskThreshold,
    Default,
}

impl From<ConditionKindArg> for ConditionKind {
    fn from(arg: ConditionKindArg) -> Self {
        match arg {
            ConditionKindArg::StepFailed => ConditionKind::StepFailed,
            ConditionKindArg::RiskThreshold => ConditionKind::RiskThreshold,
            ConditionKindArg::Default => ConditionKind::Default,
        }
    }
}

/// Outcome argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutcomeArg {
    Approved,
    Rejected,
    NeedsReview,
}

impl From<OutcomeArg> for Outcome {
    fn from(arg: OutcomeArg) -> Self {
        match arg {
            OutcomeArg::Approved => Outcome::Approved,
            OutcomeArg::Rejected => Outcome::Rejected,
            OutcomeArg::NeedsReview => Outcome::NeedsReview,
        }
    }
}

/// Parse a comparison operator symbol
pub fn parse_operator(s: &str) -> Result<ComparisonOperator, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_rule(condition: RuleCondition) -> DefinitionBuilder {
        let mut builder = DefinitionBuilder::new();
        builder.add_step(StepType::DtiRule);
        builder.add_terminal_rule();
        builder
            .update_terminal_rule(1, RulePatch::new().with_condition(condition))
            .unwrap();
        builder
    }

    #[test]
    fn test_set_params_decodes_for_step_type() {
        let builder = builder_with_rule(RuleCondition::Default);
        let action = EditAction::SetParams {
            order: 1,
            json: r#"{"max_dti": 0.3}"#.to_string(),
        };

        match action.to_command(&builder).unwrap() {
            BuilderCommand::UpdateStepParams { order, params } => {
                assert_eq!(order, 1);
                assert_eq!(params.step_type(), StepType::DtiRule);
            }
            other => panic!("Expected UpdateStepParams, got {:?}", other),
        }

        let missing = EditAction::SetParams {
            order: 4,
            json: "{}".to_string(),
        };
        assert!(missing.to_command(&builder).is_err());
    }

    #[test]
    fn test_set_rule_infers_kind_from_fields() {
        let current = RuleCondition::Default;

        let patch = rule_patch(&current, None, &[StepTypeArg::DtiRule], None, None).unwrap();
        assert_eq!(
            patch,
            RulePatch::new().with_condition(RuleCondition::step_failed([StepType::DtiRule]))
        );

        let patch = rule_patch(&current, None, &[], None, Some(45.0)).unwrap();
        assert_eq!(
            patch,
            RulePatch::new().with_condition(RuleCondition::risk_threshold(
                ComparisonOperator::LessOrEqual,
                45.0
            ))
        );
    }

    #[test]
    fn test_set_rule_keeps_current_threshold_fields() {
        let current = RuleCondition::risk_threshold(ComparisonOperator::Greater, 70.0);
        let patch =
            rule_patch(&current, None, &[], Some(ComparisonOperator::GreaterOrEqual), None).unwrap();

        assert_eq!(
            patch,
            RulePatch::new().with_condition(RuleCondition::risk_threshold(
                ComparisonOperator::GreaterOrEqual,
                70.0
            ))
        );
    }

    #[test]
    fn test_set_rule_refuses_flags_the_kind_ignores() {
        let current = RuleCondition::Default;

        let err = rule_patch(
            &current,
            Some(ConditionKind::Default),
            &[StepTypeArg::DtiRule],
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--steps"), "{}", err);

        let err = rule_patch(
            &current,
            Some(ConditionKind::StepFailed),
            &[StepTypeArg::DtiRule],
            Some(ComparisonOperator::LessOrEqual),
            None,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "--kind step-failed does not use --operator");

        let err = rule_patch(
            &current,
            Some(ConditionKind::RiskThreshold),
            &[StepTypeArg::AmountPolicy],
            None,
            Some(40.0),
        )
        .unwrap_err();
        assert!(err.to_string().contains("--steps"), "{}", err);

        let err = rule_patch(&current, None, &[StepTypeArg::DtiRule], None, Some(40.0)).unwrap_err();
        assert!(err.to_string().contains("--value"), "{}", err);
    }

    #[test]
    fn test_set_rule_kind_alone_installs_defaults() {
        let patch = rule_patch(&RuleCondition::Default, Some(ConditionKind::StepFailed), &[], None, None)
            .unwrap();
        assert_eq!(patch, RulePatch::new().with_kind(ConditionKind::StepFailed));
    }

    #[test]
    fn test_set_rule_requires_a_change() {
        let builder = builder_with_rule(RuleCondition::Default);
        let action = EditAction::SetRule {
            order: 1,
            kind: None,
            steps: vec![],
            operator: None,
            value: None,
            outcome: None,
        };
        assert!(action.to_command(&builder).is_err());
    }

    #[test]
    fn test_parse_operator() {
        assert_eq!(parse_operator("<="), Ok(ComparisonOperator::LessOrEqual));
        assert!(parse_operator("=>").is_err());
    }
}
