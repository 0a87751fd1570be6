//! CLI output formatting

use crate::{
    core::{
        catalog::{ParamKind, StepDefinition},
        Outcome, PipelineDefinition, Run, StepConfig, StepLog, TerminalRule,
    },
    execution::ExecutionEvent,
    persistence::PipelineRecord,
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format an outcome for display
pub fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Approved => style(outcome.as_str()).green().bold().to_string(),
        Outcome::Rejected => style(outcome.as_str()).red().bold().to_string(),
        Outcome::NeedsReview => style(outcome.as_str()).yellow().bold().to_string(),
    }
}

fn format_passed(passed: bool) -> String {
    if passed {
        style("PASSED").green().to_string()
    } else {
        style("FAILED").red().to_string()
    }
}

/// One configured step, e.g. `1. dti_rule {"max_dti":0.4}`
pub fn format_step(step: &StepConfig) -> String {
    format!(
        "{}. {} {}",
        step.order,
        style(step.step_type()).cyan(),
        style(step.params.to_value()).dim()
    )
}

/// One terminal rule, e.g. `2. risk score <= 45 → APPROVED`
pub fn format_rule(rule: &TerminalRule) -> String {
    format!(
        "{}. {} → {}",
        rule.order,
        rule.condition.describe(),
        format_outcome(rule.outcome)
    )
}

/// Full listing of a definition
pub fn format_definition(definition: &PipelineDefinition) -> String {
    let mut lines = vec![format!("{}", style(&definition.name).bold())];
    if !definition.description.is_empty() {
        lines.push(format!("  {}", style(&definition.description).dim()));
    }
    lines.push(format!("  Steps ({}):", definition.steps.len()));
    for step in definition.ordered_steps() {
        lines.push(format!("    {}", format_step(step)));
    }
    lines.push(format!("  Terminal rules ({}):", definition.terminal_rules.len()));
    for rule in definition.ordered_rules() {
        lines.push(format!("    {}", format_rule(rule)));
    }
    lines.join("\n")
}

/// One step log line of a run
pub fn format_step_log(log: &StepLog) -> String {
    let icon = if log.passed { CHECK } else { CROSS };
    format!(
        "{} {}. {} {} {}",
        icon,
        log.order,
        style(log.step_type).cyan(),
        format_passed(log.passed),
        style(&log.details).dim()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            application_id,
        } => format!(
            "{} Running {} for application {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(application_id).cyan(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted { order, step_type, .. } => {
            format!("{} {}. {}", SPINNER, order, style(step_type).cyan())
        }
        ExecutionEvent::StepFinished {
            order,
            step_type,
            passed,
            ..
        } => {
            let icon = if *passed { CHECK } else { CROSS };
            format!("{} {}. {} {}", icon, order, style(step_type).cyan(), format_passed(*passed))
        }
        ExecutionEvent::VerdictReached { verdict, .. } => format!(
            "{} Verdict {} ({})",
            INFO,
            format_outcome(verdict.outcome),
            style(&verdict.reason).dim()
        ),
        ExecutionEvent::RunFailed { error, .. } => {
            format!("{} Run failed: {}", CROSS, style(error).red())
        }
    }
}

/// One-line run summary for history listings
pub fn format_run_summary(run: &Run) -> String {
    let failed = run.failed_steps().count();
    format!(
        "{} - pipeline {} - application {} - {} - {}/{} steps passed - {}",
        style(&run.id.to_string()[..8]).dim(),
        style(run.pipeline_id).bold(),
        run.application_id,
        format_outcome(run.status),
        run.step_logs.len() - failed,
        run.step_logs.len(),
        style(run.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// One-line summary of a stored pipeline
pub fn format_pipeline_record(record: &PipelineRecord) -> String {
    format!(
        "{} {} ({} steps, {} rules) - updated {}",
        style(format!("#{}", record.id)).cyan(),
        style(&record.definition.name).bold(),
        record.definition.steps.len(),
        record.definition.terminal_rules.len(),
        style(record.updated_at.format("%Y-%m-%d %H:%M")).dim()
    )
}

fn param_kind(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Number => "number",
        ParamKind::Keywords => "keyword list",
    }
}

/// Catalog entry with its param schema
pub fn format_step_definition(definition: &StepDefinition) -> String {
    let mut lines = vec![format!(
        "{} {} - {}",
        style(definition.step_type).cyan().bold(),
        style(definition.name).bold(),
        definition.description
    )];
    for field in &definition.param_schema {
        lines.push(format!(
            "    {} ({}{}) {}",
            style(field.name).cyan(),
            param_kind(field.kind),
            if field.required { ", required" } else { "" },
            style(field.description).dim()
        ));
    }
    if let Some(kind) = definition.additional_params {
        lines.push(format!("    any other key ({})", param_kind(kind)));
    }
    lines.push(format!(
        "    defaults: {}",
        style(definition.default_params.to_value()).dim()
    ));
    lines.join("\n")
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else {
            format!("{}m {}s", secs / 60, secs % 60)
        }
    }
}
