//! Main execution engine - runs a definition against one application

use crate::{
    core::{Application, DefinitionError, PipelineDefinition, Run, StepLog, StepType, Verdict},
    execution::resolver::{resolve_run, ResolveError},
    steps::{StepError, StepEvaluator},
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        application_id: i64,
    },
    StepStarted {
        run_id: Uuid,
        order: u32,
        step_type: StepType,
    },
    StepFinished {
        run_id: Uuid,
        order: u32,
        step_type: StepType,
        passed: bool,
    },
    VerdictReached {
        run_id: Uuid,
        verdict: Verdict,
    },
    RunFailed {
        run_id: Uuid,
        error: String,
    },
}

/// Why a run produced no verdict
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("pipeline cannot run: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error("step {order} ({step_type}) could not be evaluated: {source}")]
    Step {
        order: u32,
        step_type: StepType,
        #[source]
        source: StepError,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Runs pipeline definitions through a step evaluator and the resolver
pub struct ExecutionEngine<E> {
    evaluator: Arc<E>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<E: StepEvaluator + 'static> ExecutionEngine<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every step in order, then resolve the verdict.
    ///
    /// `pipeline_id` is recorded on the run as is; pass 0 for a definition
    /// that was never stored.
    pub async fn execute(
        &self,
        definition: &PipelineDefinition,
        application: &Application,
        pipeline_id: i64,
    ) -> Result<Run, ExecutionError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            "Starting run {} of '{}' for application {}",
            run_id, definition.name, application.id
        );
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            pipeline_name: definition.name.clone(),
            application_id: application.id,
        })
        .await;

        let result = self.run_steps(run_id, definition, application).await;
        let (step_logs, verdict) = match result {
            Ok(done) => done,
            Err(e) => {
                error!("Run {} failed: {}", run_id, e);
                self.emit_event(ExecutionEvent::RunFailed {
                    run_id,
                    error: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };

        info!(
            "Run {} finished: {} ({})",
            run_id, verdict.outcome, verdict.reason
        );
        self.emit_event(ExecutionEvent::VerdictReached {
            run_id,
            verdict: verdict.clone(),
        })
        .await;

        Ok(Run {
            id: run_id,
            application_id: application.id,
            pipeline_id,
            status: verdict.outcome,
            step_logs,
            verdict,
            started_at,
            completed_at: Utc::now(),
        })
    }

    async fn run_steps(
        &self,
        run_id: Uuid,
        definition: &PipelineDefinition,
        application: &Application,
    ) -> Result<(Vec<StepLog>, Verdict), ExecutionError> {
        definition.check_executable()?;

        let mut step_logs: Vec<StepLog> = Vec::with_capacity(definition.steps.len());
        for step in definition.ordered_steps() {
            let step_type = step.step_type();
            self.emit_event(ExecutionEvent::StepStarted {
                run_id,
                order: step.order,
                step_type,
            })
            .await;

            let outcome = self
                .evaluator
                .evaluate(step, application, &step_logs)
                .await
                .map_err(|source| {
                    warn!("Step {} ({}) raised: {}", step.order, step_type, source);
                    ExecutionError::Step {
                        order: step.order,
                        step_type,
                        source,
                    }
                })?;

            debug!(
                order = step.order,
                step_type = %step_type,
                passed = outcome.passed,
                "step evaluated"
            );
            self.emit_event(ExecutionEvent::StepFinished {
                run_id,
                order: step.order,
                step_type,
                passed: outcome.passed,
            })
            .await;

            step_logs.push(StepLog::new(step_type, step.order, outcome.passed, outcome.details));
        }

        let verdict = resolve_run(&step_logs, &definition.terminal_rules)?;
        Ok((step_logs, verdict))
    }
}
