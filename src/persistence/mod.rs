//! Persistence layer for pipeline definitions and run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

use crate::core::{PipelineDefinition, Run};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

/// Store failures callers may want to tell apart; recover with
/// `anyhow::Error::downcast_ref`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("a pipeline named '{0}' already exists")]
    DuplicateName(String),

    #[error("Pipeline {0} not found")]
    PipelineNotFound(i64),
}

/// Which runs to list; unset fields match every run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub pipeline_id: Option<i64>,
    pub application_id: Option<i64>,
}

impl RunFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipeline(mut self, pipeline_id: i64) -> Self {
        self.pipeline_id = Some(pipeline_id);
        self
    }

    pub fn application(mut self, application_id: i64) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn matches(&self, run: &Run) -> bool {
        self.pipeline_id.map_or(true, |id| run.pipeline_id == id)
            && self.application_id.map_or(true, |id| run.application_id == id)
    }
}

/// A stored pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Identifier assigned by the store, starting at 1
    pub id: i64,

    pub definition: PipelineDefinition,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Store a new definition and return its record; names are unique
    async fn create_pipeline(&self, definition: &PipelineDefinition) -> Result<PipelineRecord>;

    /// Replace the definition stored under `id`
    async fn update_pipeline(&self, id: i64, definition: &PipelineDefinition) -> Result<PipelineRecord>;

    async fn load_pipeline(&self, id: i64) -> Result<Option<PipelineRecord>>;

    /// Remove a stored definition; runs that used it stay in history
    async fn delete_pipeline(&self, id: i64) -> Result<()>;

    /// All stored definitions, by id
    async fn list_pipelines(&self) -> Result<Vec<PipelineRecord>>;

    async fn save_run(&self, run: &Run) -> Result<()>;

    async fn load_run(&self, run_id: Uuid) -> Result<Option<Run>>;

    /// Runs matching `filter`, newest first
    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<Run>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    pipelines: tokio::sync::RwLock<BTreeMap<i64, PipelineRecord>>,
    runs: tokio::sync::RwLock<HashMap<Uuid, Run>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            pipelines: tokio::sync::RwLock::new(BTreeMap::new()),
            runs: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

fn check_name_free(
    pipelines: &BTreeMap<i64, PipelineRecord>,
    name: &str,
    except: Option<i64>,
) -> Result<()> {
    let taken = pipelines
        .values()
        .any(|record| record.definition.name == name && Some(record.id) != except);
    if taken {
        return Err(StoreError::DuplicateName(name.to_string()).into());
    }
    Ok(())
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn create_pipeline(&self, definition: &PipelineDefinition) -> Result<PipelineRecord> {
        definition.validate()?;

        let mut pipelines = self.pipelines.write().await;
        check_name_free(&pipelines, &definition.name, None)?;
        let id = pipelines.keys().next_back().map_or(1, |last| last + 1);
        let now = Utc::now();
        let record = PipelineRecord {
            id,
            definition: definition.clone(),
            created_at: now,
            updated_at: now,
        };
        pipelines.insert(id, record.clone());
        Ok(record)
    }

    async fn update_pipeline(&self, id: i64, definition: &PipelineDefinition) -> Result<PipelineRecord> {
        definition.validate()?;

        let mut pipelines = self.pipelines.write().await;
        check_name_free(&pipelines, &definition.name, Some(id))?;
        let Some(record) = pipelines.get_mut(&id) else {
            return Err(StoreError::PipelineNotFound(id).into());
        };
        record.definition = definition.clone();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn load_pipeline(&self, id: i64) -> Result<Option<PipelineRecord>> {
        let pipelines = self.pipelines.read().await;
        Ok(pipelines.get(&id).cloned())
    }

    async fn delete_pipeline(&self, id: i64) -> Result<()> {
        let mut pipelines = self.pipelines.write().await;
        match pipelines.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::PipelineNotFound(id).into()),
        }
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineRecord>> {
        let pipelines = self.pipelines.read().await;
        Ok(pipelines.values().cloned().collect())
    }

    async fn save_run(&self, run: &Run) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<Run>> {
        let runs = self.runs.read().await;
        let mut result: Vec<Run> = runs
            .values()
            .filter(|run| filter.matches(run))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }
}
