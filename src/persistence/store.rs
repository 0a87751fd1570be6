//! SQLite-based persistence store

use crate::core::{Outcome, PipelineDefinition, Run, StepLog, Verdict};
use crate::persistence::{PersistenceBackend, PipelineRecord, RunFilter, StoreError};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// SQLite store for pipeline definitions and runs
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// A private database that lives as long as the store
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("loanflow");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        Self::new(db_dir.join("loanflow.db")).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipelines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                application_id INTEGER NOT NULL,
                pipeline_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                verdict TEXT NOT NULL,
                step_logs TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_pipelines_name ON pipelines(name);
            CREATE INDEX IF NOT EXISTS idx_runs_pipeline_id ON runs(pipeline_id);
            CREATE INDEX IF NOT EXISTS idx_runs_application_id ON runs(application_id);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    /// Map a unique-name violation to `StoreError::DuplicateName`
    fn pipeline_write_error(e: sqlx::Error, name: &str, context: &'static str) -> anyhow::Error {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateName(name.to_string()).into()
            }
            _ => anyhow::Error::new(e).context(context),
        }
    }

    fn pipeline_from_row(row: &SqliteRow) -> Result<PipelineRecord> {
        let definition: PipelineDefinition =
            serde_json::from_str(&row.try_get::<String, _>("definition")?)
                .context("Stored pipeline definition is not valid JSON")?;
        Ok(PipelineRecord {
            id: row.try_get("id")?,
            definition,
            created_at: Self::from_naive(row.try_get("created_at")?),
            updated_at: Self::from_naive(row.try_get("updated_at")?),
        })
    }

    fn run_from_row(row: &SqliteRow) -> Result<Run> {
        let status = Outcome::from_str(&row.try_get::<String, _>("status")?)
            .map_err(anyhow::Error::msg)?;
        let verdict: Verdict = serde_json::from_str(&row.try_get::<String, _>("verdict")?)
            .context("Stored verdict is not valid JSON")?;
        let step_logs: Vec<StepLog> = serde_json::from_str(&row.try_get::<String, _>("step_logs")?)
            .context("Stored step logs are not valid JSON")?;

        Ok(Run {
            id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
            application_id: row.try_get("application_id")?,
            pipeline_id: row.try_get("pipeline_id")?,
            status,
            step_logs,
            verdict,
            started_at: Self::from_naive(row.try_get("started_at")?),
            completed_at: Self::from_naive(row.try_get("completed_at")?),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStore {
    async fn create_pipeline(&self, definition: &PipelineDefinition) -> Result<PipelineRecord> {
        definition.validate()?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO pipelines (name, definition, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&definition.name)
        .bind(serde_json::to_string(definition)?)
        .bind(Self::to_naive(now))
        .bind(Self::to_naive(now))
        .execute(&self.pool)
        .await
        .map_err(|e| Self::pipeline_write_error(e, &definition.name, "Failed to save pipeline"))?;

        Ok(PipelineRecord {
            id: result.last_insert_rowid(),
            definition: definition.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_pipeline(&self, id: i64, definition: &PipelineDefinition) -> Result<PipelineRecord> {
        definition.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE pipelines SET name = ?1, definition = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(&definition.name)
        .bind(serde_json::to_string(definition)?)
        .bind(Self::to_naive(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::pipeline_write_error(e, &definition.name, "Failed to update pipeline"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::PipelineNotFound(id).into());
        }

        self.load_pipeline(id)
            .await?
            .with_context(|| format!("Pipeline {} vanished during update", id))
    }

    async fn load_pipeline(&self, id: i64) -> Result<Option<PipelineRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, definition, created_at, updated_at
            FROM pipelines
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load pipeline")?;

        row.as_ref().map(Self::pipeline_from_row).transpose()
    }

    async fn delete_pipeline(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM pipelines WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete pipeline")?;

        if result.rows_affected() == 0 {
            return Err(StoreError::PipelineNotFound(id).into());
        }
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, definition, created_at, updated_at
            FROM pipelines
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        rows.iter().map(Self::pipeline_from_row).collect()
    }

    async fn save_run(&self, run: &Run) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, application_id, pipeline_id, status, verdict, step_logs, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(run.id.to_string())
        .bind(run.application_id)
        .bind(run.pipeline_id)
        .bind(run.status.as_str())
        .bind(serde_json::to_string(&run.verdict)?)
        .bind(serde_json::to_string(&run.step_logs)?)
        .bind(Self::to_naive(run.started_at))
        .bind(Self::to_naive(run.completed_at))
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        let row = sqlx::query(
            r#"
            SELECT id, application_id, pipeline_id, status, verdict, step_logs, started_at, completed_at
            FROM runs
            WHERE id = ?1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load run")?;

        row.as_ref().map(Self::run_from_row).transpose()
    }

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<Run>> {
        let rows = sqlx::query(
            r#"
            SELECT id, application_id, pipeline_id, status, verdict, step_logs, started_at, completed_at
            FROM runs
            WHERE (?1 IS NULL OR pipeline_id = ?1)
              AND (?2 IS NULL OR application_id = ?2)
            ORDER BY started_at DESC
            "#,
        )
        .bind(filter.pipeline_id)
        .bind(filter.application_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::run_from_row).collect()
    }
}
