//! Durable job ledger on SQLite
//!
//! Every job lives in one row of the `jobs` table. Requests and results are
//! stored as their concrete JSON payload next to the `kind` column, which
//! selects the type to decode them into. Timestamps are unix milliseconds.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chorus_shared_config::DatabaseConfig;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{
    now_millis, Job, JobFilter, JobKind, JobRequest, JobResult, JobStatus, JobUpdate, Transition,
};

/// Columns in [`JobRow`] order
const JOB_COLUMNS: &str = "id, kind, status, progress, stage, error_message, request_json, \
                           result_json, created_at, updated_at";

/// Errors raised by the job ledger
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or connection failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be encoded or decoded
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job {0} not found")]
    NotFound(Uuid),

    /// Insert of an id that already exists
    #[error("job {0} already exists")]
    Duplicate(Uuid),

    /// Update aimed at a job that already completed or failed
    #[error("job {id} is already {status}")]
    Finished { id: Uuid, status: JobStatus },

    /// Row holds values no job can have
    #[error("corrupt job row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Busy pool or I/O hiccup rather than a bad query
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Raw `jobs` row
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    kind: String,
    status: String,
    progress: f64,
    stage: String,
    error_message: Option<String>,
    request_json: String,
    result_json: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn millis_to_datetime(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {} out of range", millis)))
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::Corrupt(format!("id '{}': {}", row.id, e)))?;
        let kind = JobKind::from_str(&row.kind).map_err(StoreError::Corrupt)?;
        let status = JobStatus::from_str(&row.status).map_err(StoreError::Corrupt)?;
        let request = JobRequest::from_payload(kind, &row.request_json)?;
        let result = row
            .result_json
            .as_deref()
            .map(|payload| JobResult::from_payload(kind, payload))
            .transpose()?;

        Ok(Job {
            id,
            kind,
            status,
            request,
            progress: row.progress,
            stage: row.stage,
            error_message: row.error_message,
            result,
            created_at: millis_to_datetime(row.created_at)?,
            updated_at: millis_to_datetime(row.updated_at)?,
        })
    }
}

fn rows_to_jobs(rows: Vec<JobRow>) -> StoreResult<Vec<Job>> {
    rows.into_iter().map(Job::try_from).collect()
}

/// SQLite-backed job ledger
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    /// Open (creating if missing) the database described by `config`
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && parent != Path::new(":memory:") {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        info!(url = %config.url, "Connected to job store");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the schema if absent; safe to call on every start
    pub async fn initialize(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                progress REAL NOT NULL DEFAULT 0,
                stage TEXT NOT NULL DEFAULT '',
                error_message TEXT,
                request_json TEXT NOT NULL,
                result_json TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_kind_created ON jobs (kind, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_status_updated ON jobs (status, updated_at)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        debug!("Job store schema ready");
        Ok(())
    }

    /// Insert a new job; an existing id is an error, never overwritten
    #[instrument(skip(self, job), fields(job_id = %job.id, kind = %job.kind))]
    pub async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let request_json = job.request.to_payload()?;
        let result_json = job.result.as_ref().map(JobResult::to_payload).transpose()?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, status, progress, stage, error_message,
                request_json, result_json, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(&job.stage)
        .bind(&job.error_message)
        .bind(request_json)
        .bind(result_json)
        .bind(job.created_at.timestamp_millis())
        .bind(job.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Duplicate(job.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point lookup
    pub async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Job::try_from).transpose()
    }

    /// Apply a partial update in one statement and return the fresh row.
    ///
    /// Completed and Failed rows are final: any update to one is refused with
    /// [`StoreError::Finished`] and leaves the row untouched.
    #[instrument(skip(self, update), fields(job_id = %id))]
    pub async fn update_job(&self, id: Uuid, update: &JobUpdate) -> StoreResult<Job> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE jobs SET updated_at = ");
        query.push_bind(now_millis().timestamp_millis());

        if let Some(transition) = &update.transition {
            query
                .push(", status = ")
                .push_bind(transition.status().as_str());
            match transition {
                Transition::Completed(result) => {
                    query
                        .push(", result_json = ")
                        .push_bind(result.to_payload()?)
                        .push(", error_message = NULL");
                }
                Transition::Failed(message) => {
                    query
                        .push(", result_json = NULL, error_message = ")
                        .push_bind(message.clone());
                }
                Transition::Queued | Transition::Processing => {
                    query.push(", result_json = NULL, error_message = NULL");
                }
            }
        }
        if let Some(progress) = update.progress {
            query.push(", progress = ").push_bind(progress.clamp(0.0, 1.0));
        }
        if let Some(stage) = &update.stage {
            query.push(", stage = ").push_bind(stage.clone());
        }

        query
            .push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND status NOT IN (")
            .push_bind(JobStatus::Completed.as_str())
            .push(", ")
            .push_bind(JobStatus::Failed.as_str())
            .push(") RETURNING ")
            .push(JOB_COLUMNS);

        let row: Option<JobRow> = query.build_query_as::<JobRow>().fetch_optional(&self.pool).await?;
        if let Some(row) = row {
            return Job::try_from(row);
        }

        // Nothing matched: either no such job or a finished one
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match status {
            Some(status) => Err(StoreError::Finished {
                id,
                status: JobStatus::from_str(&status).map_err(StoreError::Corrupt)?,
            }),
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Jobs matching `filter`, newest first; ties keep insertion order
    pub async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM jobs", JOB_COLUMNS));
        let mut separator = " WHERE ";

        if let Some(status) = filter.status {
            query.push(separator).push("status = ").push_bind(status.as_str());
            separator = " AND ";
        }
        if let Some(kind) = filter.kind {
            query.push(separator).push("kind = ").push_bind(kind.as_str());
        }

        query.push(" ORDER BY created_at DESC, rowid DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows: Vec<JobRow> = query.build_query_as::<JobRow>().fetch_all(&self.pool).await?;
        rows_to_jobs(rows)
    }

    /// Queued and Processing jobs, oldest first
    pub async fn get_interrupted_jobs(&self) -> StoreResult<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE status IN ('queued', 'processing') \
             ORDER BY created_at ASC, rowid ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows_to_jobs(rows)
    }

    /// Delete Completed/Failed jobs last written more than `max_age` ago
    #[instrument(skip(self))]
    pub async fn purge_old_jobs(&self, max_age: Duration) -> StoreResult<u64> {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_millis().timestamp_millis().saturating_sub(max_age_ms);

        let deleted = sqlx::query(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND updated_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted > 0 {
            info!(deleted, "Purged old terminal jobs");
        }
        Ok(deleted)
    }

    /// Readiness probe
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
