//! SQLite execution store: run history plus the pause checkpoint.

use chainflow_core::repository::execution::ExecutionStore;
use chainflow_types::error::RepositoryError;
use chainflow_types::execution::{ExecutionRecord, ExecutionStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::{DatabasePool, format_datetime, from_json, parse_datetime, parse_uuid, query_err, to_json};

/// SQLite-backed implementation of `ExecutionStore`.
pub struct SqliteExecutionStore {
    pool: DatabasePool,
}

impl SqliteExecutionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ExecutionRow {
    id: String,
    workflow_id: String,
    user_id: String,
    source: String,
    status: String,
    trigger_data: String,
    test_mode: bool,
    context: Option<String>,
    steps: String,
    error: Option<String>,
    pause: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            user_id: row.try_get("user_id")?,
            source: row.try_get("source")?,
            status: row.try_get("status")?,
            trigger_data: row.try_get("trigger_data")?,
            test_mode: row.try_get("test_mode")?,
            context: row.try_get("context")?,
            steps: row.try_get("steps")?,
            error: row.try_get("error")?,
            pause: row.try_get("pause")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_record(self) -> Result<ExecutionRecord, RepositoryError> {
        let status: ExecutionStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ExecutionRecord {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            user_id: self.user_id,
            source: self.source,
            status,
            trigger_data: from_json(&self.trigger_data, "trigger_data")?,
            test_mode: self.test_mode,
            context: self.context.as_deref().map(|s| from_json(s, "context")).transpose()?,
            steps: from_json(&self.steps, "steps")?,
            error: self.error,
            pause: self.pause.as_deref().map(|s| from_json(s, "pause")).transpose()?,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

const COLUMNS: &str = "id, workflow_id, user_id, source, status, trigger_data, test_mode, context, steps, error, pause, started_at, completed_at";

fn optional_json<T: serde::Serialize>(value: Option<&T>, what: &str) -> Result<Option<String>, RepositoryError> {
    value.map(|v| to_json(v, what)).transpose()
}

impl ExecutionStore for SqliteExecutionStore {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO workflow_executions ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(record.id.to_string())
        .bind(record.workflow_id.to_string())
        .bind(&record.user_id)
        .bind(&record.source)
        .bind(record.status.to_string())
        .bind(to_json(&record.trigger_data, "trigger_data")?)
        .bind(record.test_mode)
        .bind(optional_json(record.context.as_ref(), "context")?)
        .bind(to_json(&record.steps, "steps")?)
        .bind(&record.error)
        .bind(optional_json(record.pause.as_ref(), "pause")?)
        .bind(format_datetime(&record.started_at))
        .bind(record.completed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE workflow_executions
               SET status = ?, context = ?, steps = ?, error = ?, pause = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(record.status.to_string())
        .bind(optional_json(record.context.as_ref(), "context")?)
        .bind(to_json(&record.steps, "steps")?)
        .bind(&record.error)
        .bind(optional_json(record.pause.as_ref(), "pause")?)
        .bind(record.completed_at.as_ref().map(format_datetime))
        .bind(record.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<ExecutionRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM workflow_executions WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(ExecutionRow::from_row(&row).map_err(query_err)?.into_record()?)),
            None => Ok(None),
        }
    }

    async fn list_executions(&self, workflow_id: &Uuid, limit: u32) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM workflow_executions WHERE workflow_id = ? ORDER BY started_at DESC, id DESC LIMIT ?"
        ))
        .bind(workflow_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| ExecutionRow::from_row(row).map_err(query_err)?.into_record())
            .collect()
    }

    async fn list_executions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        workflow_id: Option<&Uuid>,
    ) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM workflow_executions \
             WHERE started_at >= ?1 AND started_at < ?2 AND (?3 IS NULL OR workflow_id = ?3) \
             ORDER BY started_at ASC, id ASC"
        ))
        .bind(format_datetime(&start))
        .bind(format_datetime(&end))
        .bind(workflow_id.map(Uuid::to_string))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| ExecutionRow::from_row(row).map_err(query_err)?.into_record())
            .collect()
    }
}
