//! SQLite workflow store.
//!
//! The graph is stored as one JSON column; name, owner and status sit in
//! their own columns so listings do not need to parse it.

use chainflow_core::repository::workflow::WorkflowStore;
use chainflow_types::error::RepositoryError;
use chainflow_types::page::{Page, PageRequest};
use chainflow_types::workflow::{Workflow, WorkflowStatus};
use sqlx::Row;
use uuid::Uuid;

use super::pool::{DatabasePool, format_datetime, from_json, parse_datetime, parse_uuid, query_err, to_json};

/// SQLite-backed implementation of `WorkflowStore`.
pub struct SqliteWorkflowStore {
    pool: DatabasePool,
}

impl SqliteWorkflowStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct WorkflowRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    status: String,
    graph: String,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            graph: row.try_get("graph")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_workflow(self) -> Result<Workflow, RepositoryError> {
        let status: WorkflowStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        Ok(Workflow {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            status,
            graph: from_json(&self.graph, "graph")?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

const COLUMNS: &str = "id, user_id, name, description, status, graph, created_at, updated_at";

impl WorkflowStore for SqliteWorkflowStore {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let graph = to_json(&workflow.graph, "graph")?;

        sqlx::query(
            r#"INSERT INTO workflows (id, user_id, name, description, status, graph, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 user_id = excluded.user_id,
                 name = excluded.name,
                 description = excluded.description,
                 status = excluded.status,
                 graph = excluded.graph,
                 updated_at = excluded.updated_at"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.user_id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.status.to_string())
        .bind(&graph)
        .bind(format_datetime(&workflow.created_at))
        .bind(format_datetime(&workflow.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM workflows WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(WorkflowRow::from_row(&row).map_err(query_err)?.into_workflow()?)),
            None => Ok(None),
        }
    }

    async fn list_workflows_page(&self, user_id: Option<&str>, page: PageRequest) -> Result<Page<Workflow>, RepositoryError> {
        // A NULL `user_id` matches every owner.
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflows WHERE (?1 IS NULL OR user_id = ?1)")
            .bind(user_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM workflows WHERE (?1 IS NULL OR user_id = ?1) \
             ORDER BY updated_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let items = rows
            .iter()
            .map(|row| WorkflowRow::from_row(row).map_err(query_err)?.into_workflow())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }
}
