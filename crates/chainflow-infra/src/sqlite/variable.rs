//! SQLite workflow variable store.

use chainflow_core::repository::variable::VariableStore;
use chainflow_types::error::RepositoryError;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::pool::{DatabasePool, format_datetime, from_json, query_err, to_json};

/// SQLite-backed implementation of `VariableStore`.
pub struct SqliteVariableStore {
    pool: DatabasePool,
}

impl SqliteVariableStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl VariableStore for SqliteVariableStore {
    async fn get_variable(&self, workflow_id: &Uuid, name: &str) -> Result<Option<Value>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM workflow_variables WHERE workflow_id = ? AND name = ?")
                .bind(workflow_id.to_string())
                .bind(name)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;

        row.map(|(value,)| from_json(&value, "variable")).transpose()
    }

    async fn set_variable(&self, workflow_id: &Uuid, name: &str, value: &Value) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_variables (workflow_id, name, value, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(workflow_id, name) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at"#,
        )
        .bind(workflow_id.to_string())
        .bind(name)
        .bind(to_json(value, "variable")?)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        tracing::debug!(workflow_id = %workflow_id, name, "stored workflow variable");
        Ok(())
    }

    async fn list_variables(&self, workflow_id: &Uuid) -> Result<Vec<(String, Value)>, RepositoryError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, value FROM workflow_variables WHERE workflow_id = ? ORDER BY name ASC")
                .bind(workflow_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_err)?;

        rows.into_iter()
            .map(|(name, value)| Ok((name, from_json(&value, "variable")?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_and_overwrite() {
        let store = SqliteVariableStore::new(test_pool().await);
        let workflow_id = Uuid::now_v7();

        assert!(store.get_variable(&workflow_id, "counter").await.unwrap().is_none());

        store.set_variable(&workflow_id, "counter", &json!(1)).await.unwrap();
        store.set_variable(&workflow_id, "counter", &json!({ "n": 2 })).await.unwrap();

        assert_eq!(
            store.get_variable(&workflow_id, "counter").await.unwrap(),
            Some(json!({ "n": 2 }))
        );
    }

    #[tokio::test]
    async fn test_variables_are_scoped_per_workflow() {
        let store = SqliteVariableStore::new(test_pool().await);
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        store.set_variable(&a, "zeta", &json!("z")).await.unwrap();
        store.set_variable(&a, "alpha", &json!("a")).await.unwrap();
        store.set_variable(&b, "alpha", &json!("other")).await.unwrap();

        let listed = store.list_variables(&a).await.unwrap();
        assert_eq!(
            listed,
            vec![("alpha".to_string(), json!("a")), ("zeta".to_string(), json!("z"))]
        );
    }
}
