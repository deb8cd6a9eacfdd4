//! SQLite webhook store: registrations and their delivery log.

use chainflow_core::repository::webhook::WebhookStore;
use chainflow_types::error::RepositoryError;
use chainflow_types::webhook::{WebhookConfig, WebhookExecution, WebhookExecutionStatus, WebhookStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::{DatabasePool, format_datetime, from_json, parse_datetime, parse_uuid, query_err, to_json};

/// SQLite-backed implementation of `WebhookStore`.
pub struct SqliteWebhookStore {
    pool: DatabasePool,
}

impl SqliteWebhookStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct ConfigRow {
    id: String,
    workflow_id: String,
    user_id: String,
    trigger_type: String,
    provider_id: String,
    webhook_url: String,
    secret: String,
    status: String,
    config: String,
    metadata: String,
    last_triggered: Option<String>,
    created_at: String,
}

impl ConfigRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            user_id: row.try_get("user_id")?,
            trigger_type: row.try_get("trigger_type")?,
            provider_id: row.try_get("provider_id")?,
            webhook_url: row.try_get("webhook_url")?,
            secret: row.try_get("secret")?,
            status: row.try_get("status")?,
            config: row.try_get("config")?,
            metadata: row.try_get("metadata")?,
            last_triggered: row.try_get("last_triggered")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_config(self) -> Result<WebhookConfig, RepositoryError> {
        let status: WebhookStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(WebhookConfig {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            user_id: self.user_id,
            trigger_type: self.trigger_type,
            provider_id: self.provider_id,
            webhook_url: self.webhook_url,
            secret: self.secret,
            status,
            config: from_json(&self.config, "webhook config")?,
            metadata: from_json(&self.metadata, "webhook metadata")?,
            last_triggered: self.last_triggered.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct DeliveryRow {
    id: String,
    webhook_id: String,
    workflow_id: String,
    trigger_type: String,
    status: String,
    payload: String,
    error: Option<String>,
    execution_id: Option<String>,
    created_at: String,
}

impl DeliveryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            webhook_id: row.try_get("webhook_id")?,
            workflow_id: row.try_get("workflow_id")?,
            trigger_type: row.try_get("trigger_type")?,
            status: row.try_get("status")?,
            payload: row.try_get("payload")?,
            error: row.try_get("error")?,
            execution_id: row.try_get("execution_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_execution(self) -> Result<WebhookExecution, RepositoryError> {
        let status: WebhookExecutionStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(WebhookExecution {
            id: parse_uuid(&self.id)?,
            webhook_id: parse_uuid(&self.webhook_id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            trigger_type: self.trigger_type,
            status,
            payload: from_json(&self.payload, "payload")?,
            error: self.error,
            execution_id: self.execution_id.as_deref().map(parse_uuid).transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

const CONFIG_COLUMNS: &str = "id, workflow_id, user_id, trigger_type, provider_id, webhook_url, secret, status, config, metadata, last_triggered, created_at";
const DELIVERY_COLUMNS: &str = "id, webhook_id, workflow_id, trigger_type, status, payload, error, execution_id, created_at";

// ---------------------------------------------------------------------------
// WebhookStore impl
// ---------------------------------------------------------------------------

impl WebhookStore for SqliteWebhookStore {
    async fn insert_webhook(&self, config: &WebhookConfig) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO webhook_configs ({CONFIG_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(config.id.to_string())
        .bind(config.workflow_id.to_string())
        .bind(&config.user_id)
        .bind(&config.trigger_type)
        .bind(&config.provider_id)
        .bind(&config.webhook_url)
        .bind(&config.secret)
        .bind(config.status.to_string())
        .bind(to_json(&config.config, "webhook config")?)
        .bind(to_json(&config.metadata, "webhook metadata")?)
        .bind(config.last_triggered.as_ref().map(format_datetime))
        .bind(format_datetime(&config.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("webhook {} already exists", config.id))
            }
            _ => query_err(e),
        })?;

        Ok(())
    }

    async fn update_webhook(&self, config: &WebhookConfig) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE webhook_configs SET status = ?, config = ?, metadata = ? WHERE id = ?")
            .bind(config.status.to_string())
            .bind(to_json(&config.config, "webhook config")?)
            .bind(to_json(&config.metadata, "webhook metadata")?)
            .bind(config.id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_webhook(&self, id: &Uuid) -> Result<Option<WebhookConfig>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CONFIG_COLUMNS} FROM webhook_configs WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(ConfigRow::from_row(&row).map_err(query_err)?.into_config()?)),
            None => Ok(None),
        }
    }

    async fn list_webhooks(&self, workflow_id: &Uuid) -> Result<Vec<WebhookConfig>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM webhook_configs WHERE workflow_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| ConfigRow::from_row(row).map_err(query_err)?.into_config())
            .collect()
    }

    async fn delete_webhook(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM webhook_configs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_triggered(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE webhook_configs SET last_triggered = ? WHERE id = ?")
            .bind(format_datetime(&at))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }

    async fn insert_execution(&self, execution: &WebhookExecution) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO webhook_executions ({DELIVERY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(execution.id.to_string())
        .bind(execution.webhook_id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(&execution.trigger_type)
        .bind(execution.status.to_string())
        .bind(to_json(&execution.payload, "payload")?)
        .bind(&execution.error)
        .bind(execution.execution_id.map(|id| id.to_string()))
        .bind(format_datetime(&execution.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn update_execution_status(
        &self,
        id: &Uuid,
        status: WebhookExecutionStatus,
        execution_id: Option<&Uuid>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"UPDATE webhook_executions
               SET status = ?, execution_id = COALESCE(?, execution_id), error = ?
               WHERE id = ?"#,
        )
        .bind(status.to_string())
        .bind(execution_id.map(|id| id.to_string()))
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn list_executions(&self, webhook_id: &Uuid, limit: u32) -> Result<Vec<WebhookExecution>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_executions WHERE webhook_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(webhook_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| DeliveryRow::from_row(row).map_err(query_err)?.into_execution())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;
    use serde_json::{Map, json};

    fn sample_config() -> WebhookConfig {
        WebhookConfig {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            user_id: "u1".to_string(),
            trigger_type: "github_trigger_new_issue".to_string(),
            provider_id: "github".to_string(),
            webhook_url: "http://localhost:3000/webhooks/github?id=x".to_string(),
            secret: "whsec_test".to_string(),
            status: WebhookStatus::Pending,
            config: Map::new(),
            metadata: Map::new(),
            last_triggered: None,
            created_at: Utc::now(),
        }
    }

    fn delivery(config: &WebhookConfig, status: WebhookExecutionStatus) -> WebhookExecution {
        WebhookExecution {
            id: Uuid::now_v7(),
            webhook_id: config.id,
            workflow_id: config.workflow_id,
            trigger_type: config.trigger_type.clone(),
            status,
            payload: json!({ "issue": { "number": 1 } }),
            error: None,
            execution_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_update_and_get_config() {
        let store = SqliteWebhookStore::new(test_pool().await);
        let mut config = sample_config();
        store.insert_webhook(&config).await.unwrap();

        config.status = WebhookStatus::Active;
        config.metadata.insert("external_id".to_string(), json!("hook-42"));
        store.update_webhook(&config).await.unwrap();

        let loaded = store.get_webhook(&config.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WebhookStatus::Active);
        assert_eq!(loaded.secret, "whsec_test");
        assert_eq!(loaded.external_id(), Some("hook-42"));
        assert!(loaded.last_triggered.is_none());

        let now = Utc::now();
        store.touch_last_triggered(&config.id, now).await.unwrap();
        let touched = store.get_webhook(&config.id).await.unwrap().unwrap();
        assert_eq!(touched.last_triggered, Some(now));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let store = SqliteWebhookStore::new(test_pool().await);
        let config = sample_config();
        store.insert_webhook(&config).await.unwrap();
        let err = store.insert_webhook(&config).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delivery_log_and_cascade_delete() {
        let store = SqliteWebhookStore::new(test_pool().await);
        let config = sample_config();
        store.insert_webhook(&config).await.unwrap();

        let rejected = delivery(&config, WebhookExecutionStatus::Rejected);
        let accepted = delivery(&config, WebhookExecutionStatus::Accepted);
        store.insert_execution(&rejected).await.unwrap();
        store.insert_execution(&accepted).await.unwrap();

        let run_id = Uuid::now_v7();
        store
            .update_execution_status(&accepted.id, WebhookExecutionStatus::Completed, Some(&run_id), None)
            .await
            .unwrap();

        let log = store.list_executions(&config.id, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, accepted.id);
        assert_eq!(log[0].status, WebhookExecutionStatus::Completed);
        assert_eq!(log[0].execution_id, Some(run_id));
        assert_eq!(log[1].status, WebhookExecutionStatus::Rejected);

        assert!(store.delete_webhook(&config.id).await.unwrap());
        assert!(store.list_executions(&config.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_webhooks_by_workflow() {
        let store = SqliteWebhookStore::new(test_pool().await);
        let first = sample_config();
        let mut second = sample_config();
        second.workflow_id = first.workflow_id;
        store.insert_webhook(&first).await.unwrap();
        store.insert_webhook(&second).await.unwrap();
        store.insert_webhook(&sample_config()).await.unwrap();

        let listed = store.list_webhooks(&first.workflow_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
    }
}
