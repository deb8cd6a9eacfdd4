//! SQLite test store: workflow test suites and recorded runs.

use chainflow_core::repository::testing::TestStore;
use chainflow_types::error::RepositoryError;
use chainflow_types::testing::{TestRun, TestSuite};
use sqlx::Row;
use uuid::Uuid;

use super::pool::{DatabasePool, format_datetime, from_json, parse_datetime, parse_uuid, query_err, to_json};

/// SQLite-backed implementation of `TestStore`.
pub struct SqliteTestStore {
    pool: DatabasePool,
}

impl SqliteTestStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct SuiteRow {
    id: String,
    workflow_id: String,
    name: String,
    description: Option<String>,
    test_cases: String,
    created_at: String,
}

impl SuiteRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            test_cases: row.try_get("test_cases")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_suite(self) -> Result<TestSuite, RepositoryError> {
        Ok(TestSuite {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            name: self.name,
            description: self.description,
            test_cases: from_json(&self.test_cases, "test_cases")?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct RunRow {
    id: String,
    suite_id: String,
    workflow_id: String,
    passed: i64,
    failed: i64,
    results: String,
    started_at: String,
    completed_at: String,
}

impl RunRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            suite_id: row.try_get("suite_id")?,
            workflow_id: row.try_get("workflow_id")?,
            passed: row.try_get("passed")?,
            failed: row.try_get("failed")?,
            results: row.try_get("results")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_run(self) -> Result<TestRun, RepositoryError> {
        Ok(TestRun {
            id: parse_uuid(&self.id)?,
            suite_id: parse_uuid(&self.suite_id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            passed: self.passed.max(0) as u32,
            failed: self.failed.max(0) as u32,
            results: from_json(&self.results, "results")?,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: parse_datetime(&self.completed_at)?,
        })
    }
}

impl TestStore for SqliteTestStore {
    async fn save_suite(&self, suite: &TestSuite) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_test_suites (id, workflow_id, name, description, test_cases, created_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   description = excluded.description,
                   test_cases = excluded.test_cases"#,
        )
        .bind(suite.id.to_string())
        .bind(suite.workflow_id.to_string())
        .bind(&suite.name)
        .bind(&suite.description)
        .bind(to_json(&suite.test_cases, "test_cases")?)
        .bind(format_datetime(&suite.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn get_suite(&self, id: &Uuid) -> Result<Option<TestSuite>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, workflow_id, name, description, test_cases, created_at FROM workflow_test_suites WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(SuiteRow::from_row(&row).map_err(query_err)?.into_suite()?)),
            None => Ok(None),
        }
    }

    async fn list_suites(&self, workflow_id: &Uuid) -> Result<Vec<TestSuite>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, workflow_id, name, description, test_cases, created_at
               FROM workflow_test_suites WHERE workflow_id = ?
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| SuiteRow::from_row(row).map_err(query_err)?.into_suite())
            .collect()
    }

    async fn delete_suite(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query("DELETE FROM workflow_test_runs WHERE suite_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let result = sqlx::query("DELETE FROM workflow_test_suites WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_run(&self, run: &TestRun) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_test_runs (id, suite_id, workflow_id, passed, failed, results, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(run.suite_id.to_string())
        .bind(run.workflow_id.to_string())
        .bind(run.passed as i64)
        .bind(run.failed as i64)
        .bind(to_json(&run.results, "results")?)
        .bind(format_datetime(&run.started_at))
        .bind(format_datetime(&run.completed_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn list_runs(&self, suite_id: &Uuid, limit: u32) -> Result<Vec<TestRun>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, suite_id, workflow_id, passed, failed, results, started_at, completed_at
               FROM workflow_test_runs WHERE suite_id = ?
               ORDER BY started_at DESC, id DESC LIMIT ?"#,
        )
        .bind(suite_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| RunRow::from_row(row).map_err(query_err)?.into_run())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;
    use chainflow_types::testing::{Assertion, AssertionKind, TestCase, TestResult};
    use chrono::Utc;
    use serde_json::json;

    fn sample_suite() -> TestSuite {
        TestSuite {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            name: "smoke".to_string(),
            description: Some("big orders pass the filter".to_string()),
            test_cases: vec![TestCase {
                id: "case-1".to_string(),
                name: "amount 150".to_string(),
                trigger_data: json!({ "amount": 150 }),
                test_mode_config: None,
                assertions: vec![Assertion {
                    path: "success".to_string(),
                    kind: AssertionKind::Equals,
                    expected: json!(true),
                    message: None,
                }],
            }],
            created_at: Utc::now(),
        }
    }

    fn sample_run(suite: &TestSuite, failed: u32) -> TestRun {
        TestRun {
            id: Uuid::now_v7(),
            suite_id: suite.id,
            workflow_id: suite.workflow_id,
            passed: 1,
            failed,
            results: vec![TestResult {
                case_id: "case-1".to_string(),
                case_name: "amount 150".to_string(),
                passed: failed == 0,
                assertions: vec![],
                error: None,
                duration_ms: 12,
            }],
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_suite_upserts() {
        let store = SqliteTestStore::new(test_pool().await);
        let mut suite = sample_suite();
        store.save_suite(&suite).await.unwrap();

        suite.name = "regression".to_string();
        suite.test_cases.clear();
        store.save_suite(&suite).await.unwrap();

        let loaded = store.get_suite(&suite.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "regression");
        assert!(loaded.test_cases.is_empty());
        assert_eq!(store.list_suites(&suite.workflow_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_suite_cases_survive_storage() {
        let store = SqliteTestStore::new(test_pool().await);
        let suite = sample_suite();
        store.save_suite(&suite).await.unwrap();

        let loaded = store.get_suite(&suite.id).await.unwrap().unwrap();
        assert_eq!(loaded, suite);
    }

    #[tokio::test]
    async fn test_runs_listed_newest_first() {
        let store = SqliteTestStore::new(test_pool().await);
        let suite = sample_suite();
        store.save_suite(&suite).await.unwrap();

        let older = sample_run(&suite, 1);
        let newer = sample_run(&suite, 0);
        store.save_run(&older).await.unwrap();
        store.save_run(&newer).await.unwrap();

        let runs = store.list_runs(&suite.id, 10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.id);
        assert!(runs[0].all_passed());
        assert!(!runs[1].all_passed());

        assert_eq!(store.list_runs(&suite.id, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_suite_removes_runs() {
        let store = SqliteTestStore::new(test_pool().await);
        let suite = sample_suite();
        store.save_suite(&suite).await.unwrap();
        store.save_run(&sample_run(&suite, 0)).await.unwrap();

        assert!(store.delete_suite(&suite.id).await.unwrap());
        assert!(store.get_suite(&suite.id).await.unwrap().is_none());
        assert!(store.list_runs(&suite.id, 10).await.unwrap().is_empty());
        assert!(!store.delete_suite(&suite.id).await.unwrap());
    }
}
