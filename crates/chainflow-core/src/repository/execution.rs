//! Execution history and pause checkpoint storage.

use chainflow_types::error::RepositoryError;
use chainflow_types::execution::ExecutionRecord;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for workflow execution records.
///
/// A record is created when a run starts and rewritten as the run moves
/// through `running -> paused -> running -> completed | failed | cancelled`.
/// Paused records carry the serialized context needed to resume.
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution record.
    fn create_execution(
        &self,
        record: &ExecutionRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite the mutable fields (status, context, steps, error, pause,
    /// completed_at) of an existing record.
    fn update_execution(
        &self,
        record: &ExecutionRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution record by its UUID.
    fn get_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ExecutionRecord>, RepositoryError>> + Send;

    /// List executions for a workflow, newest first.
    fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionRecord>, RepositoryError>> + Send;

    /// Executions started in `[start, end)`, oldest first, optionally for
    /// one workflow. Feeds usage analytics.
    fn list_executions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        workflow_id: Option<&Uuid>,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionRecord>, RepositoryError>> + Send;
}
