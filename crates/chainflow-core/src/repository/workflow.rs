//! Workflow repository trait definition.
//!
//! Stores workflow graphs together with their ownership and lifecycle
//! metadata. The engine never reads this store directly; callers load a
//! graph and hand it to `WorkflowEngine::execute`.

use chainflow_types::error::RepositoryError;
use chainflow_types::page::{Page, PageRequest};
use chainflow_types::workflow::Workflow;
use uuid::Uuid;

/// Repository trait for workflow persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowStore: Send + Sync {
    /// Upsert a workflow (insert or replace by ID).
    fn save_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a workflow by its UUID.
    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// One page of workflows, optionally filtered by owner, newest first,
    /// with the unpaged total.
    fn list_workflows_page(
        &self,
        user_id: Option<&str>,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Page<Workflow>, RepositoryError>> + Send;

    /// Delete a workflow by ID. Returns `true` if it existed.
    fn delete_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
