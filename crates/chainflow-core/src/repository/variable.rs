//! Workflow-scoped variable storage.

use chainflow_types::error::RepositoryError;
use serde_json::Value;
use uuid::Uuid;

/// Persistent key-value store backing `variable_set` with `scope: workflow`
/// and the fallback lookup of `variable_get`.
///
/// Variables are namespaced by workflow ID so that every run of the same
/// workflow sees the same values.
pub trait VariableStore: Send + Sync {
    fn get_variable(
        &self,
        workflow_id: &Uuid,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Value>, RepositoryError>> + Send;

    /// Upsert a variable.
    fn set_variable(
        &self,
        workflow_id: &Uuid,
        name: &str,
        value: &Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All variables for a workflow as `(name, value)` pairs, sorted by name.
    fn list_variables(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<(String, Value)>, RepositoryError>> + Send;
}
