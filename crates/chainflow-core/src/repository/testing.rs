//! Test suite and test run storage.

use chainflow_types::error::RepositoryError;
use chainflow_types::testing::{TestRun, TestSuite};
use uuid::Uuid;

/// Repository trait for workflow test suites and their recorded runs.
pub trait TestStore: Send + Sync {
    /// Upsert a test suite.
    fn save_suite(
        &self,
        suite: &TestSuite,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_suite(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<TestSuite>, RepositoryError>> + Send;

    fn list_suites(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<TestSuite>, RepositoryError>> + Send;

    /// Delete a suite and its runs. Returns `true` if it existed.
    fn delete_suite(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn save_run(
        &self,
        run: &TestRun,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List runs of a suite, newest first.
    fn list_runs(
        &self,
        suite_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<TestRun>, RepositoryError>> + Send;
}
