//! Application state wiring stores, engine, trigger manager and test runner.
//!
//! The core services are generic over their ports; `AppState` pins them to
//! the SQLite stores, the boxed text generator and the HTTP subscriber.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chainflow_core::engine::executor::WorkflowEngine;
use chainflow_core::llm::box_generator::BoxTextGenerator;
use chainflow_core::testing::runner::TestRunner;
use chainflow_core::webhook::manager::WebhookTriggerManager;
use chainflow_infra::actions::default_registry;
use chainflow_infra::config::{database_url, llm_api_key};
use chainflow_infra::llm::build_generator;
use chainflow_infra::sqlite::execution::SqliteExecutionStore;
use chainflow_infra::sqlite::pool::DatabasePool;
use chainflow_infra::sqlite::testing::SqliteTestStore;
use chainflow_infra::sqlite::variable::SqliteVariableStore;
use chainflow_infra::sqlite::webhook::SqliteWebhookStore;
use chainflow_infra::sqlite::workflow::SqliteWorkflowStore;
use chainflow_infra::webhook::HttpWebhookSubscriber;
use chainflow_types::config::ChainflowConfig;

use crate::launcher::EngineLauncher;

/// Concrete type aliases for the generic services.
pub type ConcreteEngine = WorkflowEngine<SqliteVariableStore, SqliteExecutionStore, BoxTextGenerator>;

pub type ConcreteTriggerManager = WebhookTriggerManager<SqliteWebhookStore, HttpWebhookSubscriber, EngineLauncher>;

pub type ConcreteTestRunner =
    TestRunner<SqliteTestStore, SqliteVariableStore, SqliteExecutionStore, BoxTextGenerator>;

/// Shared state for CLI commands and REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ChainflowConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub workflows: Arc<SqliteWorkflowStore>,
    pub executions: Arc<SqliteExecutionStore>,
    pub test_store: Arc<SqliteTestStore>,
    pub engine: Arc<ConcreteEngine>,
    pub trigger_manager: Arc<ConcreteTriggerManager>,
    pub test_runner: Arc<ConcreteTestRunner>,
}

impl AppState {
    /// Open the database under `data_dir` and wire every service.
    pub async fn init(config: ChainflowConfig, data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;

        let db_pool = DatabasePool::new(&database_url(&config, data_dir)).await?;
        let generator = build_generator(&config.llm, llm_api_key(&config))?;

        Self::build(config, data_dir.to_path_buf(), db_pool, generator)
    }

    /// Wire services on an already-open pool.
    pub fn build(
        config: ChainflowConfig,
        data_dir: PathBuf,
        db_pool: DatabasePool,
        generator: BoxTextGenerator,
    ) -> anyhow::Result<Self> {
        let workflows = Arc::new(SqliteWorkflowStore::new(db_pool.clone()));
        let executions = Arc::new(SqliteExecutionStore::new(db_pool.clone()));
        let variables = Arc::new(SqliteVariableStore::new(db_pool.clone()));
        let webhooks = Arc::new(SqliteWebhookStore::new(db_pool.clone()));
        let test_store = Arc::new(SqliteTestStore::new(db_pool.clone()));

        let engine = Arc::new(WorkflowEngine::new(
            variables,
            Arc::clone(&executions),
            Arc::new(generator),
            default_registry()?,
            config.engine.clone(),
        ));

        let launcher = EngineLauncher::new(Arc::clone(&engine), Arc::clone(&workflows), Arc::clone(&webhooks));
        let subscriber = HttpWebhookSubscriber::new(config.webhooks.subscription_url.clone())?;
        let trigger_manager = Arc::new(WebhookTriggerManager::new(
            webhooks,
            Arc::new(subscriber),
            Arc::new(launcher),
            config.server.public_url.clone(),
        ));

        let test_runner = Arc::new(TestRunner::new(Arc::clone(&test_store), Arc::clone(&engine)));

        Ok(Self {
            config: Arc::new(config),
            data_dir,
            db_pool,
            workflows,
            executions,
            test_store,
            engine,
            trigger_manager,
            test_runner,
        })
    }
}
