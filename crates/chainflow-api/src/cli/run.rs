//! `chainflow run`: execute a graph file locally.

use std::path::Path;

use anyhow::{Context, Result};
use chainflow_core::engine::graph::execution_order;
use chainflow_types::execution::ExecutionRequest;
use chainflow_types::workflow::WorkflowGraph;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::cli::output::print_summary;
use crate::state::AppState;

/// Read a JSON or YAML document; `.yaml`/`.yml` select YAML, anything else JSON.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml_ng::from_str(&content).with_context(|| format!("invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
    }
}

/// Load a graph file and reject malformed graphs before anything runs.
pub async fn load_graph(path: &Path) -> Result<WorkflowGraph> {
    let graph: WorkflowGraph = read_document(path).await?;
    execution_order(&graph).with_context(|| format!("invalid workflow graph in {}", path.display()))?;
    Ok(graph)
}

pub async fn run_graph(state: &AppState, path: &Path, payload: Option<&str>, test: bool, json: bool) -> Result<()> {
    let graph = load_graph(path).await?;
    let trigger_data = match payload {
        Some(raw) => serde_json::from_str(raw).context("--payload must be valid JSON")?,
        None => Value::Object(Default::default()),
    };

    let mut request = ExecutionRequest::new(Uuid::now_v7(), graph, trigger_data);
    request.source = "cli".to_string();
    if test {
        request = request.in_test_mode(None);
    }

    let summary = state.engine.execute(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !summary.success {
        anyhow::bail!("workflow run {} did not succeed", summary.execution_id);
    }
    Ok(())
}
