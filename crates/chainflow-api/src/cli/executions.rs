//! `chainflow executions`: stored runs of one workflow.

use anyhow::Result;
use chainflow_core::repository::execution::ExecutionStore;
use comfy_table::Cell;
use console::style;
use uuid::Uuid;

use crate::cli::output::{new_table, status_cell};
use crate::state::AppState;

pub async fn list_executions(state: &AppState, workflow_id: &Uuid, limit: u32, json: bool) -> Result<()> {
    let records = state.executions.list_executions(workflow_id, limit.clamp(1, 200)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!(
            "  {} No executions found for workflow {}",
            style("i").blue().bold(),
            style(workflow_id).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Execution", "Status", "Source", "Steps", "Started", "Error"]);
    for record in &records {
        table.add_row(vec![
            Cell::new(record.id),
            status_cell(record.status),
            Cell::new(&record.source),
            Cell::new(record.steps.len()),
            Cell::new(format_relative_time(&record.started_at)),
            Cell::new(record.error.as_deref().unwrap_or("")),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else {
        dt.format("%Y-%m-%d %H:%M").to_string()
    }
}
