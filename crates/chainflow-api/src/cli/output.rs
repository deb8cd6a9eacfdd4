//! Shared rendering helpers for CLI output.

use chainflow_types::execution::{ExecutionStatus, ExecutionSummary};
use chainflow_types::node::{StepRecord, StepStatus};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

pub fn status_cell(status: ExecutionStatus) -> Cell {
    match status {
        ExecutionStatus::Running => Cell::new("◐ running").fg(Color::Blue),
        ExecutionStatus::Completed => Cell::new("● completed").fg(Color::Green),
        ExecutionStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
        ExecutionStatus::Paused => Cell::new("◌ paused").fg(Color::Yellow),
        ExecutionStatus::Cancelled => Cell::new("○ cancelled").fg(Color::DarkGrey),
    }
}

fn step_cell(status: StepStatus) -> Cell {
    match status {
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
        StepStatus::Skipped => Cell::new("skipped").fg(Color::DarkGrey),
        StepStatus::Paused => Cell::new("paused").fg(Color::Yellow),
    }
}

pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn steps_table(steps: &[StepRecord]) -> Table {
    let mut table = new_table(&["Node", "Type", "Status", "Attempt", "Duration", "Error"]);
    for step in steps {
        table.add_row(vec![
            Cell::new(&step.node_id),
            Cell::new(&step.node_type),
            step_cell(step.status),
            Cell::new(step.attempt),
            Cell::new(format!("{}ms", step.duration_ms)),
            Cell::new(step.error.as_deref().unwrap_or("")),
        ]);
    }
    table
}

/// Styled multi-line rendering of a run summary.
pub fn print_summary(summary: &ExecutionSummary) {
    let headline = if summary.success {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    println!();
    println!(
        "  {} Execution {} ({})",
        headline,
        style(summary.execution_id).cyan(),
        summary.status
    );
    if let Some(error) = &summary.error {
        println!("  {} {}", style("error:").red(), error);
    }
    if let Some(token) = summary.pause_token {
        println!("  {} waiting for input, resume token {}", style("paused:").yellow(), token);
    }
    println!();
    if !summary.steps.is_empty() {
        println!("{}", steps_table(&summary.steps));
    }
}
