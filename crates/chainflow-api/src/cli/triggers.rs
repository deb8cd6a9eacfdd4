//! `chainflow triggers`: print the webhook allow-list.

use anyhow::Result;
use chainflow_core::webhook::catalog::supported_triggers;
use comfy_table::{Cell, Color};

use crate::cli::output::new_table;

pub fn list_triggers(json: bool) -> Result<()> {
    let triggers = supported_triggers();

    if json {
        println!("{}", serde_json::to_string_pretty(triggers)?);
        return Ok(());
    }

    let mut table = new_table(&["Provider", "Trigger Type", "Subscription"]);
    for trigger in triggers {
        let subscription = if trigger.requires_subscription {
            Cell::new("required").fg(Color::Yellow)
        } else {
            Cell::new("-").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(trigger.provider_id),
            Cell::new(trigger.trigger_type),
            subscription,
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}
