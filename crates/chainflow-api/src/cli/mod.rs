//! CLI command definitions for the `chainflow` binary.
//!
//! Uses clap derive macros for argument parsing. Commands that only touch
//! local files (`run`, `test`) still open the data directory so their runs
//! land in the same history as server runs.

pub mod executions;
pub mod output;
pub mod run;
pub mod triggers;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use uuid::Uuid;

/// Event-driven workflow automation engine.
#[derive(Parser)]
#[command(name = "chainflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value = "pretty", env = "CHAINFLOW_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (REST API and webhook receiver).
    Serve {
        /// Host to bind to. Defaults to `[server] host`.
        #[arg(long, env = "CHAINFLOW_HOST")]
        host: Option<String>,

        /// Port to listen on. Defaults to `[server] port`.
        #[arg(short, long, env = "CHAINFLOW_PORT")]
        port: Option<u16>,

        /// Export spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Execute a workflow graph file (JSON or YAML) and print the summary.
    Run {
        /// Path to the graph file.
        graph: PathBuf,

        /// Trigger data as inline JSON.
        #[arg(long)]
        payload: Option<String>,

        /// Run in test mode: external actions are simulated.
        #[arg(long)]
        test: bool,
    },

    /// Run a test suite file against a graph file.
    Test {
        /// Path to the suite file (`{name, description?, test_cases}`).
        suite: PathBuf,

        /// Path to the graph file under test.
        #[arg(long)]
        graph: PathBuf,
    },

    /// List the webhook-capable triggers.
    Triggers,

    /// Show stored runs of a workflow, newest first.
    Executions {
        workflow_id: Uuid,

        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
