//! chainflow CLI and HTTP server entry point.
//!
//! Parses CLI arguments, initializes tracing, the database, and the
//! workflow services, then dispatches to the command handler or starts the
//! server.

mod cli;
mod http;
mod launcher;
mod state;

use clap::Parser;
use clap_complete::generate;

use chainflow_infra::config::{data_dir, load_config};
use chainflow_observe::tracing_setup::{LogFormat, init_tracing, shutdown_tracing};
use cli::{Cli, Commands, LogFormatArg};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chainflow=debug",
        _ => "trace",
    };
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Json => LogFormat::Json,
    };
    let enable_otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    init_tracing(filter, format, enable_otel).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "chainflow", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Triggers = &cli.command {
        return cli::triggers::list_triggers(cli.json);
    }

    let data_dir = data_dir();
    let config = load_config(&data_dir).await;
    let state = AppState::init(config, &data_dir).await?;

    let result = match cli.command {
        Commands::Serve { host, port, .. } => serve(state, host, port, cli.quiet).await,
        Commands::Run { graph, payload, test } => {
            cli::run::run_graph(&state, &graph, payload.as_deref(), test, cli.json).await
        }
        Commands::Test { suite, graph } => cli::test::run_suite_file(&state, &suite, &graph, cli.json).await,
        Commands::Executions { workflow_id, limit } => {
            cli::executions::list_executions(&state, &workflow_id, limit, cli.json).await
        }
        Commands::Triggers | Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}

async fn serve(state: AppState, host: Option<String>, port: Option<u16>, quiet: bool) -> anyhow::Result<()> {
    // Ensure an API key exists, print it if new
    if let Some(api_key) = http::extractors::auth::ensure_api_key(&state.db_pool).await? {
        println!();
        println!(
            "  {} API key generated (save this -- it won't be shown again):",
            console::style("🔑").bold()
        );
        println!();
        println!("  {}", console::style(&api_key).yellow().bold());
        println!();
    }

    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, public_url = %state.config.server.public_url, "server listening");

    if !quiet {
        println!(
            "  {} chainflow listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let router = http::router::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
