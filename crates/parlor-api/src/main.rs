//! Parlor REST API entry point.
//!
//! Binary name: `parlor`
//!
//! Parses CLI arguments, initializes the database and session runtime,
//! then starts the REST API server.

mod http;
mod state;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use http::router::build_router;
use state::AppState;

#[derive(Parser)]
#[command(name = "parlor", about = "Chat service with durable session actors", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Export spans to OpenTelemetry (stdout exporter)
        #[arg(long)]
        otel: bool,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "parlor", &mut std::io::stdout());
        return Ok(());
    }

    // Set up tracing based on verbosity (RUST_LOG overrides)
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,parlor=debug",
        _ => "trace",
    };

    match cli.command {
        Commands::Serve { bind, otel } => {
            parlor_observe::tracing_setup::init_tracing(filter, otel)
                .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

            let state = AppState::init().await?;
            let router = build_router(state.clone());

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            tracing::info!(addr = %bind, "parlor listening");

            let runtime = state.runtime.clone();
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("shutdown signal received");
                    runtime.shutdown();
                })
                .await?;

            parlor_observe::tracing_setup::shutdown_tracing();
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
