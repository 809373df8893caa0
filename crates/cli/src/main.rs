mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use stockbook_db::{init_logging, ConnectionManager, LoggingConfig};

use commands::*;

#[derive(Parser)]
#[command(name = "stockbook")]
#[command(about = "Inspect and query the stockbook inventory database")]
struct Cli {
    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the database is reachable and show pool statistics
    Ping,

    /// Run one parameterized statement and print the result as JSON
    Query {
        /// SQL text with `?` placeholders
        sql: String,

        /// Values bound to the placeholders in order
        params: Vec<String>,
    },

    /// Probe the pool periodically until interrupted
    Watch {
        /// Seconds between probes
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logging = LoggingConfig::for_cli(cli.json_logs, cli.log_level.as_deref());
    init_logging(&logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let manager = Arc::new(ConnectionManager::from_env()?);
    tracing::debug!("Using database {}", manager.config().display_target());

    let outcome = match cli.command {
        Commands::Ping => {
            let hook = Arc::clone(&manager).shutdown_on_signal();
            let outcome = ping::run(&manager).await;
            hook.abort();
            outcome
        }
        Commands::Query { sql, params } => {
            let hook = Arc::clone(&manager).shutdown_on_signal();
            let outcome = query::run(&manager, &sql, &params).await;
            hook.abort();
            outcome
        }
        Commands::Watch { interval } => watch::run(Arc::clone(&manager), interval).await,
    };

    manager.shutdown().await;
    outcome
}
