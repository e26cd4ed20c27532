use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use counsel_desk::config::Config;
use counsel_desk::db::connect_from_config;
use counsel_desk::web::{AppState, start_server};

#[derive(Parser, Debug)]
#[command(name = "counsel-desk", version, about = "Legal-services marketplace backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// TOML settings file; env vars override it.
        #[arg(long, env = "COUNSEL_DESK_CONFIG")]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply schema migrations and exit.
    Migrate {
        #[arg(long, env = "COUNSEL_DESK_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("counsel_desk=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    match Cli::parse().command {
        Command::Serve { config, host, port } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let addr = config.server.socket_addr()?;

            let db = connect_from_config(&config.database)
                .await
                .context("failed to open database")?;
            tracing::info!(
                backend = config.database.backend.as_str(),
                "Database ready"
            );

            let state = Arc::new(AppState::new(db, config.booking.clone()));
            let bound = start_server(addr, Arc::clone(&state)).await?;
            tracing::info!("counsel-desk API on http://{}", bound);

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            state.shutdown().await;
        }
        Command::Migrate { config } => {
            let config = Config::load(config.as_deref())?;
            connect_from_config(&config.database)
                .await
                .context("migration failed")?;
            tracing::info!(
                backend = config.database.backend.as_str(),
                "Migrations applied"
            );
        }
    }
    Ok(())
}
