//! Boardroom API server binary.
//!
//! Usage:
//!   boardroom-api --config boardroom.toml
//!   boardroom-api --port 8000 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` - Model provider key (required)
//! - `OPENAI_BASE_URL` - Alternative OpenAI-compatible endpoint
//! - `BOARDROOM_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `BOARDROOM_CORS_ORIGINS` - CORS allowed origins (comma-separated)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use boardroom_api::{AppState, serve};
use boardroom_team::{API_KEY_ENV, BoardroomConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "boardroom-api", version, about = "Dairy Business Agent API")]
struct Args {
    /// Path to a boardroom.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(short, long, env = "BOARDROOM_BIND_ADDR")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// CORS allowed origins
    #[arg(long, env = "BOARDROOM_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,boardroom_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = BoardroomConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(origins) = args.cors_origins {
        config.server.cors_origins = origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }

    if config.resolve_api_key().is_err() {
        tracing::error!("{API_KEY_ENV} environment variable not set.");
        return Ok(ExitCode::FAILURE);
    }

    if config.server.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes the API to all network interfaces. \
             Put it behind a firewall or an authenticating proxy."
        );
    }

    let addr: SocketAddr = config.server.address().parse()?;
    let state = AppState::new(&config)?;
    tracing::info!(
        team = %state.team.name(),
        members = state.team.members().len(),
        "Team ready"
    );

    serve(Arc::new(state), addr).await?;
    Ok(ExitCode::SUCCESS)
}
