//! Patchloop server - HTTP endpoint running one agent run per request.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use patchloop::controller::RunConfig;
use patchloop::io::config::load_config;
use patchloop::io::model::CommandModel;
use patchloop::io::search::PatternSearch;
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "patchloop-server")]
#[command(about = "HTTP endpoint for the plan-then-patch code editing agent")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Agent config (TOML). Missing file means defaults.
    #[arg(long, default_value = "patchloop.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patchloop_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    info!(
        command = ?config.model.command,
        model_timeout_secs = config.model_timeout_secs,
        run_timeout_secs = config.run_timeout_secs,
        "starting patchloop-server"
    );

    let model = CommandModel::new(config.model.command.clone());
    let state = AppState::new(model, PatternSearch, RunConfig::from(&config));
    let app = routes::app_router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
