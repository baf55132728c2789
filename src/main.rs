use anyhow::{Context, Result};
use clap::Parser;
use skillsite_edge::{config, http};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(args.config.as_path()))?
        .apply_env_overrides(|k| std::env::var(k).ok());
    config::validate(&cfg)?;
    let addr = cfg.bind_addr()?;

    let state = http::AppState::from_config(&cfg)?;
    let app = http::build_router(state);

    info!(
        %addr,
        environment = %cfg.app.environment,
        mock = cfg.app.use_mock_data,
        secret_configured = cfg.secret_configured(),
        "starting edge server"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("edge server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
