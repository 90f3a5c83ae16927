//! Binary entry point: config, wiring, and the HTTP listener.

mod app;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ballot_chain::GovernorClient;
use ballot_config::BallotConfig;
use ballot_engine::VotingSession;
use ballot_insight::{AnthropicConfig, AnthropicSummarizer};
use ballot_store::SqliteStore;
use ballot_types::WalletAddress;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::default());

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = BallotConfig::load()?;

    let rpc_url = config.rpc_url().context("chain.rpc_url is not configured")?;
    let contract = config.contract().context("chain.contract is not configured")?;
    let contract = WalletAddress::new(&contract).context("invalid chain.contract address")?;
    let api_key = config
        .insight_api_key()
        .context("insight.api_key (or ANTHROPIC_API_KEY) is not configured")?;

    let db_path = config.db_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;

    let proposals = GovernorClient::new(rpc_url, contract)?;
    let insight = AnthropicSummarizer::new(
        AnthropicConfig::new(api_key).with_model(config.insight_model()),
    )?;

    let session = VotingSession::new(store, proposals, insight)
        .with_insight_timeout(Duration::from_secs(config.insight_timeout_secs()));

    let router = app::router(Arc::new(app::AppState { session }));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, db = %db_path.display(), "ballot service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install shutdown handler");
    }
}
