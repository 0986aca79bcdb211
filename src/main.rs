use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use defi_gateway_mcp::chains::{ChainAdapter, CosmosAdapter, EvmAdapter, SolanaAdapter};
use defi_gateway_mcp::plugins::{
    balances::BalancesPlugin, lending::LendingPlugin, polymarket::PolymarketPlugin,
    swap::SwapPlugin, token_info::TokenInfoPlugin, wallet_intel::WalletIntelPlugin,
    yield_finder::YieldFinderPlugin, Plugin,
};
use defi_gateway_mcp::{AppConfig, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // stdout carries the JSON-RPC transport; logs go to stderr.
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting DeFi gateway MCP server...");

    let config = AppConfig::from_env()?;

    let adapters: Vec<Arc<dyn ChainAdapter>> = vec![
        Arc::new(EvmAdapter::new(&config)),
        Arc::new(SolanaAdapter::new(&config)),
        Arc::new(CosmosAdapter::new(&config)),
    ];
    let plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(TokenInfoPlugin::new()),
        Box::new(BalancesPlugin),
        Box::new(SwapPlugin::new()),
        Box::new(LendingPlugin::new()),
        Box::new(YieldFinderPlugin::new()),
        Box::new(WalletIntelPlugin::new()),
        Box::new(PolymarketPlugin::new()),
    ];

    let registry = Registry::new(adapters, plugins, config)
        .await
        .map_err(|e| anyhow::anyhow!("registry construction failed: {e}"))?;

    info!(
        chains = registry.context().supported_chains().len(),
        tools = registry.tools().len(),
        "registry composed"
    );

    defi_gateway_mcp::server::run(registry).await?;

    Ok(())
}
