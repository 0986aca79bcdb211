use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use defi_gateway_mcp::chains::{ChainAdapter, CosmosAdapter, EvmAdapter, SolanaAdapter};
use defi_gateway_mcp::plugins::{
    balances::BalancesPlugin, lending::LendingPlugin, polymarket::PolymarketPlugin,
    swap::SwapPlugin, token_info::TokenInfoPlugin, wallet_intel::WalletIntelPlugin,
    yield_finder::YieldFinderPlugin, Plugin,
};
use defi_gateway_mcp::protocols::{
    collect_positions, collect_yield_opportunities, ProtocolScanner, YieldSource,
};
use defi_gateway_mcp::server::{handle_request, JsonRpcRequest, JsonRpcResponse};
use defi_gateway_mcp::types::{
    ApyType, Balance, ChainInfo, Ecosystem, PositionAsset, ProtocolPosition, TokenInfo,
    YieldOpportunity,
};
use defi_gateway_mcp::{AppConfig, GatewayError, PluginContext, Registry};

/// In-process adapter for one fabricated chain. Counts network-shaped
/// calls so tests can assert that validation short-circuits before any
/// I/O would happen.
struct MockAdapter {
    chains: Vec<ChainInfo>,
    network_calls: Arc<AtomicUsize>,
}

impl MockAdapter {
    fn new(chain_id: &str) -> Self {
        let native_token = TokenInfo {
            symbol: "MCK".into(),
            name: "Mock Coin".into(),
            decimals: 9,
            address: "0x0000000000000000000000000000000000000000".into(),
            chain_id: chain_id.into(),
            coingecko_id: None,
        };
        MockAdapter {
            chains: vec![ChainInfo {
                id: chain_id.into(),
                name: "Mocknet".into(),
                ecosystem: Ecosystem::Evm,
                native_chain_id: "999".into(),
                native_token,
                rpc_url: "http://127.0.0.1:0".into(),
                explorer_url: "http://127.0.0.1:0".into(),
            }],
            network_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Evm
    }

    fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    fn is_valid_address(&self, chain_id: &str, address: &str) -> defi_gateway_mcp::Result<bool> {
        self.get_chain(chain_id)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.into()))?;
        Ok(address.starts_with("0x") && address.len() == 42)
    }

    async fn native_balance(
        &self,
        chain_id: &str,
        _address: &str,
    ) -> defi_gateway_mcp::Result<Balance> {
        let chain = self
            .get_chain(chain_id)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.into()))?;
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Balance {
            symbol: chain.native_token.symbol.clone(),
            address: chain.native_token.address.clone(),
            balance: "1500000000".into(),
            balance_formatted: "1.5".into(),
        })
    }

    async fn token_balances(
        &self,
        chain_id: &str,
        _address: &str,
        tokens: &[String],
    ) -> defi_gateway_mcp::Result<Vec<Balance>> {
        let mut balances = Vec::new();
        for token in tokens {
            if let Some(info) = self.resolve_token(chain_id, token).await? {
                self.network_calls.fetch_add(1, Ordering::SeqCst);
                balances.push(Balance {
                    symbol: info.symbol,
                    address: info.address,
                    balance: "1000000".into(),
                    balance_formatted: "1".into(),
                });
            }
        }
        Ok(balances)
    }

    async fn resolve_token(
        &self,
        chain_id: &str,
        token: &str,
    ) -> defi_gateway_mcp::Result<Option<TokenInfo>> {
        self.get_chain(chain_id)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.into()))?;
        if token.eq_ignore_ascii_case("GOOD") {
            Ok(Some(TokenInfo {
                symbol: "GOOD".into(),
                name: "Good Token".into(),
                decimals: 6,
                address: "0x00000000000000000000000000000000000000aa".into(),
                chain_id: chain_id.into(),
                coingecko_id: Some("good-token".into()),
            }))
        } else {
            Ok(None)
        }
    }
}

fn real_adapters() -> Vec<Arc<dyn ChainAdapter>> {
    let config = AppConfig::default();
    vec![
        Arc::new(EvmAdapter::new(&config)),
        Arc::new(SolanaAdapter::new(&config)),
        Arc::new(CosmosAdapter::new(&config)),
    ]
}

fn all_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(TokenInfoPlugin::new()),
        Box::new(BalancesPlugin),
        Box::new(SwapPlugin::new()),
        Box::new(LendingPlugin::new()),
        Box::new(YieldFinderPlugin::new()),
        Box::new(WalletIntelPlugin::new()),
        Box::new(PolymarketPlugin::new()),
    ]
}

async fn full_registry() -> Registry {
    Registry::new(real_adapters(), all_plugins(), AppConfig::default())
        .await
        .expect("registry should compose")
}

fn call_request(tool: &str, args: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".into(),
        method: "tools/call".into(),
        params: Some(json!({ "name": tool, "arguments": args })),
        id: Some(json!(1)),
    }
}

fn envelope(response: &JsonRpcResponse) -> &Value {
    response.result.as_ref().expect("tools/call returns a result")
}

fn envelope_text(envelope: &Value) -> &str {
    envelope["content"][0]["text"]
        .as_str()
        .expect("envelope carries a text block")
}

#[tokio::test]
async fn tools_list_exposes_every_plugin_tool() {
    let registry = full_registry().await;
    let response = handle_request(
        &registry,
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: "tools/list".into(),
            params: None,
            id: Some(json!(1)),
        },
    )
    .await;

    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<String> = tools
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    for expected in [
        "defi_get_chains",
        "defi_get_token_info",
        "defi_token_price",
        "defi_get_balances",
        "defi_get_swap_quote",
        "defi_build_swap_transaction",
        "defi_get_lending_yields",
        "defi_find_yield",
        "defi_scan_wallet",
        "defi_prediction_markets",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing tool {expected}");
    }
    // Globally unique names.
    let mut deduped = names.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), names.len());
}

#[tokio::test]
async fn get_chains_lists_every_ecosystem_without_network() {
    let registry = full_registry().await;
    let response = handle_request(&registry, call_request("defi_get_chains", json!({}))).await;
    let envelope = envelope(&response);
    assert_eq!(envelope["isError"], false);
    let text = envelope_text(envelope);
    for chain in ["ethereum", "solana-mainnet", "cosmoshub", "osmosis", "base"] {
        assert!(text.contains(chain), "missing chain {chain}");
    }
}

#[tokio::test]
async fn chain_ids_round_trip_through_the_registry() {
    let registry = full_registry().await;
    let ctx = registry.context();
    for chain in ctx.supported_chains() {
        let adapter = ctx.adapter_for_chain(&chain.id).unwrap();
        assert_eq!(adapter.get_chain(&chain.id).unwrap().id, chain.id);
    }
}

#[tokio::test]
async fn unknown_tool_is_a_router_error() {
    let registry = full_registry().await;
    let response = handle_request(&registry, call_request("defi_nope", json!({}))).await;
    assert!(response.result.is_none());
    assert!(response
        .error
        .unwrap()
        .message
        .contains("Tool not found: defi_nope"));
}

#[tokio::test]
async fn invalid_address_fails_before_any_network_call() {
    let mock = Arc::new(MockAdapter::new("mocknet"));
    let calls = mock.network_calls.clone();
    let registry = Registry::new(
        vec![mock as Arc<dyn ChainAdapter>],
        vec![Box::new(BalancesPlugin)],
        AppConfig::default(),
    )
    .await
    .unwrap();

    let response = handle_request(
        &registry,
        call_request(
            "defi_get_balances",
            json!({ "chainId": "mocknet", "address": "bogus-address" }),
        ),
    )
    .await;
    let envelope = envelope(&response);
    assert_eq!(envelope["isError"], true);
    let text = envelope_text(envelope);
    assert!(text.contains("bogus-address"), "message names the address");
    assert!(text.contains("mocknet"), "message names the chain");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no network calls were made");
}

#[tokio::test]
async fn valid_address_returns_native_balance() {
    let mock = Arc::new(MockAdapter::new("mocknet"));
    let registry = Registry::new(
        vec![mock as Arc<dyn ChainAdapter>],
        vec![Box::new(BalancesPlugin)],
        AppConfig::default(),
    )
    .await
    .unwrap();

    let response = handle_request(
        &registry,
        call_request(
            "defi_get_balances",
            json!({
                "chainId": "mocknet",
                "address": "0x00000000000000000000000000000000000000ff"
            }),
        ),
    )
    .await;
    let envelope = envelope(&response);
    assert_eq!(envelope["isError"], false);
    let payload: Value = serde_json::from_str(envelope_text(envelope)).unwrap();
    assert_eq!(payload["balances"][0]["symbol"], "MCK");
    assert_eq!(payload["balances"][0]["balanceFormatted"], "1.5");
}

#[tokio::test]
async fn token_price_fails_whole_batch_on_one_unresolvable_token() {
    let mock = Arc::new(MockAdapter::new("mocknet"));
    let registry = Registry::new(
        vec![mock as Arc<dyn ChainAdapter>],
        vec![Box::new(TokenInfoPlugin::new())],
        AppConfig::default(),
    )
    .await
    .unwrap();

    let response = handle_request(
        &registry,
        call_request(
            "defi_token_price",
            json!({ "chainId": "mocknet", "tokens": ["GOOD", "BAD"] }),
        ),
    )
    .await;
    let envelope = envelope(&response);
    assert_eq!(envelope["isError"], true);
    let text = envelope_text(envelope);
    assert!(text.contains("token not found"));
    assert!(text.contains("BAD"));
}

#[tokio::test]
async fn token_info_resolves_from_static_tables() {
    let registry = full_registry().await;
    let response = handle_request(
        &registry,
        call_request(
            "defi_get_token_info",
            json!({ "chainId": "solana-mainnet", "token": "USDC" }),
        ),
    )
    .await;
    let envelope = envelope(&response);
    assert_eq!(envelope["isError"], false);
    let payload: Value = serde_json::from_str(envelope_text(envelope)).unwrap();
    assert_eq!(payload["symbol"], "USDC");
    assert_eq!(payload["decimals"], 6);
    assert_eq!(payload["chainId"], "solana-mainnet");
}

#[tokio::test]
async fn swap_on_unregistered_chain_is_unsupported() {
    let registry = full_registry().await;
    let response = handle_request(
        &registry,
        call_request(
            "defi_get_swap_quote",
            json!({
                "chainId": "near",
                "srcToken": "USDC",
                "dstToken": "WETH",
                "amount": "10"
            }),
        ),
    )
    .await;
    let envelope = envelope(&response);
    assert_eq!(envelope["isError"], true);
    assert!(envelope_text(envelope).contains("unsupported chain: near"));
}

// ── Fan-out isolation across yield sources and scanners ──

struct StubSource {
    protocol: &'static str,
    fail: bool,
}

#[async_trait]
impl YieldSource for StubSource {
    fn protocol(&self) -> &'static str {
        self.protocol
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        &["mocknet"]
    }

    async fn yield_opportunities(
        &self,
        asset: &str,
        _ctx: &PluginContext,
    ) -> defi_gateway_mcp::Result<Vec<YieldOpportunity>> {
        if self.fail {
            return Err(GatewayError::Rpc("rpc endpoint unreachable".into()));
        }
        Ok(vec![YieldOpportunity {
            protocol: self.protocol.into(),
            chain_id: "mocknet".into(),
            chain_name: "Mocknet".into(),
            asset: asset.into(),
            asset_address: "0x00000000000000000000000000000000000000aa".into(),
            apy: 4.2,
            apy_type: ApyType::Variable,
            tvl: 1_000_000.0,
            risk_level: "low".into(),
            category: "lending".into(),
            metadata: json!({}),
        }])
    }
}

#[async_trait]
impl ProtocolScanner for StubSource {
    fn protocol(&self) -> &'static str {
        self.protocol
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        &["mocknet"]
    }

    async fn scan_positions(
        &self,
        chain_id: &str,
        address: &str,
        _ctx: &PluginContext,
    ) -> defi_gateway_mcp::Result<Vec<ProtocolPosition>> {
        if self.fail {
            return Err(GatewayError::Rpc("rpc endpoint unreachable".into()));
        }
        Ok(vec![ProtocolPosition {
            protocol: self.protocol.into(),
            position_type: "lending".into(),
            chain_id: chain_id.into(),
            chain_name: "Mocknet".into(),
            assets: vec![PositionAsset {
                symbol: "GOOD".into(),
                address: address.into(),
                balance: "1".into(),
                balance_usd: 1.0,
            }],
            total_value_usd: 1.0,
        }])
    }
}

#[tokio::test]
async fn one_broken_source_does_not_abort_the_scan() {
    let mock = Arc::new(MockAdapter::new("mocknet"));
    let registry = Registry::new(
        vec![mock as Arc<dyn ChainAdapter>],
        vec![],
        AppConfig::default(),
    )
    .await
    .unwrap();
    let ctx = registry.context();

    let sources: Vec<Arc<dyn YieldSource>> = vec![
        Arc::new(StubSource {
            protocol: "healthy",
            fail: false,
        }),
        Arc::new(StubSource {
            protocol: "broken",
            fail: true,
        }),
    ];
    let opportunities = collect_yield_opportunities(&sources, "USDC", ctx).await;
    assert_eq!(opportunities.len(), 1);
    assert_eq!(opportunities[0].protocol, "healthy");
}

#[tokio::test]
async fn one_broken_scanner_branch_is_omitted_not_fatal() {
    let mock = Arc::new(MockAdapter::new("mocknet"));
    let registry = Registry::new(
        vec![mock as Arc<dyn ChainAdapter>],
        vec![],
        AppConfig::default(),
    )
    .await
    .unwrap();
    let ctx = registry.context();

    let scanners: Vec<Arc<dyn ProtocolScanner>> = vec![
        Arc::new(StubSource {
            protocol: "healthy",
            fail: false,
        }),
        Arc::new(StubSource {
            protocol: "broken",
            fail: true,
        }),
    ];
    let positions = collect_positions(
        &scanners,
        None,
        "0x00000000000000000000000000000000000000ff",
        ctx,
    )
    .await;
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].protocol, "healthy");
}

#[tokio::test]
async fn duplicate_chain_ids_fail_composition() {
    let adapters: Vec<Arc<dyn ChainAdapter>> = vec![
        Arc::new(MockAdapter::new("mocknet")),
        Arc::new(MockAdapter::new("mocknet")),
    ];
    let err = Registry::new(adapters, vec![], AppConfig::default())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("duplicate chain id"));
}
