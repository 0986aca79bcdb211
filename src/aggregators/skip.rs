//! Skip swap routing for the Cosmos chains.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::aggregators::{require_wallet, resolve_swap, ResolvedSwap, SwapAggregator, SwapRequest};
use crate::amount;
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::registry::PluginContext;
use crate::types::{SwapQuote, TxPayload, UnsignedTransaction};

const BASE_URL: &str = "https://api.skip.build";
const PROVIDER: &str = "skip";
const SUPPORTED: &[&str] = &["cosmoshub", "osmosis"];

pub struct SkipAggregator {
    http: Client,
    base_url: String,
}

impl SkipAggregator {
    pub fn new(config: &AppConfig) -> Self {
        SkipAggregator {
            http: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
            base_url: BASE_URL.to_string(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "skip request");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::aggregator(
                PROVIDER,
                format!("{path} returned HTTP {}", response.status()),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("malformed payload: {e}")))
    }

    async fn fetch_route(&self, swap: &ResolvedSwap) -> Result<Value> {
        self.post(
            "/v2/fungible/route",
            json!({
                "amount_in": swap.amount_in_raw,
                "source_asset_denom": swap.src.address,
                "source_asset_chain_id": swap.chain.native_chain_id,
                "dest_asset_denom": swap.dst.address,
                "dest_asset_chain_id": swap.chain.native_chain_id,
                "cumulative_affiliate_fee_bps": "0",
                "allow_multi_tx": false,
            }),
        )
        .await
    }

    fn venues_from_route(route: &Value) -> Vec<String> {
        route
            .get("operations")
            .and_then(Value::as_array)
            .map(|operations| {
                operations
                    .iter()
                    .filter_map(|op| {
                        if let Some(name) = op
                            .pointer("/swap/swap_venue/name")
                            .and_then(Value::as_str)
                        {
                            Some(name.to_string())
                        } else if op.get("transfer").is_some() {
                            Some("ibc-transfer".to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SwapAggregator for SkipAggregator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    async fn get_quote(&self, request: &SwapRequest, ctx: &PluginContext) -> Result<SwapQuote> {
        let swap = resolve_swap(request, ctx).await?;
        let route = self.fetch_route(&swap).await?;
        let amount_out = route
            .get("amount_out")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "route missing amount_out"))?
            .to_string();
        let minimum_amount_out = amount::min_out_raw(&amount_out, swap.slippage_bps)?;
        let route_venues = Self::venues_from_route(&route);

        Ok(SwapQuote {
            src_token: swap.src,
            dst_token: swap.dst,
            amount_in: swap.amount_in_raw,
            amount_out,
            minimum_amount_out,
            price_impact: route
                .pointer("/swap_price_impact_percent")
                .and_then(Value::as_str)
                .map(str::to_string),
            route: route_venues,
            aggregator: PROVIDER.to_string(),
        })
    }

    async fn build_transaction(
        &self,
        request: &SwapRequest,
        ctx: &PluginContext,
    ) -> Result<UnsignedTransaction> {
        let wallet = require_wallet(request, ctx)?;
        let swap = resolve_swap(request, ctx).await?;

        let mut addresses = serde_json::Map::new();
        addresses.insert(
            swap.chain.native_chain_id.clone(),
            Value::String(wallet.clone()),
        );

        // msgs_direct routes and builds in one call with a fresh quote.
        let payload = self
            .post(
                "/v2/fungible/msgs_direct",
                json!({
                    "amount_in": swap.amount_in_raw,
                    "source_asset_denom": swap.src.address,
                    "source_asset_chain_id": swap.chain.native_chain_id,
                    "dest_asset_denom": swap.dst.address,
                    "dest_asset_chain_id": swap.chain.native_chain_id,
                    "slippage_tolerance_percent": (f64::from(swap.slippage_bps) / 100.0).to_string(),
                    "chain_ids_to_addresses": addresses,
                }),
            )
            .await?;

        let msgs = payload
            .get("msgs")
            .and_then(Value::as_array)
            .cloned()
            .or_else(|| {
                payload
                    .pointer("/txs/0/cosmos_tx/msgs")
                    .and_then(Value::as_array)
                    .cloned()
            })
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "msgs_direct returned no messages"))?;

        Ok(UnsignedTransaction {
            chain_id: swap.chain.id.clone(),
            ecosystem: swap.chain.ecosystem,
            raw: TxPayload::Cosmos { msgs },
            description: format!(
                "Skip swap {} {} -> {} on {}",
                request.amount, swap.src.symbol, swap.dst.symbol, swap.chain.name
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_venues_in_execution_order() {
        let route = json!({
            "operations": [
                { "transfer": { "port": "transfer" } },
                { "swap": { "swap_venue": { "name": "osmosis-poolmanager" } } },
            ]
        });
        assert_eq!(
            SkipAggregator::venues_from_route(&route),
            vec!["ibc-transfer".to_string(), "osmosis-poolmanager".to_string()]
        );
        assert!(SkipAggregator::venues_from_route(&json!({})).is_empty());
    }
}
