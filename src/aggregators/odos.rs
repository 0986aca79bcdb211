//! Odos swap routing for the EVM chains.

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

const BASE_URL: &str = "https://api.odos.xyz";
const PROVIDER: &str = "odos";
const SUPPORTED: &[&str] = &["ethereum", "arbitrum", "base", "optimism", "polygon"];

/// Placeholder taker for quote-only requests; Odos requires some address.
const QUOTE_ONLY_ADDR: &str = "0x0000000000000000000000000000000000000001";

pub struct OdosAggregator {
    http: Client,
    base_url: String,
}

impl OdosAggregator {
    pub fn new(config: &AppConfig) -> Self {
        OdosAggregator {
            http: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
            base_url: BASE_URL.to_string(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "odos request");
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

    /// Path quotes expire server-side, so both entry points fetch fresh.
    async fn fetch_quote(&self, swap: &ResolvedSwap, user_addr: &str) -> Result<Value> {
        let chain_id: u64 = swap.chain.native_chain_id.parse().map_err(|_| {
            GatewayError::Config(format!(
                "chain {} has a non-numeric EVM chain id",
                swap.chain.id
            ))
        })?;
        self.post(
            "/sor/quote/v2",
            json!({
                "chainId": chain_id,
                "inputTokens": [{
                    "tokenAddress": swap.src.address,
                    "amount": swap.amount_in_raw,
                }],
                "outputTokens": [{
                    "tokenAddress": swap.dst.address,
                    "proportion": 1,
                }],
                "slippageLimitPercent": f64::from(swap.slippage_bps) / 100.0,
                "userAddr": user_addr,
                "compact": true,
            }),
        )
        .await
    }

    fn quote_from_payload(&self, swap: ResolvedSwap, payload: &Value) -> Result<SwapQuote> {
        let amount_out = payload
            .pointer("/outAmounts/0")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "quote missing outAmounts"))?
            .to_string();
        let minimum_amount_out = amount::min_out_raw(&amount_out, swap.slippage_bps)?;
        let price_impact = payload
            .get("priceImpact")
            .and_then(Value::as_f64)
            .map(|impact| format!("{impact:.4}"));

        Ok(SwapQuote {
            src_token: swap.src,
            dst_token: swap.dst,
            amount_in: swap.amount_in_raw,
            amount_out,
            minimum_amount_out,
            price_impact,
            route: vec![],
            aggregator: PROVIDER.to_string(),
        })
    }
}

#[async_trait]
impl SwapAggregator for OdosAggregator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    async fn get_quote(&self, request: &SwapRequest, ctx: &PluginContext) -> Result<SwapQuote> {
        let swap = resolve_swap(request, ctx).await?;
        let user_addr = request
            .wallet_address
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .unwrap_or(QUOTE_ONLY_ADDR);
        let payload = self.fetch_quote(&swap, user_addr).await?;
        self.quote_from_payload(swap, &payload)
    }

    async fn build_transaction(
        &self,
        request: &SwapRequest,
        ctx: &PluginContext,
    ) -> Result<UnsignedTransaction> {
        let wallet = require_wallet(request, ctx)?;
        let swap = resolve_swap(request, ctx).await?;
        let quote = self.fetch_quote(&swap, &wallet).await?;
        let path_id = quote
            .get("pathId")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "quote missing pathId"))?;

        let assembled = self
            .post(
                "/sor/assemble",
                json!({
                    "userAddr": wallet,
                    "pathId": path_id,
                    "simulate": false,
                }),
            )
            .await?;
        let transaction = assembled
            .get("transaction")
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "assemble missing transaction"))?;
        let to = transaction
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "transaction missing 'to'"))?
            .to_string();
        let data = transaction
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "transaction missing 'data'"))?
            .to_string();
        let value = match transaction.get("value") {
            Some(Value::String(v)) => v.clone(),
            Some(Value::Number(v)) => v.to_string(),
            _ => "0".to_string(),
        };

        Ok(UnsignedTransaction {
            chain_id: swap.chain.id.clone(),
            ecosystem: swap.chain.ecosystem,
            raw: TxPayload::Evm { to, data, value },
            description: format!(
                "Odos swap {} {} -> {} on {}",
                request.amount, swap.src.symbol, swap.dst.symbol, swap.chain.name
            ),
        })
    }
}
