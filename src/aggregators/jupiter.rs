//! Jupiter swap routing for Solana.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::aggregators::{require_wallet, resolve_swap, ResolvedSwap, SwapAggregator, SwapRequest};
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::registry::PluginContext;
use crate::types::{SwapQuote, TxPayload, UnsignedTransaction};

const BASE_URL: &str = "https://quote-api.jup.ag/v6";
const PROVIDER: &str = "jupiter";
const SUPPORTED: &[&str] = &["solana-mainnet"];

pub struct JupiterAggregator {
    http: Client,
    base_url: String,
}

impl JupiterAggregator {
    pub fn new(config: &AppConfig) -> Self {
        JupiterAggregator {
            http: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Quotes expire within seconds, so this is called fresh for both
    /// `get_quote` and `build_transaction`.
    async fn fetch_quote(&self, swap: &ResolvedSwap) -> Result<Value> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}&swapMode=ExactIn",
            self.base_url, swap.src.address, swap.dst.address, swap.amount_in_raw, swap.slippage_bps
        );
        debug!(%url, "jupiter quote");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("quote request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::aggregator(
                PROVIDER,
                format!("quote returned HTTP {}", response.status()),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("malformed quote: {e}")))
    }

    fn quote_from_payload(&self, swap: ResolvedSwap, payload: &Value) -> Result<SwapQuote> {
        let amount_out = payload
            .get("outAmount")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "quote missing outAmount"))?
            .to_string();
        let minimum_amount_out = payload
            .get("otherAmountThreshold")
            .and_then(Value::as_str)
            .map(str::to_string)
            .map(Ok)
            .unwrap_or_else(|| crate::amount::min_out_raw(&amount_out, swap.slippage_bps))?;
        let route = payload
            .get("routePlan")
            .and_then(Value::as_array)
            .map(|plan| {
                plan.iter()
                    .filter_map(|hop| {
                        hop.pointer("/swapInfo/label")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SwapQuote {
            src_token: swap.src,
            dst_token: swap.dst,
            amount_in: swap.amount_in_raw,
            amount_out,
            minimum_amount_out,
            price_impact: payload
                .get("priceImpactPct")
                .and_then(Value::as_str)
                .map(str::to_string),
            route,
            aggregator: PROVIDER.to_string(),
        })
    }
}

#[async_trait]
impl SwapAggregator for JupiterAggregator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    async fn get_quote(&self, request: &SwapRequest, ctx: &PluginContext) -> Result<SwapQuote> {
        let swap = resolve_swap(request, ctx).await?;
        let payload = self.fetch_quote(&swap).await?;
        self.quote_from_payload(swap, &payload)
    }

    async fn build_transaction(
        &self,
        request: &SwapRequest,
        ctx: &PluginContext,
    ) -> Result<UnsignedTransaction> {
        let wallet = require_wallet(request, ctx)?;
        let swap = resolve_swap(request, ctx).await?;
        let quote = self.fetch_quote(&swap).await?;

        let body = json!({
            "quoteResponse": quote,
            "userPublicKey": wallet,
            "wrapAndUnwrapSol": true,
        });
        let response = self
            .http
            .post(format!("{}/swap", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("swap request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::aggregator(
                PROVIDER,
                format!("swap returned HTTP {}", response.status()),
            ));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("malformed swap payload: {e}")))?;
        let transaction_base64 = payload
            .get("swapTransaction")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::aggregator(PROVIDER, "swap missing swapTransaction"))?
            .to_string();

        Ok(UnsignedTransaction {
            chain_id: swap.chain.id.clone(),
            ecosystem: swap.chain.ecosystem,
            raw: TxPayload::Solana { transaction_base64 },
            description: format!(
                "Jupiter swap {} {} -> {} on {}",
                request.amount, swap.src.symbol, swap.dst.symbol, swap.chain.name
            ),
        })
    }
}
