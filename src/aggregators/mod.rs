//! Swap aggregators. One provider per ecosystem; the swap plugin routes a
//! request to the aggregator whose supported-chain set contains the
//! request's chain id. No multi-provider price comparison.

pub mod jupiter;
pub mod odos;
pub mod skip;

pub use jupiter::JupiterAggregator;
pub use odos::OdosAggregator;
pub use skip::SkipAggregator;

use async_trait::async_trait;
use serde::Deserialize;

use crate::amount;
use crate::error::{GatewayError, Result};
use crate::registry::PluginContext;
use crate::types::{ChainInfo, SwapQuote, TokenInfo, UnsignedTransaction};

/// Swap parameters as supplied by the caller. `amount` is the
/// human-readable decimal amount of `src_token`; conversion to raw units
/// happens inside the aggregator using the resolved token's decimals.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub chain_id: String,
    pub src_token: String,
    pub dst_token: String,
    pub amount: String,
    #[serde(default)]
    pub slippage_bps: Option<u32>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[async_trait]
pub trait SwapAggregator: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_chain_ids(&self) -> &'static [&'static str];

    fn supports(&self, chain_id: &str) -> bool {
        self.supported_chain_ids().contains(&chain_id)
    }

    async fn get_quote(&self, request: &SwapRequest, ctx: &PluginContext) -> Result<SwapQuote>;

    /// Build an unsigned transaction for the swap. Providers whose quotes
    /// expire re-fetch internally rather than reusing a stale quote.
    async fn build_transaction(
        &self,
        request: &SwapRequest,
        ctx: &PluginContext,
    ) -> Result<UnsignedTransaction>;
}

/// Everything an aggregator needs before talking to its provider: the
/// chain record, both resolved tokens, the raw input amount, and the
/// effective slippage.
pub(crate) struct ResolvedSwap {
    pub chain: ChainInfo,
    pub src: TokenInfo,
    pub dst: TokenInfo,
    pub amount_in_raw: String,
    pub slippage_bps: u32,
}

pub(crate) async fn resolve_swap(request: &SwapRequest, ctx: &PluginContext) -> Result<ResolvedSwap> {
    let chain = ctx.chain(&request.chain_id)?.clone();
    let adapter = ctx.adapter_for_chain(&request.chain_id)?;

    let src = adapter
        .resolve_token(&request.chain_id, &request.src_token)
        .await?
        .ok_or_else(|| GatewayError::TokenNotFound {
            chain_id: request.chain_id.clone(),
            token: request.src_token.clone(),
        })?;
    let dst = adapter
        .resolve_token(&request.chain_id, &request.dst_token)
        .await?
        .ok_or_else(|| GatewayError::TokenNotFound {
            chain_id: request.chain_id.clone(),
            token: request.dst_token.clone(),
        })?;
    if src.address == dst.address {
        return Err(GatewayError::invalid_input(format!(
            "source and destination are the same token: {}",
            src.symbol
        )));
    }

    let amount_in_raw = amount::parse_raw(&request.amount, src.decimals)?;
    if amount_in_raw == "0" {
        return Err(GatewayError::invalid_input("amount must be positive"));
    }

    Ok(ResolvedSwap {
        chain,
        src,
        dst,
        amount_in_raw,
        slippage_bps: request
            .slippage_bps
            .unwrap_or(ctx.config().default_slippage_bps),
    })
}

/// Wallet address, required for transaction building and validated
/// against the chain's address format.
pub(crate) fn require_wallet(request: &SwapRequest, ctx: &PluginContext) -> Result<String> {
    let wallet = request
        .wallet_address
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| GatewayError::invalid_input("'walletAddress' is required"))?;
    let adapter = ctx.adapter_for_chain(&request.chain_id)?;
    if !adapter.is_valid_address(&request.chain_id, wallet)? {
        return Err(GatewayError::invalid_input(format!(
            "address {wallet} is not valid for chain {}",
            request.chain_id
        )));
    }
    Ok(wallet.to_string())
}
