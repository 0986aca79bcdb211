//! Swap quoting and unsigned-transaction building, routed to the
//! aggregator that serves the request's chain.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::aggregators::{
    JupiterAggregator, OdosAggregator, SkipAggregator, SwapAggregator, SwapRequest,
};
use crate::error::{GatewayError, Result};
use crate::plugins::{Plugin, Tool};
use crate::registry::PluginContext;

type Aggregators = Arc<OnceCell<Vec<Arc<dyn SwapAggregator>>>>;

pub struct SwapPlugin {
    aggregators: Aggregators,
}

impl SwapPlugin {
    pub fn new() -> Self {
        SwapPlugin {
            aggregators: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for SwapPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SwapPlugin {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn description(&self) -> &'static str {
        "Swap quotes and unsigned swap transactions via per-ecosystem aggregators"
    }

    async fn initialize(&mut self, ctx: &Arc<PluginContext>) -> Result<()> {
        let config = ctx.config();
        let aggregators: Vec<Arc<dyn SwapAggregator>> = vec![
            Arc::new(OdosAggregator::new(config)),
            Arc::new(JupiterAggregator::new(config)),
            Arc::new(SkipAggregator::new(config)),
        ];
        self.aggregators
            .set(aggregators)
            .map_err(|_| GatewayError::Config("swap plugin initialized twice".into()))
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(GetSwapQuoteTool {
                aggregators: self.aggregators.clone(),
            }),
            Arc::new(BuildSwapTransactionTool {
                aggregators: self.aggregators.clone(),
            }),
        ]
    }
}

/// The aggregator whose supported-chain set contains `chain_id`.
pub fn aggregator_for<'a>(
    aggregators: &'a [Arc<dyn SwapAggregator>],
    chain_id: &str,
) -> Result<&'a Arc<dyn SwapAggregator>> {
    aggregators
        .iter()
        .find(|aggregator| aggregator.supports(chain_id))
        .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.to_string()))
}

fn parse_request(ctx: &PluginContext, args: Value) -> Result<SwapRequest> {
    let request: SwapRequest = serde_json::from_value(args)
        .map_err(|e| GatewayError::invalid_input(format!("invalid swap request: {e}")))?;
    // The chain must exist before any aggregator is consulted.
    ctx.chain(&request.chain_id)?;
    Ok(request)
}

fn swap_schema(require_wallet: bool) -> Value {
    let mut required = vec!["chainId", "srcToken", "dstToken", "amount"];
    if require_wallet {
        required.push("walletAddress");
    }
    json!({
        "type": "object",
        "properties": {
            "chainId": {
                "type": "string",
                "description": "Chain to swap on, e.g. 'ethereum' or 'osmosis'"
            },
            "srcToken": {
                "type": "string",
                "description": "Token to sell: symbol or chain-native address"
            },
            "dstToken": {
                "type": "string",
                "description": "Token to buy: symbol or chain-native address"
            },
            "amount": {
                "type": "string",
                "description": "Human-readable decimal amount of srcToken"
            },
            "slippageBps": {
                "type": "integer",
                "description": "Slippage tolerance in basis points (default 50)"
            },
            "walletAddress": {
                "type": "string",
                "description": "Wallet the swap is built for"
            }
        },
        "required": required
    })
}

struct GetSwapQuoteTool {
    aggregators: Aggregators,
}

#[async_trait]
impl Tool for GetSwapQuoteTool {
    fn name(&self) -> &'static str {
        "defi_get_swap_quote"
    }

    fn description(&self) -> &'static str {
        "Quote a token swap through the aggregator serving the chain's ecosystem"
    }

    fn schema(&self) -> Value {
        swap_schema(false)
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let request = parse_request(ctx, args)?;
        let aggregators = self
            .aggregators
            .get()
            .ok_or_else(|| GatewayError::Config("swap plugin not initialized".into()))?;
        let aggregator = aggregator_for(aggregators, &request.chain_id)?;
        let quote = aggregator.get_quote(&request, ctx).await?;
        serde_json::to_value(quote)
            .map_err(|e| GatewayError::Rpc(format!("serialize quote: {e}")))
    }
}

struct BuildSwapTransactionTool {
    aggregators: Aggregators,
}

#[async_trait]
impl Tool for BuildSwapTransactionTool {
    fn name(&self) -> &'static str {
        "defi_build_swap_transaction"
    }

    fn description(&self) -> &'static str {
        "Build an unsigned swap transaction. Nothing is signed or broadcast."
    }

    fn schema(&self) -> Value {
        swap_schema(true)
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let request = parse_request(ctx, args)?;
        let aggregators = self
            .aggregators
            .get()
            .ok_or_else(|| GatewayError::Config("swap plugin not initialized".into()))?;
        let aggregator = aggregator_for(aggregators, &request.chain_id)?;
        let transaction = aggregator.build_transaction(&request, ctx).await?;
        serde_json::to_value(transaction)
            .map_err(|e| GatewayError::Rpc(format!("serialize transaction: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn aggregators() -> Vec<Arc<dyn SwapAggregator>> {
        let config = AppConfig::default();
        vec![
            Arc::new(OdosAggregator::new(&config)),
            Arc::new(JupiterAggregator::new(&config)),
            Arc::new(SkipAggregator::new(&config)),
        ]
    }

    #[test]
    fn routes_by_ecosystem_membership() {
        let aggregators = aggregators();
        assert_eq!(aggregator_for(&aggregators, "ethereum").unwrap().name(), "odos");
        assert_eq!(
            aggregator_for(&aggregators, "solana-mainnet").unwrap().name(),
            "jupiter"
        );
        assert_eq!(aggregator_for(&aggregators, "osmosis").unwrap().name(), "skip");
    }

    #[test]
    fn unclaimed_chain_is_unsupported() {
        let aggregators = aggregators();
        assert!(matches!(
            aggregator_for(&aggregators, "near"),
            Err(GatewayError::UnsupportedChain(_))
        ));
    }
}
