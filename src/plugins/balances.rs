//! Native and token balance lookup across every registered chain.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::plugins::{arg_str, opt_str_list, Plugin, Tool};
use crate::registry::PluginContext;

pub struct BalancesPlugin;

#[async_trait]
impl Plugin for BalancesPlugin {
    fn name(&self) -> &'static str {
        "balances"
    }

    fn description(&self) -> &'static str {
        "Wallet balance lookup for native assets and explicit token lists"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(GetBalancesTool)]
    }
}

struct GetBalancesTool;

#[async_trait]
impl Tool for GetBalancesTool {
    fn name(&self) -> &'static str {
        "defi_get_balances"
    }

    fn description(&self) -> &'static str {
        "Get wallet balances on one chain. Without 'tokens', returns the native asset balance; with 'tokens', returns balances for the tokens that resolve."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chainId": {
                    "type": "string",
                    "description": "Chain id, e.g. 'solana-mainnet'"
                },
                "address": {
                    "type": "string",
                    "description": "Wallet address in the chain's native format"
                },
                "tokens": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional token symbols or addresses; omit for the native balance"
                }
            },
            "required": ["chainId", "address"]
        })
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let chain_id = arg_str(&args, "chainId")?;
        let address = arg_str(&args, "address")?;
        let tokens = opt_str_list(&args, "tokens")?;

        let adapter = ctx.adapter_for_chain(chain_id)?;
        // Syntactic check first: a malformed address must fail before any
        // network call goes out.
        if !adapter.is_valid_address(chain_id, address)? {
            return Err(GatewayError::invalid_input(format!(
                "address {address} is not valid for chain {chain_id}"
            )));
        }

        debug!(chain = chain_id, %address, "balance lookup");
        let balances = match tokens {
            Some(list) if !list.is_empty() => {
                adapter.token_balances(chain_id, address, &list).await?
            }
            _ => vec![adapter.native_balance(chain_id, address).await?],
        };

        Ok(json!({
            "chainId": chain_id,
            "address": address,
            "balances": balances,
        }))
    }
}
