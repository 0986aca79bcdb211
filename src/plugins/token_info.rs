//! Chain and token metadata discovery plus price lookup.

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::plugins::{arg_str, opt_str_list, Plugin, Tool};
use crate::price::{platform_for_chain, PriceClient};
use crate::registry::PluginContext;
use crate::types::TokenInfo;

pub struct TokenInfoPlugin {
    price: Arc<OnceCell<PriceClient>>,
}

impl TokenInfoPlugin {
    pub fn new() -> Self {
        TokenInfoPlugin {
            price: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for TokenInfoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for TokenInfoPlugin {
    fn name(&self) -> &'static str {
        "token-info"
    }

    fn description(&self) -> &'static str {
        "Chain discovery, token metadata resolution, and USD price lookup"
    }

    async fn initialize(&mut self, ctx: &Arc<PluginContext>) -> Result<()> {
        let client = PriceClient::new(ctx.config())?;
        self.price
            .set(client)
            .map_err(|_| GatewayError::Config("token-info plugin initialized twice".into()))
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(GetChainsTool),
            Arc::new(GetTokenInfoTool),
            Arc::new(TokenPriceTool {
                price: self.price.clone(),
            }),
        ]
    }
}

struct GetChainsTool;

#[async_trait]
impl Tool for GetChainsTool {
    fn name(&self) -> &'static str {
        "defi_get_chains"
    }

    fn description(&self) -> &'static str {
        "List every supported chain with its ecosystem, native token, and explorer"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn call(&self, ctx: &PluginContext, _args: Value) -> Result<Value> {
        let chains = ctx.supported_chains();
        Ok(json!({
            "count": chains.len(),
            "chains": chains,
        }))
    }
}

struct GetTokenInfoTool;

#[async_trait]
impl Tool for GetTokenInfoTool {
    fn name(&self) -> &'static str {
        "defi_get_token_info"
    }

    fn description(&self) -> &'static str {
        "Resolve a token symbol or chain-native address to its metadata"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chainId": {
                    "type": "string",
                    "description": "Chain id, e.g. 'ethereum' or 'solana-mainnet'"
                },
                "token": {
                    "type": "string",
                    "description": "Token symbol, contract address, mint, or denom"
                }
            },
            "required": ["chainId", "token"]
        })
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let chain_id = arg_str(&args, "chainId")?;
        let token = arg_str(&args, "token")?;
        let adapter = ctx.adapter_for_chain(chain_id)?;
        match adapter.resolve_token(chain_id, token).await? {
            Some(info) => Ok(serde_json::to_value(info)
                .map_err(|e| GatewayError::Rpc(format!("serialize token info: {e}")))?),
            None => Err(GatewayError::TokenNotFound {
                chain_id: chain_id.to_string(),
                token: token.to_string(),
            }),
        }
    }
}

struct TokenPriceTool {
    price: Arc<OnceCell<PriceClient>>,
}

#[async_trait]
impl Tool for TokenPriceTool {
    fn name(&self) -> &'static str {
        "defi_token_price"
    }

    fn description(&self) -> &'static str {
        "USD prices for a list of tokens on one chain. Every token must resolve."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chainId": {
                    "type": "string",
                    "description": "Chain id the tokens live on"
                },
                "tokens": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Token symbols or chain-native addresses"
                }
            },
            "required": ["chainId", "tokens"]
        })
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let chain_id = arg_str(&args, "chainId")?;
        let tokens = opt_str_list(&args, "tokens")?
            .filter(|list| !list.is_empty())
            .ok_or_else(|| GatewayError::invalid_input("'tokens' must be a non-empty array"))?;
        let price = self
            .price
            .get()
            .ok_or_else(|| GatewayError::Config("token-info plugin not initialized".into()))?;
        let adapter = ctx.adapter_for_chain(chain_id)?;

        // Caller-specified set: resolution is mandatory, so the first
        // unresolvable token fails the whole call.
        let resolved = join_all(
            tokens
                .iter()
                .map(|token| adapter.resolve_token(chain_id, token)),
        )
        .await;
        let mut infos: Vec<TokenInfo> = Vec::with_capacity(tokens.len());
        for (query, result) in tokens.iter().zip(resolved) {
            match result? {
                Some(info) => infos.push(info),
                None => {
                    return Err(GatewayError::TokenNotFound {
                        chain_id: chain_id.to_string(),
                        token: query.clone(),
                    })
                }
            }
        }

        let ids: Vec<String> = infos
            .iter()
            .filter_map(|info| info.coingecko_id.clone())
            .collect();
        let contracts: Vec<String> = infos
            .iter()
            .filter(|info| info.coingecko_id.is_none())
            .map(|info| info.address.clone())
            .collect();

        let by_id = price.usd_by_ids(&ids).await?;
        let by_contract = if contracts.is_empty() {
            Default::default()
        } else {
            let platform = platform_for_chain(chain_id).ok_or_else(|| {
                GatewayError::aggregator(
                    "coingecko",
                    format!("no contract-price platform for chain {chain_id}"),
                )
            })?;
            price.usd_by_contracts(platform, &contracts).await?
        };

        // Output order always matches input order, regardless of which
        // price call answered first.
        let mut priced = Vec::with_capacity(infos.len());
        for info in &infos {
            let usd = match &info.coingecko_id {
                Some(id) => by_id.get(&id.to_lowercase()),
                None => by_contract.get(&info.address.to_lowercase()),
            };
            let usd = usd.copied().ok_or_else(|| {
                GatewayError::aggregator(
                    "coingecko",
                    format!("no USD price for {} on {chain_id}", info.symbol),
                )
            })?;
            priced.push(json!({
                "token": info,
                "priceUsd": usd,
            }));
        }

        Ok(json!({
            "chainId": chain_id,
            "prices": priced,
        }))
    }
}
