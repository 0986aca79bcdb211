use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::amount;
use crate::chains::{lookup_token, require_chain, token_infos, ChainAdapter, TokenRow};
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::types::{Balance, ChainInfo, Ecosystem, TokenInfo};

/// Wrapped-SOL mint, used as the native asset identifier.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

const DEFAULT_RPC: &str = "https://api.mainnet-beta.solana.com";

const KNOWN_TOKENS: &[TokenRow] = &[
    ("USDC", "USD Coin", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6, Some("usd-coin")),
    ("USDT", "Tether USD", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6, Some("tether")),
    ("JUP", "Jupiter", "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN", 6, Some("jupiter-exchange-solana")),
    ("BONK", "Bonk", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", 5, Some("bonk")),
    ("JITOSOL", "Jito Staked SOL", "J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn", 9, Some("jito-staked-sol")),
];

/// Adapter for Solana mainnet, speaking plain JSON-RPC over HTTP.
pub struct SolanaAdapter {
    chains: Vec<ChainInfo>,
    tokens: Vec<TokenInfo>,
    http: Client,
}

impl SolanaAdapter {
    pub fn new(config: &AppConfig) -> Self {
        let chain_id = "solana-mainnet";
        let chains = vec![ChainInfo {
            id: chain_id.to_string(),
            name: "Solana".to_string(),
            ecosystem: Ecosystem::Solana,
            native_chain_id: "mainnet-beta".to_string(),
            native_token: TokenInfo {
                symbol: "SOL".to_string(),
                name: "Solana".to_string(),
                decimals: 9,
                address: NATIVE_MINT.to_string(),
                chain_id: chain_id.to_string(),
                coingecko_id: Some("solana".to_string()),
            },
            rpc_url: config.rpc_url_for(chain_id, DEFAULT_RPC).to_string(),
            explorer_url: "https://solscan.io".to_string(),
        }];
        SolanaAdapter {
            chains,
            tokens: token_infos(chain_id, KNOWN_TOKENS),
            http: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn rpc_call(&self, chain: &ChainInfo, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: Value = self
            .http
            .post(&chain.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(GatewayError::Rpc(format!("{method} failed: {message}")));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn lamports(&self, chain: &ChainInfo, address: &str) -> Result<u64> {
        let result = self
            .rpc_call(chain, "getBalance", json!([address]))
            .await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::Rpc("getBalance returned no value".to_string()))
    }

    /// Sum of all token accounts the owner holds for one mint.
    async fn spl_balance(&self, chain: &ChainInfo, owner: &str, mint: &str) -> Result<u128> {
        let result = self
            .rpc_call(
                chain,
                "getTokenAccountsByOwner",
                json!([owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        let accounts = result
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut total: u128 = 0;
        for account in &accounts {
            let raw = account
                .pointer("/account/data/parsed/info/tokenAmount/amount")
                .and_then(Value::as_str)
                .unwrap_or("0");
            total = total.saturating_add(raw.parse::<u128>().unwrap_or(0));
        }
        Ok(total)
    }

    async fn token_balance(&self, chain: &ChainInfo, owner: &str, token: &TokenInfo) -> Result<Balance> {
        let raw = if token.address == NATIVE_MINT {
            self.lamports(chain, owner).await?.to_string()
        } else {
            self.spl_balance(chain, owner, &token.address).await?.to_string()
        };
        Ok(Balance {
            symbol: token.symbol.clone(),
            address: token.address.clone(),
            balance_formatted: amount::format_raw(&raw, token.decimals)?,
            balance: raw,
        })
    }

    fn is_base58_pubkey(address: &str) -> bool {
        bs58::decode(address)
            .into_vec()
            .map(|bytes| bytes.len() == 32)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Solana
    }

    fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    fn is_valid_address(&self, chain_id: &str, address: &str) -> Result<bool> {
        require_chain(self, chain_id)?;
        Ok(Self::is_base58_pubkey(address))
    }

    async fn native_balance(&self, chain_id: &str, address: &str) -> Result<Balance> {
        let chain = require_chain(self, chain_id)?;
        debug!(chain = %chain.id, %address, "fetching SOL balance");
        self.token_balance(chain, address, &chain.native_token).await
    }

    async fn token_balances(
        &self,
        chain_id: &str,
        address: &str,
        tokens: &[String],
    ) -> Result<Vec<Balance>> {
        let chain = require_chain(self, chain_id)?;

        let resolved = join_all(tokens.iter().map(|t| self.resolve_token(chain_id, t))).await;
        let mut targets = Vec::new();
        for (query, result) in tokens.iter().zip(resolved) {
            match result {
                Ok(Some(token)) => targets.push(token),
                Ok(None) => debug!(chain = %chain.id, token = %query, "skipping unresolved token"),
                Err(e) => warn!(chain = %chain.id, token = %query, error = %e, "token resolution failed"),
            }
        }

        let queried = join_all(
            targets
                .iter()
                .map(|token| self.token_balance(chain, address, token)),
        )
        .await;
        let mut balances = Vec::new();
        for (token, result) in targets.iter().zip(queried) {
            match result {
                Ok(balance) => balances.push(balance),
                Err(e) => warn!(chain = %chain.id, token = %token.symbol, error = %e, "balance query failed"),
            }
        }
        Ok(balances)
    }

    async fn resolve_token(&self, chain_id: &str, token: &str) -> Result<Option<TokenInfo>> {
        let chain = require_chain(self, chain_id)?;
        let native = &chain.native_token;
        if native.symbol.eq_ignore_ascii_case(token) || native.address == token {
            return Ok(Some(native.clone()));
        }
        if let Some(known) = lookup_token(&self.tokens, token) {
            return Ok(Some(known.clone()));
        }
        if !Self::is_base58_pubkey(token) {
            return Ok(None);
        }
        // Unknown mint: ask the cluster for its decimals. A node-level
        // error means the mint does not exist (known-absent); only
        // transport failures propagate.
        match self
            .rpc_call(chain, "getTokenSupply", json!([token]))
            .await
        {
            Ok(result) => {
                let Some(decimals) = result.pointer("/value/decimals").and_then(Value::as_u64)
                else {
                    return Ok(None);
                };
                Ok(Some(TokenInfo {
                    symbol: token.chars().take(4).collect::<String>().to_uppercase(),
                    name: format!("SPL mint {token}"),
                    decimals: decimals as u8,
                    address: token.to_string(),
                    chain_id: chain_id.to_string(),
                    coingecko_id: None,
                }))
            }
            Err(GatewayError::Rpc(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SolanaAdapter {
        SolanaAdapter::new(&AppConfig::default())
    }

    #[test]
    fn validates_base58_pubkeys() {
        let adapter = adapter();
        assert!(adapter
            .is_valid_address("solana-mainnet", NATIVE_MINT)
            .unwrap());
        assert!(adapter
            .is_valid_address("solana-mainnet", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
            .unwrap());
        // Hex addresses and short strings are not Solana pubkeys.
        assert!(!adapter
            .is_valid_address("solana-mainnet", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")
            .unwrap());
        assert!(!adapter.is_valid_address("solana-mainnet", "abc").unwrap());
        assert!(matches!(
            adapter.is_valid_address("solana-devnet", NATIVE_MINT),
            Err(GatewayError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn native_token_is_nine_decimal_sol() {
        let adapter = adapter();
        let chain = adapter.get_chain("solana-mainnet").unwrap();
        assert_eq!(chain.native_token.symbol, "SOL");
        assert_eq!(chain.native_token.decimals, 9);
        assert_eq!(chain.native_token.address, NATIVE_MINT);
    }

    #[tokio::test]
    async fn resolves_usdc_by_symbol_and_mint() {
        let adapter = adapter();
        let by_symbol = adapter
            .resolve_token("solana-mainnet", "usdc")
            .await
            .unwrap()
            .unwrap();
        let by_mint = adapter
            .resolve_token("solana-mainnet", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_symbol.address, by_mint.address);
        assert_eq!(by_symbol.decimals, 6);
    }

    #[tokio::test]
    async fn malformed_mint_is_known_absent_without_io() {
        let adapter = adapter();
        // Not valid base58-of-32-bytes, so resolution answers before any
        // network call is attempted.
        assert!(adapter
            .resolve_token("solana-mainnet", "definitely-not-a-mint")
            .await
            .unwrap()
            .is_none());
    }
}
