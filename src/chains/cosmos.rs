use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::amount;
use crate::chains::{lookup_token, require_chain, token_infos, ChainAdapter, TokenRow};
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::types::{Balance, ChainInfo, Ecosystem, TokenInfo};

/// `(id, name, chain-id, bech32 prefix, denom, symbol, display name,
/// coingecko id, LCD fallback, explorer)`
const CHAINS: &[(
    &str,
    &str,
    &str,
    &str,
    &str,
    &str,
    &str,
    &str,
    &str,
    &str,
)] = &[
    (
        "cosmoshub",
        "Cosmos Hub",
        "cosmoshub-4",
        "cosmos",
        "uatom",
        "ATOM",
        "Cosmos Hub Atom",
        "cosmos",
        "https://rest.cosmos.directory/cosmoshub",
        "https://www.mintscan.io/cosmos",
    ),
    (
        "osmosis",
        "Osmosis",
        "osmosis-1",
        "osmo",
        "uosmo",
        "OSMO",
        "Osmosis",
        "osmosis",
        "https://rest.cosmos.directory/osmosis",
        "https://www.mintscan.io/osmosis",
    ),
];

const OSMOSIS_TOKENS: &[TokenRow] = &[
    (
        "USDC",
        "USD Coin (Noble)",
        "ibc/498A0751C798A0D9A389AA3691123DADA57DAA4FE165D5C75894505B876BA6E4",
        6,
        Some("usd-coin"),
    ),
    (
        "ATOM",
        "Cosmos Hub Atom",
        "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2",
        6,
        Some("cosmos"),
    ),
];

fn tokens_for(id: &str) -> &'static [TokenRow] {
    match id {
        "osmosis" => OSMOSIS_TOKENS,
        _ => &[],
    }
}

fn bech32_prefix(chain_id: &str) -> Option<&'static str> {
    CHAINS
        .iter()
        .find(|row| row.0 == chain_id)
        .map(|row| row.3)
}

/// Adapter over the configured Cosmos chains, speaking LCD REST.
pub struct CosmosAdapter {
    chains: Vec<ChainInfo>,
    tokens: std::collections::HashMap<String, Vec<TokenInfo>>,
    http: Client,
}

impl CosmosAdapter {
    pub fn new(config: &AppConfig) -> Self {
        let mut chains = Vec::with_capacity(CHAINS.len());
        let mut tokens = std::collections::HashMap::new();
        for (id, name, chain_id, _prefix, denom, symbol, display, coingecko, lcd, explorer) in
            CHAINS
        {
            chains.push(ChainInfo {
                id: (*id).to_string(),
                name: (*name).to_string(),
                ecosystem: Ecosystem::Cosmos,
                native_chain_id: (*chain_id).to_string(),
                native_token: TokenInfo {
                    symbol: (*symbol).to_string(),
                    name: (*display).to_string(),
                    decimals: 6,
                    address: (*denom).to_string(),
                    chain_id: (*id).to_string(),
                    coingecko_id: Some((*coingecko).to_string()),
                },
                rpc_url: config.rpc_url_for(id, lcd).to_string(),
                explorer_url: (*explorer).to_string(),
            });
            tokens.insert((*id).to_string(), token_infos(id, tokens_for(id)));
        }
        CosmosAdapter {
            chains,
            tokens,
            http: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Bank module balance for one denom, in base units.
    async fn denom_balance(&self, chain: &ChainInfo, address: &str, denom: &str) -> Result<String> {
        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
            chain.rpc_url, address, denom
        );
        let response: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| GatewayError::Rpc(format!("bank query on {} failed: {e}", chain.id)))?
            .json()
            .await?;
        let raw = response
            .pointer("/balance/amount")
            .and_then(Value::as_str)
            .unwrap_or("0");
        Ok(raw.to_string())
    }

    async fn token_balance(&self, chain: &ChainInfo, address: &str, token: &TokenInfo) -> Result<Balance> {
        let raw = self.denom_balance(chain, address, &token.address).await?;
        Ok(Balance {
            symbol: token.symbol.clone(),
            address: token.address.clone(),
            balance_formatted: amount::format_raw(&raw, token.decimals)?,
            balance: raw,
        })
    }
}

#[async_trait]
impl ChainAdapter for CosmosAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cosmos
    }

    fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    fn is_valid_address(&self, chain_id: &str, address: &str) -> Result<bool> {
        require_chain(self, chain_id)?;
        let Some(expected) = bech32_prefix(chain_id) else {
            return Ok(false);
        };
        Ok(bech32::decode(address)
            .map(|(hrp, _, _)| hrp == expected)
            .unwrap_or(false))
    }

    async fn native_balance(&self, chain_id: &str, address: &str) -> Result<Balance> {
        let chain = require_chain(self, chain_id)?;
        debug!(chain = %chain.id, %address, "fetching native balance");
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
        let table = self.tokens.get(chain_id).map(Vec::as_slice).unwrap_or(&[]);
        // Denoms carry no on-chain decimals metadata, so resolution is
        // table-only: anything else is known-absent.
        Ok(lookup_token(table, token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> CosmosAdapter {
        CosmosAdapter::new(&AppConfig::default())
    }

    #[test]
    fn validates_bech32_with_chain_prefix() {
        let adapter = adapter();
        assert!(adapter
            .is_valid_address("cosmoshub", "cosmos1vqpjljwsynsn58dugz0w8ut7kun7t8ls2qkmsq")
            .unwrap());
        // Right encoding, wrong prefix for the chain.
        assert!(!adapter
            .is_valid_address("osmosis", "cosmos1vqpjljwsynsn58dugz0w8ut7kun7t8ls2qkmsq")
            .unwrap());
        assert!(!adapter.is_valid_address("cosmoshub", "not-bech32").unwrap());
        assert!(matches!(
            adapter.is_valid_address("juno", "juno1xyz"),
            Err(GatewayError::UnsupportedChain(_))
        ));
    }

    #[tokio::test]
    async fn resolves_native_and_table_denoms() {
        let adapter = adapter();
        let atom = adapter
            .resolve_token("cosmoshub", "uatom")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(atom.symbol, "ATOM");
        assert_eq!(atom.decimals, 6);

        let usdc = adapter
            .resolve_token("osmosis", "USDC")
            .await
            .unwrap()
            .unwrap();
        assert!(usdc.address.starts_with("ibc/"));

        assert!(adapter
            .resolve_token("cosmoshub", "ibc/DOESNOTEXIST")
            .await
            .unwrap()
            .is_none());
    }
}
