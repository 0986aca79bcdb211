use alloy::{
    primitives::{Address, Bytes},
    providers::{Provider, ProviderBuilder},
    rpc::types::eth::TransactionRequest,
    sol,
    sol_types::SolCall,
};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};
use url::Url;

use crate::amount;
use crate::chains::{lookup_token, require_chain, token_infos, ChainAdapter, TokenRow};
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::types::{Balance, ChainInfo, Ecosystem, TokenInfo};

sol! {
    #[allow(missing_docs)]
    function balanceOf(address account) external view returns (uint256);
    #[allow(missing_docs)]
    function decimals() external view returns (uint8);
    #[allow(missing_docs)]
    function symbol() external view returns (string);
}

/// Sentinel address for the chain's native asset.
pub const NATIVE_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

type HttpProvider = alloy::providers::RootProvider<
    alloy::transports::http::Http<alloy::transports::http::Client>,
>;

/// `(id, name, numeric chain id, native symbol, native name, native
/// coingecko id, public rpc fallback, explorer)`
const CHAINS: &[(
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
        "ethereum",
        "Ethereum",
        "1",
        "ETH",
        "Ether",
        "ethereum",
        "https://eth.llamarpc.com",
        "https://etherscan.io",
    ),
    (
        "arbitrum",
        "Arbitrum One",
        "42161",
        "ETH",
        "Ether",
        "ethereum",
        "https://arb1.arbitrum.io/rpc",
        "https://arbiscan.io",
    ),
    (
        "base",
        "Base",
        "8453",
        "ETH",
        "Ether",
        "ethereum",
        "https://mainnet.base.org",
        "https://basescan.org",
    ),
    (
        "optimism",
        "Optimism",
        "10",
        "ETH",
        "Ether",
        "ethereum",
        "https://mainnet.optimism.io",
        "https://optimistic.etherscan.io",
    ),
    (
        "polygon",
        "Polygon",
        "137",
        "POL",
        "Polygon Ecosystem Token",
        "polygon-ecosystem-token",
        "https://polygon-rpc.com",
        "https://polygonscan.com",
    ),
];

const ETHEREUM_TOKENS: &[TokenRow] = &[
    ("USDC", "USD Coin", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6, Some("usd-coin")),
    ("USDT", "Tether USD", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6, Some("tether")),
    ("WETH", "Wrapped Ether", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18, Some("weth")),
    ("DAI", "Dai Stablecoin", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18, Some("dai")),
    ("WBTC", "Wrapped BTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8, Some("wrapped-bitcoin")),
];

const ARBITRUM_TOKENS: &[TokenRow] = &[
    ("USDC", "USD Coin", "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", 6, Some("usd-coin")),
    ("USDT", "Tether USD", "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", 6, Some("tether")),
    ("WETH", "Wrapped Ether", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1", 18, Some("weth")),
    ("ARB", "Arbitrum", "0x912CE59144191C1204E64559FE8253a0e49E6548", 18, Some("arbitrum")),
];

const BASE_TOKENS: &[TokenRow] = &[
    ("USDC", "USD Coin", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6, Some("usd-coin")),
    ("WETH", "Wrapped Ether", "0x4200000000000000000000000000000000000006", 18, Some("weth")),
    ("DAI", "Dai Stablecoin", "0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb", 18, Some("dai")),
];

const OPTIMISM_TOKENS: &[TokenRow] = &[
    ("USDC", "USD Coin", "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85", 6, Some("usd-coin")),
    ("USDT", "Tether USD", "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58", 6, Some("tether")),
    ("WETH", "Wrapped Ether", "0x4200000000000000000000000000000000000006", 18, Some("weth")),
    ("OP", "Optimism", "0x4200000000000000000000000000000000000042", 18, Some("optimism")),
];

const POLYGON_TOKENS: &[TokenRow] = &[
    ("USDC", "USD Coin", "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", 6, Some("usd-coin")),
    ("USDT", "Tether USD", "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", 6, Some("tether")),
    ("WETH", "Wrapped Ether", "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619", 18, Some("weth")),
    ("DAI", "Dai Stablecoin", "0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063", 18, Some("dai")),
];

fn tokens_for(id: &str) -> &'static [TokenRow] {
    match id {
        "ethereum" => ETHEREUM_TOKENS,
        "arbitrum" => ARBITRUM_TOKENS,
        "base" => BASE_TOKENS,
        "optimism" => OPTIMISM_TOKENS,
        "polygon" => POLYGON_TOKENS,
        _ => &[],
    }
}

/// Adapter over all configured EVM chains. Stateless between calls: a
/// provider is built per request from the chain's effective RPC URL.
pub struct EvmAdapter {
    chains: Vec<ChainInfo>,
    tokens: HashMap<String, Vec<TokenInfo>>,
}

impl EvmAdapter {
    pub fn new(config: &AppConfig) -> Self {
        let mut chains = Vec::with_capacity(CHAINS.len());
        let mut tokens = HashMap::new();
        for (id, name, native_chain_id, symbol, native_name, coingecko, rpc, explorer) in CHAINS {
            chains.push(ChainInfo {
                id: (*id).to_string(),
                name: (*name).to_string(),
                ecosystem: Ecosystem::Evm,
                native_chain_id: (*native_chain_id).to_string(),
                native_token: TokenInfo {
                    symbol: (*symbol).to_string(),
                    name: (*native_name).to_string(),
                    decimals: 18,
                    address: NATIVE_ADDRESS.to_string(),
                    chain_id: (*id).to_string(),
                    coingecko_id: Some((*coingecko).to_string()),
                },
                rpc_url: config.rpc_url_for(id, rpc).to_string(),
                explorer_url: (*explorer).to_string(),
            });
            tokens.insert((*id).to_string(), token_infos(id, tokens_for(id)));
        }
        EvmAdapter { chains, tokens }
    }

    fn provider(&self, chain: &ChainInfo) -> Result<HttpProvider> {
        let url = Url::parse(&chain.rpc_url)
            .map_err(|e| GatewayError::Config(format!("invalid RPC URL for {}: {e}", chain.id)))?;
        Ok(ProviderBuilder::new().on_http(url))
    }

    async fn eth_call(&self, chain: &ChainInfo, to: Address, data: Vec<u8>) -> Result<Bytes> {
        let provider = self.provider(chain)?;
        let tx_req = TransactionRequest::default().to(to).input(data.into());
        provider
            .call(&tx_req)
            .await
            .map_err(|e| GatewayError::Rpc(format!("eth_call on {} failed: {e}", chain.id)))
    }

    async fn erc20_balance(&self, chain: &ChainInfo, token: Address, owner: Address) -> Result<String> {
        let data = balanceOfCall { account: owner }.abi_encode();
        let res = self.eth_call(chain, token, data).await?;
        let balance = balanceOfCall::abi_decode_returns(&res, true)
            .map_err(|e| GatewayError::Rpc(format!("decode balanceOf: {e}")))?
            ._0;
        Ok(balance.to_string())
    }

    async fn erc20_metadata(&self, chain: &ChainInfo, token: Address) -> Result<Option<(String, u8)>> {
        let res = self
            .eth_call(chain, token, symbolCall {}.abi_encode())
            .await?;
        let Ok(symbol) = symbolCall::abi_decode_returns(&res, true) else {
            // Address answered but does not speak ERC20: known-absent.
            return Ok(None);
        };
        let res = self
            .eth_call(chain, token, decimalsCall {}.abi_encode())
            .await?;
        let Ok(decimals) = decimalsCall::abi_decode_returns(&res, true) else {
            return Ok(None);
        };
        Ok(Some((symbol._0, decimals._0)))
    }

    async fn balance_of(&self, chain: &ChainInfo, token: &TokenInfo, owner: Address) -> Result<Balance> {
        let raw = if token.address == NATIVE_ADDRESS {
            let provider = self.provider(chain)?;
            provider
                .get_balance(owner)
                .await
                .map_err(|e| GatewayError::Rpc(format!("get_balance on {} failed: {e}", chain.id)))?
                .to_string()
        } else {
            let token_address = Address::from_str(&token.address)
                .map_err(|_| GatewayError::invalid_input(format!("invalid token address: {}", token.address)))?;
            self.erc20_balance(chain, token_address, owner).await?
        };
        Ok(Balance {
            symbol: token.symbol.clone(),
            address: token.address.clone(),
            balance_formatted: amount::format_raw(&raw, token.decimals)?,
            balance: raw,
        })
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Evm
    }

    fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    fn is_valid_address(&self, chain_id: &str, address: &str) -> Result<bool> {
        require_chain(self, chain_id)?;
        Ok(Address::from_str(address).is_ok())
    }

    async fn native_balance(&self, chain_id: &str, address: &str) -> Result<Balance> {
        let chain = require_chain(self, chain_id)?;
        let owner = Address::from_str(address)
            .map_err(|_| GatewayError::invalid_input(format!("invalid address: {address}")))?;
        debug!(chain = %chain.id, %address, "fetching native balance");
        self.balance_of(chain, &chain.native_token, owner).await
    }

    async fn token_balances(
        &self,
        chain_id: &str,
        address: &str,
        tokens: &[String],
    ) -> Result<Vec<Balance>> {
        let chain = require_chain(self, chain_id)?;
        let owner = Address::from_str(address)
            .map_err(|_| GatewayError::invalid_input(format!("invalid address: {address}")))?;

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
                .map(|token| self.balance_of(chain, token, owner)),
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
        if native.symbol.eq_ignore_ascii_case(token) || native.address.eq_ignore_ascii_case(token) {
            return Ok(Some(native.clone()));
        }
        let table = self.tokens.get(chain_id).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(known) = lookup_token(table, token) {
            return Ok(Some(known.clone()));
        }
        // Unknown symbol with no address form: known-absent, no I/O.
        let Ok(token_address) = Address::from_str(token) else {
            return Ok(None);
        };
        match self.erc20_metadata(chain, token_address).await? {
            Some((symbol, decimals)) => Ok(Some(TokenInfo {
                symbol,
                name: format!("ERC20 at {token}"),
                decimals,
                address: token.to_string(),
                chain_id: chain_id.to_string(),
                coingecko_id: None,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> EvmAdapter {
        EvmAdapter::new(&AppConfig::default())
    }

    #[test]
    fn owns_five_chains() {
        let adapter = adapter();
        assert_eq!(adapter.chains().len(), 5);
        assert!(adapter.get_chain("ethereum").is_some());
        assert!(adapter.get_chain("solana-mainnet").is_none());
    }

    #[test]
    fn address_validation_is_syntactic() {
        let adapter = adapter();
        assert!(adapter
            .is_valid_address("ethereum", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")
            .unwrap());
        assert!(!adapter.is_valid_address("ethereum", "not-an-address").unwrap());
        assert!(!adapter
            .is_valid_address("base", "So11111111111111111111111111111111111111112")
            .unwrap());
        assert!(matches!(
            adapter.is_valid_address("ethereum-classic", "0x00"),
            Err(GatewayError::UnsupportedChain(_))
        ));
    }

    #[tokio::test]
    async fn resolves_known_tokens_from_table() {
        let adapter = adapter();
        let usdc = adapter.resolve_token("ethereum", "USDC").await.unwrap().unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.chain_id, "ethereum");
        assert_eq!(usdc.coingecko_id.as_deref(), Some("usd-coin"));

        // Address form resolves to the same token, case-insensitively.
        let by_addr = adapter
            .resolve_token("ethereum", "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_addr.symbol, "USDC");
    }

    #[tokio::test]
    async fn native_symbol_resolves_to_native_token() {
        let adapter = adapter();
        let eth = adapter.resolve_token("ethereum", "ETH").await.unwrap().unwrap();
        assert_eq!(eth.address, NATIVE_ADDRESS);
        assert_eq!(eth.decimals, 18);
    }

    #[tokio::test]
    async fn unknown_symbol_is_known_absent() {
        let adapter = adapter();
        assert!(adapter
            .resolve_token("ethereum", "NOSUCHTOKEN")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn rpc_override_applies() {
        let mut config = AppConfig::default();
        config
            .rpc_overrides
            .insert("ethereum".into(), "https://example-rpc.invalid".into());
        let adapter = EvmAdapter::new(&config);
        assert_eq!(
            adapter.get_chain("ethereum").unwrap().rpc_url,
            "https://example-rpc.invalid"
        );
        assert_eq!(
            adapter.get_chain("base").unwrap().rpc_url,
            "https://mainnet.base.org"
        );
    }
}
