//! Ecosystem adapters. One capability set over each family's RPC and
//! address semantics; the registry routes to an adapter by the
//! `ecosystem` field of the chain record.

pub mod cosmos;
pub mod evm;
pub mod solana;

pub use cosmos::CosmosAdapter;
pub use evm::EvmAdapter;
pub use solana::SolanaAdapter;

use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::types::{Balance, ChainInfo, Ecosystem, TokenInfo};

/// Uniform capability set over one ecosystem's chains.
///
/// Every operation takes a chain id and fails with
/// [`GatewayError::UnsupportedChain`] when the adapter does not own that
/// id. Adapters never sign, never broadcast, and keep no mutable state.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    /// Static chain table this adapter owns.
    fn chains(&self) -> &[ChainInfo];

    /// Synchronous lookup in the adapter's chain table.
    fn get_chain(&self, chain_id: &str) -> Option<&ChainInfo> {
        self.chains().iter().find(|c| c.id == chain_id)
    }

    /// Syntactic address validation. Pure: never performs network I/O.
    fn is_valid_address(&self, chain_id: &str, address: &str) -> Result<bool>;

    /// Native asset balance, normalized to the native token's decimals.
    async fn native_balance(&self, chain_id: &str, address: &str) -> Result<Balance>;

    /// Balances for an explicit token list. Tokens that do not resolve,
    /// and tokens whose balance query fails, are omitted; partial success
    /// never aborts the call.
    async fn token_balances(
        &self,
        chain_id: &str,
        address: &str,
        tokens: &[String],
    ) -> Result<Vec<Balance>>;

    /// Resolve a symbol or chain-native address to token metadata.
    /// `Ok(None)` means "known-absent", distinct from transport failure.
    async fn resolve_token(&self, chain_id: &str, token: &str) -> Result<Option<TokenInfo>>;
}

pub(crate) fn require_chain<'a>(adapter: &'a dyn ChainAdapter, chain_id: &str) -> Result<&'a ChainInfo> {
    adapter
        .get_chain(chain_id)
        .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.to_string()))
}

/// Row shape for the static known-token tables:
/// `(symbol, name, address, decimals, coingecko id)`.
pub(crate) type TokenRow = (
    &'static str,
    &'static str,
    &'static str,
    u8,
    Option<&'static str>,
);

pub(crate) fn token_infos(chain_id: &str, rows: &[TokenRow]) -> Vec<TokenInfo> {
    rows.iter()
        .map(|(symbol, name, address, decimals, coingecko_id)| TokenInfo {
            symbol: (*symbol).to_string(),
            name: (*name).to_string(),
            decimals: *decimals,
            address: (*address).to_string(),
            chain_id: chain_id.to_string(),
            coingecko_id: coingecko_id.map(str::to_string),
        })
        .collect()
}

/// Table lookup shared by the adapters: exact address/denom match first
/// (case-insensitive for hex addresses), then case-insensitive symbol.
pub(crate) fn lookup_token<'a>(tokens: &'a [TokenInfo], query: &str) -> Option<&'a TokenInfo> {
    tokens
        .iter()
        .find(|t| t.address.eq_ignore_ascii_case(query))
        .or_else(|| tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(query)))
}
