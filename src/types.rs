use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Family of chains sharing address and transaction semantics. Adapter
/// dispatch keys off this field, never off runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Evm,
    Solana,
    Cosmos,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Evm => "evm",
            Ecosystem::Solana => "solana",
            Ecosystem::Cosmos => "cosmos",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record for one network. Immutable after registration; the set
/// of chains is process-wide static configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub id: String,
    pub name: String,
    pub ecosystem: Ecosystem,
    /// Ecosystem-native identifier: numeric chain id for EVM, cluster name
    /// for Solana, chain-id string for Cosmos.
    pub native_chain_id: String,
    pub native_token: TokenInfo,
    pub rpc_url: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Chain-native identifier: contract address, SPL mint, or denom.
    pub address: String,
    pub chain_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub symbol: String,
    pub address: String,
    /// Raw integer amount in the token's smallest unit.
    pub balance: String,
    /// `balance` scaled by the token's decimals, no float rounding.
    pub balance_formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub src_token: TokenInfo,
    pub dst_token: TokenInfo,
    pub amount_in: String,
    pub amount_out: String,
    pub minimum_amount_out: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<String>,
    /// Venue labels in multi-hop execution order.
    pub route: Vec<String>,
    pub aggregator: String,
}

/// Ecosystem-specific unsigned payload. The gateway never signs or
/// broadcasts; this is handed back to the caller as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TxPayload {
    #[serde(rename_all = "camelCase")]
    Evm {
        to: String,
        data: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Solana { transaction_base64: String },
    #[serde(rename_all = "camelCase")]
    Cosmos { msgs: Vec<Value> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub chain_id: String,
    pub ecosystem: Ecosystem,
    pub raw: TxPayload,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApyType {
    Variable,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldOpportunity {
    pub protocol: String,
    pub chain_id: String,
    pub chain_name: String,
    pub asset: String,
    pub asset_address: String,
    /// Annualized percentage, derived from the protocol's native rate.
    pub apy: f64,
    pub apy_type: ApyType,
    pub tvl: f64,
    pub risk_level: String,
    pub category: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAsset {
    pub symbol: String,
    pub address: String,
    pub balance: String,
    pub balance_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolPosition {
    pub protocol: String,
    #[serde(rename = "type")]
    pub position_type: String,
    pub chain_id: String,
    pub chain_name: String,
    pub assets: Vec<PositionAsset>,
    pub total_value_usd: f64,
}

impl ProtocolPosition {
    /// `total_value_usd` is always the sum of the constituent assets.
    pub fn from_assets(
        protocol: impl Into<String>,
        position_type: impl Into<String>,
        chain: &ChainInfo,
        assets: Vec<PositionAsset>,
    ) -> Self {
        let total_value_usd = assets.iter().map(|a| a.balance_usd).sum();
        ProtocolPosition {
            protocol: protocol.into(),
            position_type: position_type.into(),
            chain_id: chain.id.clone(),
            chain_name: chain.name.clone(),
            assets,
            total_value_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecosystem_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Ecosystem::Evm).unwrap(),
            "\"evm\""
        );
        assert_eq!(
            serde_json::from_str::<Ecosystem>("\"cosmos\"").unwrap(),
            Ecosystem::Cosmos
        );
    }

    #[test]
    fn balance_uses_camel_case_keys() {
        let b = Balance {
            symbol: "SOL".into(),
            address: "So11111111111111111111111111111111111111112".into(),
            balance: "1500000000".into(),
            balance_formatted: "1.5".into(),
        };
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("balanceFormatted"));
        assert!(!json.contains("balance_formatted"));
    }

    #[test]
    fn position_total_is_sum_of_assets() {
        let chain = ChainInfo {
            id: "ethereum".into(),
            name: "Ethereum".into(),
            ecosystem: Ecosystem::Evm,
            native_chain_id: "1".into(),
            native_token: TokenInfo {
                symbol: "ETH".into(),
                name: "Ether".into(),
                decimals: 18,
                address: "0x0000000000000000000000000000000000000000".into(),
                chain_id: "ethereum".into(),
                coingecko_id: Some("ethereum".into()),
            },
            rpc_url: "https://eth.llamarpc.com".into(),
            explorer_url: "https://etherscan.io".into(),
        };
        let position = ProtocolPosition::from_assets(
            "aave-v3",
            "lending",
            &chain,
            vec![
                PositionAsset {
                    symbol: "USDC".into(),
                    address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into(),
                    balance: "100".into(),
                    balance_usd: 100.0,
                },
                PositionAsset {
                    symbol: "DAI".into(),
                    address: "0x6B175474E89094C44Da98b954EedeAC495271d0F".into(),
                    balance: "50".into(),
                    balance_usd: 50.5,
                },
            ],
        );
        assert!((position.total_value_usd - 150.5).abs() < f64::EPSILON);
    }
}
