//! Compound v3 (Comet) reader for the USDC base markets.

use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::amount;
use crate::error::Result;
use crate::price::PriceClient;
use crate::protocols::{
    apy_from_rate_per_second, evm_call, keep_successes, parse_evm_address, ProtocolScanner,
    YieldSource,
};
use crate::registry::PluginContext;
use crate::types::{
    ApyType, ChainInfo, PositionAsset, ProtocolPosition, TokenInfo, YieldOpportunity,
};

sol! {
    #[allow(missing_docs)]
    function baseToken() external view returns (address);
    #[allow(missing_docs)]
    function getUtilization() external view returns (uint256);
    #[allow(missing_docs)]
    function getSupplyRate(uint256 utilization) external view returns (uint64);
    #[allow(missing_docs)]
    function balanceOf(address account) external view returns (uint256);
    #[allow(missing_docs)]
    function borrowBalanceOf(address account) external view returns (uint256);
    #[allow(missing_docs)]
    function totalSupply() external view returns (uint256);
}

const PROTOCOL: &str = "compound-v3";
const SUPPORTED: &[&str] = &["ethereum", "arbitrum", "base", "optimism", "polygon"];

/// Per-second rates are scaled by 1e18.
const RATE_SCALE: f64 = 1e18;

fn comet_for_chain(chain_id: &str) -> Option<&'static str> {
    // USDC markets, per compound-finance/comet deployments.
    match chain_id {
        "ethereum" => Some("0xc3d688B66703497DAA19211EEdff47f25384cdc3"),
        "base" => Some("0xb125E6687d4313864e53df431d5425969c15Eb2F"),
        "arbitrum" => Some("0x9c4ec768c28520B50860ea7a15bd7213a9fF58bf"),
        "optimism" => Some("0x2e44e174f7D53F0212823acC11C01A11d58c5bCB"),
        "polygon" => Some("0xF25212E676D1F7F89Cd72fFEe66158f541246445"),
        _ => None,
    }
}

pub struct CompoundV3Source {
    price: Arc<PriceClient>,
}

impl CompoundV3Source {
    pub fn new(price: Arc<PriceClient>) -> Self {
        CompoundV3Source { price }
    }

    async fn usd_price(&self, token: &TokenInfo) -> f64 {
        let Some(id) = token.coingecko_id.clone() else {
            return 0.0;
        };
        match self.price.usd_by_ids(&[id.clone()]).await {
            Ok(prices) => prices.get(&id.to_lowercase()).copied().unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    /// The market's base token, checked against what the caller asked
    /// for; Comet only pays supply yield on its base asset.
    async fn base_token(
        &self,
        chain: &ChainInfo,
        comet: alloy::primitives::Address,
        ctx: &PluginContext,
    ) -> Result<Option<TokenInfo>> {
        let res = evm_call(chain, comet, baseTokenCall {}.abi_encode()).await?;
        let base = baseTokenCall::abi_decode_returns(&res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode baseToken: {e}")))?
            ._0;
        let adapter = ctx.adapter_for_chain(&chain.id)?;
        adapter.resolve_token(&chain.id, &base.to_string()).await
    }

    async fn chain_opportunities(
        &self,
        chain: &ChainInfo,
        asset: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<YieldOpportunity>> {
        let Some(comet) = comet_for_chain(&chain.id) else {
            return Ok(vec![]);
        };
        let comet_address = parse_evm_address(comet)?;

        let adapter = ctx.adapter_for_chain(&chain.id)?;
        let Some(requested) = adapter.resolve_token(&chain.id, asset).await? else {
            return Ok(vec![]);
        };
        let Some(base) = self.base_token(chain, comet_address, ctx).await? else {
            return Ok(vec![]);
        };
        if !base.address.eq_ignore_ascii_case(&requested.address) {
            debug!(chain = %chain.id, asset = %requested.symbol, "not the comet base asset");
            return Ok(vec![]);
        }

        let utilization_res =
            evm_call(chain, comet_address, getUtilizationCall {}.abi_encode()).await?;
        let utilization = getUtilizationCall::abi_decode_returns(&utilization_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode getUtilization: {e}")))?
            ._0;
        let rate_res = evm_call(
            chain,
            comet_address,
            getSupplyRateCall { utilization }.abi_encode(),
        )
        .await?;
        let rate_per_second = getSupplyRateCall::abi_decode_returns(&rate_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode getSupplyRate: {e}")))?
            ._0 as f64
            / RATE_SCALE;
        let apy = apy_from_rate_per_second(rate_per_second);

        let supply_res = evm_call(chain, comet_address, totalSupplyCall {}.abi_encode()).await?;
        let supply_raw = totalSupplyCall::abi_decode_returns(&supply_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode totalSupply: {e}")))?
            ._0
            .to_string();
        let supply = amount::format_raw(&supply_raw, base.decimals)?
            .parse::<f64>()
            .unwrap_or(0.0);
        let tvl = supply * self.usd_price(&base).await;

        Ok(vec![YieldOpportunity {
            protocol: PROTOCOL.to_string(),
            chain_id: chain.id.clone(),
            chain_name: chain.name.clone(),
            asset: base.symbol.clone(),
            asset_address: base.address.clone(),
            apy,
            apy_type: ApyType::Variable,
            tvl,
            risk_level: "low".to_string(),
            category: "lending".to_string(),
            metadata: json!({
                "utilization": utilization.to_string(),
                "comet": comet,
            }),
        }])
    }
}

#[async_trait]
impl YieldSource for CompoundV3Source {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    async fn yield_opportunities(
        &self,
        asset: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<YieldOpportunity>> {
        let targets: Vec<&str> = SUPPORTED
            .iter()
            .copied()
            .filter(|id| ctx.has_chain(id))
            .collect();
        let results = join_all(targets.iter().map(|id| async {
            let chain = ctx.chain(id)?.clone();
            self.chain_opportunities(&chain, asset, ctx).await
        }))
        .await;
        Ok(keep_successes(PROTOCOL, &targets, results))
    }
}

#[async_trait]
impl ProtocolScanner for CompoundV3Source {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn supported_chain_ids(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    async fn scan_positions(
        &self,
        chain_id: &str,
        address: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<ProtocolPosition>> {
        let chain = ctx.chain(chain_id)?.clone();
        let Some(comet) = comet_for_chain(chain_id) else {
            return Ok(vec![]);
        };
        let comet_address = parse_evm_address(comet)?;
        let user = parse_evm_address(address)?;
        let Some(base) = self.base_token(&chain, comet_address, ctx).await? else {
            return Ok(vec![]);
        };

        let supply_res = evm_call(
            &chain,
            comet_address,
            balanceOfCall { account: user }.abi_encode(),
        )
        .await?;
        let supplied = balanceOfCall::abi_decode_returns(&supply_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode balanceOf: {e}")))?
            ._0;
        let borrow_res = evm_call(
            &chain,
            comet_address,
            borrowBalanceOfCall { account: user }.abi_encode(),
        )
        .await?;
        let borrowed = borrowBalanceOfCall::abi_decode_returns(&borrow_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode borrowBalanceOf: {e}")))?
            ._0;

        let price = self.usd_price(&base).await;
        let mut positions = Vec::new();
        for (raw, position_type) in [(supplied, "lending"), (borrowed, "borrow")] {
            if raw.is_zero() {
                continue;
            }
            let formatted = amount::format_raw(&raw.to_string(), base.decimals)?;
            let balance_usd = formatted.parse::<f64>().unwrap_or(0.0) * price;
            positions.push(ProtocolPosition::from_assets(
                PROTOCOL,
                position_type,
                &chain,
                vec![PositionAsset {
                    symbol: base.symbol.clone(),
                    address: base.address.clone(),
                    balance: formatted,
                    balance_usd,
                }],
            ));
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comet_addresses_cover_supported_chains() {
        for chain_id in SUPPORTED {
            assert!(comet_for_chain(chain_id).is_some(), "missing comet for {chain_id}");
        }
        assert!(comet_for_chain("osmosis").is_none());
    }
}
