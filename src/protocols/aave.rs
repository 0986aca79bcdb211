//! Aave v3 pool reader: supply yields and wallet positions on the EVM
//! chains where the protocol is deployed.

use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::amount;
use crate::chains::evm::NATIVE_ADDRESS;
use crate::error::Result;
use crate::price::PriceClient;
use crate::protocols::{
    apy_from_rate_per_second, evm_call, keep_successes, parse_evm_address, ProtocolScanner,
    YieldSource, SECONDS_PER_YEAR,
};
use crate::registry::PluginContext;
use crate::types::{
    ApyType, ChainInfo, PositionAsset, ProtocolPosition, TokenInfo, YieldOpportunity,
};

sol! {
    #[allow(missing_docs)]
    struct ReserveData {
        uint256 configuration;
        uint128 liquidityIndex;
        uint128 currentLiquidityRate;
        uint128 variableBorrowIndex;
        uint128 currentVariableBorrowRate;
        uint128 currentStableBorrowRate;
        uint40 lastUpdateTimestamp;
        uint16 id;
        address aTokenAddress;
        address stableDebtTokenAddress;
        address variableDebtTokenAddress;
        address interestRateStrategyAddress;
        uint128 accruedToTreasury;
        uint128 unbacked;
        uint128 isolationModeTotalDebt;
    }

    #[allow(missing_docs)]
    function getReserveData(address asset) external view returns (ReserveData data);

    #[allow(missing_docs)]
    function getUserAccountData(address user) external view returns (
        uint256 totalCollateralBase,
        uint256 totalDebtBase,
        uint256 availableBorrowsBase,
        uint256 currentLiquidationThreshold,
        uint256 ltv,
        uint256 healthFactor
    );

    #[allow(missing_docs)]
    function balanceOf(address account) external view returns (uint256);

    #[allow(missing_docs)]
    function totalSupply() external view returns (uint256);
}

const PROTOCOL: &str = "aave-v3";
const SUPPORTED: &[&str] = &["ethereum", "arbitrum", "base", "optimism", "polygon"];

/// Reserves worth scanning for positions; anything outside the static
/// token tables cannot be priced anyway.
const RESERVE_SYMBOLS: &[&str] = &["USDC", "USDT", "WETH", "DAI", "WBTC"];

const RAY: f64 = 1e27;

fn pool_for_chain(chain_id: &str) -> Option<&'static str> {
    match chain_id {
        "ethereum" => Some("0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
        "base" => Some("0xA238Dd80C259a72e81d7e4664a9801593F98d1c5"),
        "arbitrum" | "optimism" | "polygon" => Some("0x794a61358D6845594F94dc1DB02A252b5b4814aD"),
        _ => None,
    }
}

pub struct AaveV3Source {
    price: Arc<PriceClient>,
}

impl AaveV3Source {
    pub fn new(price: Arc<PriceClient>) -> Self {
        AaveV3Source { price }
    }

    async fn reserve_data(&self, chain: &ChainInfo, pool: &str, asset: &TokenInfo) -> Result<ReserveData> {
        let pool_address = parse_evm_address(pool)?;
        let asset_address = parse_evm_address(&asset.address)?;
        let data = getReserveDataCall {
            asset: asset_address,
        }
        .abi_encode();
        let res = evm_call(chain, pool_address, data).await?;
        let decoded = getReserveDataCall::abi_decode_returns(&res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode getReserveData: {e}")))?;
        Ok(decoded.data)
    }

    /// Best-effort USD price for a token; unpriceable tokens value at 0.
    async fn usd_price(&self, token: &TokenInfo) -> f64 {
        let Some(id) = token.coingecko_id.clone() else {
            return 0.0;
        };
        match self.price.usd_by_ids(&[id.clone()]).await {
            Ok(prices) => prices.get(&id.to_lowercase()).copied().unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    async fn chain_opportunities(
        &self,
        chain: &ChainInfo,
        asset: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<YieldOpportunity>> {
        let Some(pool) = pool_for_chain(&chain.id) else {
            return Ok(vec![]);
        };
        let adapter = ctx.adapter_for_chain(&chain.id)?;
        let Some(token) = adapter.resolve_token(&chain.id, asset).await? else {
            // Asset does not exist on this chain; nothing to report.
            return Ok(vec![]);
        };
        if token.address == NATIVE_ADDRESS {
            // The pool only holds ERC20 reserves; ETH enters as WETH.
            return Ok(vec![]);
        }

        let reserve = self.reserve_data(chain, pool, &token).await?;
        let a_token = reserve.aTokenAddress;
        if a_token == alloy::primitives::Address::ZERO {
            debug!(chain = %chain.id, asset = %token.symbol, "asset not listed on the pool");
            return Ok(vec![]);
        }

        let rate_ray = reserve.currentLiquidityRate as f64;
        let apr = rate_ray / RAY;
        let apy = apy_from_rate_per_second(apr / SECONDS_PER_YEAR);

        // aToken supply mirrors the deposited reserve 1:1.
        let supply_res = evm_call(chain, a_token, totalSupplyCall {}.abi_encode()).await?;
        let supply_raw = totalSupplyCall::abi_decode_returns(&supply_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode totalSupply: {e}")))?
            ._0
            .to_string();
        let supply = amount::format_raw(&supply_raw, token.decimals)?
            .parse::<f64>()
            .unwrap_or(0.0);
        let tvl = supply * self.usd_price(&token).await;

        Ok(vec![YieldOpportunity {
            protocol: PROTOCOL.to_string(),
            chain_id: chain.id.clone(),
            chain_name: chain.name.clone(),
            asset: token.symbol.clone(),
            asset_address: token.address.clone(),
            apy,
            apy_type: ApyType::Variable,
            tvl,
            risk_level: "low".to_string(),
            category: "lending".to_string(),
            metadata: json!({
                "liquidityRateRay": reserve.currentLiquidityRate.to_string(),
                "variableBorrowRateRay": reserve.currentVariableBorrowRate.to_string(),
                "aToken": a_token.to_string(),
            }),
        }])
    }

    async fn chain_positions(
        &self,
        chain: &ChainInfo,
        address: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<ProtocolPosition>> {
        let Some(pool) = pool_for_chain(&chain.id) else {
            return Ok(vec![]);
        };
        let pool_address = parse_evm_address(pool)?;
        let user = parse_evm_address(address)?;

        // One account-level read decides whether per-reserve scans are
        // worth doing at all.
        let account_res = evm_call(
            chain,
            pool_address,
            getUserAccountDataCall { user }.abi_encode(),
        )
        .await?;
        let account = getUserAccountDataCall::abi_decode_returns(&account_res, true)
            .map_err(|e| crate::error::GatewayError::Rpc(format!("decode getUserAccountData: {e}")))?;
        if account.totalCollateralBase.is_zero() {
            return Ok(vec![]);
        }

        let adapter = ctx.adapter_for_chain(&chain.id)?;
        let mut assets = Vec::new();
        for symbol in RESERVE_SYMBOLS {
            let Some(token) = adapter.resolve_token(&chain.id, symbol).await? else {
                continue;
            };
            let Ok(reserve) = self.reserve_data(chain, pool, &token).await else {
                continue;
            };
            if reserve.aTokenAddress == alloy::primitives::Address::ZERO {
                continue;
            }
            let balance_res = evm_call(
                chain,
                reserve.aTokenAddress,
                balanceOfCall { account: user }.abi_encode(),
            )
            .await?;
            let raw = balanceOfCall::abi_decode_returns(&balance_res, true)
                .map_err(|e| crate::error::GatewayError::Rpc(format!("decode balanceOf: {e}")))?
                ._0;
            if raw.is_zero() {
                continue;
            }
            let formatted = amount::format_raw(&raw.to_string(), token.decimals)?;
            let balance_usd =
                formatted.parse::<f64>().unwrap_or(0.0) * self.usd_price(&token).await;
            assets.push(PositionAsset {
                symbol: token.symbol.clone(),
                address: token.address.clone(),
                balance: formatted,
                balance_usd,
            });
        }

        if assets.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![ProtocolPosition::from_assets(
            PROTOCOL, "lending", chain, assets,
        )])
    }
}

#[async_trait]
impl YieldSource for AaveV3Source {
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
impl ProtocolScanner for AaveV3Source {
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
        self.chain_positions(&chain, address, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_addresses_cover_supported_chains() {
        for chain_id in SUPPORTED {
            assert!(pool_for_chain(chain_id).is_some(), "missing pool for {chain_id}");
        }
        assert!(pool_for_chain("solana-mainnet").is_none());
    }

    #[test]
    fn ray_rate_converts_to_reasonable_apy() {
        // 5% APR in ray units.
        let apr = 0.05_f64;
        let apy = apy_from_rate_per_second(apr / SECONDS_PER_YEAR);
        assert!(apy > 5.0 && apy < 5.2, "apy was {apy}");
    }
}
