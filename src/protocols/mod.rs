//! Per-protocol yield sources and position scanners. Every multi-chain
//! scan is best-effort: one broken chain contributes nothing instead of
//! failing the whole aggregation.

pub mod aave;
pub mod compound;

pub use aave::AaveV3Source;
pub use compound::CompoundV3Source;

use alloy::{
    primitives::{Address, Bytes},
    providers::{Provider, ProviderBuilder},
    rpc::types::eth::TransactionRequest,
};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::error::{GatewayError, Result};
use crate::registry::PluginContext;
use crate::types::{ChainInfo, ProtocolPosition, YieldOpportunity};

pub(crate) const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Discovers yield opportunities for one protocol across its chains.
#[async_trait]
pub trait YieldSource: Send + Sync {
    fn protocol(&self) -> &'static str;
    fn supported_chain_ids(&self) -> &'static [&'static str];

    /// Opportunities for `asset` across every supported chain,
    /// per-chain failure isolated.
    async fn yield_opportunities(
        &self,
        asset: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<YieldOpportunity>>;
}

/// Discovers a wallet's positions in one protocol.
#[async_trait]
pub trait ProtocolScanner: Send + Sync {
    fn protocol(&self) -> &'static str;
    fn supported_chain_ids(&self) -> &'static [&'static str];

    async fn scan_positions(
        &self,
        chain_id: &str,
        address: &str,
        ctx: &PluginContext,
    ) -> Result<Vec<ProtocolPosition>>;
}

/// Per-branch failure isolation: pair each branch's label with its
/// outcome, log the failures, keep the successes.
pub(crate) fn keep_successes<T>(
    protocol: &str,
    labels: &[&str],
    results: Vec<Result<Vec<T>>>,
) -> Vec<T> {
    let mut kept = Vec::new();
    for (label, result) in labels.iter().zip(results) {
        match result {
            Ok(items) => kept.extend(items),
            Err(e) => warn!(%protocol, branch = %label, error = %e, "branch failed; continuing without it"),
        }
    }
    kept
}

/// All opportunities for `asset` across a set of sources. Source-level
/// failures are isolated the same way chain-level failures are inside
/// each source.
pub async fn collect_yield_opportunities(
    sources: &[Arc<dyn YieldSource>],
    asset: &str,
    ctx: &PluginContext,
) -> Vec<YieldOpportunity> {
    let results = join_all(
        sources
            .iter()
            .map(|source| source.yield_opportunities(asset, ctx)),
    )
    .await;
    let labels: Vec<&str> = sources.iter().map(|s| s.protocol()).collect();
    keep_successes("yield", &labels, results)
}

/// A wallet's positions across every scanner and every chain the scanner
/// supports (optionally restricted to one chain). Chains where the
/// address is not syntactically valid are skipped, as are failing
/// branches.
pub async fn collect_positions(
    scanners: &[Arc<dyn ProtocolScanner>],
    chain_filter: Option<&str>,
    address: &str,
    ctx: &PluginContext,
) -> Vec<ProtocolPosition> {
    let mut branches = Vec::new();
    for scanner in scanners {
        for chain_id in scanner.supported_chain_ids() {
            if let Some(filter) = chain_filter {
                if filter != *chain_id {
                    continue;
                }
            }
            if !ctx.has_chain(chain_id) {
                continue;
            }
            let valid = ctx
                .adapter_for_chain(chain_id)
                .and_then(|adapter| adapter.is_valid_address(chain_id, address))
                .unwrap_or(false);
            if !valid {
                continue;
            }
            branches.push((scanner.clone(), *chain_id));
        }
    }

    let results = join_all(
        branches
            .iter()
            .map(|(scanner, chain_id)| scanner.scan_positions(chain_id, address, ctx)),
    )
    .await;
    let labels: Vec<&str> = branches.iter().map(|(_, chain_id)| *chain_id).collect();
    keep_successes("positions", &labels, results)
}

/// One read-only EVM call against the chain's effective RPC endpoint.
pub(crate) async fn evm_call(chain: &ChainInfo, to: Address, data: Vec<u8>) -> Result<Bytes> {
    let url = Url::parse(&chain.rpc_url)
        .map_err(|e| GatewayError::Config(format!("invalid RPC URL for {}: {e}", chain.id)))?;
    let provider = ProviderBuilder::new().on_http(url);
    let tx_req = TransactionRequest::default().to(to).input(data.into());
    provider
        .call(&tx_req)
        .await
        .map_err(|e| GatewayError::Rpc(format!("eth_call on {} failed: {e}", chain.id)))
}

pub(crate) fn parse_evm_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|_| GatewayError::invalid_input(format!("invalid address: {raw}")))
}

/// Rate-per-second (1e18 scale) to compounded annual percentage.
pub(crate) fn apy_from_rate_per_second(rate_per_second: f64) -> f64 {
    ((1.0 + rate_per_second).powf(SECONDS_PER_YEAR) - 1.0) * 100.0
}
