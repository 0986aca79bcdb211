//! Wallet intelligence: protocol positions for one address, scanned
//! across every chain the scanners cover.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::plugins::{arg_str, opt_str, Plugin, Tool};
use crate::price::PriceClient;
use crate::protocols::{collect_positions, AaveV3Source, CompoundV3Source, ProtocolScanner};
use crate::registry::PluginContext;

type Scanners = Arc<OnceCell<Vec<Arc<dyn ProtocolScanner>>>>;

pub struct WalletIntelPlugin {
    scanners: Scanners,
}

impl WalletIntelPlugin {
    pub fn new() -> Self {
        WalletIntelPlugin {
            scanners: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for WalletIntelPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for WalletIntelPlugin {
    fn name(&self) -> &'static str {
        "wallet-intelligence"
    }

    fn description(&self) -> &'static str {
        "Protocol position discovery for a wallet across chains"
    }

    async fn initialize(&mut self, ctx: &Arc<PluginContext>) -> Result<()> {
        let price = Arc::new(PriceClient::new(ctx.config())?);
        let scanners: Vec<Arc<dyn ProtocolScanner>> = vec![
            Arc::new(AaveV3Source::new(price.clone())),
            Arc::new(CompoundV3Source::new(price)),
        ];
        self.scanners
            .set(scanners)
            .map_err(|_| GatewayError::Config("wallet-intelligence plugin initialized twice".into()))
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ScanWalletTool {
            scanners: self.scanners.clone(),
        })]
    }
}

struct ScanWalletTool {
    scanners: Scanners,
}

#[async_trait]
impl Tool for ScanWalletTool {
    fn name(&self) -> &'static str {
        "defi_scan_wallet"
    }

    fn description(&self) -> &'static str {
        "Scan a wallet for protocol positions. Chains that fail to answer contribute nothing instead of failing the scan."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "string",
                    "description": "Wallet address to scan"
                },
                "chainId": {
                    "type": "string",
                    "description": "Restrict the scan to one chain"
                }
            },
            "required": ["address"]
        })
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let address = arg_str(&args, "address")?;
        let chain_filter = opt_str(&args, "chainId");
        if let Some(chain_id) = chain_filter {
            // An explicit chain must exist and must match the address
            // format; the discovered multi-chain path just skips instead.
            let adapter = ctx.adapter_for_chain(chain_id)?;
            if !adapter.is_valid_address(chain_id, address)? {
                return Err(GatewayError::invalid_input(format!(
                    "address {address} is not valid for chain {chain_id}"
                )));
            }
        }
        let scanners = self
            .scanners
            .get()
            .ok_or_else(|| GatewayError::Config("wallet-intelligence plugin not initialized".into()))?;

        let positions = collect_positions(scanners, chain_filter, address, ctx).await;
        let total_value_usd: f64 = positions.iter().map(|p| p.total_value_usd).sum();

        Ok(json!({
            "address": address,
            "positionCount": positions.len(),
            "totalValueUsd": total_value_usd,
            "positions": positions,
        }))
    }
}
