//! Lending-market yield discovery across the registered protocols.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::plugins::{opt_str, Plugin, Tool};
use crate::price::PriceClient;
use crate::protocols::{collect_yield_opportunities, AaveV3Source, CompoundV3Source, YieldSource};
use crate::registry::PluginContext;

type Sources = Arc<OnceCell<Vec<Arc<dyn YieldSource>>>>;

pub struct LendingPlugin {
    sources: Sources,
}

impl LendingPlugin {
    pub fn new() -> Self {
        LendingPlugin {
            sources: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for LendingPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for LendingPlugin {
    fn name(&self) -> &'static str {
        "lending"
    }

    fn description(&self) -> &'static str {
        "Supply yields on lending protocols across every chain they are deployed on"
    }

    async fn initialize(&mut self, ctx: &Arc<PluginContext>) -> Result<()> {
        let price = Arc::new(PriceClient::new(ctx.config())?);
        let sources: Vec<Arc<dyn YieldSource>> = vec![
            Arc::new(AaveV3Source::new(price.clone())),
            Arc::new(CompoundV3Source::new(price)),
        ];
        self.sources
            .set(sources)
            .map_err(|_| GatewayError::Config("lending plugin initialized twice".into()))
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(GetLendingYieldsTool {
            sources: self.sources.clone(),
        })]
    }
}

struct GetLendingYieldsTool {
    sources: Sources,
}

#[async_trait]
impl Tool for GetLendingYieldsTool {
    fn name(&self) -> &'static str {
        "defi_get_lending_yields"
    }

    fn description(&self) -> &'static str {
        "Current supply APYs for an asset across lending protocols. Unreachable chains are skipped, not fatal."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "asset": {
                    "type": "string",
                    "description": "Asset symbol to look up (default USDC)"
                },
                "protocol": {
                    "type": "string",
                    "description": "Restrict to one protocol, e.g. 'aave-v3'"
                }
            }
        })
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let asset = opt_str(&args, "asset").unwrap_or("USDC");
        let protocol_filter = opt_str(&args, "protocol");
        let sources = self
            .sources
            .get()
            .ok_or_else(|| GatewayError::Config("lending plugin not initialized".into()))?;

        let selected: Vec<Arc<dyn YieldSource>> = sources
            .iter()
            .filter(|source| {
                protocol_filter
                    .map(|wanted| source.protocol() == wanted)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(GatewayError::invalid_input(format!(
                "unknown protocol: {}",
                protocol_filter.unwrap_or_default()
            )));
        }

        let mut opportunities = collect_yield_opportunities(&selected, asset, ctx).await;
        opportunities.sort_by(|a, b| b.apy.partial_cmp(&a.apy).unwrap_or(std::cmp::Ordering::Equal));

        Ok(json!({
            "asset": asset,
            "count": opportunities.len(),
            "opportunities": opportunities,
        }))
    }
}
