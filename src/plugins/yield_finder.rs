//! Best-yield search for one asset across every registered yield source.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::plugins::{arg_str, Plugin, Tool};
use crate::price::PriceClient;
use crate::protocols::{collect_yield_opportunities, AaveV3Source, CompoundV3Source, YieldSource};
use crate::registry::PluginContext;

type Sources = Arc<OnceCell<Vec<Arc<dyn YieldSource>>>>;

pub struct YieldFinderPlugin {
    sources: Sources,
}

impl YieldFinderPlugin {
    pub fn new() -> Self {
        YieldFinderPlugin {
            sources: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for YieldFinderPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for YieldFinderPlugin {
    fn name(&self) -> &'static str {
        "yield-finder"
    }

    fn description(&self) -> &'static str {
        "Ranked yield opportunities for an asset across protocols and chains"
    }

    async fn initialize(&mut self, ctx: &Arc<PluginContext>) -> Result<()> {
        let price = Arc::new(PriceClient::new(ctx.config())?);
        let sources: Vec<Arc<dyn YieldSource>> = vec![
            Arc::new(AaveV3Source::new(price.clone())),
            Arc::new(CompoundV3Source::new(price)),
        ];
        self.sources
            .set(sources)
            .map_err(|_| GatewayError::Config("yield-finder plugin initialized twice".into()))
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(FindYieldTool {
            sources: self.sources.clone(),
        })]
    }
}

struct FindYieldTool {
    sources: Sources,
}

#[async_trait]
impl Tool for FindYieldTool {
    fn name(&self) -> &'static str {
        "defi_find_yield"
    }

    fn description(&self) -> &'static str {
        "Find where an asset earns the most, sorted by APY. Partial data from reachable chains is returned rather than failing the search."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "asset": {
                    "type": "string",
                    "description": "Asset symbol, e.g. 'USDC'"
                },
                "minApy": {
                    "type": "number",
                    "description": "Drop opportunities below this APY percentage"
                },
                "minTvlUsd": {
                    "type": "number",
                    "description": "Drop opportunities below this TVL in USD"
                },
                "maxResults": {
                    "type": "integer",
                    "description": "Cap on returned opportunities (default 20)"
                }
            },
            "required": ["asset"]
        })
    }

    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value> {
        let asset = arg_str(&args, "asset")?;
        let min_apy = args.get("minApy").and_then(Value::as_f64).unwrap_or(0.0);
        let min_tvl = args.get("minTvlUsd").and_then(Value::as_f64).unwrap_or(0.0);
        let max_results = args
            .get("maxResults")
            .and_then(Value::as_u64)
            .unwrap_or(20)
            .clamp(1, 100) as usize;
        let sources = self
            .sources
            .get()
            .ok_or_else(|| GatewayError::Config("yield-finder plugin not initialized".into()))?;

        let mut opportunities = collect_yield_opportunities(sources, asset, ctx).await;
        opportunities.retain(|o| o.apy >= min_apy && o.tvl >= min_tvl);
        opportunities.sort_by(|a, b| b.apy.partial_cmp(&a.apy).unwrap_or(std::cmp::Ordering::Equal));
        opportunities.truncate(max_results);

        Ok(json!({
            "asset": asset,
            "count": opportunities.len(),
            "opportunities": opportunities,
        }))
    }
}
