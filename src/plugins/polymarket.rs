//! Prediction-market discovery through the Polymarket Gamma API.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::plugins::{opt_str, Plugin, Tool};
use crate::registry::PluginContext;

const BASE_URL: &str = "https://gamma-api.polymarket.com";
const PROVIDER: &str = "polymarket";

pub struct PolymarketPlugin {
    http: Arc<OnceCell<Client>>,
}

impl PolymarketPlugin {
    pub fn new() -> Self {
        PolymarketPlugin {
            http: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for PolymarketPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for PolymarketPlugin {
    fn name(&self) -> &'static str {
        "polymarket"
    }

    fn description(&self) -> &'static str {
        "Prediction-market discovery on Polymarket"
    }

    async fn initialize(&mut self, ctx: &Arc<PluginContext>) -> Result<()> {
        let client = Client::builder()
            .timeout(ctx.config().http_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build http client: {e}")))?;
        self.http
            .set(client)
            .map_err(|_| GatewayError::Config("polymarket plugin initialized twice".into()))
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(PredictionMarketsTool {
            http: self.http.clone(),
        })]
    }
}

struct PredictionMarketsTool {
    http: Arc<OnceCell<Client>>,
}

#[async_trait]
impl Tool for PredictionMarketsTool {
    fn name(&self) -> &'static str {
        "defi_prediction_markets"
    }

    fn description(&self) -> &'static str {
        "List active Polymarket prediction markets, optionally filtered by a search query"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text filter over market questions"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum markets to return (default 10)"
                }
            }
        })
    }

    async fn call(&self, _ctx: &PluginContext, args: Value) -> Result<Value> {
        let query = opt_str(&args, "query");
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .clamp(1, 50);
        let http = self
            .http
            .get()
            .ok_or_else(|| GatewayError::Config("polymarket plugin not initialized".into()))?;

        let url = format!(
            "{BASE_URL}/markets?active=true&closed=false&order=volumeNum&ascending=false&limit={limit}"
        );
        debug!(%url, "polymarket lookup");
        let response = http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::aggregator(
                PROVIDER,
                format!("HTTP {}", response.status()),
            ));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("malformed payload: {e}")))?;

        let markets = payload.as_array().cloned().unwrap_or_default();
        let mut normalized: Vec<Value> = markets.iter().map(normalize_market).collect();
        if let Some(q) = query {
            let needle = q.to_lowercase();
            normalized.retain(|market| {
                market
                    .get("question")
                    .and_then(Value::as_str)
                    .map(|question| question.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
        }

        Ok(json!({
            "count": normalized.len(),
            "markets": normalized,
        }))
    }
}

fn normalize_market(market: &Value) -> Value {
    json!({
        "question": market.get("question").and_then(Value::as_str).unwrap_or(""),
        "slug": market.get("slug").and_then(Value::as_str).unwrap_or(""),
        "outcomes": coerce_str_list(market.get("outcomes")),
        "outcomePrices": coerce_str_list(market.get("outcomePrices")),
        "volumeUsd": market.get("volumeNum").and_then(Value::as_f64)
            .or_else(|| market.get("volume").and_then(Value::as_str).and_then(|v| v.parse().ok())),
        "liquidityUsd": market.get("liquidityNum").and_then(Value::as_f64)
            .or_else(|| market.get("liquidity").and_then(Value::as_str).and_then(|v| v.parse().ok())),
        "endDate": market.get("endDate").and_then(Value::as_str),
    })
}

/// Gamma returns list fields either as JSON arrays or as JSON-encoded
/// strings; accept both.
fn coerce_str_list(value: Option<&Value>) -> Vec<String> {
    let Some(value) = value else {
        return vec![];
    };
    if let Some(array) = value.as_array() {
        return array
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    let Some(text) = value.as_str() else {
        return vec![];
    };
    serde_json::from_str::<Vec<String>>(text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_arrays_and_encoded_strings() {
        assert_eq!(
            coerce_str_list(Some(&json!(["Yes", "No"]))),
            vec!["Yes".to_string(), "No".to_string()]
        );
        assert_eq!(
            coerce_str_list(Some(&json!("[\"Yes\",\"No\"]"))),
            vec!["Yes".to_string(), "No".to_string()]
        );
        assert!(coerce_str_list(Some(&json!(42))).is_empty());
        assert!(coerce_str_list(None).is_empty());
    }

    #[test]
    fn normalizes_stringly_numbers() {
        let market = json!({
            "question": "Will it happen?",
            "slug": "will-it-happen",
            "outcomes": "[\"Yes\",\"No\"]",
            "volume": "12345.5",
            "endDate": "2026-12-31T00:00:00Z",
        });
        let normalized = normalize_market(&market);
        assert_eq!(normalized["question"], "Will it happen?");
        assert_eq!(normalized["volumeUsd"], 12345.5);
        assert_eq!(normalized["outcomes"][0], "Yes");
    }
}
