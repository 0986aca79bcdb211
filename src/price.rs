//! Thin CoinGecko client. Keyed lookups by asset id or by
//! `(platform, contract address)`; everything else in the gateway treats
//! this as an opaque price oracle.

use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER: &str = "coingecko";

/// CoinGecko asset-platform id for a gateway chain id.
pub fn platform_for_chain(chain_id: &str) -> Option<&'static str> {
    match chain_id {
        "ethereum" => Some("ethereum"),
        "arbitrum" => Some("arbitrum-one"),
        "base" => Some("base"),
        "optimism" => Some("optimistic-ethereum"),
        "polygon" => Some("polygon-pos"),
        "solana-mainnet" => Some("solana"),
        _ => None,
    }
}

pub struct PriceClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PriceClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build http client: {e}")))?;
        Ok(PriceClient {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.coingecko_api_key.clone(),
        })
    }

    async fn get(&self, path_and_query: String) -> Result<Value> {
        let url = format!("{}/{path_and_query}", self.base_url);
        debug!(%url, "price lookup");
        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::aggregator(
                PROVIDER,
                format!("HTTP {}", response.status()),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::aggregator(PROVIDER, format!("malformed payload: {e}")))
    }

    /// USD prices for CoinGecko asset ids. Missing ids are simply absent
    /// from the map; the caller decides whether that is fatal.
    pub async fn usd_by_ids(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let payload = self
            .get(format!(
                "simple/price?ids={}&vs_currencies=usd",
                ids.join(",")
            ))
            .await?;
        Ok(extract_usd_map(&payload))
    }

    /// USD prices for contract addresses on one asset platform. Keys in
    /// the result are lowercased addresses.
    pub async fn usd_by_contracts(
        &self,
        platform: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, f64>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let payload = self
            .get(format!(
                "simple/token_price/{platform}?contract_addresses={}&vs_currencies=usd",
                addresses.join(",")
            ))
            .await?;
        Ok(extract_usd_map(&payload))
    }
}

fn extract_usd_map(payload: &Value) -> HashMap<String, f64> {
    let mut prices = HashMap::new();
    if let Some(object) = payload.as_object() {
        for (key, entry) in object {
            if let Some(usd) = entry.get("usd").and_then(Value::as_f64) {
                prices.insert(key.to_lowercase(), usd);
            }
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_mapping_covers_registered_chains() {
        assert_eq!(platform_for_chain("ethereum"), Some("ethereum"));
        assert_eq!(platform_for_chain("solana-mainnet"), Some("solana"));
        assert_eq!(platform_for_chain("cosmoshub"), None);
    }

    #[test]
    fn extracts_usd_prices_case_insensitively() {
        let payload = json!({
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48": {"usd": 0.9998},
            "solana": {"usd": 150.25},
            "broken": {"eur": 1.0},
        });
        let prices = extract_usd_map(&payload);
        assert_eq!(
            prices.get("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            Some(&0.9998)
        );
        assert_eq!(prices.get("solana"), Some(&150.25));
        assert!(!prices.contains_key("broken"));
    }
}
