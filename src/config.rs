use anyhow::Context;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Default slippage tolerance applied when a swap request omits one.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Process-wide configuration, resolved once at startup from the
/// environment and shared read-only through the plugin context.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Per-chain RPC endpoint overrides keyed by chain id. Chains without
    /// an override fall back to the public endpoint in the chain table.
    pub rpc_overrides: HashMap<String, String>,
    pub coingecko_api_key: Option<String>,
    pub default_slippage_bps: u32,
    /// Bound on every outbound request so one unresponsive provider
    /// cannot hang a multi-chain fan-out.
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut rpc_overrides = HashMap::new();
        for (key, value) in env::vars() {
            if let Some(suffix) = key.strip_prefix("RPC_URL_") {
                let chain_id = suffix.to_lowercase().replace('_', "-");
                rpc_overrides.insert(chain_id, value);
            }
        }

        let default_slippage_bps = match env::var("DEFAULT_SLIPPAGE_BPS") {
            Ok(raw) => raw
                .parse::<u32>()
                .context("DEFAULT_SLIPPAGE_BPS must be an integer")?,
            Err(_) => DEFAULT_SLIPPAGE_BPS,
        };

        let timeout_secs = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("HTTP_TIMEOUT_SECS must be an integer")?,
            Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            rpc_overrides,
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty()),
            default_slippage_bps,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Effective RPC endpoint for a chain: override if set, otherwise the
    /// chain table's public fallback.
    pub fn rpc_url_for<'a>(&'a self, chain_id: &str, fallback: &'a str) -> &'a str {
        self.rpc_overrides
            .get(chain_id)
            .map(String::as_str)
            .unwrap_or(fallback)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_overrides: HashMap::new(),
            coingecko_api_key: None,
            default_slippage_bps: DEFAULT_SLIPPAGE_BPS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_fallback() {
        let mut config = AppConfig::default();
        config
            .rpc_overrides
            .insert("solana-mainnet".into(), "https://rpc.example".into());
        assert_eq!(
            config.rpc_url_for("solana-mainnet", "https://api.mainnet-beta.solana.com"),
            "https://rpc.example"
        );
        assert_eq!(
            config.rpc_url_for("ethereum", "https://eth.llamarpc.com"),
            "https://eth.llamarpc.com"
        );
    }

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.default_slippage_bps, 50);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
    }
}
