//! Feature plugins. Each plugin groups a coherent set of tools and knows
//! nothing about the other plugins; the registry composes them.

pub mod balances;
pub mod lending;
pub mod polymarket;
pub mod swap;
pub mod token_info;
pub mod wallet_intel;
pub mod yield_finder;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::registry::PluginContext;

/// One callable tool. Stateless: registered once, invoked concurrently.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    async fn call(&self, ctx: &PluginContext, args: Value) -> Result<Value>;
}

/// A feature area contributing tools to the registry.
///
/// `initialize` runs exactly once, before any tool is exposed, and may
/// perform one-time setup such as constructing API clients from the
/// shared configuration. `tools` must be deterministic and must not
/// depend on network state.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
    async fn initialize(&mut self, _ctx: &Arc<PluginContext>) -> Result<()> {
        Ok(())
    }
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

pub(crate) fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    opt_str(args, key).ok_or_else(|| GatewayError::invalid_input(format!("missing '{key}'")))
}

pub(crate) fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn opt_str_list(args: &Value, key: &str) -> Result<Option<Vec<String>>> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let list = value
        .as_array()
        .ok_or_else(|| GatewayError::invalid_input(format!("'{key}' must be an array of strings")))?
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                GatewayError::invalid_input(format!("'{key}' must be an array of strings"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arg_helpers_trim_and_reject() {
        let args = json!({"chainId": " ethereum ", "empty": "", "tokens": ["USDC", "SOL"]});
        assert_eq!(arg_str(&args, "chainId").unwrap(), "ethereum");
        assert!(arg_str(&args, "empty").is_err());
        assert!(arg_str(&args, "missing").is_err());
        assert_eq!(
            opt_str_list(&args, "tokens").unwrap().unwrap(),
            vec!["USDC".to_string(), "SOL".to_string()]
        );
        assert!(opt_str_list(&args, "missing").unwrap().is_none());
        assert!(opt_str_list(&json!({"tokens": "USDC"}), "tokens").is_err());
    }
}
