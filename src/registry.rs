//! Composition root: chain adapters + plugins + configuration become one
//! addressable surface with O(1) chain and tool lookup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::chains::ChainAdapter;
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::plugins::{Plugin, Tool};
use crate::types::ChainInfo;

/// Shared, read-only state handed to every tool invocation: the resolved
/// configuration and the chain-id → adapter index. Built once by the
/// registry; never mutated afterwards.
pub struct PluginContext {
    config: AppConfig,
    adapters: Vec<Arc<dyn ChainAdapter>>,
    chain_index: HashMap<String, usize>,
}

impl PluginContext {
    fn new(config: AppConfig, adapters: Vec<Arc<dyn ChainAdapter>>) -> Result<Self> {
        let mut chain_index = HashMap::new();
        for (position, adapter) in adapters.iter().enumerate() {
            for chain in adapter.chains() {
                if chain.ecosystem != adapter.ecosystem() {
                    return Err(GatewayError::Config(format!(
                        "chain {} declares ecosystem {} but is owned by a {} adapter",
                        chain.id,
                        chain.ecosystem,
                        adapter.ecosystem()
                    )));
                }
                if chain_index.insert(chain.id.clone(), position).is_some() {
                    return Err(GatewayError::Config(format!(
                        "duplicate chain id: {}",
                        chain.id
                    )));
                }
            }
        }
        Ok(PluginContext {
            config,
            adapters,
            chain_index,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Adapter owning `chain_id`, by ecosystem membership of the chain
    /// record. O(1) after the one-time index build.
    pub fn adapter_for_chain(&self, chain_id: &str) -> Result<&Arc<dyn ChainAdapter>> {
        self.chain_index
            .get(chain_id)
            .map(|&position| &self.adapters[position])
            .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.to_string()))
    }

    pub fn chain(&self, chain_id: &str) -> Result<&ChainInfo> {
        self.adapter_for_chain(chain_id)?
            .get_chain(chain_id)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.to_string()))
    }

    /// Union of all adapters' chain tables, for discovery.
    pub fn supported_chains(&self) -> Vec<ChainInfo> {
        self.adapters
            .iter()
            .flat_map(|adapter| adapter.chains().iter().cloned())
            .collect()
    }

    /// True when `chain_id` is registered.
    pub fn has_chain(&self, chain_id: &str) -> bool {
        self.chain_index.contains_key(chain_id)
    }
}

pub struct Registry {
    context: Arc<PluginContext>,
    plugins: Vec<Box<dyn Plugin>>,
    tools: Vec<Arc<dyn Tool>>,
    tool_index: HashMap<String, usize>,
}

impl Registry {
    /// Build the registry. Every plugin's `initialize` runs exactly once,
    /// in registration order, before any tool is exposed; any failure
    /// fails the whole construction. Duplicate chain ids and duplicate
    /// tool names are rejected here, not at call time.
    pub async fn new(
        adapters: Vec<Arc<dyn ChainAdapter>>,
        mut plugins: Vec<Box<dyn Plugin>>,
        config: AppConfig,
    ) -> Result<Self> {
        let context = Arc::new(PluginContext::new(config, adapters)?);

        for plugin in &mut plugins {
            plugin.initialize(&context).await.map_err(|e| {
                GatewayError::Config(format!(
                    "plugin {} failed to initialize: {e}",
                    plugin.name()
                ))
            })?;
            info!(
                plugin = plugin.name(),
                version = plugin.version(),
                "plugin initialized"
            );
        }

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut tool_index = HashMap::new();
        for plugin in &plugins {
            for tool in plugin.tools() {
                if tool_index
                    .insert(tool.name().to_string(), tools.len())
                    .is_some()
                {
                    return Err(GatewayError::Config(format!(
                        "duplicate tool name: {}",
                        tool.name()
                    )));
                }
                tools.push(tool);
            }
        }

        Ok(Registry {
            context,
            plugins,
            tools,
            tool_index,
        })
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    /// Every registered tool, in plugin registration order.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn get_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tool_index.get(name).map(|&position| &self.tools[position])
    }

    /// Plugin identities, for diagnostics.
    pub fn plugins(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.plugins.iter().map(|p| (p.name(), p.version()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{CosmosAdapter, EvmAdapter, SolanaAdapter};
    use crate::plugins;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StaticTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &'static str {
            self.name
        }
        fn description(&self) -> &'static str {
            "test tool"
        }
        fn schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn call(&self, _ctx: &PluginContext, _args: Value) -> crate::error::Result<Value> {
            Ok(json!({"ok": true}))
        }
    }

    struct StaticPlugin {
        name: &'static str,
        tool_names: Vec<&'static str>,
        fail_init: bool,
    }

    #[async_trait]
    impl Plugin for StaticPlugin {
        fn name(&self) -> &'static str {
            self.name
        }
        fn description(&self) -> &'static str {
            "test plugin"
        }
        async fn initialize(&mut self, _ctx: &Arc<PluginContext>) -> crate::error::Result<()> {
            if self.fail_init {
                Err(GatewayError::Config("boom".into()))
            } else {
                Ok(())
            }
        }
        fn tools(&self) -> Vec<Arc<dyn plugins::Tool>> {
            self.tool_names
                .iter()
                .map(|&name| Arc::new(StaticTool { name }) as Arc<dyn plugins::Tool>)
                .collect()
        }
    }

    fn all_adapters() -> Vec<Arc<dyn ChainAdapter>> {
        let config = AppConfig::default();
        vec![
            Arc::new(EvmAdapter::new(&config)),
            Arc::new(SolanaAdapter::new(&config)),
            Arc::new(CosmosAdapter::new(&config)),
        ]
    }

    #[tokio::test]
    async fn chain_ids_round_trip_through_the_index() {
        let registry = Registry::new(all_adapters(), vec![], AppConfig::default())
            .await
            .unwrap();
        let ctx = registry.context();
        for chain in ctx.supported_chains() {
            let adapter = ctx.adapter_for_chain(&chain.id).unwrap();
            assert_eq!(adapter.get_chain(&chain.id).unwrap().id, chain.id);
            assert_eq!(adapter.ecosystem(), chain.ecosystem);
        }
    }

    #[tokio::test]
    async fn unknown_chain_is_unsupported() {
        let registry = Registry::new(all_adapters(), vec![], AppConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            registry.context().adapter_for_chain("near"),
            Err(GatewayError::UnsupportedChain(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_tool_names_fail_composition() {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(StaticPlugin {
                name: "first",
                tool_names: vec!["defi_dup"],
                fail_init: false,
            }),
            Box::new(StaticPlugin {
                name: "second",
                tool_names: vec!["defi_dup"],
                fail_init: false,
            }),
        ];
        let err = Registry::new(all_adapters(), plugins, AppConfig::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[tokio::test]
    async fn initialize_failure_fails_the_whole_registry() {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(StaticPlugin {
                name: "fine",
                tool_names: vec!["defi_a"],
                fail_init: false,
            }),
            Box::new(StaticPlugin {
                name: "broken",
                tool_names: vec!["defi_b"],
                fail_init: true,
            }),
        ];
        let err = Registry::new(all_adapters(), plugins, AppConfig::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn tool_lookup_by_name() {
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(StaticPlugin {
            name: "solo",
            tool_names: vec!["defi_one", "defi_two"],
            fail_init: false,
        })];
        let registry = Registry::new(all_adapters(), plugins, AppConfig::default())
            .await
            .unwrap();
        assert_eq!(registry.tools().len(), 2);
        assert!(registry.get_tool("defi_two").is_some());
        assert!(registry.get_tool("defi_three").is_none());
    }
}
