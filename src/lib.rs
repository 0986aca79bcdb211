//! DeFi gateway MCP server: one tool surface over EVM, Solana, and Cosmos
//! chains, composed from independent feature plugins by a single registry.

pub mod aggregators;
pub mod amount;
pub mod chains;
pub mod config;
pub mod error;
pub mod plugins;
pub mod price;
pub mod protocols;
pub mod registry;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{GatewayError, Result};
pub use registry::{PluginContext, Registry};
