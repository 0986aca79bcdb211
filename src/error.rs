use thiserror::Error;

/// Error taxonomy for the gateway. Every variant is caught at the tool
/// router boundary and rendered into the MCP error envelope; none of them
/// may take down the process.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("token not found on {chain_id}: {token}")]
    TokenNotFound { chain_id: String, token: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{provider} error: {detail}")]
    Aggregator {
        provider: &'static str,
        detail: String,
    },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn aggregator(provider: &'static str, detail: impl Into<String>) -> Self {
        GatewayError::Aggregator {
            provider,
            detail: detail.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        GatewayError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
