//! Top-level error definitions for the exporter
//!
//! Every variant here is fatal: they are raised while loading configuration,
//! building chain clients, registering metrics, or binding the exposition
//! server. Per-item fetch failures at runtime are reported through
//! [`ChainClientError`](crate::chain_client::error::ChainClientError) and never
//! surface as an `ExporterError`.

use crate::chain_client::error::ChainClientError;

/// Exporter errors
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// The configuration file could not be read
    #[error("can't read config file: {0}")]
    ConfigRead(String),
    /// The configuration file is not well formed
    #[error("can't parse config: {0}")]
    ConfigParse(String),
    /// A wallet tracks a chain that is not declared
    #[error("unknown chain '{chain}' in wallet '{wallet}'")]
    UnknownChain {
        /// The undeclared chain name
        chain: String,
        /// The address of the wallet referencing it
        wallet: String,
    },
    /// A wallet tracks a symbol absent from the chain's token list
    #[error("unknown token '{symbol}' for chain '{chain}' in wallet '{wallet}'")]
    UnknownToken {
        /// The unresolved token symbol
        symbol: String,
        /// The chain on which the symbol was looked up
        chain: String,
        /// The address of the wallet referencing it
        wallet: String,
    },
    /// A wallet or token address is not valid hex
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    /// A wallet label name is not a valid Prometheus label name
    #[error("invalid label name '{label}' in wallet '{wallet}'")]
    InvalidLabel {
        /// The offending label name
        label: String,
        /// The address of the wallet declaring it
        wallet: String,
    },
    /// Two watch items resolved to the same metric label set
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    /// A chain declared in the config has no client bound to it
    #[error("no chain client for chain '{0}'")]
    MissingChainClient(String),
    /// A chain client could not be constructed
    #[error("RPC client error: {0}")]
    RpcClient(#[from] ChainClientError),
    /// An error binding or running the metrics HTTP server
    #[error("HTTP server error: {0}")]
    HttpServer(String),
}

#[allow(clippy::needless_pass_by_value)]
impl ExporterError {
    /// Create a new config read error
    pub fn config_read<T: ToString>(msg: T) -> Self {
        Self::ConfigRead(msg.to_string())
    }

    /// Create a new config parse error
    pub fn config_parse<T: ToString>(msg: T) -> Self {
        Self::ConfigParse(msg.to_string())
    }

    /// Create a new duplicate metric error
    pub fn duplicate_metric<T: ToString>(msg: T) -> Self {
        Self::DuplicateMetric(msg.to_string())
    }

    /// Create a new HTTP server error
    pub fn http_server<T: ToString>(msg: T) -> Self {
        Self::HttpServer(msg.to_string())
    }
}
