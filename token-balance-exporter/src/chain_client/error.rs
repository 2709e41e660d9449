//! Error definitions for chain clients

use std::time::Duration;

/// Chain client errors
///
/// The variants only differ in how they are logged; every one of them is
/// published as the same failed-fetch sentinel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainClientError {
    /// The endpoint could not be reached or returned a JSON-RPC error
    #[error("RPC error: {0}")]
    Rpc(String),
    /// The token contract call reverted or returned undecodable data
    #[error("contract call error: {0}")]
    ContractCall(String),
    /// The call did not complete within the configured deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The endpoint URL is not valid
    #[error("invalid RPC url: {0}")]
    InvalidUrl(String),
}

#[allow(clippy::needless_pass_by_value)]
impl ChainClientError {
    /// Create a new RPC error
    pub fn rpc<T: ToString>(msg: T) -> Self {
        Self::Rpc(msg.to_string())
    }

    /// Create a new contract call error
    pub fn contract_call<T: ToString>(msg: T) -> Self {
        Self::ContractCall(msg.to_string())
    }

    /// Create a new invalid URL error
    pub fn invalid_url<T: ToString>(msg: T) -> Self {
        Self::InvalidUrl(msg.to_string())
    }
}
