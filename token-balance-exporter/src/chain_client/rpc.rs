//! A chain client backed by an alloy JSON-RPC provider
#![allow(missing_docs)]

use alloy::{
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol,
};
use async_trait::async_trait;
use url::Url;

use super::{error::ChainClientError, ChainClient};

sol! {
    /// The subset of the ERC-20 interface used to read balances
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// A chain client talking to a node over HTTP JSON-RPC
#[derive(Clone)]
pub struct RpcChainClient {
    /// The underlying provider
    provider: DynProvider,
}

impl RpcChainClient {
    /// Build a client for the given HTTP endpoint.
    ///
    /// No request is made here; an unreachable node only shows up as failed
    /// fetches once the poller runs.
    pub fn new(rpc_url: &str) -> Result<Self, ChainClientError> {
        let url = Url::parse(rpc_url).map_err(ChainClientError::invalid_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }

    /// Get a reference to the underlying RPC provider
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_native_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        self.provider.get_balance(address).await.map_err(ChainClientError::rpc)
    }

    async fn call_balance_of(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainClientError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        erc20.balanceOf(holder).call().await.map_err(ChainClientError::contract_call)
    }
}
