//! Defines an abstract interface for reading balances from a chain node

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::chain_client::error::ChainClientError;

pub mod error;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;
pub mod rpc;

// --------------------
// | Trait Definition |
// --------------------

/// The read-only operations the balance poller needs from a chain node.
///
/// One client is built per chain and shared by every watch item on that
/// chain. Calls on a single client are issued sequentially by the poller, so
/// implementations need no internal locking around the connection.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch the native currency balance of `address` at the latest block
    async fn get_native_balance(&self, address: Address) -> Result<U256, ChainClientError>;

    /// Call `balanceOf(holder)` on the ERC-20 contract at `token`, returning
    /// the raw, unscaled balance
    async fn call_balance_of(&self, token: Address, holder: Address)
        -> Result<U256, ChainClientError>;
}

// --------------------------
// | Erased Type Definition |
// --------------------------

/// A type-erased, cheaply cloneable chain client
#[derive(Clone)]
pub struct DynChainClient(Arc<dyn ChainClient>);

impl DynChainClient {
    /// Create a new type-erased chain client
    pub fn new<C: ChainClient + 'static>(client: C) -> Self {
        Self(Arc::new(client))
    }

    /// Wrap a client that is already shared, e.g. a mock the caller keeps a
    /// handle to for inspection
    pub fn from_arc(client: Arc<dyn ChainClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl ChainClient for DynChainClient {
    async fn get_native_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        self.0.get_native_balance(address).await
    }

    async fn call_balance_of(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainClientError> {
        self.0.call_balance_of(token, holder).await
    }
}
