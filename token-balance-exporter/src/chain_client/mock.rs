//! A mock chain client implementation for testing

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use super::{error::ChainClientError, ChainClient, DynChainClient};

// ---------
// | Types |
// ---------

/// A call observed by the mock client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    /// A native balance lookup
    NativeBalance {
        /// The address whose balance was requested
        holder: Address,
    },
    /// A token `balanceOf` call
    BalanceOf {
        /// The token contract called
        token: Address,
        /// The holder passed to `balanceOf`
        holder: Address,
    },
}

/// A scripted response
type MockResponse = Result<U256, ChainClientError>;

// ---------------------
// | Mock Chain Client |
// ---------------------

/// A mock chain client used for testing.
///
/// Responses are scripted up front with the builder methods. Any call without
/// a scripted response fails with an RPC error. Every call is recorded, in
/// order, before the optional latency elapses, so tests can observe calls that
/// are still in flight.
#[derive(Default)]
pub struct MockChainClient {
    /// Native balances keyed by holder
    native: HashMap<Address, MockResponse>,
    /// Token balances keyed by (token, holder)
    tokens: HashMap<(Address, Address), MockResponse>,
    /// Artificial delay applied to every call
    latency: Option<Duration>,
    /// The calls observed so far
    calls: Mutex<Vec<MockCall>>,
}

impl MockChainClient {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a native balance for `holder`
    pub fn with_native_balance(mut self, holder: Address, balance: U256) -> Self {
        self.native.insert(holder, Ok(balance));
        self
    }

    /// Script a failing native balance lookup for `holder`
    pub fn with_native_error(mut self, holder: Address, err: ChainClientError) -> Self {
        self.native.insert(holder, Err(err));
        self
    }

    /// Script a token balance for `(token, holder)`
    pub fn with_token_balance(mut self, token: Address, holder: Address, balance: U256) -> Self {
        self.tokens.insert((token, holder), Ok(balance));
        self
    }

    /// Script a failing `balanceOf` call for `(token, holder)`
    pub fn with_token_error(
        mut self,
        token: Address,
        holder: Address,
        err: ChainClientError,
    ) -> Self {
        self.tokens.insert((token, holder), Err(err));
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Wrap the mock for use by the watcher, keeping a handle for inspection
    pub fn into_shared(self) -> (Arc<Self>, DynChainClient) {
        let mock = Arc::new(self);
        let client = DynChainClient::from_arc(mock.clone());
        (mock, client)
    }

    /// The calls observed so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The number of calls observed so far
    pub fn num_calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Record a call and apply the configured latency
    async fn observe(&self, call: MockCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// The error returned for a call with no scripted response
fn unscripted(call: MockCall) -> ChainClientError {
    ChainClientError::rpc(format!("no mocked response for {call:?}"))
}

// -------------------------------------
// | Chain Client Trait Implementation |
// -------------------------------------

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_native_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        let call = MockCall::NativeBalance { holder: address };
        self.observe(call).await;
        self.native.get(&address).cloned().unwrap_or_else(|| Err(unscripted(call)))
    }

    async fn call_balance_of(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainClientError> {
        let call = MockCall::BalanceOf { token, holder };
        self.observe(call).await;
        self.tokens.get(&(token, holder)).cloned().unwrap_or_else(|| Err(unscripted(call)))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    /// The holder used in tests
    const HOLDER: Address = address!("0x00000000000000000000000000000000000000aa");
    /// The token used in tests
    const TOKEN: Address = address!("0x00000000000000000000000000000000000000bb");

    /// Tests that scripted responses are returned and calls are recorded
    #[tokio::test]
    async fn test_scripted_responses() {
        let mock = MockChainClient::new()
            .with_native_balance(HOLDER, U256::from(7u64))
            .with_token_balance(TOKEN, HOLDER, U256::from(9u64));

        assert_eq!(mock.get_native_balance(HOLDER).await.unwrap(), U256::from(7u64));
        assert_eq!(mock.call_balance_of(TOKEN, HOLDER).await.unwrap(), U256::from(9u64));
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::NativeBalance { holder: HOLDER },
                MockCall::BalanceOf { token: TOKEN, holder: HOLDER },
            ]
        );
    }

    /// Tests that unscripted calls fail
    #[tokio::test]
    async fn test_unscripted_call_fails() {
        let mock = MockChainClient::new();
        let res = mock.call_balance_of(TOKEN, HOLDER).await;
        assert!(matches!(res, Err(ChainClientError::Rpc(_))));
        assert_eq!(mock.num_calls(), 1);
    }
}
