//! Resolution of a single watch item's balance

use std::time::Duration;

use alloy::primitives::U256;
use tracing::{debug, warn};

use crate::{
    chain_client::{error::ChainClientError, ChainClient},
    conversion::to_scaled_float,
    watch_item::{TokenKind, WatchItem, WatchItemSpec},
};

/// The value published for an item whose last fetch failed
pub const FAILED_FETCH_SENTINEL: f64 = -1.0;

/// Fetch an item's raw balance and scale it by the token's decimals
///
/// The call is abandoned after `timeout`
pub async fn fetch_balance(
    client: &dyn ChainClient,
    item: &WatchItemSpec,
    timeout: Duration,
) -> Result<f64, ChainClientError> {
    let raw = tokio::time::timeout(timeout, fetch_raw_balance(client, item))
        .await
        .map_err(|_| ChainClientError::Timeout(timeout))??;

    Ok(to_scaled_float(raw, item.decimals))
}

/// Resolve an item's balance, logging the item's context on failure
///
/// This is the single resolution path: [`resolve_balance`] and
/// [`refresh_item`] are views over its result
pub async fn try_resolve_balance(
    client: &dyn ChainClient,
    item: &WatchItemSpec,
    timeout: Duration,
) -> Result<f64, ChainClientError> {
    let res = fetch_balance(client, item, timeout).await;
    match &res {
        Ok(balance) => debug!(
            chain = %item.chain,
            wallet = %item.wallet,
            symbol = %item.symbol,
            balance,
            "Updated balance"
        ),
        Err(e) => log_fetch_failure(item, e),
    }

    res
}

/// Resolve an item's balance, returning [`FAILED_FETCH_SENTINEL`] if the
/// fetch fails
pub async fn resolve_balance(
    client: &dyn ChainClient,
    item: &WatchItemSpec,
    timeout: Duration,
) -> f64 {
    try_resolve_balance(client, item, timeout).await.unwrap_or(FAILED_FETCH_SENTINEL)
}

/// Resolve an item's balance and publish the result to its metrics
pub async fn refresh_item(client: &dyn ChainClient, item: &WatchItem, timeout: Duration) {
    match try_resolve_balance(client, &item.spec, timeout).await {
        Ok(balance) => item.metrics.record_success(balance),
        Err(_) => item.metrics.record_failure(),
    }
}

/// Issue the chain call matching the item's token kind
async fn fetch_raw_balance(
    client: &dyn ChainClient,
    item: &WatchItemSpec,
) -> Result<U256, ChainClientError> {
    match item.kind {
        TokenKind::Native => client.get_native_balance(item.wallet_address).await,
        TokenKind::Erc20(token) => client.call_balance_of(token, item.wallet_address).await,
    }
}

/// Log a failed fetch with the item's context
fn log_fetch_failure(item: &WatchItemSpec, err: &ChainClientError) {
    warn!(
        chain = %item.chain,
        wallet = %item.wallet,
        token = %item.token,
        symbol = %item.symbol,
        error = %err,
        "Can't get balance"
    );
}
