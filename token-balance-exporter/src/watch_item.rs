//! Watch items: the (chain, wallet, token) tuples refreshed by the watcher,
//! and their resolution from configuration

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::Address;
use tracing::warn;

use crate::{
    config::{ExporterConfig, TokenConfig},
    error::ExporterError,
    registry::{
        labels::{CHAIN_TAG, NAME_TAG, RESERVED_TAGS, SYMBOL_TAG, TOKEN_TAG, WALLET_TAG},
        ItemMetrics, LabelSet, MetricRegistry,
    },
    utils::{is_native_token, parse_address},
};

/// Watch items grouped by chain name
pub type ItemsByChain<T> = BTreeMap<String, Vec<T>>;

// ---------
// | Types |
// ---------

/// The asset a watch item reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// The chain's native currency
    Native,
    /// An ERC-20 token at the given contract
    Erc20(Address),
}

/// A validated watch item that has not been bound to metrics yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchItemSpec {
    /// The chain the item is read from
    pub chain: String,
    /// The wallet address as configured, used in logs and labels
    pub wallet: String,
    /// The parsed wallet address
    pub wallet_address: Address,
    /// The token contract as configured, empty for native assets
    pub token: String,
    /// The asset to read
    pub kind: TokenKind,
    /// The token symbol
    pub symbol: String,
    /// The number of decimal places in the token's base unit
    pub decimals: u32,
    /// The item's full label set
    pub labels: LabelSet,
}

impl WatchItemSpec {
    /// Register the item's metrics, producing a watch item ready to refresh
    pub fn bind(self, registry: &mut MetricRegistry) -> Result<WatchItem, ExporterError> {
        let metrics = registry.register_item(&self.labels)?;
        Ok(WatchItem { spec: self, metrics })
    }
}

/// A watch item bound to its metric handles
///
/// Structurally immutable once built; refreshes only write through `metrics`
#[derive(Clone)]
pub struct WatchItem {
    /// The validated item
    pub spec: WatchItemSpec,
    /// The item's metric handles
    pub metrics: ItemMetrics,
}

// --------------
// | Resolution |
// --------------

/// Validate a configuration and expand it into watch items, grouped by chain.
///
/// The whole configuration is validated here; nothing is registered, so a
/// failure leaves no metrics behind
pub fn resolve_watch_items(
    config: &ExporterConfig,
) -> Result<ItemsByChain<WatchItemSpec>, ExporterError> {
    let tokens = index_tokens(config);
    let mut items: ItemsByChain<WatchItemSpec> = BTreeMap::new();

    for wallet in config.wallets.iter() {
        let wallet_address = parse_address(&wallet.address)?;
        if let Some(label) = wallet.labels.keys().find(|label| !is_valid_label_name(label)) {
            return Err(ExporterError::InvalidLabel {
                label: label.clone(),
                wallet: wallet.address.clone(),
            });
        }
        for tag in RESERVED_TAGS.iter().filter(|tag| wallet.labels.contains_key(**tag)) {
            warn!(wallet = %wallet.address, label = %tag, "wallet label is reserved and will be overridden");
        }

        for (chain, symbols) in wallet.track_for.iter() {
            if !config.chains.contains_key(chain) {
                return Err(ExporterError::UnknownChain {
                    chain: chain.clone(),
                    wallet: wallet.address.clone(),
                });
            }

            for symbol in symbols.iter() {
                let token =
                    tokens.get(chain.as_str()).and_then(|t| t.get(symbol.as_str())).ok_or_else(
                        || ExporterError::UnknownToken {
                            symbol: symbol.clone(),
                            chain: chain.clone(),
                            wallet: wallet.address.clone(),
                        },
                    )?;

                let kind = if is_native_token(&token.contract) {
                    TokenKind::Native
                } else {
                    TokenKind::Erc20(parse_address(&token.contract)?)
                };

                let mut labels = wallet.labels.clone();
                labels.insert(SYMBOL_TAG.to_string(), symbol.clone());
                labels.insert(NAME_TAG.to_string(), wallet.name.clone());
                labels.insert(WALLET_TAG.to_string(), wallet.address.clone());
                labels.insert(TOKEN_TAG.to_string(), token.contract.clone());
                labels.insert(CHAIN_TAG.to_string(), chain.clone());

                items.entry(chain.clone()).or_default().push(WatchItemSpec {
                    chain: chain.clone(),
                    wallet: wallet.address.clone(),
                    wallet_address,
                    token: token.contract.clone(),
                    kind,
                    symbol: symbol.clone(),
                    decimals: token.decimal,
                    labels: labels.into_iter().collect(),
                });
            }
        }
    }

    Ok(items)
}

/// Register every resolved item's metrics
pub fn bind_watch_items(
    specs: ItemsByChain<WatchItemSpec>,
    registry: &mut MetricRegistry,
) -> Result<ItemsByChain<WatchItem>, ExporterError> {
    let mut items = BTreeMap::new();
    for (chain, chain_specs) in specs {
        let bound =
            chain_specs.into_iter().map(|spec| spec.bind(registry)).collect::<Result<Vec<_>, _>>()?;
        items.insert(chain, bound);
    }

    Ok(items)
}

/// Whether `name` is a legal user label name: `[a-zA-Z_][a-zA-Z0-9_]*`, and
/// not in the `__` namespace Prometheus reserves for itself
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.starts_with("__")
}

/// Index each chain's tokens by symbol. A symbol declared twice on the same
/// chain resolves to its last declaration
fn index_tokens(config: &ExporterConfig) -> HashMap<&str, HashMap<&str, &TokenConfig>> {
    let mut index = HashMap::new();
    for (chain, tokens) in config.tokens.iter() {
        let mut by_symbol = HashMap::new();
        for token in tokens.iter() {
            if by_symbol.insert(token.symbol.as_str(), token).is_some() {
                warn!(chain = %chain, symbol = %token.symbol, "token declared twice, using the last declaration");
            }
        }
        index.insert(chain.as_str(), by_symbol);
    }

    index
}
