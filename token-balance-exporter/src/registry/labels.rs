//! Constants for metric labels and metric names

/// Metric for the scaled balance of a watch item, `-1` after a failed fetch
pub const TOKEN_BALANCE_METRIC_NAME: &str = "token_balance";

/// Metric set to `1` after a successful fetch and `0` after a failed one
pub const TOKEN_BALANCE_UP_METRIC_NAME: &str = "token_balance_up";

/// Metric counting failed balance fetches
pub const TOKEN_BALANCE_FETCH_ERRORS_METRIC_NAME: &str = "token_balance_fetch_errors_total";

/// Metric tag for the token symbol
pub const SYMBOL_TAG: &str = "symbol";

/// Metric tag for the wallet's display name
pub const NAME_TAG: &str = "name";

/// Metric tag for the wallet address, as configured
pub const WALLET_TAG: &str = "wallet";

/// Metric tag for the token contract, as configured; empty for native assets
pub const TOKEN_TAG: &str = "token";

/// Metric tag for the chain name
pub const CHAIN_TAG: &str = "chain";

/// The tags set by the exporter, which take precedence over wallet labels
pub const RESERVED_TAGS: [&str; 5] = [SYMBOL_TAG, NAME_TAG, WALLET_TAG, TOKEN_TAG, CHAIN_TAG];
