//! Miscellaneous helpers: logging setup and address parsing

use alloy::primitives::{hex, Address};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::ExporterError;

/// The number of bytes in an address
const ADDRESS_LEN: usize = 20;

/// Set up the global tracing subscriber
///
/// The filter is read from `RUST_LOG`, defaulting to `info`
pub fn setup_logging(json: bool) {
    let filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_file(true).with_line_number(true).json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
    }
}

/// Parse a hex address leniently.
///
/// An odd digit count is padded with a leading `0`; shorter inputs are
/// left-padded with zero bytes and longer ones keep their trailing 20 bytes.
/// Only non-hex input is rejected.
pub fn parse_address(s: &str) -> Result<Address, ExporterError> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let padded = if digits.len() % 2 == 1 { format!("0{digits}") } else { digits.to_string() };

    let bytes = hex::decode(&padded).map_err(|_| ExporterError::InvalidAddress(s.to_string()))?;
    let tail = &bytes[bytes.len().saturating_sub(ADDRESS_LEN)..];
    Ok(Address::left_padding_from(tail))
}

/// Whether a configured token contract denotes the chain's native currency
pub fn is_native_token(contract: &str) -> bool {
    if contract.is_empty() {
        return true;
    }

    matches!(parse_address(contract), Ok(addr) if addr == Address::ZERO)
}
