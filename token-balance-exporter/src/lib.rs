//! Periodically reads native and ERC-20 balances of configured wallets across
//! EVM chains and exposes them as Prometheus gauges

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::needless_pass_by_ref_mut)]

pub mod balance;
pub mod chain_client;
pub mod cli;
pub mod config;
pub mod conversion;
pub mod error;
pub mod http_server;
pub mod registry;
pub mod utils;
pub mod watch_item;
pub mod watcher;
