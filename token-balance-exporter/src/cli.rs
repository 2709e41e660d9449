//! Defines the command-line arguments & parsing helpers for the exporter

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

use crate::watcher::{OverlapPolicy, WatcherSettings};

/// The CLI for the token balance exporter
#[derive(Debug, Parser)]
#[clap(about = "Exports wallet token balances across EVM chains as Prometheus metrics")]
pub struct Cli {
    // --- Server --- //
    /// The address on which the metrics endpoint listens
    #[clap(long, default_value = "0.0.0.0:8080", env = "LISTEN")]
    pub listen: SocketAddr,

    // --- Environment --- //
    /// The path to the YAML configuration file, or a JSON one if it ends in
    /// `.json`
    #[clap(long, env = "CONFIG_FILE")]
    pub config_file: PathBuf,

    // --- Polling --- //
    /// The number of seconds between refresh cycles
    #[clap(
        long,
        default_value = "600",
        env = "REFRESH_INTERVAL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_interval_secs: u64,
    /// The number of seconds after which a single chain call is abandoned
    #[clap(long, default_value = "30", env = "RPC_TIMEOUT_SECS")]
    pub rpc_timeout_secs: u64,
    /// Whether a chain may be refreshed again while its previous refresh is
    /// still running
    #[clap(long, value_enum, default_value = "allow", env = "OVERLAP_POLICY")]
    pub overlap_policy: OverlapPolicy,

    // --- Telemetry --- //
    /// Whether or not to emit JSON-formatted logs
    #[clap(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Cli {
    /// The watcher settings described by the CLI
    pub fn watcher_settings(&self) -> WatcherSettings {
        WatcherSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs),
            overlap_policy: self.overlap_policy,
        }
    }
}
