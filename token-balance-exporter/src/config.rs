//! The exporter's configuration file format and loading helpers
//!
//! Configuration files are YAML. A file with a `.json` extension is read as
//! JSON instead.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use tokio::fs::read_to_string;

use crate::error::ExporterError;

/// The file extension selecting the JSON parser
const JSON_EXTENSION: &str = "json";

/// The decimal count assumed for a token that does not declare one
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// The serde default for [`TokenConfig::decimal`]
fn default_decimals() -> u32 {
    DEFAULT_TOKEN_DECIMALS
}

// ---------
// | Types |
// ---------

/// A token tracked on a chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenConfig {
    /// The token contract address.
    ///
    /// Empty, or the zero address, denotes the chain's native currency
    #[serde(default)]
    pub contract: String,
    /// The symbol wallets use to reference the token
    pub symbol: String,
    /// The number of decimal places in the token's base unit
    #[serde(default = "default_decimals")]
    pub decimal: u32,
}

/// A wallet whose balances are exported
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletConfig {
    /// A display name, exported as the `name` label
    pub name: String,
    /// The wallet address
    pub address: String,
    /// The token symbols to track, keyed by chain name
    #[serde(default)]
    pub track_for: BTreeMap<String, Vec<String>>,
    /// Extra labels attached to every metric of this wallet
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// The exporter's configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExporterConfig {
    /// RPC endpoint URLs keyed by chain name
    pub chains: BTreeMap<String, String>,
    /// The tokens known on each chain, keyed by chain name
    #[serde(default)]
    pub tokens: BTreeMap<String, Vec<TokenConfig>>,
    /// The wallets to export balances for
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
}

impl ExporterConfig {
    /// Read and parse a configuration file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ExporterError> {
        let path = path.as_ref();
        let contents = read_to_string(path)
            .await
            .map_err(|e| ExporterError::config_read(format!("{}: {e}", path.display())))?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(JSON_EXTENSION));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    /// Parse a configuration from its YAML representation
    pub fn from_yaml_str(contents: &str) -> Result<Self, ExporterError> {
        serde_yaml::from_str(contents).map_err(ExporterError::config_parse)
    }

    /// Parse a configuration from its JSON representation
    pub fn from_json_str(contents: &str) -> Result<Self, ExporterError> {
        serde_json::from_str(contents).map_err(ExporterError::config_parse)
    }
}
