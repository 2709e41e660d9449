//! The watcher owns the chain clients, watch items, and metric registry, and
//! drives the periodic refresh of every item
//!
//! A [`Watcher`] is built from configuration with all of its metrics already
//! registered. [`Watcher::start`] consumes it, binds the exposition server,
//! and spawns the refresh loop, returning a [`RunningWatcher`] whose
//! [`RunningWatcher::stop`] tears both down.
//!
//! Each refresh cycle spawns one task per chain. Chains refresh in parallel;
//! the items of a single chain refresh one after another through that chain's
//! client.

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use tokio::{
    net::TcpListener,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    balance::refresh_item,
    chain_client::{rpc::RpcChainClient, DynChainClient},
    config::ExporterConfig,
    error::ExporterError,
    http_server::HttpServer,
    registry::MetricRegistry,
    watch_item::{bind_watch_items, resolve_watch_items, WatchItem},
};

// -------------
// | Constants |
// -------------

/// The default period between refresh cycles
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// The default deadline for a single chain call
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

// ------------
// | Settings |
// ------------

/// What to do when a chain's previous refresh is still running as the next
/// cycle begins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OverlapPolicy {
    /// Start another refresh of the chain alongside the running one
    #[default]
    Allow,
    /// Skip the chain for this cycle
    Skip,
}

/// Runtime settings for the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherSettings {
    /// The period between refresh cycles
    pub refresh_interval: Duration,
    /// The deadline for a single chain call
    pub rpc_timeout: Duration,
    /// The policy for overlapping refreshes of a chain
    pub overlap_policy: OverlapPolicy,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

// ----------------
// | Chain Worker |
// ----------------

/// A chain's client together with the items read through it
#[derive(Clone)]
struct ChainWorker {
    /// The chain name
    chain: String,
    /// The chain's client
    client: DynChainClient,
    /// The chain's items, in refresh order
    items: Arc<Vec<WatchItem>>,
}

impl ChainWorker {
    /// Refresh every item on the chain, one at a time
    async fn refresh(&self, timeout: Duration) {
        info!(chain = %self.chain, items = self.items.len(), "Updating tokens on chain");
        for item in self.items.iter() {
            refresh_item(&self.client, item, timeout).await;
        }
        info!(chain = %self.chain, "Updated tokens on chain");
    }

    /// Spawn a refresh of the chain that is abandoned once `cancel` fires
    fn spawn_refresh(&self, timeout: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(chain = %worker.chain, "Refresh cancelled");
                },
                _ = worker.refresh(timeout) => {},
            }
        })
    }
}

// -----------
// | Watcher |
// -----------

/// A configured watcher that has not been started
pub struct Watcher {
    /// The chain workers, keyed by chain name
    chains: BTreeMap<String, ChainWorker>,
    /// The registry holding every item's metrics
    registry: Arc<MetricRegistry>,
    /// The watcher's settings
    settings: WatcherSettings,
}

impl Watcher {
    /// Build a watcher, connecting an RPC client to every declared chain
    pub fn build_from_config(
        config: &ExporterConfig,
        settings: WatcherSettings,
    ) -> Result<Self, ExporterError> {
        let mut clients = HashMap::new();
        for (chain, rpc_url) in config.chains.iter() {
            let client = RpcChainClient::new(rpc_url)?;
            clients.insert(chain.clone(), DynChainClient::new(client));
        }

        Self::with_clients(config, clients, settings)
    }

    /// Build a watcher around the given clients, keyed by chain name.
    ///
    /// The configuration is fully validated before any metric is registered
    pub fn with_clients(
        config: &ExporterConfig,
        mut clients: HashMap<String, DynChainClient>,
        settings: WatcherSettings,
    ) -> Result<Self, ExporterError> {
        if settings.refresh_interval.is_zero() {
            return Err(ExporterError::config_parse("refresh interval must be positive"));
        }

        let specs = resolve_watch_items(config)?;
        if let Some(chain) = config.chains.keys().find(|chain| !clients.contains_key(*chain)) {
            return Err(ExporterError::MissingChainClient(chain.clone()));
        }

        let mut registry = MetricRegistry::new();
        let mut items = bind_watch_items(specs, &mut registry)?;

        let mut chains = BTreeMap::new();
        for chain in config.chains.keys() {
            let client =
                clients.remove(chain).ok_or_else(|| ExporterError::MissingChainClient(chain.clone()))?;
            let chain_items = items.remove(chain).unwrap_or_default();
            let worker =
                ChainWorker { chain: chain.clone(), client, items: Arc::new(chain_items) };
            chains.insert(chain.clone(), worker);
        }

        info!(chains = chains.len(), items = registry.len(), "Registered watch items");
        Ok(Self { chains, registry: Arc::new(registry), settings })
    }

    /// The registry holding every item's metrics
    pub fn registry(&self) -> Arc<MetricRegistry> {
        self.registry.clone()
    }

    /// The watcher's settings
    pub fn settings(&self) -> &WatcherSettings {
        &self.settings
    }

    /// Run a single refresh cycle and wait for every chain to finish
    pub async fn refresh_once(&self) {
        let cancel = CancellationToken::new();
        let handles = self
            .chains
            .values()
            .map(|worker| worker.spawn_refresh(self.settings.rpc_timeout, cancel.clone()));

        for res in join_all(handles).await {
            if let Err(e) = res {
                error!("Chain refresh task failed: {e}");
            }
        }
    }

    /// Start serving metrics on `listen` and refreshing on the configured
    /// interval. The first cycle begins immediately
    pub async fn start(self, listen: SocketAddr) -> Result<RunningWatcher, ExporterError> {
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|e| ExporterError::http_server(format!("can't bind {listen}: {e}")))?;
        let local_addr = listener.local_addr().map_err(ExporterError::http_server)?;

        let cancel = CancellationToken::new();
        let server = HttpServer::new(self.registry.clone())?;
        let server_handle = tokio::spawn(server.execution_loop(listener, cancel.clone()));
        let refresh_handle = self.spawn_refresh_loop(cancel.clone());

        Ok(RunningWatcher {
            cancel,
            server_handle,
            refresh_handle,
            local_addr,
            registry: self.registry,
        })
    }

    /// Spawn the refresh loop over the watcher's chains
    fn spawn_refresh_loop(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let refresh_loop = RefreshLoop {
            chains: self.chains.clone(),
            settings: self.settings,
            in_flight: HashMap::new(),
        };
        tokio::spawn(refresh_loop.run(cancel))
    }
}

// ----------------
// | Refresh Loop |
// ----------------

/// The timer-driven loop launching refresh cycles
struct RefreshLoop {
    /// The chain workers, keyed by chain name
    chains: BTreeMap<String, ChainWorker>,
    /// The watcher's settings
    settings: WatcherSettings,
    /// The most recently launched refresh of each chain
    in_flight: HashMap<String, JoinHandle<()>>,
}

impl RefreshLoop {
    /// Launch a cycle on every tick until cancelled, then wait for the
    /// in-flight refreshes to wind down
    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.launch_cycle(&cancel),
            }
        }

        for (chain, handle) in self.in_flight.drain() {
            if let Err(e) = handle.await {
                error!(chain = %chain, "Chain refresh task failed: {e}");
            }
        }
    }

    /// Spawn one refresh per chain, honoring the overlap policy
    fn launch_cycle(&mut self, cancel: &CancellationToken) {
        for (chain, worker) in self.chains.iter() {
            let still_running = self.in_flight.get(chain).is_some_and(|h| !h.is_finished());
            if still_running && self.settings.overlap_policy == OverlapPolicy::Skip {
                warn!(chain = %chain, "Previous refresh still running, skipping chain this cycle");
                continue;
            }

            let handle = worker.spawn_refresh(self.settings.rpc_timeout, cancel.clone());
            self.in_flight.insert(chain.clone(), handle);
        }
    }
}

// -------------------
// | Running Watcher |
// -------------------

/// A started watcher
pub struct RunningWatcher {
    /// Cancels the server, the refresh loop, and in-flight refreshes
    cancel: CancellationToken,
    /// The exposition server task
    server_handle: JoinHandle<Result<(), ExporterError>>,
    /// The refresh loop task
    refresh_handle: JoinHandle<()>,
    /// The address the exposition server is bound to
    local_addr: SocketAddr,
    /// The registry holding every item's metrics
    registry: Arc<MetricRegistry>,
}

impl RunningWatcher {
    /// The address the exposition server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The registry holding every item's metrics
    pub fn registry(&self) -> Arc<MetricRegistry> {
        self.registry.clone()
    }

    /// Stop refreshing and serving, waiting for both tasks to exit.
    ///
    /// Items whose refresh is interrupted keep their last published value
    pub async fn stop(self) -> Result<(), ExporterError> {
        self.cancel.cancel();

        if let Err(e) = self.refresh_handle.await {
            error!("Refresh loop failed: {e}");
        }

        match self.server_handle.await {
            Ok(res) => res,
            Err(e) => Err(ExporterError::http_server(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Address, U256};

    use super::*;
    use crate::{
        chain_client::mock::MockChainClient,
        config::{TokenConfig, WalletConfig},
    };

    /// The wallet used in tests
    const WALLET: Address = address!("0x0000000000000000000000000000000000000001");

    /// Build a config where one wallet tracks the native asset on each chain
    fn native_config(chains: &[&str]) -> ExporterConfig {
        let native = TokenConfig { contract: String::new(), symbol: "ETH".to_string(), decimal: 18 };
        ExporterConfig {
            chains: chains.iter().map(|c| (c.to_string(), "http://localhost:8545".to_string())).collect(),
            tokens: chains.iter().map(|c| (c.to_string(), vec![native.clone()])).collect(),
            wallets: vec![WalletConfig {
                name: "alice".to_string(),
                address: "0x1".to_string(),
                track_for: chains.iter().map(|c| (c.to_string(), vec!["ETH".to_string()])).collect(),
                labels: BTreeMap::new(),
            }],
        }
    }

    /// Build settings with the given interval and overlap policy
    fn settings(refresh_interval: Duration, overlap_policy: OverlapPolicy) -> WatcherSettings {
        WatcherSettings { refresh_interval, rpc_timeout: Duration::from_secs(60), overlap_policy }
    }

    /// Build a watcher over a single `eth` chain served by a slow mock
    fn slow_watcher(policy: OverlapPolicy) -> (Arc<MockChainClient>, Watcher) {
        let (mock, client) = MockChainClient::new()
            .with_native_balance(WALLET, U256::from(1u64))
            .with_latency(Duration::from_secs(25))
            .into_shared();

        let clients = HashMap::from([("eth".to_string(), client)]);
        let watcher = Watcher::with_clients(
            &native_config(&["eth"]),
            clients,
            settings(Duration::from_secs(10), policy),
        )
        .unwrap();

        (mock, watcher)
    }

    /// Tests that overlapping refreshes of a chain are launched under the
    /// `allow` policy
    #[tokio::test(start_paused = true)]
    async fn test_overlap_allowed() {
        let (mock, watcher) = slow_watcher(OverlapPolicy::Allow);
        let cancel = CancellationToken::new();
        let handle = watcher.spawn_refresh_loop(cancel.clone());

        // Cycles launch at 0s, 10s, and 20s while the first is still running
        tokio::time::sleep(Duration::from_secs(24)).await;
        assert_eq!(mock.num_calls(), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    /// Tests that a chain whose refresh is still running is skipped under the
    /// `skip` policy
    #[tokio::test(start_paused = true)]
    async fn test_overlap_skipped() {
        let (mock, watcher) = slow_watcher(OverlapPolicy::Skip);
        let cancel = CancellationToken::new();
        let handle = watcher.spawn_refresh_loop(cancel.clone());

        // The 10s and 20s cycles are skipped
        tokio::time::sleep(Duration::from_secs(24)).await;
        assert_eq!(mock.num_calls(), 1);

        // The first refresh finishes at 25s, so the 30s cycle launches
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(mock.num_calls(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    /// Tests that chains refresh in parallel
    #[tokio::test(start_paused = true)]
    async fn test_chains_refresh_in_parallel() {
        let (eth_mock, eth_client) = MockChainClient::new()
            .with_native_balance(WALLET, U256::from(1u64))
            .with_latency(Duration::from_secs(10))
            .into_shared();
        let (base_mock, base_client) = MockChainClient::new()
            .with_native_balance(WALLET, U256::from(1u64))
            .with_latency(Duration::from_secs(10))
            .into_shared();

        let clients =
            HashMap::from([("eth".to_string(), eth_client), ("base".to_string(), base_client)]);
        let watcher = Watcher::with_clients(
            &native_config(&["eth", "base"]),
            clients,
            settings(Duration::from_secs(600), OverlapPolicy::Allow),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let handle = watcher.spawn_refresh_loop(cancel.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(eth_mock.num_calls(), 1);
        assert_eq!(base_mock.num_calls(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    /// Tests that a missing client for a declared chain is rejected
    #[test]
    fn test_missing_chain_client() {
        let res = Watcher::with_clients(
            &native_config(&["eth"]),
            HashMap::new(),
            WatcherSettings::default(),
        );
        assert!(matches!(res, Err(ExporterError::MissingChainClient(chain)) if chain == "eth"));
    }

    /// Tests that a zero refresh interval is rejected
    #[test]
    fn test_zero_interval_rejected() {
        let (_, client) = MockChainClient::new().into_shared();
        let res = Watcher::with_clients(
            &native_config(&["eth"]),
            HashMap::from([("eth".to_string(), client)]),
            settings(Duration::ZERO, OverlapPolicy::Allow),
        );
        assert!(matches!(res, Err(ExporterError::ConfigParse(_))));
    }

    /// Tests that an invalid endpoint URL fails construction
    #[test]
    fn test_build_from_config_invalid_url() {
        let mut config = native_config(&["eth"]);
        config.chains.insert("eth".to_string(), "not a url".to_string());

        let res = Watcher::build_from_config(&config, WatcherSettings::default());
        assert!(matches!(res, Err(ExporterError::RpcClient(_))));
    }
}
