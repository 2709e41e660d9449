//! The metric registry backing the exposition endpoint
//!
//! The registry wraps a Prometheus recorder that is owned rather than
//! installed as the global `metrics` recorder, so each watcher (and each
//! test) gets an isolated set of gauges. Handles returned from registration
//! write straight into the recorder's atomic storage; rendering reads the
//! same storage, so scrapes never block a refresh and vice versa.

use std::collections::HashSet;

use itertools::Itertools;
use metrics::{Counter, Gauge, Key, Label, Level, Metadata, Recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::{balance::FAILED_FETCH_SENTINEL, error::ExporterError};

use self::labels::{
    TOKEN_BALANCE_FETCH_ERRORS_METRIC_NAME, TOKEN_BALANCE_METRIC_NAME,
    TOKEN_BALANCE_UP_METRIC_NAME,
};

pub mod labels;

/// An ordered set of metric labels
pub type LabelSet = Vec<(String, String)>;

/// The metadata attached to every metric registered by the exporter
fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

// ----------------
// | Item Metrics |
// ----------------

/// The metric handles bound to a single watch item
#[derive(Clone)]
pub struct ItemMetrics {
    /// The scaled balance
    balance: Gauge,
    /// Whether the last fetch succeeded
    up: Gauge,
    /// The number of failed fetches
    fetch_errors: Counter,
}

impl ItemMetrics {
    /// Publish a successfully fetched balance
    pub fn record_success(&self, balance: f64) {
        self.balance.set(balance);
        self.up.set(1.0);
    }

    /// Publish a failed fetch
    pub fn record_failure(&self) {
        self.balance.set(FAILED_FETCH_SENTINEL);
        self.up.set(0.0);
        self.fetch_errors.increment(1);
    }
}

// ------------
// | Registry |
// ------------

/// The set of exported metrics, keyed by label set
pub struct MetricRegistry {
    /// The recorder owning metric storage
    recorder: PrometheusRecorder,
    /// A handle used to render the recorder's contents
    handle: PrometheusHandle,
    /// The label sets registered so far
    registered: HashSet<LabelSet>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        recorder.describe_gauge(
            TOKEN_BALANCE_METRIC_NAME.into(),
            None,
            "Wallet balance scaled by token decimals, -1 if the last fetch failed".into(),
        );
        recorder.describe_gauge(
            TOKEN_BALANCE_UP_METRIC_NAME.into(),
            None,
            "1 if the last balance fetch succeeded, 0 otherwise".into(),
        );
        recorder.describe_counter(
            TOKEN_BALANCE_FETCH_ERRORS_METRIC_NAME.into(),
            None,
            "Number of failed balance fetches".into(),
        );

        Self { recorder, handle, registered: HashSet::new() }
    }

    /// Register the metrics for one watch item.
    ///
    /// Fails if another item already registered the same label set, since the
    /// two would be indistinguishable to a scraper
    pub fn register_item(&mut self, labels: &LabelSet) -> Result<ItemMetrics, ExporterError> {
        let mut canonical = labels.clone();
        canonical.sort();
        if !self.registered.insert(canonical) {
            return Err(ExporterError::duplicate_metric(format!(
                "{TOKEN_BALANCE_METRIC_NAME}{}",
                format_labels(labels)
            )));
        }

        let key_labels: Vec<Label> =
            labels.iter().map(|(k, v)| Label::new(k.clone(), v.clone())).collect();
        let key = |name: &'static str| Key::from_parts(name, key_labels.clone());
        let metadata = metadata();

        Ok(ItemMetrics {
            balance: self.recorder.register_gauge(&key(TOKEN_BALANCE_METRIC_NAME), &metadata),
            up: self.recorder.register_gauge(&key(TOKEN_BALANCE_UP_METRIC_NAME), &metadata),
            fetch_errors: self
                .recorder
                .register_counter(&key(TOKEN_BALANCE_FETCH_ERRORS_METRIC_NAME), &metadata),
        })
    }

    /// The number of watch items registered
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Whether no watch items are registered
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Format a label set the way Prometheus prints it
fn format_labels(labels: &LabelSet) -> String {
    format!("{{{}}}", labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).join(","))
}

#[cfg(any(test, feature = "mocks"))]
pub mod test_utils {
    //! Helpers for reading values back out of rendered metrics

    /// Find the value of the sample `name` whose labels include every pair in
    /// `labels`
    pub fn sample_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let prefix = format!("{name}{{");
        rendered
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .find(|line| labels.iter().all(|(k, v)| line.contains(&format!("{k}=\"{v}\""))))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::{test_utils::sample_value, *};

    /// Build a label set from string pairs
    fn label_set(pairs: &[(&str, &str)]) -> LabelSet {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// Tests that a registered gauge is rendered with its labels and value
    #[test]
    fn test_register_and_render() {
        let mut registry = MetricRegistry::new();
        let metrics =
            registry.register_item(&label_set(&[("chain", "eth"), ("symbol", "USDC")])).unwrap();
        metrics.record_success(5.0);

        let rendered = registry.render();
        let labels = [("chain", "eth"), ("symbol", "USDC")];
        assert_eq!(sample_value(&rendered, TOKEN_BALANCE_METRIC_NAME, &labels), Some(5.0));
        assert_eq!(sample_value(&rendered, TOKEN_BALANCE_UP_METRIC_NAME, &labels), Some(1.0));
        assert_eq!(registry.len(), 1);
    }

    /// Tests that a failure publishes the sentinel and bumps the error counter
    #[test]
    fn test_record_failure() {
        let mut registry = MetricRegistry::new();
        let metrics = registry.register_item(&label_set(&[("chain", "eth")])).unwrap();
        metrics.record_success(3.0);
        metrics.record_failure();
        metrics.record_failure();

        let rendered = registry.render();
        let labels = [("chain", "eth")];
        assert_eq!(sample_value(&rendered, TOKEN_BALANCE_METRIC_NAME, &labels), Some(-1.0));
        assert_eq!(sample_value(&rendered, TOKEN_BALANCE_UP_METRIC_NAME, &labels), Some(0.0));
        assert_eq!(
            sample_value(&rendered, TOKEN_BALANCE_FETCH_ERRORS_METRIC_NAME, &labels),
            Some(2.0)
        );
    }

    /// Tests that the same label set cannot be registered twice, regardless of
    /// label order
    #[test]
    fn test_duplicate_label_set() {
        let mut registry = MetricRegistry::new();
        registry.register_item(&label_set(&[("chain", "eth"), ("wallet", "0x1")])).unwrap();

        let res = registry.register_item(&label_set(&[("wallet", "0x1"), ("chain", "eth")]));
        assert!(matches!(res, Err(ExporterError::DuplicateMetric(_))));
        assert_eq!(registry.len(), 1);
    }

    /// Tests that registries are isolated from one another
    #[test]
    fn test_registries_are_isolated() {
        let mut first = MetricRegistry::new();
        let second = MetricRegistry::new();
        first.register_item(&label_set(&[("chain", "eth")])).unwrap().record_success(1.0);

        assert!(sample_value(&second.render(), TOKEN_BALANCE_METRIC_NAME, &[]).is_none());
        assert!(second.is_empty());
    }
}
