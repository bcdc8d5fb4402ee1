use std::collections::HashSet;
#[cfg(feature = "http-listener")]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
#[cfg(feature = "http-listener")]
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
#[cfg(feature = "http-listener")]
use ipnet::IpNet;
use quanta::Clock;

use crate::common::{BuildError, Matcher};
use crate::formatting::sanitize_label_key;
use crate::naming::Canonicalizer;
use crate::record::RecordSource;
use crate::sink::{Inner, PrometheusSink};
use crate::store::SampleStore;
use crate::telemetry::Telemetry;

#[cfg(feature = "http-listener")]
use super::ExporterFuture;

/// Tags that carry nested structure rather than a label value, and are dropped by default.
const DEFAULT_EXCLUDED_TAGS: [&str; 1] = ["numopenconnectionsperuser"];

/// Builder for creating and installing a Prometheus sink/exporter.
pub struct PrometheusBuilder {
    #[cfg(feature = "http-listener")]
    listen_address: SocketAddr,
    #[cfg(feature = "http-listener")]
    allowed_addresses: Option<Vec<IpNet>>,
    #[cfg_attr(not(feature = "http-listener"), allow(dead_code))]
    collection_interval: Duration,
    #[cfg_attr(not(feature = "http-listener"), allow(dead_code))]
    record_source: Option<Arc<dyn RecordSource>>,
    opaque_matchers: Vec<Matcher>,
    excluded_tags: HashSet<String>,
    global_labels: Option<IndexMap<String, String>>,
}

impl PrometheusBuilder {
    /// Creates a new [`PrometheusBuilder`].
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "http-listener")]
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 9000),
            #[cfg(feature = "http-listener")]
            allowed_addresses: None,
            collection_interval: Duration::from_secs(10),
            record_source: None,
            opaque_matchers: Canonicalizer::default_opaque_matchers(),
            excluded_tags: DEFAULT_EXCLUDED_TAGS.iter().map(|tag| normalize_tag(tag)).collect(),
            global_labels: None,
        }
    }

    /// Configures the address of the HTTP listener that functions as a [scrape endpoint].
    ///
    /// The HTTP listener that is spawned will respond to GET requests on any request path, except
    /// for `/health`, which always responds with `OK`.
    ///
    /// Defaults to `0.0.0.0:9000`.
    ///
    /// [scrape endpoint]: https://prometheus.io/docs/instrumenting/exposition_formats/#text-based-format
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    #[must_use]
    pub fn with_http_listener(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.listen_address = addr.into();
        self
    }

    /// Adds an IP address or subnet to the allowlist for the scrape endpoint.
    ///
    /// If a client makes a request to the scrape endpoint and their IP is not present in the
    /// allowlist, either directly or within any of the allowed subnets, they will receive a 403
    /// Forbidden response.  Plain addresses are treated as single-host subnets.
    ///
    /// Defaults to allowing all IPs.
    ///
    /// ## Errors
    ///
    /// If the given address cannot be parsed into an IP address or subnet, an error variant will be
    /// returned describing the error.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    pub fn add_allowed_address<A>(mut self, address: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        use std::str::FromStr;

        let address = address.as_ref();
        let address = IpNet::from_str(address)
            .or_else(|_| IpAddr::from_str(address).map(IpNet::from))
            .map_err(|e| BuildError::InvalidAllowlistAddress(e.to_string()))?;
        self.allowed_addresses.get_or_insert(vec![]).push(address);

        Ok(self)
    }

    /// Sets the source that records are collected from on every collection cycle.
    ///
    /// When no source is set, no collection task is spawned, and records must be handed to the
    /// sink with [`PrometheusSink::put_records`].
    #[must_use]
    pub fn with_record_source<S>(mut self, source: S) -> Self
    where
        S: RecordSource + 'static,
    {
        self.record_source = Some(Arc::new(source));
        self
    }

    /// Sets the interval between two collection cycles.
    ///
    /// Defaults to 10 seconds.
    ///
    /// ## Errors
    ///
    /// If the interval given is zero, an error variant will be thrown.
    pub fn set_collection_interval(mut self, interval: Duration) -> Result<Self, BuildError> {
        if interval.is_zero() {
            return Err(BuildError::ZeroCollectionInterval);
        }

        self.collection_interval = interval;
        Ok(self)
    }

    /// Adds a matcher for record names that are already formatted upstream.
    ///
    /// Records whose name matches, ignoring case, are exposed by only lowercasing the record and
    /// metric names, instead of splitting them on case transitions.
    ///
    /// Defaults to names starting with `rocksdb_` or containing a `.`.
    #[must_use]
    pub fn add_opaque_record_matcher(mut self, matcher: Matcher) -> Self {
        self.opaque_matchers.push(matcher);
        self
    }

    /// Removes all matchers for pre-formatted record names, including the default ones.
    #[must_use]
    pub fn clear_opaque_record_matchers(mut self) -> Self {
        self.opaque_matchers.clear();
        self
    }

    /// Excludes a record tag from the labels of every sample.
    ///
    /// Tags are compared after being converted to label keys, so the comparison ignores case.
    ///
    /// Defaults to excluding `NumOpenConnectionsPerUser`, whose values are nested maps.
    #[must_use]
    pub fn exclude_tag<N>(mut self, name: N) -> Self
    where
        N: AsRef<str>,
    {
        self.excluded_tags.insert(normalize_tag(name.as_ref()));
        self
    }

    /// Removes all tag exclusions, including the default ones.
    #[must_use]
    pub fn clear_excluded_tags(mut self) -> Self {
        self.excluded_tags.clear();
        self
    }

    /// Adds a global label to this sink.
    ///
    /// Global labels are applied to all metrics.  Tags defined on the record itself have precedence
    /// over any global labels.  If this method is called multiple times, the latest value for a
    /// given label key will be used.
    #[must_use]
    pub fn add_global_label<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let labels = self.global_labels.get_or_insert_with(IndexMap::new);
        labels.insert(sanitize_label_key(key.as_ref()), value.into());
        self
    }

    /// Builds the sink and exporter and installs them.
    ///
    /// When called from within a Tokio runtime, the exporter future is spawned directly into the
    /// runtime.  Otherwise, a new single-threaded Tokio runtime is created on a background thread,
    /// and the exporter is spawned there.
    ///
    /// ## Errors
    ///
    /// If there is an error while either building or installing the sink and exporter, an error
    /// variant will be returned describing the error.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    pub fn install(self) -> Result<PrometheusSink, BuildError> {
        use tokio::runtime;

        let sink = if let Ok(handle) = runtime::Handle::try_current() {
            let (sink, exporter) = {
                let _g = handle.enter();
                self.build()?
            };

            handle.spawn(log_exporter_errors(exporter));

            sink
        } else {
            let runtime = runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            let (sink, exporter) = {
                let _g = runtime.enter();
                self.build()?
            };

            thread::Builder::new()
                .name("metrics-sink-prometheus-http".to_string())
                .spawn(move || runtime.block_on(log_exporter_errors(exporter)))
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            sink
        };

        Ok(sink)
    }

    /// Builds the sink and exporter and returns them both.
    ///
    /// If a record source was configured, a collection task is spawned that merges its records
    /// into the sink once per collection interval.
    ///
    /// In most cases, users should prefer to use [`install`][PrometheusBuilder::install] to create
    /// and install the sink and exporter automatically for them.  If a caller needs to schedule the
    /// exporter to run in a particular way, this method, or
    /// [`build_sink`][PrometheusBuilder::build_sink], provide the flexibility to do so.
    ///
    /// ## Panics
    ///
    /// This method must be called from within an existing Tokio runtime or it will panic.
    ///
    /// ## Errors
    ///
    /// If there is an error while building the sink and exporter, an error variant will be
    /// returned describing the error.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    pub fn build(mut self) -> Result<(PrometheusSink, ExporterFuture), BuildError> {
        let listen_address = self.listen_address;
        let allowed_addresses = self.allowed_addresses.take();
        let record_source = self.record_source.take();
        let collection_interval = self.collection_interval;

        let sink = self.build_sink();

        let exporter = super::http_listener::new_http_listener(
            sink.handle(),
            listen_address,
            allowed_addresses,
        )?;

        if let Some(source) = record_source {
            tokio::spawn(super::collector::run_collection(
                sink.clone(),
                source,
                collection_interval,
            ));
        }

        Ok((sink, exporter))
    }

    /// Builds the sink and returns it.
    ///
    /// No exporter or collection task is started.
    pub fn build_sink(self) -> PrometheusSink {
        let inner = Inner {
            store: SampleStore::new(),
            canonicalizer: Canonicalizer::new(self.opaque_matchers),
            global_labels: self.global_labels.unwrap_or_default(),
            excluded_tags: self.excluded_tags,
            clock: Clock::new(),
            telemetry: Telemetry::new(),
        };

        PrometheusSink::from(inner)
    }
}

impl Default for PrometheusBuilder {
    fn default() -> Self {
        PrometheusBuilder::new()
    }
}

fn normalize_tag(name: &str) -> String {
    sanitize_label_key(&name.to_lowercase())
}

#[cfg(feature = "http-listener")]
async fn log_exporter_errors(exporter: ExporterFuture) {
    if let Err(e) = exporter.await {
        tracing::error!("Prometheus exporter stopped: {}", e);
    }
}
