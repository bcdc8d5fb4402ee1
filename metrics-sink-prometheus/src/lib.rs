//! A sink that exposes record-based application metrics in the Prometheus exposition format.
//!
//! Applications instrumented with a record-oriented metrics system report their state as
//! [`MetricRecord`]s: a record name, a set of tags, and a set of named counter and gauge values.
//! This crate turns those records into Prometheus time series and serves them to scrapers.
//!
//! ## Naming
//!
//! Every `(record, metric)` pair is mapped to a single metric name by a [`Canonicalizer`]:
//! camel-cased names are split into lowercase tokens (`RpcTime` + `SomeMetrics` becomes
//! `rpc_time_some_metrics`, `OMRpcTime` + `OMInfoKeys` becomes `om_rpc_time_om_info_keys`), while
//! records matching one of the configured opaque [`Matcher`]s keep their pre-formatted names and
//! are only lowercased (`Rocksdb_om.db` + `num_open_connections` becomes
//! `rocksdb_om.db_num_open_connections`).
//!
//! ## Labels and merging
//!
//! The tags of a record become the labels of every sample derived from it, with tag names
//! lowercased.  Records reporting the same metric name with different tags produce distinct time
//! series, while reporting the same name and tags again replaces the previous value.  Metrics that
//! stop being reported keep their last value.
//!
//! ## Usage
//!
//! With a record source configured, [`PrometheusBuilder::install`] spawns both the collection task
//! and an HTTP listener serving the scrape endpoint:
//!
//! ```no_run
//! # use metrics_sink_prometheus::{MetricRecord, PrometheusBuilder};
//! let source = || {
//!     vec![MetricRecord::new("RpcMetrics")
//!         .with_tag("port", "9862")
//!         .with_gauge("CallQueueLength", 3.0)]
//! };
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([127, 0, 0, 1], 9000))
//!     .with_record_source(source)
//!     .install()
//!     .expect("failed to install Prometheus sink");
//! ```
//!
//! Alternatively, [`PrometheusBuilder::build_sink`] returns a bare [`PrometheusSink`], which can be
//! fed with [`PrometheusSink::put_records`] and rendered through its [`PrometheusHandle`].
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
pub use self::common::{BuildError, Matcher};

pub mod formatting;

mod naming;
pub use self::naming::{Canonicalizer, NamingMode};

mod record;
pub use self::record::{MetricKind, MetricRecord, MetricValue, RecordSource, Tag};

mod store;
pub use self::store::{LabelSet, MergeOutcome, MetricFamily, Sample, SampleStore, SampleUpdate};

mod sink;
pub use self::sink::{PrometheusHandle, PrometheusSink};

mod telemetry;

mod exporter;
pub use self::exporter::builder::PrometheusBuilder;
#[cfg(feature = "http-listener")]
pub use self::exporter::{ExporterError, ExporterFuture};
