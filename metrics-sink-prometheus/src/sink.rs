use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use indexmap::IndexMap;
use quanta::Clock;
use tracing::debug;

use crate::formatting::{render, sanitize_label_key, write_to};
use crate::naming::Canonicalizer;
use crate::record::{MetricRecord, RecordSource};
use crate::store::{LabelSet, MetricFamily, SampleStore, SampleUpdate};
use crate::telemetry::Telemetry;

pub(crate) struct Inner {
    pub store: SampleStore,
    pub canonicalizer: Canonicalizer,
    pub global_labels: IndexMap<String, String>,
    pub excluded_tags: HashSet<String>,
    pub clock: Clock,
    pub telemetry: Telemetry,
}

impl Inner {
    /// Builds the labels for all samples of a record.
    ///
    /// Tag names are lowercased and sanitized into label keys.  Tags take precedence over global
    /// labels with the same key.
    fn labels_for(&self, record: &MetricRecord) -> LabelSet {
        let mut labels = LabelSet::new();
        for (key, value) in &self.global_labels {
            labels.insert(key.as_str(), value.as_str());
        }

        for tag in record.tags() {
            let key = sanitize_label_key(&tag.name().to_lowercase());
            if self.excluded_tags.contains(&key) {
                continue;
            }
            labels.insert(key, tag.value());
        }

        labels
    }

    fn put_records(&self, records: &[MetricRecord]) {
        let start = self.clock.now();

        let mut updates = Vec::new();
        for record in records {
            let labels = self.labels_for(record);
            for metric in record.metrics() {
                updates.push(SampleUpdate {
                    name: self.canonicalizer.canonicalize(record.name(), metric.name()),
                    kind: metric.kind(),
                    labels: labels.clone(),
                    value: metric.value(),
                });
            }
        }

        let outcome = self.store.merge(updates);
        let delta = self.clock.now() - start;

        debug!(
            records = records.len(),
            samples = outcome.samples,
            kind_conflicts = outcome.kind_conflicts,
            "Merged metric records."
        );
        self.telemetry.track_merge(
            records.len(),
            outcome.samples,
            outcome.kind_conflicts,
            delta.as_secs_f64(),
        );
    }
}

/// A Prometheus sink.
///
/// Accepts metric records, turns them into Prometheus samples and keeps the latest value of every
/// time series.  Rendering happens through a [`PrometheusHandle`], which can be cloned and shared
/// with whatever serves the scrape endpoint.
#[derive(Clone)]
pub struct PrometheusSink {
    inner: Arc<Inner>,
}

impl PrometheusSink {
    /// Gets a [`PrometheusHandle`] to this sink.
    pub fn handle(&self) -> PrometheusHandle {
        PrometheusHandle { inner: self.inner.clone() }
    }

    /// Merges a batch of records, as collected during one cycle.
    ///
    /// Every metric of every record becomes one sample named after the record and the metric, and
    /// labelled with the record's tags.  The whole batch is applied atomically with respect to
    /// concurrent renders.
    pub fn put_records(&self, records: &[MetricRecord]) {
        self.inner.put_records(records);
    }

    /// Collects records from the given source and merges them.
    pub fn collect_from<S>(&self, source: &S)
    where
        S: RecordSource + ?Sized,
    {
        let records = source.collect();
        self.inner.put_records(&records);
    }
}

impl From<Inner> for PrometheusSink {
    fn from(inner: Inner) -> Self {
        PrometheusSink { inner: Arc::new(inner) }
    }
}

/// Handle to [`PrometheusSink`].
///
/// Useful for exposing a scrape endpoint on an existing HTTP/HTTPS server.
#[derive(Clone)]
pub struct PrometheusHandle {
    inner: Arc<Inner>,
}

impl PrometheusHandle {
    /// Takes a consistent copy of all metric families.
    pub fn snapshot(&self) -> Vec<MetricFamily> {
        self.inner.store.snapshot()
    }

    /// Returns the metrics in Prometheus accepted String format.
    pub fn render(&self) -> String {
        self.inner.telemetry.track_scrape();
        render(&self.snapshot())
    }

    /// Renders the metrics and writes them to `writer`.
    ///
    /// ## Errors
    ///
    /// If the writer fails, the error is returned as-is.
    pub fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: io::Write,
    {
        self.inner.telemetry.track_scrape();
        write_to(&self.snapshot(), writer)
    }
}
