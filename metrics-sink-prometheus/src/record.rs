//! Metric records, as produced by an application's internal metrics system.

/// Metric kind.
///
/// Only the kinds that have a direct Prometheus counterpart in the text format are carried.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
}

impl MetricKind {
    /// Gets the name of this kind as used by the `# TYPE` line of the exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// A tag attached to a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    name: String,
    value: String,
}

impl Tag {
    /// Creates a new [`Tag`].
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self { name: name.into(), value: value.into() }
    }

    /// Name of the tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the tag.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A single named value within a record.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricValue {
    name: String,
    value: f64,
    kind: MetricKind,
}

impl MetricValue {
    /// Creates a new [`MetricValue`].
    pub fn new<N>(name: N, value: f64, kind: MetricKind) -> Self
    where
        N: Into<String>,
    {
        Self { name: name.into(), value, kind }
    }

    /// Name of the metric, relative to its record.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Kind of the metric.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }
}

/// A snapshot of one instrumented component.
///
/// Records are produced fresh on every collection cycle.  All metrics within a record share the
/// record's tags, which become the labels of every sample derived from it.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    name: String,
    tags: Vec<Tag>,
    metrics: Vec<MetricValue>,
}

impl MetricRecord {
    /// Creates an empty record with the given name.
    pub fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        Self { name: name.into(), tags: Vec::new(), metrics: Vec::new() }
    }

    /// Creates a record from all of its parts.
    pub fn from_parts<N>(name: N, tags: Vec<Tag>, metrics: Vec<MetricValue>) -> Self
    where
        N: Into<String>,
    {
        Self { name: name.into(), tags, metrics }
    }

    /// Adds a tag to this record.
    #[must_use]
    pub fn with_tag<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags.push(Tag::new(name, value));
        self
    }

    /// Adds a counter value to this record.
    #[must_use]
    pub fn with_counter<N>(mut self, name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        self.metrics.push(MetricValue::new(name, value, MetricKind::Counter));
        self
    }

    /// Adds a gauge value to this record.
    #[must_use]
    pub fn with_gauge<N>(mut self, name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        self.metrics.push(MetricValue::new(name, value, MetricKind::Gauge));
        self
    }

    /// Name of the record.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags of the record, in the order they were added.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Metrics of the record, in the order they were added.
    pub fn metrics(&self) -> &[MetricValue] {
        &self.metrics
    }
}

/// A producer of metric records.
///
/// The collection task calls [`collect`](RecordSource::collect) once per cycle and merges
/// everything it returns.  Closures returning a `Vec<MetricRecord>` are record sources as well.
pub trait RecordSource: Send + Sync {
    /// Collects the current set of records.
    fn collect(&self) -> Vec<MetricRecord>;
}

impl<F> RecordSource for F
where
    F: Fn() -> Vec<MetricRecord> + Send + Sync,
{
    fn collect(&self) -> Vec<MetricRecord> {
        (self)()
    }
}
