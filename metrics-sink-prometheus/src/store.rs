//! Shared storage of the latest sample for every known time series.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::warn;

use crate::record::MetricKind;

/// An ordered set of labels.
///
/// Labels keep the order in which they were first inserted, which is the order they are rendered
/// in.  Identity, however, only depends on the label keys and values: two sets holding the same
/// pairs in a different order are equal and hash identically.
#[derive(Clone, Debug, Default)]
pub struct LabelSet {
    labels: IndexMap<String, String>,
}

impl LabelSet {
    /// Creates an empty [`LabelSet`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a label.
    ///
    /// If the key is already present, its value is replaced and its position is kept.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels.insert(key.into(), value.into());
    }

    /// Gets the value for the given label key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Iterates over the labels, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether or not there are any labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl PartialEq for LabelSet {
    fn eq(&self, other: &Self) -> bool {
        // `IndexMap` equality ignores ordering.
        self.labels == other.labels
    }
}

impl Eq for LabelSet {}

impl Hash for LabelSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut pairs = self.labels.iter().collect::<Vec<_>>();
        pairs.sort_unstable();
        pairs.hash(state);
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = LabelSet::new();
        for (k, v) in iter {
            labels.insert(k, v);
        }
        labels
    }
}

/// The latest value of a single time series.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    labels: LabelSet,
    value: f64,
}

impl Sample {
    /// Labels of this sample.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Latest value of this sample.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// All time series sharing one metric name.
#[derive(Clone, Debug)]
pub struct MetricFamily {
    name: String,
    kind: MetricKind,
    samples: IndexMap<LabelSet, Sample>,
    kind_conflict_logged: bool,
}

impl MetricFamily {
    fn new(name: String, kind: MetricKind) -> Self {
        Self { name, kind, samples: IndexMap::new(), kind_conflict_logged: false }
    }

    /// Metric name of this family.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of this family, as fixed by the first sample ever merged into it.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Iterates over the samples of this family, in the order they were first seen.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    /// Gets the sample for the given labels.
    pub fn get(&self, labels: &LabelSet) -> Option<&Sample> {
        self.samples.get(labels)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether or not this family holds any samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A single value to be merged into a [`SampleStore`].
#[derive(Clone, Debug)]
pub struct SampleUpdate {
    /// Canonical metric name.
    pub name: String,
    /// Kind of the metric.
    pub kind: MetricKind,
    /// Labels identifying the time series.
    pub labels: LabelSet,
    /// Latest value.
    pub value: f64,
}

/// Summary of a single [`SampleStore::merge`] call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MergeOutcome {
    /// Number of samples merged.
    pub samples: usize,
    /// Number of samples whose kind disagreed with the kind of their family.
    pub kind_conflicts: usize,
}

/// Latest samples for every metric family seen so far.
///
/// Families are created on first sighting and are never removed: a metric that stops being
/// reported keeps its last known samples.  Writers are serialized against each other and against
/// readers, so a snapshot never observes a partially applied merge.
#[derive(Debug, Default)]
pub struct SampleStore {
    families: RwLock<IndexMap<String, MetricFamily>>,
}

impl SampleStore {
    /// Creates an empty [`SampleStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the given updates.
    ///
    /// An update with the same name and labels as an existing sample replaces its value; any other
    /// update adds a new sample.  The write lock is held for the whole call.
    pub fn merge<I>(&self, updates: I) -> MergeOutcome
    where
        I: IntoIterator<Item = SampleUpdate>,
    {
        let mut outcome = MergeOutcome::default();
        let mut families = self.families.write();

        for SampleUpdate { name, kind, labels, value } in updates {
            let family = families
                .entry(name)
                .or_insert_with_key(|name| MetricFamily::new(name.clone(), kind));

            if family.kind != kind {
                // Only the first conflict of a family is logged, as it recurs on every cycle.
                if !family.kind_conflict_logged {
                    family.kind_conflict_logged = true;
                    warn!(
                        metric = family.name.as_str(),
                        registered = family.kind.as_str(),
                        reported = kind.as_str(),
                        "Metric reported with a kind different from its first registration. Keeping the original kind."
                    );
                }
                outcome.kind_conflicts += 1;
            }

            match family.samples.get_mut(&labels) {
                Some(sample) => sample.value = value,
                None => {
                    family.samples.insert(labels.clone(), Sample { labels, value });
                }
            }
            outcome.samples += 1;
        }

        outcome
    }

    /// Takes a consistent copy of every family, in the order they were first seen.
    pub fn snapshot(&self) -> Vec<MetricFamily> {
        self.families.read().values().cloned().collect()
    }

    /// Number of families.
    pub fn len(&self) -> usize {
        self.families.read().len()
    }

    /// Whether or not any family has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.families.read().is_empty()
    }
}
