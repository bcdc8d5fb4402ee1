use metrics::{counter, histogram, Counter, Histogram};

/// Sink telemetry.
///
/// Reported through whichever `metrics` recorder is installed globally when the sink is built.  If
/// none is installed, all of these are no-ops.
pub(crate) struct Telemetry {
    records_merged: Counter,
    samples_merged: Counter,
    kind_conflicts: Counter,
    merge_duration: Histogram,
    scrapes: Counter,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            records_merged: counter!("prometheus_sink_records_merged"),
            samples_merged: counter!("prometheus_sink_samples_merged"),
            kind_conflicts: counter!("prometheus_sink_kind_conflicts"),
            merge_duration: histogram!("prometheus_sink_merge_duration_seconds"),
            scrapes: counter!("prometheus_sink_scrapes"),
        }
    }

    pub fn track_merge(&self, records: usize, samples: usize, kind_conflicts: usize, secs: f64) {
        self.records_merged.increment(records as u64);
        self.samples_merged.increment(samples as u64);
        if kind_conflicts > 0 {
            self.kind_conflicts.increment(kind_conflicts as u64);
        }
        self.merge_duration.record(secs);
    }

    pub fn track_scrape(&self) {
        self.scrapes.increment(1);
    }
}
