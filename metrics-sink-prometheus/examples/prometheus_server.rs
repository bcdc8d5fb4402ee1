use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use metrics_sink_prometheus::{MetricRecord, PrometheusBuilder};
use rand::Rng;

fn main() {
    tracing_subscriber::fmt::init();

    let calls = Arc::new(AtomicU64::new(0));

    // The record source is polled once per collection cycle.  Each port of the RPC server reports
    // under the same record name, and ends up as its own time series.
    let source = {
        let calls = Arc::clone(&calls);
        move || {
            let calls = calls.load(Ordering::Relaxed) as f64;
            vec![
                MetricRecord::new("RpcMetrics")
                    .with_tag("Context", "rpc")
                    .with_tag("Port", "9862")
                    .with_counter("RpcProcessingTimeNumOps", calls)
                    .with_gauge("CallQueueLength", rand::rng().random_range(0.0..16.0)),
                MetricRecord::new("RpcMetrics")
                    .with_tag("Context", "rpc")
                    .with_tag("Port", "9863")
                    .with_counter("RpcProcessingTimeNumOps", calls / 2.0)
                    .with_gauge("CallQueueLength", rand::rng().random_range(0.0..16.0)),
                MetricRecord::new("Rocksdb_om.db").with_gauge("rocksdb.estimate-num-keys", 1024.0),
            ]
        }
    };

    PrometheusBuilder::new()
        .with_record_source(source)
        .set_collection_interval(Duration::from_secs(1))
        .expect("interval is not zero")
        .install()
        .expect("failed to install Prometheus sink");

    // Loop over and over, pretending to do some work.
    loop {
        calls.fetch_add(1, Ordering::Relaxed);
        thread::sleep(Duration::from_millis(750));
    }
}
