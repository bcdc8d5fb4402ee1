use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::{PrometheusSink, RecordSource};

/// Runs one collection cycle per `period`, forever.
///
/// The first cycle runs immediately.  A cycle that overruns its period delays the following one
/// instead of triggering a burst of catch-up cycles.  Each cycle runs on the blocking pool, so a
/// slow source never stalls the scrape endpoint, and a panicking source only loses that cycle.
pub(super) async fn run_collection(
    sink: PrometheusSink,
    source: Arc<dyn RecordSource>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(?period, "Starting metric record collection.");

    loop {
        ticker.tick().await;

        let sink = sink.clone();
        let source = Arc::clone(&source);
        if let Err(e) = task::spawn_blocking(move || sink.collect_from(source.as_ref())).await {
            error!(error = %e, "Metric record collection cycle failed. Skipping to the next cycle.");
        }
    }
}
