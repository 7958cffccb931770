//! Background task that keeps flushing partitions so callers of the
//! `enqueue_*` methods only have to wait on their requests.

use crate::config::PollerConfig;
use crate::version_db::VersionDb;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct PollerTelemetry {
    rounds: AtomicU64,
    flushed: AtomicU64,
}

pub struct PartitionPoller {
    shutdown: Arc<Notify>,
    telemetry: Arc<PollerTelemetry>,
    handle: Option<JoinHandle<()>>,
}

impl PartitionPoller {
    /// Spawns the poll loop on the current tokio runtime.
    pub fn spawn(db: Arc<VersionDb>, config: PollerConfig) -> Self {
        let shutdown = Arc::new(Notify::new());
        let telemetry = Arc::new(PollerTelemetry::default());
        let loop_shutdown = Arc::clone(&shutdown);
        let loop_telemetry = Arc::clone(&telemetry);
        let handle = tokio::spawn(async move {
            // tokio intervals reject a zero period.
            let period = config.interval.max(Duration::from_micros(1));
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = loop_shutdown.notified() => break,
                    _ = ticker.tick() => {}
                }
                let flushed = visit_all_blocking(&db);
                loop_telemetry.rounds.fetch_add(1, Ordering::Relaxed);
                if flushed > 0 {
                    loop_telemetry
                        .flushed
                        .fetch_add(flushed as u64, Ordering::Relaxed);
                    trace!(flushed, "poller round");
                }
            }
            // Drain whatever was queued before shutdown.
            let flushed = visit_all_blocking(&db);
            debug!(flushed, "partition poller stopped");
        });
        Self {
            shutdown,
            telemetry,
            handle: Some(handle),
        }
    }

    pub fn rounds(&self) -> u64 {
        self.telemetry.rounds.load(Ordering::Relaxed)
    }

    pub fn flushed(&self) -> u64 {
        self.telemetry.flushed.load(Ordering::Relaxed)
    }

    /// Stops the loop after a final flush and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// Flushing does synchronous store I/O; keep it off the async workers where the
// runtime allows it.
fn visit_all_blocking(db: &VersionDb) -> usize {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| db.visit_all()),
        _ => db.visit_all(),
    }
}

impl Drop for PartitionPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
