mod latch;
mod routing;

pub use latch::{SpinLatch, SpinLatchGuard};
pub use routing::{HashRouter, PartitionRouter, PartitionRouting};

use crate::backend::{BackendVisitor, KvStore};
use crate::request::TxRequest;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
struct PartitionTelemetry {
    enqueued: AtomicU64,
    flushed: AtomicU64,
    batches: AtomicU64,
    store_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionMetrics {
    pub enqueued: u64,
    pub flushed: u64,
    pub batches: u64,
    pub store_failures: u64,
    pub pending: u64,
}

impl PartitionMetrics {
    pub fn merge(self, other: PartitionMetrics) -> PartitionMetrics {
        PartitionMetrics {
            enqueued: self.enqueued + other.enqueued,
            flushed: self.flushed + other.flushed,
            batches: self.batches + other.batches,
            store_failures: self.store_failures + other.store_failures,
            pending: self.pending + other.pending,
        }
    }
}

/// One request partition: producers append to the pending queue under a spin
/// latch, and a single flusher swaps it with the flush queue and drains that
/// through the backend.
pub struct Partition {
    index: usize,
    pending: SpinLatch<Vec<Arc<TxRequest>>>,
    flush: Mutex<Vec<Arc<TxRequest>>>,
    visitor: BackendVisitor,
    telemetry: PartitionTelemetry,
}

impl Partition {
    pub fn new(
        namespace: &str,
        index: usize,
        queue_capacity: usize,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            index,
            pending: SpinLatch::new(Vec::with_capacity(queue_capacity)),
            flush: Mutex::new(Vec::with_capacity(queue_capacity)),
            visitor: BackendVisitor::new(namespace, index, store),
            telemetry: PartitionTelemetry::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn namespace(&self) -> &str {
        self.visitor.namespace()
    }

    pub fn enqueue(&self, request: Arc<TxRequest>) {
        self.pending.lock().push(request);
        self.telemetry.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Flushes everything enqueued before the swap and returns how many
    /// requests were completed. Requests enqueued during the flush wait for
    /// the next call.
    pub fn visit(&self) -> usize {
        let mut flush = self.flush.lock();
        {
            let mut pending = self.pending.lock();
            std::mem::swap(&mut *pending, &mut *flush);
        }
        if flush.is_empty() {
            return 0;
        }
        let outcome = self.visitor.invoke(&flush);
        flush.clear();

        self.telemetry
            .flushed
            .fetch_add(outcome.flushed as u64, Ordering::Relaxed);
        self.telemetry.batches.fetch_add(1, Ordering::Relaxed);
        if outcome.store_failed {
            self.telemetry.store_failures.fetch_add(1, Ordering::Relaxed);
        }
        trace!(
            namespace = self.namespace(),
            partition = self.index,
            flushed = outcome.flushed,
            "partition visited"
        );
        outcome.flushed
    }

    /// Visits until `request` is complete. Another thread flushing the same
    /// queue holds the flush lock until its replies are decoded, so this
    /// terminates once the request has been enqueued here.
    pub fn visit_until_ready(&self, request: &TxRequest) -> usize {
        let mut flushed = 0;
        while !request.is_ready() {
            flushed += self.visit();
        }
        flushed
    }

    pub fn metrics(&self) -> PartitionMetrics {
        PartitionMetrics {
            enqueued: self.telemetry.enqueued.load(Ordering::Relaxed),
            flushed: self.telemetry.flushed.load(Ordering::Relaxed),
            batches: self.telemetry.batches.load(Ordering::Relaxed),
            store_failures: self.telemetry.store_failures.load(Ordering::Relaxed),
            pending: self.pending_len() as u64,
        }
    }
}

/// Builds `count` partitions over one namespace.
pub(crate) fn build_partitions(
    namespace: &str,
    count: usize,
    queue_capacity: usize,
    store: &Arc<dyn KvStore>,
) -> Vec<Partition> {
    (0..count)
        .map(|index| Partition::new(namespace, index, queue_capacity, Arc::clone(store)))
        .collect()
}
