//! Single-flight execution
//!
//! At most one operation is in flight per [`SingleFlight`] instance. Callers
//! that arrive while it is pending receive a clone of the same shared future.
//! The slot is cleared by the operation itself, after its output is produced
//! and before any caller observes that output, so the first caller after
//! settlement always starts a fresh operation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::trace;

/// Handle to a pending (or settled) single-flight operation
pub type Flight<T> = Shared<BoxFuture<'static, T>>;

struct Slot<T: Clone> {
    id: u64,
    future: Flight<T>,
}

/// Deduplicates concurrent executions of one operation
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    slot: Arc<Mutex<Option<Slot<T>>>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    /// Create an idle single-flight group
    #[must_use]
    pub fn new() -> Self {
        Self { slot: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(0) }
    }

    /// Join the pending operation, or start one with `start`
    ///
    /// `start` runs under the slot lock only to construct the future; it must
    /// not call back into this group. The returned handle is lazy: the
    /// operation makes progress while at least one caller polls it.
    pub fn run<F, Fut>(&self, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(pending) = slot.as_ref() {
            trace!(flight_id = pending.id, "joining in-flight operation");
            return pending.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let operation = start();
        let shared_slot = Arc::clone(&self.slot);

        let future = async move {
            let output = operation.await;
            let mut slot = shared_slot.lock();
            if slot.as_ref().is_some_and(|pending| pending.id == id) {
                *slot = None;
            }
            output
        }
        .boxed()
        .shared();

        trace!(flight_id = id, "started new operation");
        *slot = Some(Slot { id, future: future.clone() });
        future
    }

    /// Whether an operation is currently pending
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Number of operations started over the lifetime of this group
    pub fn started(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}
