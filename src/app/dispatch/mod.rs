//! Completion delivery on a single execution context
//!
//! Transport workers never call user code. They hand finished results to a
//! [`DeliveryQueue`], and the thread that owns the [`CompletionDispatcher`]
//! runs the queued callbacks when it drains the queue, one at a time and in
//! enqueue order. User callbacks therefore never run concurrently with each
//! other and never run on a network thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

use crate::app::reader::{FetchCallback, Fetched};
use crate::constants::dispatch::RUN_LOOP_INTERVAL;

type Delivery = Box<dyn FnOnce() + Send + 'static>;

/// Counters shared by the queue and the dispatcher
#[derive(Debug, Default)]
struct DeliveryCounters {
    queued: AtomicUsize,
    delivered: AtomicU64,
}

/// Sending side: cloneable, usable from any thread
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    sender: UnboundedSender<Delivery>,
    counters: Arc<DeliveryCounters>,
}

impl DeliveryQueue {
    /// Schedule `callback(fetched)` on the delivery context
    ///
    /// If the dispatcher is gone the callback is dropped without running.
    pub fn deliver(&self, callback: FetchCallback, fetched: Fetched) {
        let url = fetched.url.clone();
        self.counters.queued.fetch_add(1, Ordering::AcqRel);
        if self
            .sender
            .send(Box::new(move || callback(fetched)))
            .is_err()
        {
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            warn!("Dropping result for {}: completion dispatcher is gone", url);
        }
    }

    /// Number of callbacks waiting to run
    pub fn pending(&self) -> usize {
        self.counters.queued.load(Ordering::Acquire)
    }
}

/// Receiving side, bound to the thread that created it
#[derive(Debug)]
pub struct CompletionDispatcher {
    receiver: Mutex<UnboundedReceiver<Delivery>>,
    queue: DeliveryQueue,
    owner: ThreadId,
}

impl CompletionDispatcher {
    /// Create a dispatcher whose delivery context is the current thread
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            receiver: Mutex::new(receiver),
            queue: DeliveryQueue {
                sender,
                counters: Arc::new(DeliveryCounters::default()),
            },
            owner: thread::current().id(),
        }
    }

    /// Get a sending handle for transport-side code
    pub fn queue(&self) -> DeliveryQueue {
        self.queue.clone()
    }

    /// Check whether the caller is on the delivery context
    pub fn is_delivery_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Number of callbacks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Total callbacks run so far
    pub fn delivered(&self) -> u64 {
        self.queue.counters.delivered.load(Ordering::Relaxed)
    }

    /// Run every queued callback; returns how many ran
    ///
    /// Calls from any thread other than the delivery context run nothing.
    /// A panicking callback is logged and the panic is resumed; callbacks
    /// queued behind it stay queued for the next drain.
    pub fn run_pending(&self) -> usize {
        if !self.is_delivery_thread() {
            error!(
                "Completion callbacks can only run on the thread that created the reader ({:?})",
                self.owner
            );
            return 0;
        }

        let mut ran = 0;
        loop {
            // Lock only for the receive so a callback may drain re-entrantly
            let next = self.receiver.lock().try_recv();
            let delivery = match next {
                Ok(delivery) => delivery,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            let counters = &self.queue.counters;
            counters.queued.fetch_sub(1, Ordering::AcqRel);
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            ran += 1;

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(delivery)) {
                error!("Fetch callback panicked");
                panic::resume_unwind(payload);
            }
        }

        if ran > 0 {
            debug!("Delivered {} completion(s)", ran);
        }
        ran
    }

    /// Drain the queue repeatedly for `duration`; returns how many ran
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = self.run_pending();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(RUN_LOOP_INTERVAL.min(deadline - now));
            ran += self.run_pending();
        }
        ran
    }
}

impl Default for CompletionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
