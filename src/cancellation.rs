use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Single-fire cooperative cancellation signal.
///
/// The signal channel never carries a message; a completed receive can
/// only mean disconnection, which `cancel` triggers exactly once by
/// dropping the sole sender. Every clone of the token shares the same
/// signal, so long-running consumers race [`signal`](CancellationToken::signal)
/// against their natural wakeup inside a `select!` and observe shutdown
/// within one pending wait.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        let (trigger, signal) = bounded(0);
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
        }
    }

    /// Fires the signal, waking every current and future waiter. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let mut trigger = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Dropping the sender disconnects every receiver clone at once.
        let _ = trigger.take();
    }

    /// Cheap point-in-time check.
    pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::SeqCst) }

    /// Receiver half, for use as one branch of a `select!` race.
    pub fn signal(&self) -> &Receiver<()> { &self.signal }
}

impl Default for CancellationToken {
    fn default() -> CancellationToken { CancellationToken::new() }
}
