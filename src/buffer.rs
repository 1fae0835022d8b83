use crate::cancellation::CancellationToken;
use crate::data::metrics::Metrics;
use crate::sink::Sink;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError, TrySendError};
use log::debug;

/// Bounded FIFO hand-off between recording callers and the unary delivery
/// path.
///
/// Emission never blocks: when the queue is full, the oldest queued
/// records are dropped to make room. Bounded memory takes priority over
/// completeness here - an unshipped record is worth less than a stalled
/// caller.
#[derive(Clone)]
pub struct SynchronizingBuffer {
    tx: Sender<Metrics>,
    rx: Receiver<Metrics>,
    token: CancellationToken,
}

impl SynchronizingBuffer {
    /// A zero `queue_size` is clamped to one; a rendezvous channel could
    /// never accept a non-blocking emit.
    pub fn new(queue_size: usize, token: CancellationToken) -> SynchronizingBuffer {
        let (tx, rx) = bounded(queue_size.max(1));
        SynchronizingBuffer { tx, rx, token }
    }

    /// A lazy sequence over the queue's contents: drains whatever is
    /// queued, then suspends until a record arrives or the buffer is
    /// closed. Not restartable; after close it drains and ends.
    pub fn consume(&self) -> Consume {
        Consume {
            rx: self.rx.clone(),
            token: self.token.clone(),
        }
    }

    /// Raw receiver half, for wiring a [`Batcher`](crate::batcher::Batcher)
    /// directly upstream.
    pub fn subscribe(&self) -> Receiver<Metrics> { self.rx.clone() }

    pub fn len(&self) -> usize { self.rx.len() }

    pub fn is_empty(&self) -> bool { self.rx.is_empty() }
}

impl Sink for SynchronizingBuffer {
    fn emit(&self, metrics: Metrics) {
        let mut item = metrics;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // Evict the oldest queued record and retry.
                    if let Ok(dropped) = self.rx.try_recv() {
                        debug!("queue full; dropping oldest record '{}'", dropped.name());
                    }
                    item = back;
                },
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn close(&self) { self.token.cancel(); }
}

/// Iterator returned by [`SynchronizingBuffer::consume`].
pub struct Consume {
    rx: Receiver<Metrics>,
    token: CancellationToken,
}

impl Iterator for Consume {
    type Item = Metrics;

    fn next(&mut self) -> Option<Metrics> {
        loop {
            // Drain anything already queued before suspending; after
            // cancellation this lets what was accepted still go out.
            match self.rx.try_recv() {
                Ok(metrics) => return Some(metrics),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {},
            }

            if self.token.is_cancelled() {
                return None;
            }

            select! {
                recv(self.rx) -> msg => match msg {
                    Ok(metrics) => return Some(metrics),
                    Err(_) => return None,
                },
                recv(self.token.signal()) -> _ => {
                    // Loop once more to drain, then stop.
                },
            }
        }
    }
}
