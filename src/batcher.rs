use crate::cancellation::CancellationToken;
use crossbeam_channel::{after, select, Receiver};
use std::time::Duration;

/// Regroups an upstream sequence into count- and age-bounded batches for
/// efficient network send.
///
/// Wraps either pipeline source: individual records from a
/// [`SynchronizingBuffer`](crate::buffer::SynchronizingBuffer), or window
/// snapshots from an [`Aggregator`](crate::aggregator::Aggregator).
pub struct Batcher<T> {
    upstream: Receiver<T>,
    batch_size: usize,
    batch_age: Duration,
    token: CancellationToken,
    done: bool,
}

impl<T> Batcher<T> {
    pub fn new(upstream: Receiver<T>, batch_size: usize, batch_age: Duration, token: CancellationToken) -> Batcher<T> {
        Batcher {
            upstream,
            batch_size,
            batch_age,
            token,
            done: false,
        }
    }

    /// Blocks until the next batch closes: `batch_size` items collected,
    /// or `batch_age` elapsed since the batch opened, whichever first.
    ///
    /// An empty batch is a normal timeout tick, not an error; consumers
    /// treat it as a no-op. Returns `None` once the pipeline has shut
    /// down and everything queued has been flushed.
    pub fn next_batch(&mut self) -> Option<Vec<T>> {
        if self.done {
            return None;
        }

        let deadline = after(self.batch_age);
        let mut batch = Vec::new();
        loop {
            // Drain whatever is already waiting before suspending.
            while batch.len() < self.batch_size {
                match self.upstream.try_recv() {
                    Ok(item) => batch.push(item),
                    Err(_) => break,
                }
            }
            if batch.len() >= self.batch_size {
                return Some(batch);
            }

            select! {
                recv(self.upstream) -> msg => match msg {
                    Ok(item) => {
                        batch.push(item);
                        if batch.len() >= self.batch_size {
                            return Some(batch);
                        }
                    },
                    Err(_) => return self.finish(batch),
                },
                recv(deadline) -> _ => return Some(batch),
                recv(self.token.signal()) -> _ => {
                    // Flush what the upstream still holds, then end.
                    while batch.len() < self.batch_size {
                        match self.upstream.try_recv() {
                            Ok(item) => batch.push(item),
                            Err(_) => break,
                        }
                    }
                    return self.finish(batch);
                },
            }
        }
    }

    fn finish(&mut self, batch: Vec<T>) -> Option<Vec<T>> {
        self.done = true;
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

impl<T> Iterator for Batcher<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> { self.next_batch() }
}

/// Drives a batcher into a transport until the pipeline shuts down.
///
/// Empty timeout ticks are skipped. Transport failures go to `report` and
/// are otherwise swallowed - one failed batch must not stall the batches
/// behind it.
pub fn deliver<T, E, F, G>(mut batcher: Batcher<T>, mut transport: F, mut report: G)
where
    F: FnMut(Vec<T>) -> Result<(), E>,
    G: FnMut(E),
{
    while let Some(batch) = batcher.next_batch() {
        if batch.is_empty() {
            continue;
        }
        if let Err(e) = transport(batch) {
            report(e);
        }
    }
}
