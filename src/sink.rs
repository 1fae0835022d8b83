use crate::data::metrics::Metrics;

/// Consumer half of the recording lifecycle.
///
/// The factory hands every finalized record to one of these. Built-in
/// implementations are [`SynchronizingBuffer`](crate::buffer::SynchronizingBuffer)
/// for the unary path and [`AggregatingSink`](crate::aggregator::AggregatingSink)
/// for the pre-aggregated path; adapters for custom destinations just
/// implement the trait.
pub trait Sink {
    /// Accepts one finished record. Must not block the caller
    /// indefinitely; implementations drop on overflow instead.
    fn emit(&self, metrics: Metrics);

    /// Begins shutdown of the consuming side. Idempotent, and safe to
    /// call from any thread.
    fn close(&self);
}
