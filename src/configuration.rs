use crate::aggregator::{AggregatingSink, Aggregator};
use crate::batcher::Batcher;
use crate::buffer::SynchronizingBuffer;
use crate::cancellation::CancellationToken;
use crate::clock::SystemClock;
use crate::data::batch::AggregatedBatch;
use crate::data::metrics::Metrics;
use crate::factory::{MetricsFactory, TimestampAt, TotaltimeType};
use std::time::Duration;

/// A configuration builder for telemetry pipelines.
#[derive(Clone)]
pub struct Configuration {
    pub(crate) aggregation_width: Duration,
    pub(crate) capacity: usize,
    pub(crate) batch_size: usize,
    pub(crate) batch_age: Duration,
    pub(crate) queue_size: usize,
    pub(crate) stamp_at: TimestampAt,
    pub(crate) totaltime_type: TotaltimeType,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            aggregation_width: Duration::from_secs(10),
            capacity: 128,
            batch_size: 1000,
            batch_age: Duration::from_secs(10),
            queue_size: 1024,
            stamp_at: TimestampAt::Start,
            totaltime_type: TotaltimeType::DistributionMilliseconds,
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values.
    pub fn new() -> Configuration {
        Default::default()
    }

    /// Sets the aggregation window width.
    ///
    /// Defaults to `10s`.
    ///
    /// Window boundaries are aligned to multiples of the width, so every
    /// process on the same width emits at comparable instants.
    pub fn aggregation_width(mut self, aggregation_width: Duration) -> Self {
        self.aggregation_width = aggregation_width;
        self
    }

    /// Sets the channel capacity between pipeline stages.
    ///
    /// Defaults to `128`.
    ///
    /// When a stage falls behind and its channel fills, new items are
    /// dropped rather than blocking the caller.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the batch size.
    ///
    /// Defaults to `1000`.
    ///
    /// The batcher closes a batch as soon as it holds this many items,
    /// regardless of age.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the maximum batch age.
    ///
    /// Defaults to `10s`.
    ///
    /// The batcher closes whatever partial batch it holds once the batch
    /// has been open this long, keeping delivery latency bounded when
    /// traffic is light.
    pub fn batch_age(mut self, batch_age: Duration) -> Self {
        self.batch_age = batch_age;
        self
    }

    /// Sets the unary queue size.
    ///
    /// Defaults to `1024`.
    ///
    /// This bounds the synchronizing buffer between recording callers and
    /// the unary delivery path. On overflow the oldest queued records are
    /// dropped first.
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Sets when records take their wall-clock stamp.
    ///
    /// Defaults to [`TimestampAt::Start`].
    pub fn stamp_at(mut self, stamp_at: TimestampAt) -> Self {
        self.stamp_at = stamp_at;
        self
    }

    /// Sets how recording duration is reported.
    ///
    /// Defaults to [`TotaltimeType::DistributionMilliseconds`].
    pub fn totaltime_type(mut self, totaltime_type: TotaltimeType) -> Self {
        self.totaltime_type = totaltime_type;
        self
    }

    /// Builds the unary pipeline: every record ships individually,
    /// batched only for transport efficiency.
    pub fn build_unary_pipeline(self) -> UnaryPipeline {
        let token = CancellationToken::new();
        let buffer = SynchronizingBuffer::new(self.queue_size, token.clone());
        let batcher = Batcher::new(buffer.subscribe(), self.batch_size, self.batch_age, token.clone());
        let factory = MetricsFactory::new(buffer, self.totaltime_type, self.stamp_at);
        UnaryPipeline { factory, batcher, token }
    }

    /// Builds the pre-aggregated pipeline: records fold into windowed
    /// aggregates, and only window snapshots ship.
    pub fn build_preaggregated_pipeline(self) -> PreaggregatedPipeline {
        let token = CancellationToken::new();
        let (sink, aggregator, windows) =
            Aggregator::new(self.aggregation_width, self.capacity, SystemClock, token.clone());
        let batcher = Batcher::new(windows, self.batch_size, self.batch_age, token.clone());
        let factory = MetricsFactory::new(sink, self.totaltime_type, self.stamp_at);
        PreaggregatedPipeline {
            factory,
            aggregator,
            batcher,
            token,
        }
    }
}

/// The assembled unary pipeline.
///
/// Run the batcher (or [`deliver`](crate::batcher::deliver)) on its own
/// thread and record through the factory from anywhere.
pub struct UnaryPipeline {
    pub factory: MetricsFactory<SynchronizingBuffer>,
    pub batcher: Batcher<Metrics>,
    pub token: CancellationToken,
}

/// The assembled pre-aggregated pipeline.
///
/// The aggregator and the batcher each want a dedicated thread; the
/// factory is the caller-facing handle.
pub struct PreaggregatedPipeline {
    pub factory: MetricsFactory<AggregatingSink>,
    pub aggregator: Aggregator<SystemClock>,
    pub batcher: Batcher<AggregatedBatch>,
    pub token: CancellationToken,
}
