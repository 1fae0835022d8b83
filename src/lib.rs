//! Client-side telemetry pipeline: record measurements per logical
//! operation, aggregate them into aligned time windows or ship them
//! individually, and batch everything for delivery to a transport.
//!
//! Start from [`Configuration`] to assemble a pipeline, then record
//! through its [`MetricsFactory`].

mod aggregator;
mod batcher;
mod buffer;
mod cancellation;
mod clock;
mod configuration;
mod data;
mod factory;
mod sink;

pub use self::{
    aggregator::{AggregatingSink, Aggregator, Tick},
    batcher::{deliver, Batcher},
    buffer::{Consume, SynchronizingBuffer},
    cancellation::CancellationToken,
    clock::{ClockSource, Mock, SystemClock},
    configuration::{Configuration, PreaggregatedPipeline, UnaryPipeline},
    data::{
        batch::{AggregatedBatch, DistributionRecord, Record, ScalarRecord},
        bucket::{bucket, bucket_base_2, bucket_below},
        histogram::Histogram,
        metrics::{Metrics, MetricsBehavior},
        statistic_set::StatisticSet,
        Aggregation, Dimension, DimensionPosition, DimensionPositionMap, MeasurementMap,
    },
    factory::{MetricsFactory, TimestampAt, TotaltimeType},
    sink::Sink,
};

/// Instrumentation scope name reported alongside emitted telemetry.
pub const SCOPE_NAME: &str = "tallyho";

/// Instrumentation scope version reported alongside emitted telemetry.
pub const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");
