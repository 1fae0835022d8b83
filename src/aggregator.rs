use crate::cancellation::CancellationToken;
use crate::clock::ClockSource;
use crate::data::batch::AggregatedBatch;
use crate::data::metrics::Metrics;
use crate::data::{Aggregation, DimensionPositionMap, Histogram, StatisticSet};
use crate::sink::Sink;
use crossbeam_channel::{after, bounded, select, Receiver, Sender, TrySendError};
use fnv::FnvHashMap;
use log::warn;
use std::mem;
use std::time::Duration;

/// Producer half of the pre-aggregated path: a cheap, cloneable handle
/// that forwards finished records into the aggregator's channel.
#[derive(Clone)]
pub struct AggregatingSink {
    data_tx: Sender<Metrics>,
    token: CancellationToken,
}

impl Sink for AggregatingSink {
    fn emit(&self, metrics: Metrics) {
        match self.data_tx.try_send(metrics) {
            Ok(()) => {},
            Err(TrySendError::Full(metrics)) => {
                warn!("aggregator backlogged; dropping record '{}'", metrics.name());
            },
            Err(TrySendError::Disconnected(_)) => {},
        }
    }

    fn close(&self) { self.token.cancel(); }
}

/// What the aggregator should do next, as decided by [`Aggregator::tick`].
#[derive(Debug)]
pub enum Tick {
    /// The current window is still open; wait at most this long.
    Sleep(Duration),
    /// A window boundary passed; these batches left the accumulator.
    Window(Vec<AggregatedBatch>),
}

/// Folds individual records into per-window aggregates and emits one
/// immutable snapshot per metric name each time a window closes.
///
/// Windows are aligned to multiples of the width, so readings from
/// separate processes land on comparable boundaries. All bookkeeping is
/// driven by a [`ClockSource`], which keeps the windowing logic itself
/// free of real sleeps and directly testable.
pub struct Aggregator<C: ClockSource> {
    data_rx: Receiver<Metrics>,
    out_tx: Sender<AggregatedBatch>,
    token: CancellationToken,
    clock: C,
    width_millis: u64,
    last_emit: u64,
    accumulator: FnvHashMap<String, DimensionPositionMap>,
}

impl<C: ClockSource> Aggregator<C> {
    /// Builds the pre-aggregated pipeline stage: the sink callers emit
    /// into, the aggregator to run on a dedicated thread, and the
    /// receiver window snapshots come out of.
    ///
    /// A zero width or capacity is clamped to one; neither makes sense
    /// and both would wedge the pipeline.
    pub fn new(
        width: Duration, capacity: usize, clock: C, token: CancellationToken,
    ) -> (AggregatingSink, Aggregator<C>, Receiver<AggregatedBatch>) {
        let capacity = capacity.max(1);
        let (data_tx, data_rx) = bounded(capacity);
        let (out_tx, out_rx) = bounded(capacity);
        let width_millis = (width.as_millis() as u64).max(1);
        let now = clock.now_millis();
        let aggregator = Aggregator {
            data_rx,
            out_tx,
            token: token.clone(),
            clock,
            width_millis,
            // Align the first boundary to a multiple of the width.
            last_emit: now - now % width_millis,
            accumulator: FnvHashMap::default(),
        };
        let sink = AggregatingSink { data_tx, token };
        (sink, aggregator, out_rx)
    }

    /// Folds one record into the open window.
    ///
    /// Panics if a measurement name switches kind between scalar and
    /// distribution within a window; that is a bug at the recording site.
    pub fn ingest(&mut self, metrics: Metrics) {
        let position = metrics.dimension_position();
        let measurements = self
            .accumulator
            .entry(metrics.name().to_owned())
            .or_default()
            .entry(position)
            .or_default();

        for (name, value) in metrics.measurements() {
            let aggregation = measurements
                .entry(name.clone())
                .or_insert_with(|| Aggregation::StatisticSet(StatisticSet::new()));
            match aggregation {
                Aggregation::StatisticSet(ss) => ss.accumulate(*value),
                Aggregation::Histogram(_) => {
                    panic!("measurement '{}' was previously recorded as a distribution", name)
                },
            }
        }

        for (name, value) in metrics.distributions() {
            let aggregation = measurements
                .entry(name.clone())
                .or_insert_with(|| Aggregation::Histogram(Histogram::new()));
            match aggregation {
                Aggregation::Histogram(histogram) => histogram.accumulate(*value),
                Aggregation::StatisticSet(_) => {
                    panic!("measurement '{}' was previously recorded as a scalar", name)
                },
            }
        }
    }

    /// Advances the window bookkeeping against the clock.
    ///
    /// After a stall spanning several widths, the accumulated data is
    /// stamped at the latest fully closed boundary rather than replayed
    /// across the boundaries nobody observed.
    pub fn tick(&mut self) -> Tick {
        let now = self.clock.now_millis();
        let mut next_emit = self.last_emit + self.width_millis;
        if now < next_emit {
            return Tick::Sleep(Duration::from_millis(next_emit - now));
        }
        while now >= next_emit + self.width_millis {
            next_emit += self.width_millis;
        }
        self.last_emit = next_emit;
        Tick::Window(self.close_window(next_emit))
    }

    fn close_window(&mut self, timestamp_millis: u64) -> Vec<AggregatedBatch> {
        let accumulator = mem::take(&mut self.accumulator);
        accumulator
            .into_iter()
            .map(|(metric, positions)| AggregatedBatch::new(metric, timestamp_millis, self.width_millis, positions))
            .collect()
    }

    /// Runs the aggregation loop until cancellation or until every sink
    /// handle is gone. The partial window in progress is flushed on the
    /// way out.
    pub fn run(&mut self) {
        loop {
            let wait = match self.tick() {
                Tick::Sleep(duration) => duration,
                Tick::Window(batches) => {
                    if !self.send_batches(batches) {
                        return;
                    }
                    continue;
                },
            };

            select! {
                recv(self.data_rx) -> msg => match msg {
                    Ok(metrics) => self.ingest(metrics),
                    Err(_) => break,
                },
                recv(after(wait)) -> _ => {},
                recv(self.token.signal()) -> _ => break,
            }
        }

        // Drain what was accepted before shutdown, then flush the
        // partial window at the upcoming boundary.
        while let Ok(metrics) = self.data_rx.try_recv() {
            self.ingest(metrics);
        }
        let batches = self.close_window(self.last_emit + self.width_millis);
        self.send_batches(batches);
    }

    fn send_batches(&self, batches: Vec<AggregatedBatch>) -> bool {
        for batch in batches {
            match self.out_tx.try_send(batch) {
                Ok(()) => {},
                Err(TrySendError::Full(batch)) => {
                    warn!("window output backlogged; dropping batch for metric '{}'", batch.metric());
                },
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Aggregator, Tick};
    use crate::cancellation::CancellationToken;
    use crate::clock::Mock;
    use crate::data::metrics::{Metrics, MetricsBehavior};
    use crate::data::Aggregation;
    use crate::sink::Sink;
    use std::thread;
    use std::time::Duration;

    fn record_with_measure(name: &str, measurement: &str, value: f64) -> Metrics {
        let mut metrics = Metrics::new(name, Some(0), MetricsBehavior::Default);
        metrics.measure(measurement, value);
        metrics
    }

    #[test]
    fn test_tick_sleeps_until_boundary() {
        let clock = Mock::new(100);
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::from_millis(1_000), 16, clock, CancellationToken::new());

        match aggregator.tick() {
            Tick::Sleep(wait) => assert_eq!(wait, Duration::from_millis(900)),
            Tick::Window(_) => panic!("window closed before its boundary"),
        }
    }

    #[test]
    fn test_zero_width_is_clamped() {
        let clock = Mock::new(5);
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::ZERO, 0, clock.clone(), CancellationToken::new());

        // Construction must not divide by zero, and the clamped width
        // still closes windows.
        aggregator.ingest(record_with_measure("api", "latency", 1.0));
        clock.increment(1);
        match aggregator.tick() {
            Tick::Window(batches) => assert_eq!(batches.len(), 1),
            Tick::Sleep(_) => panic!("boundary passed but no window closed"),
        }
    }

    #[test]
    fn test_ingest_merges_same_key() {
        let clock = Mock::new(100);
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::from_millis(1_000), 16, clock.clone(), CancellationToken::new());

        for value in &[2.0, 4.0, 9.0] {
            aggregator.ingest(record_with_measure("api", "latency", *value));
        }

        clock.increment(1_400);
        let batches = match aggregator.tick() {
            Tick::Window(batches) => batches,
            Tick::Sleep(_) => panic!("boundary passed but no window closed"),
        };
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.metric(), "api");
        assert_eq!(batch.positions().len(), 1);
        let measurements = batch.positions().values().next().expect("position missing");
        match measurements.get("latency").expect("aggregate missing") {
            Aggregation::StatisticSet(ss) => {
                assert_eq!(ss.count, 3);
                assert_eq!(ss.min, 2.0);
                assert_eq!(ss.max, 9.0);
                assert_eq!(ss.sum, 15.0);
            },
            _ => panic!("scalar measurements aggregate into statistic sets"),
        }
    }

    #[test]
    fn test_windows_stamp_at_aligned_boundaries() {
        let clock = Mock::new(100);
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::from_millis(1_000), 16, clock.clone(), CancellationToken::new());

        aggregator.ingest(record_with_measure("api", "latency", 5.0));
        clock.increment(400); // t=500
        aggregator.ingest(record_with_measure("api", "latency", 7.0));

        clock.increment(1_000); // t=1500
        match aggregator.tick() {
            Tick::Window(batches) => {
                assert_eq!(batches.len(), 1);
                assert_eq!(batches[0].timestamp_millis(), 1_000);
                assert_eq!(batches[0].width_millis(), 1_000);
            },
            Tick::Sleep(_) => panic!("boundary passed but no window closed"),
        }

        aggregator.ingest(record_with_measure("api", "latency", 1.0));
        clock.increment(1_000); // t=2500
        match aggregator.tick() {
            Tick::Window(batches) => {
                assert_eq!(batches.len(), 1);
                assert_eq!(batches[0].timestamp_millis(), 2_000);
            },
            Tick::Sleep(_) => panic!("boundary passed but no window closed"),
        }
    }

    #[test]
    fn test_stall_stamps_latest_boundary() {
        let clock = Mock::new(100);
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::from_millis(1_000), 16, clock.clone(), CancellationToken::new());

        aggregator.ingest(record_with_measure("api", "latency", 5.0));
        clock.increment(5_400); // t=5500, several widths behind
        match aggregator.tick() {
            Tick::Window(batches) => {
                assert_eq!(batches.len(), 1);
                assert_eq!(batches[0].timestamp_millis(), 5_000);
            },
            Tick::Sleep(_) => panic!("boundary passed but no window closed"),
        }
    }

    #[test]
    fn test_empty_window_closes_with_no_batches() {
        let clock = Mock::new(0);
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::from_millis(1_000), 16, clock.clone(), CancellationToken::new());

        clock.increment(1_000);
        match aggregator.tick() {
            Tick::Window(batches) => assert!(batches.is_empty()),
            Tick::Sleep(_) => panic!("boundary passed but no window closed"),
        }
    }

    #[test]
    #[should_panic(expected = "previously recorded as a scalar")]
    fn test_measurement_kind_must_not_change() {
        let (_sink, mut aggregator, _out) =
            Aggregator::new(Duration::from_millis(1_000), 16, Mock::new(0), CancellationToken::new());

        aggregator.ingest(record_with_measure("api", "latency", 5.0));
        let mut metrics = Metrics::new("api", Some(0), MetricsBehavior::Default);
        metrics.distribution("latency", 5.0);
        aggregator.ingest(metrics);
    }

    #[test]
    fn test_run_flushes_partial_window_on_cancel() {
        let token = CancellationToken::new();
        let (sink, mut aggregator, out) =
            Aggregator::new(Duration::from_secs(60), 16, Mock::new(0), token.clone());
        let handle = thread::spawn(move || aggregator.run());

        sink.emit(record_with_measure("api", "latency", 5.0));
        thread::sleep(Duration::from_millis(50));
        token.cancel();
        handle.join().expect("aggregator thread panicked");

        let batch = out.recv_timeout(Duration::from_secs(1)).expect("flush missing");
        assert_eq!(batch.metric(), "api");
    }
}
