use crate::clock::{ClockSource, SystemClock};
use crate::data::metrics::{Metrics, MetricsBehavior};
use crate::sink::Sink;
use log::debug;

/// When a record's wall-clock stamp is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampAt {
    /// Stamp when the recording opens.
    Start,
    /// Stamp when the recording finalizes.
    End,
}

/// How the factory reports each recording's wall duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TotaltimeType {
    /// Report `totaltime` as a distribution sample, in milliseconds.
    DistributionMilliseconds,
    /// Report `totaltime` as a scalar measurement, in milliseconds.
    MeasurementMilliseconds,
    /// Never report `totaltime`.
    None,
}

/// Entry point for instrumented code: opens a record, runs the caller's
/// body against it, then finalizes and emits exactly once.
///
/// Emission is tied to the record guard's destructor, so the record goes
/// out whether the body returns, errors, or panics.
pub struct MetricsFactory<S: Sink, C: ClockSource = SystemClock> {
    sink: S,
    totaltime_type: TotaltimeType,
    stamp_at: TimestampAt,
    clock: C,
}

impl<S: Sink> MetricsFactory<S, SystemClock> {
    pub fn new(sink: S, totaltime_type: TotaltimeType, stamp_at: TimestampAt) -> MetricsFactory<S, SystemClock> {
        MetricsFactory::with_clock(sink, totaltime_type, stamp_at, SystemClock)
    }
}

impl<S: Sink, C: ClockSource> MetricsFactory<S, C> {
    pub fn with_clock(sink: S, totaltime_type: TotaltimeType, stamp_at: TimestampAt, clock: C) -> MetricsFactory<S, C> {
        MetricsFactory {
            sink,
            totaltime_type,
            stamp_at,
            clock,
        }
    }

    /// Records one logical operation under the factory's defaults.
    ///
    /// The body's return value passes through untouched; a body that
    /// errors or panics still gets its record finalized and emitted.
    pub fn record<T>(&self, name: impl Into<String>, body: impl FnOnce(&mut Metrics) -> T) -> T {
        self.record_with_behavior(name, self.stamp_at, MetricsBehavior::Default, body)
    }

    /// Records one logical operation with explicit stamping and behavior.
    pub fn record_with_behavior<T>(
        &self, name: impl Into<String>, stamp_at: TimestampAt, behavior: MetricsBehavior,
        body: impl FnOnce(&mut Metrics) -> T,
    ) -> T {
        let timestamp_millis = match stamp_at {
            TimestampAt::Start => Some(self.clock.now_millis()),
            TimestampAt::End => None,
        };
        let mut recording = Recording {
            metrics: Some(Metrics::new(name, timestamp_millis, behavior)),
            factory: self,
        };
        body(recording.metrics())
    }

    /// Shuts down the downstream pipeline.
    pub fn close(&self) { self.sink.close(); }

    fn finalize_and_emit(&self, mut metrics: Metrics) {
        metrics.stamp(self.clock.now_millis());

        if metrics.behavior() != MetricsBehavior::NoTotaltime {
            let elapsed = metrics.elapsed_millis() as f64;
            match self.totaltime_type {
                TotaltimeType::DistributionMilliseconds => metrics.distribution("totaltime", elapsed),
                TotaltimeType::MeasurementMilliseconds => metrics.measure("totaltime", elapsed),
                TotaltimeType::None => {},
            }
        }

        debug!("emitting record '{}'", metrics.name());
        self.sink.emit(metrics);
    }
}

/// Guard that ties finalize-and-emit to scope exit.
struct Recording<'a, S: Sink, C: ClockSource> {
    metrics: Option<Metrics>,
    factory: &'a MetricsFactory<S, C>,
}

impl<'a, S: Sink, C: ClockSource> Recording<'a, S, C> {
    fn metrics(&mut self) -> &mut Metrics {
        self.metrics.as_mut().expect("recording already finalized")
    }
}

impl<'a, S: Sink, C: ClockSource> Drop for Recording<'a, S, C> {
    fn drop(&mut self) {
        if let Some(metrics) = self.metrics.take() {
            self.factory.finalize_and_emit(metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricsFactory, TimestampAt, TotaltimeType};
    use crate::clock::Mock;
    use crate::data::metrics::{Metrics, MetricsBehavior};
    use crate::sink::Sink;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CollectingSink {
        emitted: Arc<Mutex<Vec<Metrics>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl CollectingSink {
        fn emitted(&self) -> Vec<Metrics> {
            let mut guard = self.emitted.lock().expect("sink lock poisoned");
            std::mem::take(&mut *guard)
        }
    }

    impl Sink for CollectingSink {
        fn emit(&self, metrics: Metrics) {
            self.emitted.lock().expect("sink lock poisoned").push(metrics);
        }

        fn close(&self) {
            *self.closed.lock().expect("sink lock poisoned") = true;
        }
    }

    fn factory(sink: CollectingSink) -> MetricsFactory<CollectingSink, Mock> {
        MetricsFactory::with_clock(sink, TotaltimeType::DistributionMilliseconds, TimestampAt::Start, Mock::new(1_000))
    }

    #[test]
    fn test_record_emits_once_with_totaltime() {
        let sink = CollectingSink::default();
        let result = factory(sink.clone()).record("api", |metrics| {
            metrics.dimension("host", "web-1");
            metrics.measure("queue_depth", 3.0);
            7
        });
        assert_eq!(result, 7);

        let emitted = sink.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].name(), "api");
        assert_eq!(emitted[0].timestamp_millis(), Some(1_000));
        assert!(emitted[0].distributions().contains_key("totaltime"));
    }

    #[test]
    fn test_record_emits_when_body_errors() {
        let sink = CollectingSink::default();
        let result: Result<(), &str> = factory(sink.clone()).record("api", |metrics| {
            metrics.dimension("outcome", "failed");
            Err("backend unavailable")
        });
        assert!(result.is_err());
        assert_eq!(sink.emitted().len(), 1);
    }

    #[test]
    fn test_record_emits_when_body_panics() {
        let sink = CollectingSink::default();
        let factory = factory(sink.clone());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            factory.record("api", |_metrics| panic!("body exploded"));
        }));
        assert!(outcome.is_err());
        assert_eq!(sink.emitted().len(), 1);
    }

    #[test]
    fn test_no_totaltime_behavior_skips_series() {
        let sink = CollectingSink::default();
        factory(sink.clone()).record_with_behavior("api", TimestampAt::Start, MetricsBehavior::NoTotaltime, |_| {});

        let emitted = sink.emitted();
        assert!(emitted[0].distributions().is_empty());
        assert!(emitted[0].measurements().is_empty());
    }

    #[test]
    fn test_totaltime_as_measurement() {
        let sink = CollectingSink::default();
        let factory = MetricsFactory::with_clock(
            sink.clone(),
            TotaltimeType::MeasurementMilliseconds,
            TimestampAt::Start,
            Mock::new(0),
        );
        factory.record("api", |_| {});

        let emitted = sink.emitted();
        assert!(emitted[0].measurements().contains_key("totaltime"));
        assert!(emitted[0].distributions().is_empty());
    }

    #[test]
    fn test_stamp_at_end_resolves_during_finalize() {
        let sink = CollectingSink::default();
        let clock = Mock::new(1_000);
        let factory = MetricsFactory::with_clock(
            sink.clone(),
            TotaltimeType::None,
            TimestampAt::End,
            clock.clone(),
        );
        factory.record("api", |metrics| {
            assert_eq!(metrics.timestamp_millis(), None);
            clock.increment(500);
        });

        assert_eq!(sink.emitted()[0].timestamp_millis(), Some(1_500));
    }

    #[test]
    fn test_close_propagates_to_sink() {
        let sink = CollectingSink::default();
        factory(sink.clone()).close();
        assert!(*sink.closed.lock().expect("sink lock poisoned"));
    }
}
