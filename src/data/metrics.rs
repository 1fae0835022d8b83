use super::batch::{DistributionRecord, Record, ScalarRecord};
use super::bucket::{bucket, bucket_below};
use super::{Dimension, DimensionPosition};
use fnv::FnvHashMap;
use std::collections::BTreeMap;
use std::time::Instant;

/// Per-record behavior flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricsBehavior {
    Default,
    /// Skip the `totaltime` series for this record entirely.
    NoTotaltime,
}

/// One in-flight measurement record.
///
/// A `Metrics` is created by the factory, mutated by caller code for the
/// duration of one logical operation, then finalized and handed to a
/// [`Sink`](crate::sink::Sink) exactly once. Nothing mutates it after
/// emission.
#[derive(Debug)]
pub struct Metrics {
    name: String,
    timestamp_millis: Option<u64>,
    start: Instant,
    behavior: MetricsBehavior,
    dimensions: BTreeMap<String, Dimension>,
    measurements: FnvHashMap<String, f64>,
    distributions: FnvHashMap<String, u64>,
}

impl Metrics {
    pub fn new(name: impl Into<String>, timestamp_millis: Option<u64>, behavior: MetricsBehavior) -> Metrics {
        Metrics {
            name: name.into(),
            timestamp_millis,
            start: Instant::now(),
            behavior,
            dimensions: BTreeMap::new(),
            measurements: FnvHashMap::default(),
            distributions: FnvHashMap::default(),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Wall-clock stamp in epoch milliseconds; `None` until a deferred
    /// stamp is resolved during finalize.
    pub fn timestamp_millis(&self) -> Option<u64> { self.timestamp_millis }

    pub fn behavior(&self) -> MetricsBehavior { self.behavior }

    /// Attaches a label to this record. Later writes for the same name win.
    pub fn dimension(&mut self, name: impl Into<String>, value: impl Into<Dimension>) {
        self.dimensions.insert(name.into(), value.into());
    }

    /// Records a point-in-time measurement. Later writes for the same name win.
    pub fn measure(&mut self, name: impl Into<String>, value: f64) {
        self.measurements.insert(name.into(), value);
    }

    /// Records one distribution sample.
    ///
    /// Distributions are positive only; negative or non-finite values are
    /// dropped. Only one sample per name is kept for the lifetime of the
    /// record - later writes overwrite rather than accumulate.
    pub fn distribution(&mut self, name: impl Into<String>, value: f64) {
        if value < 0.0 || !value.is_finite() {
            return;
        }
        self.distributions.insert(name.into(), value as u64);
    }

    /// The aggregation grouping key formed by this record's dimensions.
    pub fn dimension_position(&self) -> DimensionPosition { self.dimensions.clone() }

    pub fn measurements(&self) -> &FnvHashMap<String, f64> { &self.measurements }

    pub fn distributions(&self) -> &FnvHashMap<String, u64> { &self.distributions }

    /// Converts this record into transport-neutral wire records: one
    /// scalar per measurement and one single-sample distribution per
    /// distribution sample, each carrying the record's dimensions.
    pub fn to_records(&self) -> Vec<Record> {
        let timestamp_millis = self.timestamp_millis.unwrap_or(0);
        let width_millis = self.elapsed_millis();
        let mut records = Vec::with_capacity(self.measurements.len() + self.distributions.len());

        for (measurement, value) in &self.measurements {
            records.push(Record::Scalar(ScalarRecord {
                name: format!("{}_{}", self.name, measurement),
                value: *value,
                timestamp_millis,
                width_millis,
                dimensions: self.dimensions.clone(),
            }));
        }

        for (measurement, value) in &self.distributions {
            let representative = bucket(*value);
            let mut explicit_bounds = Vec::with_capacity(2);
            let mut bucket_counts = Vec::with_capacity(3);
            if representative > 0 {
                // Explicit lower bound for the single occupied bucket, so
                // consumers don't interpret it as unbounded below.
                explicit_bounds.push(bucket_below(*value));
                bucket_counts.push(0);
            }
            explicit_bounds.push(representative);
            bucket_counts.push(1);
            // Implicit "everything above" bucket.
            bucket_counts.push(0);

            records.push(Record::Distribution(DistributionRecord {
                name: format!("{}_{}", self.name, measurement),
                timestamp_millis,
                width_millis,
                dimensions: self.dimensions.clone(),
                explicit_bounds,
                bucket_counts,
                count: 1,
            }));
        }

        records
    }

    pub(crate) fn stamp(&mut self, timestamp_millis: u64) {
        if self.timestamp_millis.is_none() {
            self.timestamp_millis = Some(timestamp_millis);
        }
    }

    /// Milliseconds since the record was opened, from the monotonic start
    /// marker.
    pub(crate) fn elapsed_millis(&self) -> u64 { self.start.elapsed().as_millis() as u64 }
}
