use super::bucket::bucket_below;
use super::histogram::Histogram;
use super::statistic_set::StatisticSet;
use super::{Aggregation, DimensionPosition, DimensionPositionMap};
use serde::Serialize;

/// Transport-neutral wire form of one emitted data point.
///
/// Transports take these and encode them however their backend demands;
/// nothing here knows about any particular wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Record {
    Scalar(ScalarRecord),
    Distribution(DistributionRecord),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalarRecord {
    pub name: String,
    pub value: f64,
    pub timestamp_millis: u64,
    pub width_millis: u64,
    pub dimensions: DimensionPosition,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DistributionRecord {
    pub name: String,
    pub timestamp_millis: u64,
    pub width_millis: u64,
    pub dimensions: DimensionPosition,
    /// Upper bounds of the occupied buckets, ascending.
    pub explicit_bounds: Vec<u64>,
    /// One count per bound, plus a trailing count for the implicit
    /// "everything above" bucket.
    pub bucket_counts: Vec<u64>,
    pub count: u64,
}

/// Immutable snapshot of one metric name's aggregations over one window.
///
/// Produced exactly once per (metric name, window) by the aggregator and
/// never mutated afterwards.
#[derive(Clone, Debug)]
pub struct AggregatedBatch {
    metric: String,
    timestamp_millis: u64,
    width_millis: u64,
    positions: DimensionPositionMap,
}

impl AggregatedBatch {
    pub(crate) fn new(
        metric: String, timestamp_millis: u64, width_millis: u64, positions: DimensionPositionMap,
    ) -> AggregatedBatch {
        AggregatedBatch {
            metric,
            timestamp_millis,
            width_millis,
            positions,
        }
    }

    pub fn metric(&self) -> &str { &self.metric }

    /// Epoch milliseconds of the window close.
    pub fn timestamp_millis(&self) -> u64 { self.timestamp_millis }

    pub fn width_millis(&self) -> u64 { self.width_millis }

    pub fn positions(&self) -> &DimensionPositionMap { &self.positions }

    /// Flattens this snapshot into wire records: four scalars per
    /// statistic set, one distribution per histogram.
    pub fn to_records(&self) -> Vec<Record> {
        let mut records = Vec::new();
        for (position, measurements) in &self.positions {
            for (measurement, aggregation) in measurements {
                let name = format!("{}_{}", self.metric, measurement);
                match aggregation {
                    Aggregation::StatisticSet(ss) => self.push_statistic_set(&mut records, name, ss, position),
                    Aggregation::Histogram(histogram) => {
                        records.push(self.distribution_record(name, histogram, position))
                    },
                }
            }
        }
        records
    }

    fn push_statistic_set(
        &self, records: &mut Vec<Record>, name: String, ss: &StatisticSet, position: &DimensionPosition,
    ) {
        let components = [
            ("min", ss.min),
            ("max", ss.max),
            ("count", ss.count as f64),
            ("sum", ss.sum),
        ];
        for (component, value) in &components {
            records.push(Record::Scalar(ScalarRecord {
                name: format!("{}_{}", name, component),
                value: *value,
                timestamp_millis: self.timestamp_millis,
                width_millis: self.width_millis,
                dimensions: position.clone(),
            }));
        }
    }

    fn distribution_record(&self, name: String, histogram: &Histogram, position: &DimensionPosition) -> Record {
        let sorted = histogram.sorted_buckets();
        let mut explicit_bounds = Vec::with_capacity(sorted.len() * 2);
        let mut bucket_counts = Vec::with_capacity(sorted.len() * 2 + 1);
        for (bucket, count) in &sorted {
            let below = bucket_below(*bucket);
            if below > 0 && !histogram.bucket_counts().contains_key(&below) {
                // Occupied buckets need an explicit lower bound; without
                // it, consumers treat the range as unbounded below.
                explicit_bounds.push(below);
                bucket_counts.push(0);
            }
            explicit_bounds.push(*bucket);
            bucket_counts.push(*count);
        }
        // Implicit "everything above" bucket.
        bucket_counts.push(0);

        Record::Distribution(DistributionRecord {
            name,
            timestamp_millis: self.timestamp_millis,
            width_millis: self.width_millis,
            dimensions: position.clone(),
            explicit_bounds,
            bucket_counts,
            count: histogram.total_count(),
        })
    }
}
