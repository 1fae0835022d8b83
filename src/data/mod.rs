use fnv::{FnvBuildHasher, FnvHashMap};
use hashbrown::HashMap;
use serde::Serialize;
use std::collections::BTreeMap;

pub mod batch;
pub mod bucket;
pub mod histogram;
pub mod metrics;
pub mod statistic_set;

pub(crate) use self::{histogram::Histogram, statistic_set::StatisticSet};

/// A typed label attached to a measurement record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Dimension {
    Str(String),
    Num(i64),
    Bool(bool),
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Dimension { Dimension::Str(value.to_owned()) }
}

impl From<String> for Dimension {
    fn from(value: String) -> Dimension { Dimension::Str(value) }
}

impl From<i64> for Dimension {
    fn from(value: i64) -> Dimension { Dimension::Num(value) }
}

impl From<bool> for Dimension {
    fn from(value: bool) -> Dimension { Dimension::Bool(value) }
}

/// The set of dimensions identifying one aggregation group.
///
/// Keyed by dimension name; the ordered map gives every equal set of
/// dimensions the same representation, so positions compare and hash as
/// unordered collections.
pub type DimensionPosition = BTreeMap<String, Dimension>;

/// Measurement name to running aggregate, within one position.
pub type MeasurementMap = FnvHashMap<String, Aggregation>;

/// Every position observed for one metric name within one window.
pub type DimensionPositionMap = HashMap<DimensionPosition, MeasurementMap, FnvBuildHasher>;

/// A running aggregate of one measurement under one position.
///
/// The variant is decided once, when the first sample for the key arrives:
/// scalar measurements fold into statistic sets, distribution samples into
/// histograms. The two never mix under a single key.
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregation {
    StatisticSet(StatisticSet),
    Histogram(Histogram),
}

impl Aggregation {
    /// Folds `other` into this aggregate.
    ///
    /// Panics if the variants differ: that means two incompatible
    /// measurement kinds were recorded under the same name, which is a
    /// bug at the recording site and must not be silently coerced.
    pub fn merge(&mut self, other: &Aggregation) {
        match (self, other) {
            (Aggregation::StatisticSet(a), Aggregation::StatisticSet(b)) => a.merge(b),
            (Aggregation::Histogram(a), Aggregation::Histogram(b)) => a.merge(b),
            _ => panic!("cannot merge a statistic set with a histogram under one measurement name"),
        }
    }
}
