use serde::Serialize;

/// Running min/max/sum/count over the samples of one aggregation window.
///
/// Merging is commutative and associative, so partial sets can be combined
/// in whatever order samples happen to arrive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StatisticSet {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl StatisticSet {
    pub fn new() -> StatisticSet {
        StatisticSet {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    /// Folds a single sample into the set.
    pub fn accumulate(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Folds another set into this one.
    pub fn merge(&mut self, other: &StatisticSet) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }
}

impl Default for StatisticSet {
    fn default() -> StatisticSet { StatisticSet::new() }
}
