use super::bucket::bucket;
use fnv::FnvHashMap;

/// Log-bucketed value distribution over one aggregation window.
///
/// Samples are coarsened through [`bucket`](super::bucket::bucket) on the
/// way in, so the map stays small across a wide dynamic range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Histogram {
    buckets: FnvHashMap<u64, u64>,
}

impl Histogram {
    pub fn new() -> Histogram {
        Histogram {
            buckets: FnvHashMap::default(),
        }
    }

    /// Folds a single sample into its bucket.
    pub fn accumulate(&mut self, value: u64) {
        *self.buckets.entry(bucket(value)).or_insert(0) += 1;
    }

    /// Folds another histogram into this one.
    pub fn merge(&mut self, other: &Histogram) {
        for (bucket, count) in &other.buckets {
            *self.buckets.entry(*bucket).or_insert(0) += count;
        }
    }

    /// Total number of samples accumulated.
    pub fn total_count(&self) -> u64 { self.buckets.values().sum() }

    /// Bucket representative to sample count.
    pub fn bucket_counts(&self) -> &FnvHashMap<u64, u64> { &self.buckets }

    pub(crate) fn sorted_buckets(&self) -> Vec<(u64, u64)> {
        let mut entries: Vec<(u64, u64)> = self.buckets.iter().map(|(b, c)| (*b, *c)).collect();
        entries.sort_unstable();
        entries
    }
}
