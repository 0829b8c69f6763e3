use crate::domain::record::Record;
use crate::domain::traits::ShardSource;

/// A record source backed by an owned Vec.
///
/// Shard assignment is strided: shard `i` of `n` gets records
/// `i, i + n, i + 2n, ...`. Every record lands in exactly one shard
/// and shard sizes differ by at most one.
pub struct InMemorySource {
    records: Vec<Record>,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl ShardSource for InMemorySource {
    type Iter = std::vec::IntoIter<Record>;

    fn shard(&self, shard_count: usize, shard_index: usize) -> Self::Iter {
        let stride = shard_count.max(1);
        let shard: Vec<Record> = self
            .records
            .iter()
            .skip(shard_index)
            .step_by(stride)
            .cloned()
            .collect();
        shard.into_iter()
    }
}
