//! Shard plans - splitting the flat cell array across workers
//!
//! A [`ShardPlan`] cuts `0..cell_count` into contiguous ranges, one per
//! processor. Shards never overlap and together cover every cell, which is
//! what lets workers update their cells without locking each other out.
//!
//! # Example
//!
//! ```
//! use lattica_hub::ShardPlan;
//!
//! let plan = ShardPlan::new(10, 4);
//! assert_eq!(plan.shard_count(), 4);
//! assert_eq!(plan.shard(0), Some(0..3));
//! // The last shard absorbs the rounding remainder
//! assert_eq!(plan.shard(3), Some(9..10));
//! ```

use std::ops::Range;

/// Contiguous, disjoint index ranges covering `0..cell_count`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    cell_count: usize,
    processor_count: usize,
    shards: Vec<Range<usize>>,
}

impl ShardPlan {
    /// Partition `cell_count` cells across `processor_count` shards
    ///
    /// Each shard holds `round(N / P)` cells (half rounds up, at least one)
    /// except the last, which takes whatever remains. When `P > N` the
    /// trailing shards are empty. A processor count of 0 is treated as 1.
    pub fn new(cell_count: usize, processor_count: usize) -> Self {
        let processor_count = processor_count.max(1);
        let size = ((2 * cell_count + processor_count) / (2 * processor_count)).max(1);

        let shards = (0..processor_count)
            .map(|i| {
                let start = (i * size).min(cell_count);
                let end = if i + 1 == processor_count {
                    cell_count
                } else {
                    ((i + 1) * size).min(cell_count)
                };
                start..end
            })
            .collect();

        Self {
            cell_count,
            processor_count,
            shards,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn processor_count(&self) -> usize {
        self.processor_count
    }

    /// Number of shards, equal to the processor count (empty ones included)
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Every shard's cell range, in index order
    ///
    /// The ranges are disjoint and together cover `0..cell_count` exactly,
    /// so each cell is written by exactly one worker per generation.
    pub fn shards(&self) -> &[Range<usize>] {
        &self.shards
    }

    pub fn shard(&self, index: usize) -> Option<Range<usize>> {
        self.shards.get(index).cloned()
    }

    /// Index of the shard owning cell `index`
    pub fn shard_of(&self, index: usize) -> Option<usize> {
        self.shards.iter().position(|r| r.contains(&index))
    }

    /// Check whether this plan still fits the given workload
    pub fn matches(&self, cell_count: usize, processor_count: usize) -> bool {
        self.cell_count == cell_count && self.processor_count == processor_count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(plan: &ShardPlan) {
        let mut next = 0;
        for shard in plan.shards() {
            assert_eq!(shard.start, next, "gap or overlap in {:?}", plan);
            assert!(shard.start <= shard.end);
            next = shard.end;
        }
        assert_eq!(next, plan.cell_count());
    }

    #[test]
    fn test_single_processor() {
        let plan = ShardPlan::new(100, 1);
        assert_eq!(plan.shards(), &[0..100]);
    }

    #[test]
    fn test_rounding() {
        // 10 / 4 = 2.5 rounds up to 3
        assert_eq!(ShardPlan::new(10, 4).shards(), &[0..3, 3..6, 6..9, 9..10]);
        // 10 / 3 = 3.33 rounds down; remainder goes to the last shard
        assert_eq!(ShardPlan::new(10, 3).shards(), &[0..3, 3..6, 6..10]);
        // 7 / 4 = 1.75 rounds up to 2
        assert_eq!(ShardPlan::new(7, 4).shards(), &[0..2, 2..4, 4..6, 6..7]);
    }

    #[test]
    fn test_more_processors_than_cells() {
        let plan = ShardPlan::new(2, 5);
        assert_eq!(plan.shard_count(), 5);
        assert_exact_cover(&plan);
        assert_eq!(plan.shard_of(0), Some(0));
        assert_eq!(plan.shard_of(1), Some(1));
    }

    #[test]
    fn test_exact_cover_for_many_shapes() {
        for cells in [0, 1, 2, 7, 10, 99, 100, 101, 1000] {
            for processors in 0..=16 {
                let plan = ShardPlan::new(cells, processors);
                assert_eq!(plan.shard_count(), processors.max(1));
                assert_exact_cover(&plan);
            }
        }
    }

    #[test]
    fn test_matches() {
        let plan = ShardPlan::new(50, 2);
        assert!(plan.matches(50, 2));
        assert!(!plan.matches(50, 4));
        assert!(!plan.matches(51, 2));
        assert!(ShardPlan::new(50, 0).matches(50, 0));
    }
}
