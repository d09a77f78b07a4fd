//! Sequence value generation for `catalog::ColumnDefault::Sequence`
//! columns.

use ahash::RandomState;
use common::{DbResult, SequenceId};
use hashbrown::HashMap;
use parking_lot::Mutex;

/// Supplies the next value for a sequence-backed column default.
pub trait SequenceSource: Send + Sync {
    fn next(&self, id: SequenceId) -> DbResult<i64>;
}

/// Monotonic, in-memory sequence generator: one counter per `SequenceId`,
/// starting at 1. A value handed out is never reclaimed, even if the
/// transaction that fetched it aborts, matching how a real sequence
/// generator behaves.
#[derive(Default)]
pub struct InMemorySequenceManager {
    counters: Mutex<HashMap<SequenceId, i64, RandomState>>,
}

impl InMemorySequenceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceSource for InMemorySequenceManager {
    fn next(&self, id: SequenceId) -> DbResult<i64> {
        let mut counters = self.counters.lock();
        let value = counters.entry(id).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent_and_monotonic() {
        let mgr = InMemorySequenceManager::new();
        assert_eq!(mgr.next(SequenceId(1)).unwrap(), 1);
        assert_eq!(mgr.next(SequenceId(1)).unwrap(), 2);
        assert_eq!(mgr.next(SequenceId(2)).unwrap(), 1);
    }
}
