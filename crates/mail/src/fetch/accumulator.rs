//! Append-only collection of thread IDs gathered by the fetch workers

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::ThreadId;

/// Thread IDs from every fetched page, in arrival order
///
/// Duplicates are kept while fetching and removed by [`unique`](Self::unique).
#[derive(Default)]
pub struct ResultAccumulator {
    items: Mutex<Vec<ThreadId>>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ThreadId>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one page worth of IDs, keeping their order
    pub fn extend(&self, items: impl IntoIterator<Item = ThreadId>) {
        self.lock().extend(items);
    }

    /// Number of IDs appended so far, duplicates included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Distinct IDs in first-seen order
    pub fn unique(&self) -> Vec<ThreadId> {
        dedup_in_order(self.lock().iter().cloned())
    }

    /// Consume the accumulator and return distinct IDs in first-seen order
    pub fn into_unique(self) -> Vec<ThreadId> {
        let items = self.items.into_inner().unwrap_or_else(PoisonError::into_inner);
        dedup_in_order(items)
    }
}

fn dedup_in_order(items: impl IntoIterator<Item = ThreadId>) -> Vec<ThreadId> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ids(values: &[&str]) -> Vec<ThreadId> {
        values.iter().map(|v| ThreadId::new(*v)).collect()
    }

    #[test]
    fn test_unique_keeps_first_seen_order() {
        let acc = ResultAccumulator::new();
        acc.extend(ids(&["t3", "t1"]));
        acc.extend(ids(&["t1", "t2", "t3"]));

        assert_eq!(acc.len(), 5);
        assert_eq!(acc.unique(), ids(&["t3", "t1", "t2"]));
        assert_eq!(acc.into_unique(), ids(&["t3", "t1", "t2"]));
    }

    #[test]
    fn test_concurrent_extend_loses_nothing() {
        let acc = ResultAccumulator::new();

        thread::scope(|scope| {
            for worker in 0..4 {
                let acc = &acc;
                scope.spawn(move || {
                    for page in 0..25 {
                        acc.extend(vec![
                            ThreadId::new(format!("w{worker}-p{page}-a")),
                            ThreadId::new(format!("w{worker}-p{page}-b")),
                        ]);
                    }
                });
            }
        });

        assert_eq!(acc.len(), 200);
        assert_eq!(acc.unique().len(), 200);
    }

    #[test]
    fn test_empty() {
        let acc = ResultAccumulator::new();
        assert!(acc.is_empty());
        assert!(acc.unique().is_empty());
    }
}
