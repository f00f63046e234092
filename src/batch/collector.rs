//! Failure collector.

use crate::error::SubmitError;
use crate::types::FailedRecord;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Concurrency-safe, append-only sink of failed records for one job.
///
/// Clones share the same underlying list, so each submission task can hold
/// its own handle.
#[derive(Debug)]
pub struct FailureCollector<T> {
    items: Arc<Mutex<Vec<FailedRecord<T>>>>,
}

impl<T> Clone for FailureCollector<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for FailureCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FailureCollector<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    // A panic while holding the lock can only happen between push calls, so
    // the list is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<FailedRecord<T>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, failure: FailedRecord<T>) {
        self.lock().push(failure);
    }

    pub fn record_all(&self, failures: impl IntoIterator<Item = FailedRecord<T>>) {
        self.lock().extend(failures);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> FailureCollector<T> {
    /// Failures in the order they were recorded.
    pub fn snapshot(&self) -> Vec<FailedRecord<T>> {
        self.lock().clone()
    }

    /// Just the failed records, e.g. to feed a rerun.
    pub fn records(&self) -> Vec<T> {
        self.lock().iter().map(|f| f.record.clone()).collect()
    }

    pub fn causes(&self) -> Vec<SubmitError> {
        self.lock().iter().map(|f| f.cause.clone()).collect()
    }

    /// Consume this handle. Clones still alive keep their shared view.
    pub fn into_records(self) -> Vec<FailedRecord<T>> {
        match Arc::try_unwrap(self.items) {
            Ok(items) => items.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(unit: usize, record: u32) -> FailedRecord<u32> {
        FailedRecord {
            unit,
            position: 0,
            record,
            cause: SubmitError::rejected(400, "bad"),
        }
    }

    #[test]
    fn test_collector_empty() {
        let collector: FailureCollector<u32> = FailureCollector::new();
        assert!(collector.is_empty());
        assert!(collector.snapshot().is_empty());
    }

    #[test]
    fn test_collector_keeps_recording_order_and_duplicates() {
        let collector = FailureCollector::new();
        collector.record(failure(3, 30));
        collector.record(failure(1, 10));
        collector.record(failure(3, 30));

        let units: Vec<usize> = collector.snapshot().iter().map(|f| f.unit).collect();
        assert_eq!(units, vec![3, 1, 3]);
        assert_eq!(collector.records(), vec![30, 10, 30]);
    }

    #[test]
    fn test_collector_clones_share_state() {
        let collector = FailureCollector::new();
        let handle = collector.clone();
        handle.record_all(vec![failure(0, 1), failure(1, 2)]);
        assert_eq!(collector.len(), 2);

        let shared = handle.clone().into_records();
        assert_eq!(shared.len(), 2);
        drop(handle);
        let owned = collector.into_records();
        assert_eq!(owned.iter().map(|f| f.record).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_collector_thread_safe() {
        use std::thread;

        let collector: FailureCollector<u32> = FailureCollector::new();

        let mut handles = vec![];
        for i in 0..10 {
            let c = collector.clone();
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    c.record(failure(i * 100 + j, (i * 100 + j) as u32));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let mut units: Vec<usize> = collector.snapshot().iter().map(|f| f.unit).collect();
        units.sort_unstable();
        assert_eq!(units, (0..1000).collect::<Vec<_>>());
    }
}
