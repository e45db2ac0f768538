// Record Storage Abstraction
//
// Defines the durability contract for a sequenced log.
// Implementations may persist to a file, keep records in memory, etc.

use std::sync::{Mutex, PoisonError};

use super::{Entry, LogError, Record, SequenceId};

/// Storage backend for a sequenced log.
///
/// Properties required from implementations:
/// - Append-only
/// - Ordered
/// - Sequence ids start at 1 and have no gaps
///
/// Implementations MUST NOT:
/// - Reorder records
/// - Mutate existing records
/// - Hand out the same sequence id twice, even to concurrent callers
pub trait RecordStore: Send + Sync {
    /// Assign the next sequence id to `entry` and persist it.
    ///
    /// Reading the last id and writing the new record must be one
    /// critical section.
    fn append(&self, entry: &Entry) -> Result<Record, LogError>;

    /// Load all records in order.
    fn load(&self) -> Result<Vec<Record>, LogError>;

    /// Sequence id of the last persisted record.
    fn last_sequence(&self) -> Result<Option<SequenceId>, LogError>;
}

/// Volatile store. Same numbering contract as the file store.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    records: Mutex<Vec<Record>>,
}

impl RecordStore for InMemoryLogStore {
    fn append(&self, entry: &Entry) -> Result<Record, LogError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let next = records.last().map(|r| r.sequence_id + 1).unwrap_or(1);
        let record = Record::new(next, entry.clone());
        records.push(record.clone());
        Ok(record)
    }

    fn load(&self) -> Result<Vec<Record>, LogError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn last_sequence(&self) -> Result<Option<SequenceId>, LogError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|r| r.sequence_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Timestamp;
    use std::sync::Arc;
    use std::thread;

    fn entry(content: &str) -> Entry {
        Entry {
            classification: "INFO".into(),
            physical_location: "lab".into(),
            content: content.into(),
            uuid: "u".into(),
            timestamp: Timestamp::now(),
        }
    }

    #[test]
    fn concurrent_appends_get_distinct_ids() {
        let store = Arc::new(InMemoryLogStore::default());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store.append(&entry(&format!("{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: Vec<_> = store.load().unwrap().iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, (1..=200).collect::<Vec<_>>());
    }
}
