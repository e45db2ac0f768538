use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod csv_store;
mod store;
mod timestamp;

pub use csv_store::{CsvFileStore, HEADER};
pub use store::{InMemoryLogStore, RecordStore};
pub use timestamp::{Timestamp, TimestampError};

/// Position of a record in the log. The first record is 1.
pub type SequenceId = u64;

/// Caller-supplied fields of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub classification: String,
    pub physical_location: String,
    pub content: String,
    pub uuid: String,
    pub timestamp: Timestamp,
}

/// One persisted row. Field names match the on-disk header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "SequenceID")]
    pub sequence_id: SequenceId,
    #[serde(rename = "Classification")]
    pub classification: String,
    #[serde(rename = "Physical Location")]
    pub physical_location: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: Timestamp,
}

impl Record {
    pub fn new(sequence_id: SequenceId, entry: Entry) -> Self {
        Self {
            sequence_id,
            classification: entry.classification,
            physical_location: entry.physical_location,
            content: entry.content,
            uuid: entry.uuid,
            timestamp: entry.timestamp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid log path: {0}")]
    InvalidPath(String),

    #[error("corrupt log {}: {reason}", path.display())]
    CorruptLog { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only log that numbers every record it writes.
///
/// The store owns the critical section: reading the last sequence id and
/// writing the next record happen under one lock.
#[derive(Debug)]
pub struct SequencedLog<S: RecordStore = CsvFileStore> {
    store: S,
}

impl SequencedLog<CsvFileStore> {
    /// Open a file-backed log at `directory/filename`.
    ///
    /// Nothing is created until the first append.
    pub fn new(directory: impl AsRef<Path>, filename: &str) -> Result<Self, LogError> {
        Ok(Self {
            store: CsvFileStore::new(directory, filename)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

impl<S: RecordStore> SequencedLog<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn append(
        &self,
        classification: impl Into<String>,
        physical_location: impl Into<String>,
        content: impl Into<String>,
        uuid: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<Record, LogError> {
        self.append_entry(Entry {
            classification: classification.into(),
            physical_location: physical_location.into(),
            content: content.into(),
            uuid: uuid.into(),
            timestamp,
        })
    }

    pub fn append_entry(&self, entry: Entry) -> Result<Record, LogError> {
        self.store.append(&entry)
    }

    /// Sequence id of the last record, `None` for an empty log.
    pub fn last_sequence(&self) -> Result<Option<SequenceId>, LogError> {
        self.store.last_sequence()
    }

    /// All records in write order.
    pub fn load(&self) -> Result<Vec<Record>, LogError> {
        self.store.load()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
