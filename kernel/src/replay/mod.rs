// Log Replay
//
// Walks persisted records in order while enforcing invariants.
// Used to verify a log file without modifying it.

use serde::Serialize;

use crate::invariants::{InvariantEngine, InvariantViolation};
use crate::log::{LogError, Record, RecordStore, SequenceId, SequencedLog};

/// Outcome of a successful replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub records: usize,
    pub first: Option<SequenceId>,
    pub last: Option<SequenceId>,
}

/// Errors that can occur during replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Replay records, stopping at the first invariant violation.
pub fn replay_records(
    records: &[Record],
    invariants: &InvariantEngine,
) -> Result<ReplaySummary, InvariantViolation> {
    let mut previous: Option<&Record> = None;

    for record in records {
        invariants.evaluate(previous, record)?;
        previous = Some(record);
    }

    Ok(ReplaySummary {
        records: records.len(),
        first: records.first().map(|r| r.sequence_id),
        last: previous.map(|r| r.sequence_id),
    })
}

/// Load everything from `log` and replay it.
pub fn replay_log<S: RecordStore>(
    log: &SequencedLog<S>,
    invariants: &InvariantEngine,
) -> Result<ReplaySummary, ReplayError> {
    let records = log.load()?;
    Ok(replay_records(&records, invariants)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{InMemoryLogStore, Timestamp};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn replay_succeeds_on_appended_log() {
        let log = SequencedLog::with_store(InMemoryLogStore::default());
        for i in 0..3 {
            log.append("INFO", "lab", format!("event {i}"), "u", Timestamp::now())
                .unwrap();
        }

        let summary = replay_log(&log, &InvariantEngine::standard()).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                records: 3,
                first: Some(1),
                last: Some(3),
            }
        );
    }

    #[test]
    fn empty_log_replays_cleanly() {
        let summary = replay_records(&[], &InvariantEngine::standard()).unwrap();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.last, None);
    }

    #[test]
    fn replay_fails_on_hand_edited_gap() {
        let dir = TempDir::new().unwrap();
        let log = SequencedLog::new(dir.path(), "events.csv").unwrap();
        fs::write(
            log.path(),
            "SequenceID,Classification,Physical Location,Content,UUID,Timestamp\n\
             1,INFO,a,b,c,2024-03-01T10:00:00Z\n\
             3,INFO,a,b,c,2024-03-01T10:00:00Z\n",
        )
        .unwrap();

        let err = replay_log(&log, &InvariantEngine::standard()).unwrap_err();

        assert!(matches!(err, ReplayError::Invariant(_)));
        assert!(err.to_string().contains("contiguous-sequence"));
    }

    #[test]
    fn replay_surfaces_corrupt_rows() {
        let dir = TempDir::new().unwrap();
        let log = SequencedLog::new(dir.path(), "events.csv").unwrap();
        fs::write(
            log.path(),
            "SequenceID,Classification,Physical Location,Content,UUID,Timestamp\n\
             1,INFO,a,b,c,not-a-time\n",
        )
        .unwrap();

        let err = replay_log(&log, &InvariantEngine::standard()).unwrap_err();
        assert!(matches!(err, ReplayError::Log(LogError::CorruptLog { .. })));
    }
}
