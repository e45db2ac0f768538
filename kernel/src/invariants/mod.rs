// Invariant Framework
//
// Invariants are pure rules that must hold between consecutive records
// of a log. Violations mean the persisted history cannot be trusted.

use crate::log::Record;

/// Result of invariant evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantResult {
    Pass,
    Fail(String),
}

/// Trait implemented by all invariants.
///
/// Invariants must be:
/// - Pure
/// - Deterministic
/// - Side-effect free
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    /// `previous` is `None` for the first record of the log.
    fn validate(&self, previous: Option<&Record>, record: &Record) -> InvariantResult;
}

/// The first record carries sequence id 1.
pub struct StartsAtOne;

impl Invariant for StartsAtOne {
    fn name(&self) -> &'static str {
        "starts-at-one"
    }

    fn validate(&self, previous: Option<&Record>, record: &Record) -> InvariantResult {
        match previous {
            None if record.sequence_id != 1 => InvariantResult::Fail(format!(
                "first record has sequence id {}",
                record.sequence_id
            )),
            _ => InvariantResult::Pass,
        }
    }
}

/// Each record follows its predecessor by exactly one.
pub struct ContiguousSequence;

impl Invariant for ContiguousSequence {
    fn name(&self) -> &'static str {
        "contiguous-sequence"
    }

    fn validate(&self, previous: Option<&Record>, record: &Record) -> InvariantResult {
        match previous {
            Some(prev) if prev.sequence_id.checked_add(1) != Some(record.sequence_id) => {
                InvariantResult::Fail(format!(
                    "sequence id {} follows {}",
                    record.sequence_id, prev.sequence_id
                ))
            }
            _ => InvariantResult::Pass,
        }
    }
}

/// Invariant engine that evaluates a set of invariants.
#[derive(Default)]
pub struct InvariantEngine {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantEngine {
    /// Create a new invariant engine.
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    /// Engine with the sequencing rules every log must satisfy.
    pub fn standard() -> Self {
        let mut engine = Self::new();
        engine.register(StartsAtOne);
        engine.register(ContiguousSequence);
        engine
    }

    /// Register an invariant.
    pub fn register<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Evaluate all invariants.
    ///
    /// Stops at the first failure.
    pub fn evaluate(
        &self,
        previous: Option<&Record>,
        record: &Record,
    ) -> Result<(), InvariantViolation> {
        for invariant in &self.invariants {
            match invariant.validate(previous, record) {
                InvariantResult::Pass => continue,
                InvariantResult::Fail(reason) => {
                    return Err(InvariantViolation {
                        invariant: invariant.name(),
                        sequence_id: record.sequence_id,
                        reason,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Returned when an invariant is violated.
#[derive(Debug, thiserror::Error)]
#[error("invariant `{invariant}` violated at sequence id {sequence_id}: {reason}")]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub sequence_id: u64,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Timestamp;

    fn record(sequence_id: u64) -> Record {
        Record {
            sequence_id,
            classification: "INFO".into(),
            physical_location: "lab".into(),
            content: String::new(),
            uuid: "u".into(),
            timestamp: Timestamp::now(),
        }
    }

    struct NoEmptyClassification;

    impl Invariant for NoEmptyClassification {
        fn name(&self) -> &'static str {
            "no-empty-classification"
        }

        fn validate(&self, _previous: Option<&Record>, record: &Record) -> InvariantResult {
            if record.classification.is_empty() {
                InvariantResult::Fail("classification is empty".into())
            } else {
                InvariantResult::Pass
            }
        }
    }

    #[test]
    fn gap_is_rejected() {
        let engine = InvariantEngine::standard();

        let err = engine.evaluate(Some(&record(2)), &record(4)).unwrap_err();

        assert_eq!(err.invariant, "contiguous-sequence");
        assert_eq!(err.sequence_id, 4);
    }

    #[test]
    fn first_record_must_be_one() {
        let engine = InvariantEngine::standard();

        assert!(engine.evaluate(None, &record(1)).is_ok());
        let err = engine.evaluate(None, &record(3)).unwrap_err();
        assert!(err.to_string().contains("starts-at-one"));
    }

    #[test]
    fn custom_invariant_is_evaluated() {
        let mut engine = InvariantEngine::new();
        engine.register(NoEmptyClassification);

        let mut blank = record(1);
        blank.classification.clear();

        let err = engine.evaluate(None, &blank).unwrap_err();
        assert!(err.to_string().contains("no-empty-classification"));
    }
}
