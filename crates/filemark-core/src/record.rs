//! The integrity record and its state machine.
//!
//! `IntegrityRecord` is the in-memory view of one tracked file. Its fields
//! are only changed through the transition methods below, which the tracker
//! calls after each sub-step succeeds, so a record is never half-updated:
//!
//! ```text
//!   Empty ──upload──► Hashed ──register──► Registering ──confirmed──► Registered
//!                       │                                               │
//!                       └──────────────verify──► Verifying ◄──verify────┘
//!                                                  │
//!                                   ┌──────────────┴──────────────┐
//!                                   ▼                             ▼
//!                               Verified                      Mismatched
//! ```
//!
//! Any failure moves the record to `Failed` and remembers the stable state
//! the failing operation started from, so the same operation can be retried
//! without re-selecting the file.

use serde::Serialize;

use filemark_contracts::{
    FileMetadata, Fingerprint, Operation, RecordState, TrackerError, TrackerResult,
};

/// One tracked file across its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityRecord {
    file_name: String,
    file_size: u64,
    local_fingerprint: Option<Fingerprint>,
    committed_id: Option<Fingerprint>,
    history: Vec<u64>,
    owner: Option<String>,
    state: RecordState,
    resume_state: Option<RecordState>,
}

impl IntegrityRecord {
    /// A record for a freshly selected file. Nothing has been hashed yet.
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            local_fingerprint: None,
            committed_id: None,
            history: Vec::new(),
            owner: None,
            state: RecordState::Empty,
            resume_state: None,
        }
    }

    /// The record the tracker holds before any file has been selected.
    pub fn unselected() -> Self {
        Self::new(String::new(), 0)
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// Informational file name; not part of the fingerprint.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Informational byte count.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Result of the most recent local hash computation.
    pub fn local_fingerprint(&self) -> Option<Fingerprint> {
        self.local_fingerprint
    }

    /// The fingerprint the ledger accepted or reported as registered.
    pub fn committed_id(&self) -> Option<Fingerprint> {
        self.committed_id
    }

    /// Registration timestamps returned by the last successful verification.
    pub fn history(&self) -> &[u64] {
        &self.history
    }

    /// Registering account reported by the ledger, if known.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// The state operations are checked against.
    ///
    /// Equal to `state()` except after a failure, where it is the stable
    /// state the failed operation started from.
    pub fn effective_state(&self) -> RecordState {
        match self.state {
            RecordState::Failed => self.resume_state.unwrap_or(RecordState::Empty),
            other => other,
        }
    }

    // ── Transition checks ────────────────────────────────────────────────────

    /// Return `Ok` if `operation` may start from the current state.
    ///
    /// Selection is always allowed. Every other operation is checked against
    /// [`effective_state`](Self::effective_state).
    pub fn check(&self, operation: Operation) -> TrackerResult<()> {
        let from = self.effective_state();
        let allowed = match operation {
            Operation::Select => true,
            Operation::Upload => matches!(from, RecordState::Empty | RecordState::Hashed),
            Operation::Register => from == RecordState::Hashed,
            Operation::Verify => matches!(
                from,
                RecordState::Hashed
                    | RecordState::Registered
                    | RecordState::Verified
                    | RecordState::Mismatched
            ),
        };

        if allowed {
            Ok(())
        } else {
            Err(TrackerError::InvalidTransition {
                operation: operation.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Enter the transient state for `operation` and return the stable state
    /// to resume from if it fails.
    pub(crate) fn begin(&mut self, operation: Operation) -> RecordState {
        let resume = self.effective_state();
        match operation {
            Operation::Register => self.state = RecordState::Registering,
            Operation::Verify => self.state = RecordState::Verifying,
            Operation::Select | Operation::Upload => {}
        }
        resume
    }

    /// A local fingerprint was computed.
    pub(crate) fn hashed(&mut self, fingerprint: Fingerprint) {
        self.local_fingerprint = Some(fingerprint);
        self.state = RecordState::Hashed;
        self.resume_state = None;
    }

    /// The ledger confirmed the registration of `fingerprint`.
    pub(crate) fn registered(&mut self, fingerprint: Fingerprint) {
        self.committed_id = Some(fingerprint);
        self.state = RecordState::Registered;
        self.resume_state = None;
    }

    /// A candidate matched `committed` and the ledger returned `metadata`.
    pub(crate) fn verified(&mut self, committed: Fingerprint, metadata: FileMetadata) {
        self.committed_id = Some(committed);
        self.history = metadata.history;
        self.owner = metadata.owner;
        self.state = RecordState::Verified;
        self.resume_state = None;
    }

    /// A candidate did not match. History is left as it was.
    pub(crate) fn mismatched(&mut self) {
        self.state = RecordState::Mismatched;
        self.resume_state = None;
    }

    /// The current attempt failed; confirmed fields are left untouched.
    pub(crate) fn failed(&mut self, resume: RecordState) {
        self.state = RecordState::Failed;
        self.resume_state = Some(resume);
    }
}

impl Default for IntegrityRecord {
    fn default() -> Self {
        Self::unselected()
    }
}

#[cfg(test)]
mod tests {
    use filemark_contracts::FINGERPRINT_LEN;

    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; FINGERPRINT_LEN])
    }

    fn hashed_record() -> IntegrityRecord {
        let mut record = IntegrityRecord::new("a.txt", 5);
        record.hashed(fp(1));
        record
    }

    #[test]
    fn new_record_is_empty() {
        let record = IntegrityRecord::new("a.txt", 5);
        assert_eq!(record.state(), RecordState::Empty);
        assert_eq!(record.file_name(), "a.txt");
        assert_eq!(record.file_size(), 5);
        assert!(record.local_fingerprint().is_none());
        assert!(record.committed_id().is_none());
        assert!(record.history().is_empty());
    }

    #[test]
    fn register_and_verify_are_rejected_before_upload() {
        let record = IntegrityRecord::new("a.txt", 5);

        assert!(record.check(Operation::Upload).is_ok());
        assert!(matches!(
            record.check(Operation::Register),
            Err(TrackerError::InvalidTransition { .. })
        ));
        assert!(matches!(
            record.check(Operation::Verify),
            Err(TrackerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn registered_record_cannot_register_again() {
        let mut record = hashed_record();
        record.begin(Operation::Register);
        record.registered(fp(1));

        assert_eq!(record.state(), RecordState::Registered);
        assert_eq!(record.committed_id(), Some(fp(1)));
        assert!(record.check(Operation::Register).is_err());
        assert!(record.check(Operation::Upload).is_err());
        assert!(record.check(Operation::Verify).is_ok());
    }

    #[test]
    fn begin_enters_transient_states() {
        let mut record = hashed_record();
        let resume = record.begin(Operation::Register);
        assert_eq!(resume, RecordState::Hashed);
        assert_eq!(record.state(), RecordState::Registering);

        let mut record = hashed_record();
        record.begin(Operation::Verify);
        assert_eq!(record.state(), RecordState::Verifying);
    }

    #[test]
    fn failure_keeps_fields_and_allows_retry_from_resume_state() {
        let mut record = hashed_record();
        let resume = record.begin(Operation::Register);
        record.failed(resume);

        assert_eq!(record.state(), RecordState::Failed);
        assert_eq!(record.effective_state(), RecordState::Hashed);
        assert_eq!(record.local_fingerprint(), Some(fp(1)));
        assert!(record.committed_id().is_none());
        assert!(record.check(Operation::Register).is_ok());
    }

    #[test]
    fn failed_upload_from_empty_only_allows_upload() {
        let mut record = IntegrityRecord::new("a.txt", 5);
        let resume = record.begin(Operation::Upload);
        record.failed(resume);

        assert_eq!(record.effective_state(), RecordState::Empty);
        assert!(record.check(Operation::Upload).is_ok());
        assert!(record.check(Operation::Register).is_err());
    }

    #[test]
    fn verified_sets_history_and_owner() {
        let mut record = hashed_record();
        record.begin(Operation::Verify);
        record.verified(
            fp(1),
            FileMetadata {
                file_name: "a.txt".to_string(),
                file_size: 5,
                owner: Some("0xabc".to_string()),
                history: vec![1_700_000_000, 1_700_000_100],
            },
        );

        assert_eq!(record.state(), RecordState::Verified);
        assert_eq!(record.committed_id(), Some(fp(1)));
        assert_eq!(record.history(), &[1_700_000_000, 1_700_000_100]);
        assert_eq!(record.owner(), Some("0xabc"));
    }

    #[test]
    fn mismatch_leaves_history_untouched() {
        let mut record = hashed_record();
        record.begin(Operation::Verify);
        record.mismatched();

        assert_eq!(record.state(), RecordState::Mismatched);
        assert!(record.history().is_empty());
        assert!(record.check(Operation::Verify).is_ok());
    }
}
