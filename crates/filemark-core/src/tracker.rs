//! The filemark tracker: the async state machine behind every user intent.
//!
//! The tracker enforces the integrity-tracking model for one file selection
//! at a time:
//!
//!   select → upload (read → hash) → register (submit → confirm)
//!                                 → verify  (read → hash → compare → query)
//!
//! Each public operation is one async function with that ordering. Every
//! sub-step is appended to the session's audit log before the operation
//! returns, and every error is caught here, logged, stored in the error slot,
//! and returned as a `TrackerResult`.
//!
//! The session lives behind a mutex that is never held across an `.await`.
//! An operation remembers the `SessionId` it started under; if the user
//! selects a new file while it is suspended, its completion is discarded and
//! the caller receives `TrackerError::Superseded`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use filemark_audit::{AuditEntry, AuditKind, AuditLog, AuditTrail};
use filemark_contracts::{
    Confirmation, FileMetadata, Fingerprint, Operation, RecordState, SessionId,
    SigningCredential, TrackerError, TrackerResult,
};

use crate::hash::HashEngine;
use crate::record::IntegrityRecord;
use crate::traits::{FileSource, LedgerClient};

// ── Options and results ──────────────────────────────────────────────────────

/// Tunables for a [`Tracker`].
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    /// Upper bound for each suspension point (file read, submission,
    /// confirmation, query). `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,
}

impl TrackerOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            operation_timeout: Some(timeout),
        }
    }
}

/// A confirmed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The fingerprint now committed on the ledger.
    pub fingerprint: Fingerprint,
    /// Where and when the ledger finalized it.
    pub confirmation: Confirmation,
}

/// The outcome of a verification that ran to completion.
///
/// A mismatch is a domain result, not a failure, so it is returned as `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The candidate matches a registered fingerprint.
    Verified {
        fingerprint: Fingerprint,
        metadata: FileMetadata,
    },
    /// The candidate's content does not match.
    Mismatched {
        /// The committed fingerprint, or `None` when the ledger knows no
        /// registration for the candidate's content.
        expected: Option<Fingerprint>,
        actual: Fingerprint,
    },
}

/// Everything a presentation layer needs to render after an operation.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub session_id: SessionId,
    pub record: IntegrityRecord,
    pub audit: Vec<AuditEntry>,
    /// The most recent error or notice; cleared when the next operation starts.
    pub error: Option<TrackerError>,
    /// The operation currently suspended on this session, if any.
    pub in_flight: Option<Operation>,
}

impl TrackerSnapshot {
    /// The audit log's messages in append order.
    pub fn messages(&self) -> Vec<&str> {
        self.audit.iter().map(|e| e.message.as_str()).collect()
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

/// One file selection: the record, its audit log, and the error slot.
struct Session {
    id: SessionId,
    source: Option<Arc<dyn FileSource>>,
    record: IntegrityRecord,
    audit: AuditLog,
    error: Option<TrackerError>,
    in_flight: Option<Operation>,
}

impl Session {
    fn unselected() -> Self {
        let id = SessionId::new();
        Self {
            id,
            source: None,
            record: IntegrityRecord::unselected(),
            audit: AuditLog::new(id),
            error: None,
            in_flight: None,
        }
    }

    fn selected(source: Arc<dyn FileSource>) -> Self {
        let id = SessionId::new();
        let mut audit = AuditLog::new(id);
        audit.append(
            AuditKind::Selection,
            format!("File selected: {}", source.name()),
        );
        Self {
            id,
            record: IntegrityRecord::new(source.name(), source.size()),
            source: Some(source),
            audit,
            error: None,
            in_flight: None,
        }
    }

    /// Record `err` without touching the record's state.
    fn reject(&mut self, context: &str, err: TrackerError) -> TrackerError {
        self.audit
            .append(AuditKind::Error, format!("{context}: {err}"));
        self.error = Some(err.clone());
        err
    }

    /// Move the record to `Failed` and record `err`.
    fn fail(&mut self, resume: RecordState, context: &str, err: TrackerError) -> TrackerError {
        self.in_flight = None;
        self.record.failed(resume);
        self.reject(context, err)
    }

    /// Check that `operation` may start now. Clears the error slot first.
    fn ensure_ready(&mut self, operation: Operation) -> TrackerResult<()> {
        self.error = None;
        let context = format!("Cannot {operation}");

        if let Some(busy) = self.in_flight {
            return Err(self.reject(
                &context,
                TrackerError::OperationInProgress {
                    operation: busy.to_string(),
                },
            ));
        }
        if self.source.is_none() {
            return Err(self.reject(&context, TrackerError::NoFileSelected));
        }
        if let Err(err) = self.record.check(operation) {
            return Err(self.reject(&context, err));
        }
        Ok(())
    }

    /// Mark `operation` as outstanding and return the state to resume from.
    fn launch(&mut self, operation: Operation) -> RecordState {
        self.in_flight = Some(operation);
        self.record.begin(operation)
    }

    /// Conclude the outstanding operation successfully. Its outcome replaces
    /// whatever a rejected call left in the error slot.
    fn settle(&mut self) {
        self.in_flight = None;
        self.error = None;
    }

    /// Conclude a verification with a content mismatch.
    fn mismatch(&mut self, expected: Option<Fingerprint>, actual: Fingerprint) -> Verification {
        self.audit
            .append(AuditKind::Compare, "File content does not match the stored hash");
        self.record.mismatched();
        self.settle();
        self.error = Some(TrackerError::Mismatch { expected, actual });
        Verification::Mismatched { expected, actual }
    }

    fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            session_id: self.id,
            record: self.record.clone(),
            audit: self.audit.entries().to_vec(),
            error: self.error.clone(),
            in_flight: self.in_flight,
        }
    }
}

// ── Tracker ──────────────────────────────────────────────────────────────────

/// Orchestrates hashing, the integrity record, and the ledger for one file
/// selection at a time.
///
/// All methods take `&self`; share a tracker across tasks with `Arc`.
pub struct Tracker {
    ledger: Arc<dyn LedgerClient>,
    credential: Arc<SigningCredential>,
    options: TrackerOptions,
    session: Mutex<Session>,
}

impl Tracker {
    /// Create a tracker over an already-configured ledger client.
    ///
    /// The credential is only ever read.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        credential: Arc<SigningCredential>,
        options: TrackerOptions,
    ) -> Self {
        Self {
            ledger,
            credential,
            options,
            session: Mutex::new(Session::unselected()),
        }
    }

    /// Start a new session for `source`.
    ///
    /// Always allowed. Discards the previous record, audit log, and error
    /// slot; an operation still suspended on the previous session will have
    /// its completion discarded.
    pub fn select_file(&self, source: Arc<dyn FileSource>) -> SessionId {
        let next = Session::selected(source);
        let id = next.id;

        let mut session = self.lock();
        if let Some(outstanding) = session.in_flight {
            debug!(
                session_id = %session.id,
                operation = %outstanding,
                "superseding session with an outstanding operation"
            );
        }
        *session = next;
        id
    }

    /// Read the selected file and compute its fingerprint.
    ///
    /// Legal from `Empty` and `Hashed`. A failed read moves the record to
    /// `Failed`; it is never retried automatically.
    pub async fn upload(&self) -> TrackerResult<Fingerprint> {
        let (session_id, source, resume) = {
            let mut session = self.lock();
            session.ensure_ready(Operation::Upload)?;
            let Some(source) = session.source.clone() else {
                return Err(TrackerError::NoFileSelected);
            };
            let resume = session.launch(Operation::Upload);
            (session.id, source, resume)
        };
        debug!(session_id = %session_id, operation = "upload", "operation starting");

        let hashed = self
            .bounded("file read", source.read_bytes())
            .await
            .map(|bytes| HashEngine::compute_fingerprint(&bytes));

        let mut session = self.reattach(session_id)?;
        let fingerprint = match hashed {
            Ok(fingerprint) => fingerprint,
            Err(err) => return Err(session.fail(resume, "Error computing hash", err)),
        };

        session
            .audit
            .append(AuditKind::Read, "File content read successfully");
        session
            .audit
            .append(AuditKind::Hash, format!("Computed hash: {fingerprint}"));
        session.record.hashed(fingerprint);
        session.settle();

        info!(session_id = %session_id, fingerprint = %fingerprint, "file hashed");
        Ok(fingerprint)
    }

    /// Register the local fingerprint on the ledger and wait for it to be
    /// final.
    ///
    /// Legal from `Hashed` (including a `Failed` record whose last stable
    /// state was `Hashed`). Requires a fingerprint, a file name, and a
    /// non-zero file size; otherwise fails fast without a ledger call.
    pub async fn register_on_chain(&self) -> TrackerResult<Registration> {
        let (session_id, fingerprint, file_name, file_size, resume) = {
            let mut session = self.lock();
            session.ensure_ready(Operation::Register)?;

            let record = &session.record;
            let ready = match record.local_fingerprint() {
                Some(fp) if !record.file_name().is_empty() && record.file_size() > 0 => Some((
                    fp,
                    record.file_name().to_string(),
                    record.file_size(),
                )),
                _ => None,
            };
            let Some((fingerprint, file_name, file_size)) = ready else {
                return Err(session.reject(
                    "Cannot register",
                    TrackerError::InvalidInput {
                        reason: "file hash, name, or size is missing".to_string(),
                    },
                ));
            };

            let resume = session.launch(Operation::Register);
            session.audit.append(
                AuditKind::Submit,
                format!("Submitting {fingerprint} for {file_name} ({file_size} bytes)"),
            );
            (session.id, fingerprint, file_name, file_size, resume)
        };
        debug!(session_id = %session_id, operation = "register", "operation starting");

        // ── Submission ───────────────────────────────────────────────────────
        let submitted = self
            .bounded(
                "transaction submission",
                self.ledger
                    .register_fingerprint(&fingerprint, &file_name, file_size, &self.credential),
            )
            .await;

        let tx = {
            let mut session = self.reattach(session_id)?;
            match submitted {
                Ok(tx) => {
                    session
                        .audit
                        .append(AuditKind::Submit, format!("Transaction sent: {tx}"));
                    tx
                }
                Err(err) => {
                    return Err(session.fail(resume, "Error submitting transaction", err));
                }
            }
        };

        // ── Confirmation ─────────────────────────────────────────────────────
        let confirmed = self
            .bounded("transaction confirmation", self.ledger.await_confirmation(&tx))
            .await;

        let mut session = self.reattach(session_id)?;
        let confirmation = match confirmed {
            Ok(confirmation) => confirmation,
            Err(err) => return Err(session.fail(resume, "Error confirming transaction", err)),
        };

        session.audit.append(
            AuditKind::Confirm,
            format!("Transaction confirmed in block {}", confirmation.block_number),
        );
        session.record.registered(fingerprint);
        session
            .audit
            .append(AuditKind::Confirm, format!("File ID set: {fingerprint}"));
        session.settle();

        info!(
            session_id = %session_id,
            fingerprint = %fingerprint,
            tx_hash = %confirmation.tx,
            block = confirmation.block_number,
            "registration confirmed"
        );
        Ok(Registration {
            fingerprint,
            confirmation,
        })
    }

    /// Verify `candidate` against this session's committed fingerprint and
    /// fetch its ledger history.
    ///
    /// With a committed fingerprint, a differing candidate is `Mismatched`
    /// without touching the ledger. Without one, the ledger is queried by
    /// the candidate's own fingerprint: a registration on record verifies it,
    /// an empty history is a mismatch.
    pub async fn verify(&self, candidate: Arc<dyn FileSource>) -> TrackerResult<Verification> {
        let (session_id, committed, resume) = {
            let mut session = self.lock();
            session.ensure_ready(Operation::Verify)?;
            let resume = session.launch(Operation::Verify);
            session.audit.append(
                AuditKind::Read,
                format!("Reading {} for verification", candidate.name()),
            );
            (session.id, session.record.committed_id(), resume)
        };
        debug!(session_id = %session_id, operation = "verify", "operation starting");

        let hashed = self
            .bounded("file read", candidate.read_bytes())
            .await
            .map(|bytes| HashEngine::compute_fingerprint(&bytes));

        // ── Compare ──────────────────────────────────────────────────────────
        let key = {
            let mut session = self.reattach(session_id)?;
            let actual = match hashed {
                Ok(fingerprint) => fingerprint,
                Err(err) => {
                    return Err(session.fail(resume, "Error computing hash for verification", err));
                }
            };
            session.audit.append(
                AuditKind::Read,
                "File content read successfully for verification",
            );
            session.audit.append(
                AuditKind::Hash,
                format!("Computed hash for verification: {actual}"),
            );

            match committed {
                Some(expected) if expected != actual => {
                    return Ok(session.mismatch(Some(expected), actual));
                }
                Some(expected) => {
                    session.audit.append(
                        AuditKind::Compare,
                        format!("Computed hash matches file ID {expected}"),
                    );
                    expected
                }
                None => {
                    session.audit.append(
                        AuditKind::Compare,
                        "No file ID in this session, querying ledger by computed hash",
                    );
                    actual
                }
            }
        };

        // ── Query ────────────────────────────────────────────────────────────
        let queried = self
            .bounded("metadata query", self.ledger.query_metadata(&key))
            .await;

        let mut session = self.reattach(session_id)?;
        let metadata = match queried {
            Ok(metadata) => metadata,
            Err(err) => return Err(session.fail(resume, "Error verifying data", err)),
        };
        session.audit.append(
            AuditKind::Query,
            format!(
                "Metadata retrieved: name={:?}, size={}, owner={}, {} timestamp(s)",
                metadata.file_name,
                metadata.file_size,
                metadata.owner.as_deref().unwrap_or("none"),
                metadata.history.len()
            ),
        );

        let notice = if metadata.is_unregistered() {
            if committed.is_none() {
                return Ok(session.mismatch(None, key));
            }
            session
                .audit
                .append(AuditKind::Query, "No history found for this hash");
            Some(TrackerError::NotFound { fingerprint: key })
        } else {
            None
        };

        session.record.verified(key, metadata.clone());
        session
            .audit
            .append(AuditKind::Compare, format!("File verified: {key}"));
        session.settle();
        session.error = notice;

        info!(
            session_id = %session_id,
            fingerprint = %key,
            history_len = metadata.history.len(),
            "file verified"
        );
        Ok(Verification::Verified {
            fingerprint: key,
            metadata,
        })
    }

    /// Verify the currently selected file by reading it again.
    pub async fn verify_selected(&self) -> TrackerResult<Verification> {
        let source = {
            let mut session = self.lock();
            match session.source.clone() {
                Some(source) => source,
                None => {
                    session.error = None;
                    return Err(session.reject(
                        "No file selected for verification",
                        TrackerError::NoFileSelected,
                    ));
                }
            }
        };
        self.verify(source).await
    }

    /// A copy of the current record, audit log, and error slot.
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.lock().snapshot()
    }

    /// A sealed copy of the current session's audit log.
    pub fn audit_trail(&self) -> AuditTrail {
        self.lock().audit.export()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-enter the session after a suspension point, or report that it was
    /// superseded by a new selection.
    fn reattach(&self, session_id: SessionId) -> TrackerResult<MutexGuard<'_, Session>> {
        let session = self.lock();
        if session.id != session_id {
            debug!(
                stale_session = %session_id,
                current_session = %session.id,
                "discarding completion of superseded session"
            );
            return Err(TrackerError::Superseded);
        }
        Ok(session)
    }

    /// Apply the configured timeout to one suspension point.
    async fn bounded<T, F>(&self, what: &str, fut: F) -> TrackerResult<T>
    where
        F: Future<Output = TrackerResult<T>>,
    {
        match self.options.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(TrackerError::Timeout {
                    operation: what.to_string(),
                    after_ms: whole_millis(limit),
                }),
            },
            None => fut.await,
        }
    }
}

/// `limit` in milliseconds, saturating at `u64::MAX`.
fn whole_millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ────────────────────────────────────────────────────────────────────
