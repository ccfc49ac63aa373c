//! Error taxonomy for the filemark tracker.
//!
//! All fallible operations return `TrackerResult<T>`. The tracker catches
//! every error at its boundary, writes it to the audit log, and keeps the
//! most recent one in its error slot, so variants are `Clone`.
//!
//! `Mismatch` and `NotFound` are domain outcomes rather than system faults;
//! see [`TrackerError::is_fault`].

use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// The unified error type for the filemark tracker and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Reading the file content failed.
    #[error("file read failed: {reason}")]
    Io { reason: String },

    /// The bytes handed to the hash engine were corrupt or truncated.
    #[error("hash computation failed: {reason}")]
    Hash { reason: String },

    /// The ledger node could not be reached or the connection dropped.
    #[error("ledger connectivity error: {reason}")]
    Connectivity { reason: String },

    /// The signing credential is malformed or unusable.
    #[error("invalid signing credential: {reason}")]
    InvalidCredential { reason: String },

    /// A fingerprint, name, or size argument was malformed.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The ledger executed the transaction and reverted it.
    #[error("transaction reverted{}: {reason}", tx_suffix(.tx_hash))]
    TransactionReverted {
        tx_hash: Option<String>,
        reason: String,
    },

    /// The ledger node refused to accept the transaction (fees, nonce, funds).
    #[error("transaction rejected by ledger: {reason}")]
    Rejected { reason: String },

    /// The ledger node answered with something this client cannot interpret.
    #[error("ledger protocol error: {reason}")]
    Protocol { reason: String },

    /// The candidate file's content does not match the registered fingerprint.
    #[error("file content does not match the stored hash (expected {}, computed {actual})", expected_label(.expected))]
    Mismatch {
        expected: Option<Fingerprint>,
        actual: Fingerprint,
    },

    /// An operation did not complete within the configured bound.
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    /// The ledger holds no history for the queried fingerprint.
    #[error("no history found for hash {fingerprint}")]
    NotFound { fingerprint: Fingerprint },

    /// An operation that needs a selected file was invoked without one.
    #[error("no file selected")]
    NoFileSelected,

    /// The requested operation is not legal from the record's current state.
    #[error("cannot {operation} while record is {state}")]
    InvalidTransition { operation: String, state: String },

    /// Another operation on the same session has not finished yet.
    #[error("{operation} is still in progress")]
    OperationInProgress { operation: String },

    /// The session this operation belonged to was replaced by a new selection.
    #[error("operation discarded: a new file was selected")]
    Superseded,

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl TrackerError {
    /// Return false for outcomes that are user-visible but not system
    /// failures: a content mismatch and an empty ledger history.
    pub fn is_fault(&self) -> bool {
        !matches!(self, TrackerError::Mismatch { .. } | TrackerError::NotFound { .. })
    }
}

fn tx_suffix(tx_hash: &Option<String>) -> String {
    tx_hash
        .as_deref()
        .map(|h| format!(" ({h})"))
        .unwrap_or_default()
}

fn expected_label(expected: &Option<Fingerprint>) -> String {
    expected
        .map(|f| f.to_hex())
        .unwrap_or_else(|| "a registered fingerprint".to_string())
}

/// Convenience alias used throughout the filemark crates.
pub type TrackerResult<T> = Result<T, TrackerError>;
