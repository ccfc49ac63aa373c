//! Lifecycle state, operation, and session identifier types.
//!
//! These types describe where a tracked file is in its lifecycle and which
//! user intent is acting on it. They carry no logic beyond classification;
//! the transition rules live in `filemark-core`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one tracked file.
///
/// `Registering` and `Verifying` are transient: they are only observable
/// while the corresponding ledger call is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordState {
    /// A file is selected (or nothing is), no fingerprint computed yet.
    Empty,
    /// The local fingerprint has been computed.
    Hashed,
    /// A registration transaction is being submitted or confirmed.
    Registering,
    /// The ledger confirmed the registration.
    Registered,
    /// A candidate file is being hashed and checked against the ledger.
    Verifying,
    /// The candidate matched and the ledger history was retrieved.
    Verified,
    /// The candidate's content does not match the registered fingerprint.
    Mismatched,
    /// The last operation failed; prior confirmed fields are untouched.
    Failed,
}

impl RecordState {
    /// True for states that only exist while an operation is outstanding.
    pub fn is_transient(self) -> bool {
        matches!(self, RecordState::Registering | RecordState::Verifying)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordState::Empty => "empty",
            RecordState::Hashed => "hashed",
            RecordState::Registering => "registering",
            RecordState::Registered => "registered",
            RecordState::Verifying => "verifying",
            RecordState::Verified => "verified",
            RecordState::Mismatched => "mismatched",
            RecordState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A user intent the tracker performs against the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Select,
    Upload,
    Register,
    Verify,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Select => "select",
            Operation::Upload => "upload",
            Operation::Register => "register",
            Operation::Verify => "verify",
        };
        f.write_str(label)
    }
}

/// Unique identifier for one file-selection session.
///
/// Every `select_file` starts a new session. Completions of operations that
/// were started under an older session are discarded by comparing ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Create a new, unique session ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
