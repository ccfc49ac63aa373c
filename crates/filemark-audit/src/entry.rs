//! Audit entry and trail types.
//!
//! `AuditEntry` is a single line in a session's audit log: a human-readable
//! message plus the sequence number and SHA-256 links that make in-memory
//! tampering detectable. `AuditTrail` is the sealed copy handed to callers
//! that want to persist or display a whole session.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filemark_contracts::SessionId;

/// The sub-step of an operation an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    /// A file was selected and a new session started.
    Selection,
    /// File content was read.
    Read,
    /// A fingerprint was computed.
    Hash,
    /// A registration transaction was built or sent.
    Submit,
    /// A transaction was confirmed and the record committed.
    Confirm,
    /// A candidate fingerprint was compared with the committed one.
    Compare,
    /// Metadata or history was read from the ledger.
    Query,
    /// An operation failed or was rejected.
    Error,
}

impl AuditKind {
    /// Stable lowercase label, also used in the hash input.
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::Selection => "selection",
            AuditKind::Read => "read",
            AuditKind::Hash => "hash",
            AuditKind::Submit => "submit",
            AuditKind::Confirm => "confirm",
            AuditKind::Compare => "compare",
            AuditKind::Query => "query",
            AuditKind::Error => "error",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the SHA-256 hash chain for one session.
///
/// Each entry commits to the previous one via `prev_hash`. Modifying any
/// field invalidates `this_hash` and every later `prev_hash`, which
/// `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,

    /// The session this entry belongs to.
    pub session_id: SessionId,

    /// Which sub-step the entry records.
    pub kind: AuditKind,

    /// Human-readable description, e.g. `"File selected: report.pdf"`.
    pub message: String,

    /// Wall-clock time (UTC) the entry was appended.
    pub timestamp: DateTime<Utc>,

    /// SHA-256 hash (hex) of the previous entry, or `GENESIS_HASH`.
    pub prev_hash: String,

    /// SHA-256 hash (hex) of this entry's canonical content.
    pub this_hash: String,
}

impl AuditEntry {
    /// The sentinel `prev_hash` used for the first entry in every log.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed copy of one session's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    /// The session whose steps are recorded here.
    pub session_id: SessionId,

    /// All entries in append order.
    pub entries: Vec<AuditEntry>,

    /// Wall-clock time (UTC) the trail was exported.
    pub exported_at: DateTime<Utc>,

    /// The `this_hash` of the last entry. Empty string if the log is empty.
    pub terminal_hash: String,
}
