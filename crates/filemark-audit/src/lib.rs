//! # filemark-audit
//!
//! Append-only, SHA-256 hash-chained audit log for one filemark session.
//!
//! ## Overview
//!
//! Every step the tracker takes (selection, read, hash, submit, confirm,
//! compare, query, error) is appended as an `AuditEntry` that links to the
//! previous entry via its SHA-256 hash. Entries are never reordered or
//! removed; a new file selection starts a new log.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filemark_audit::{AuditKind, AuditLog};
//!
//! let mut log = AuditLog::new(session_id);
//! log.append(AuditKind::Selection, "File selected: report.pdf");
//! assert!(log.verify_integrity());
//! let trail = log.export();
//! ```

pub mod chain;
pub mod entry;
pub mod log;

pub use chain::{hash_entry, verify_chain};
pub use entry::{AuditEntry, AuditKind, AuditTrail};
pub use log::AuditLog;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use filemark_contracts::SessionId;

    use super::{verify_chain, AuditEntry, AuditKind, AuditLog};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn populated_log() -> AuditLog {
        let mut log = AuditLog::new(SessionId::new());
        log.append(AuditKind::Selection, "File selected: a.txt");
        log.append(AuditKind::Read, "File content read successfully");
        log.append(AuditKind::Hash, "Computed hash: 0x00");
        log
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Sequential appends produce a valid chain.
    #[test]
    fn test_hash_chain_integrity() {
        let log = populated_log();
        assert!(log.verify_integrity(), "chain must be valid after sequential appends");
    }

    /// Mutating a stored message breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let mut log = populated_log();
        log.entries[1].message = "File content TAMPERED".to_string();

        assert!(
            !log.verify_integrity(),
            "chain must detect tampering with a stored entry"
        );
    }

    /// Swapping two entries is detected even if their hashes are untouched.
    #[test]
    fn test_reorder_detection() {
        let mut log = populated_log();
        log.entries.swap(0, 1);
        assert!(!log.verify_integrity(), "chain must detect reordering");
    }

    /// Removing an entry from the middle is detected.
    #[test]
    fn test_truncation_detection() {
        let mut log = populated_log();
        log.entries.remove(1);
        assert!(!log.verify_integrity(), "chain must detect a removed entry");
    }

    /// The first entry links to the genesis sentinel.
    #[test]
    fn test_genesis_hash() {
        let mut log = AuditLog::new(SessionId::new());
        log.append(AuditKind::Selection, "File selected: a.txt");

        assert_eq!(log.entries()[0].prev_hash, AuditEntry::GENESIS_HASH);
    }

    /// Sequence numbers are 0, 1, 2, … and messages keep append order.
    #[test]
    fn test_sequence_and_order() {
        let log = populated_log();

        for (idx, entry) in log.entries().iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
        assert_eq!(
            log.messages(),
            vec![
                "File selected: a.txt",
                "File content read successfully",
                "Computed hash: 0x00"
            ]
        );
    }

    /// Every entry carries the log's session id.
    #[test]
    fn test_entries_carry_session() {
        let session = SessionId::new();
        let mut log = AuditLog::new(session);
        log.append(AuditKind::Selection, "File selected: a.txt");
        log.append(AuditKind::Error, "No file selected");

        assert!(log.entries().iter().all(|e| e.session_id == session));
        assert_eq!(log.session_id(), session);
    }

    /// `export()` contains every entry and the terminal hash of the last one.
    #[test]
    fn test_export_trail() {
        let log = populated_log();
        let trail = log.export();

        assert_eq!(trail.session_id, log.session_id());
        assert_eq!(trail.entries.len(), 3);
        assert_eq!(trail.terminal_hash, trail.entries[2].this_hash);
        assert!(verify_chain(&trail.entries));
    }

    /// A serialized and reloaded trail still verifies.
    #[test]
    fn test_trail_survives_json() {
        let trail = populated_log().export();
        let json = serde_json::to_string(&trail).unwrap();
        let reloaded: super::AuditTrail = serde_json::from_str(&json).unwrap();

        assert!(verify_chain(&reloaded.entries));
    }

    /// An empty log is trivially valid and exports an empty terminal hash.
    #[test]
    fn test_verify_empty() {
        let log = AuditLog::new(SessionId::new());
        assert!(log.is_empty());
        assert!(log.verify_integrity());
        assert!(log.export().terminal_hash.is_empty());
        assert!(verify_chain(&[]));
    }
}
