//! The per-session, append-only audit log.
//!
//! `AuditLog` keeps every entry in a `Vec` and chains each new entry to the
//! previous one. The tracker owns exactly one log per session and replaces it
//! with a fresh one when a new file is selected; there is no other way to
//! remove entries.
//!
//! Every appended entry is also emitted as a `tracing` event so the same
//! steps show up in process logs.

use chrono::Utc;
use tracing::{info, warn};

use filemark_contracts::SessionId;

use crate::{
    chain::{hash_entry, verify_chain},
    entry::{AuditEntry, AuditKind, AuditTrail},
};

/// An append-only audit log backed by a SHA-256 hash chain.
#[derive(Debug, Clone)]
pub struct AuditLog {
    session_id: SessionId,
    pub(crate) entries: Vec<AuditEntry>,
    last_hash: String,
}

impl AuditLog {
    /// Create an empty log for the given session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            entries: Vec::new(),
            last_hash: AuditEntry::GENESIS_HASH.to_string(),
        }
    }

    /// The session this log belongs to.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Append one entry and return it.
    ///
    /// Computes `this_hash` from the entry's fields and the previous hash,
    /// then advances the chain head.
    pub fn append(&mut self, kind: AuditKind, message: impl Into<String>) -> &AuditEntry {
        let message = message.into();
        let sequence = self.entries.len() as u64;
        let timestamp = Utc::now();
        let prev_hash = self.last_hash.clone();

        let this_hash = hash_entry(
            &self.session_id,
            sequence,
            kind,
            &message,
            &timestamp,
            &prev_hash,
        );

        match kind {
            AuditKind::Error => warn!(
                session_id = %self.session_id,
                sequence,
                kind = %kind,
                "{message}"
            ),
            _ => info!(
                session_id = %self.session_id,
                sequence,
                kind = %kind,
                "{message}"
            ),
        }

        self.last_hash = this_hash.clone();
        self.entries.push(AuditEntry {
            sequence,
            session_id: self.session_id,
            kind,
            message,
            timestamp,
            prev_hash,
            this_hash,
        });

        &self.entries[self.entries.len() - 1]
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Just the human-readable messages, in append order.
    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export a sealed `AuditTrail` of everything appended so far.
    pub fn export(&self) -> AuditTrail {
        let terminal_hash = self
            .entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        AuditTrail {
            session_id: self.session_id,
            entries: self.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.entries)
    }
}
