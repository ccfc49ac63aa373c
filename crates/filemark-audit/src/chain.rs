//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. session_id as UTF-8 bytes (hyphenated UUID)
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. kind label as UTF-8 bytes
//!   5. timestamp as RFC 3339 with nanoseconds, UTF-8
//!   6. message as UTF-8 bytes
//!
//! Variable-length fields are length-prefixed (8-byte little-endian) so two
//! different field splits can never produce the same input.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use filemark_contracts::SessionId;

use crate::entry::{AuditEntry, AuditKind};

/// Compute the SHA-256 hash for a single audit entry.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(
    session_id: &SessionId,
    sequence: u64,
    kind: AuditKind,
    message: &str,
    timestamp: &DateTime<Utc>,
    prev_hash: &str,
) -> String {
    let session = session_id.to_string();
    let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);

    let mut hasher = Sha256::new();
    update_field(&mut hasher, session.as_bytes());
    hasher.update(sequence.to_le_bytes());
    update_field(&mut hasher, prev_hash.as_bytes());
    update_field(&mut hasher, kind.as_str().as_bytes());
    update_field(&mut hasher, stamp.as_bytes());
    update_field(&mut hasher, message.as_bytes());

    hex::encode(hasher.finalize())
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Verify the integrity of an audit chain.
///
/// Returns `true` when every entry links to its predecessor (or to
/// `GENESIS_HASH` for the first), carries the expected sequence number, and
/// its `this_hash` matches the value recomputed from its own fields. An empty
/// chain is valid.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    let mut expected_prev = AuditEntry::GENESIS_HASH.to_string();

    for (position, entry) in entries.iter().enumerate() {
        if entry.sequence != position as u64 || entry.prev_hash != expected_prev {
            return false;
        }

        let recomputed = hash_entry(
            &entry.session_id,
            entry.sequence,
            entry.kind,
            &entry.message,
            &entry.timestamp,
            &entry.prev_hash,
        );
        if entry.this_hash != recomputed {
            return false;
        }

        expected_prev = entry.this_hash.clone();
    }

    true
}
