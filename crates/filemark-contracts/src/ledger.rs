//! Data exchanged with the ledger.
//!
//! These types mirror the contract surface the tracker consumes: a signed
//! registration produces a `TxHandle`, confirming it yields a
//! `Confirmation`, and read queries return `FileMetadata`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};

/// Handle to a submitted, not necessarily confirmed, transaction.
///
/// For EVM ledgers this is the `0x`-prefixed transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof that a submitted registration became final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// The transaction that was confirmed.
    pub tx: TxHandle,
    /// Block that included the transaction.
    pub block_number: u64,
}

/// Everything the ledger stores about one fingerprint.
///
/// A fingerprint that was never registered yields the `Default` value: empty
/// name, zero size, no owner, and an empty history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File name given at the most recent registration.
    pub file_name: String,
    /// File size given at the most recent registration.
    pub file_size: u64,
    /// Account that registered the fingerprint, `0x`-prefixed hex.
    pub owner: Option<String>,
    /// Registration timestamps in seconds since the Unix epoch, oldest first.
    pub history: Vec<u64>,
}

impl FileMetadata {
    /// True when the ledger has never seen this fingerprint.
    pub fn is_unregistered(&self) -> bool {
        self.history.is_empty()
    }
}

/// Length in bytes of a secp256k1 secret key.
pub const CREDENTIAL_LEN: usize = 32;

/// The secret key used to sign registration transactions.
///
/// The tracker treats it as an opaque, read-only input; it is never logged
/// (`Debug` is redacted) and never mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredential {
    secret: [u8; CREDENTIAL_LEN],
}

impl SigningCredential {
    /// Wrap a raw secret key.
    ///
    /// Returns `InvalidCredential` for the all-zero key, which no curve
    /// accepts. Range checks against the curve order happen when the ledger
    /// client derives its signing key.
    pub fn from_bytes(secret: [u8; CREDENTIAL_LEN]) -> TrackerResult<Self> {
        if secret.iter().all(|b| *b == 0) {
            return Err(TrackerError::InvalidCredential {
                reason: "secret key must not be zero".to_string(),
            });
        }
        Ok(Self { secret })
    }

    /// Parse a hex secret key, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> TrackerResult<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let mut secret = [0u8; CREDENTIAL_LEN];
        hex::decode_to_slice(digits, &mut secret).map_err(|e| {
            TrackerError::InvalidCredential {
                reason: format!("secret key must be {} hex bytes: {e}", CREDENTIAL_LEN),
            }
        })?;
        Self::from_bytes(secret)
    }

    /// Borrow the raw secret bytes.
    pub fn secret_bytes(&self) -> &[u8; CREDENTIAL_LEN] {
        &self.secret
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningCredential(<redacted>)")
    }
}
