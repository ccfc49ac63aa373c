//! Content hashing.
//!
//! The fingerprint is the EVM `keccak256` of a file's full byte content: the
//! original Keccak padding, not the NIST SHA3-256 variant. It must match the
//! ledger contract bit-for-bit because the chain decides equality.

use sha3::{Digest, Keccak256};

use filemark_contracts::{Fingerprint, FINGERPRINT_LEN};

/// Computes content fingerprints.
///
/// Stateless; every call hashes the whole buffer in a single pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEngine;

impl HashEngine {
    /// Hash `bytes` into a [`Fingerprint`].
    ///
    /// Deterministic and infallible. Empty input yields the Keccak-256 of the
    /// empty string.
    pub fn compute_fingerprint(bytes: &[u8]) -> Fingerprint {
        Fingerprint::from_bytes(keccak256(bytes))
    }
}

/// Raw Keccak-256 digest.
pub fn keccak256(data: &[u8]) -> [u8; FINGERPRINT_LEN] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&digest);
    out
}
