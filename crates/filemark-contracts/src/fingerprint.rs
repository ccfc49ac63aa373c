//! Content fingerprint type.
//!
//! A `Fingerprint` is the 32-byte Keccak-256 digest of a file's full byte
//! content. It is the content-addressed identifier the ledger stores, so its
//! external form is fixed: `0x` followed by exactly 64 hex digits.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{TrackerError, TrackerResult};

/// Length in bytes of a fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// A fixed-width, opaque content fingerprint.
///
/// Equality is byte-exact. Two fingerprints are equal iff the bytes they were
/// computed from were bit-identical (up to hash collisions).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw 32 bytes (the `bytes32` value sent to the ledger).
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Render as `0x` + 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse the canonical `0x` + 64 hex digit form.
    ///
    /// Returns `TrackerError::InvalidInput` for a missing prefix, a wrong
    /// length, or non-hex characters.
    pub fn from_hex(s: &str) -> TrackerResult<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| TrackerError::InvalidInput {
                reason: format!("fingerprint '{s}' must start with 0x"),
            })?;

        if digits.len() != FINGERPRINT_LEN * 2 {
            return Err(TrackerError::InvalidInput {
                reason: format!(
                    "fingerprint must have {} hex digits, got {}",
                    FINGERPRINT_LEN * 2,
                    digits.len()
                ),
            });
        }

        let mut out = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(digits, &mut out).map_err(|e| TrackerError::InvalidInput {
            reason: format!("fingerprint '{s}' is not valid hex: {e}"),
        })?;
        Ok(Self(out))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; FINGERPRINT_LEN]> for Fingerprint {
    fn from(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}
