//! Solidity ABI encoding for the file-tracker contract.
//!
//! Only the three functions the tracker calls are supported:
//!
//! ```text
//! storeFileHash(bytes32 _fileHash, string _fileName, uint256 _fileSize)
//! getFileMetadata(bytes32 _fileHash) returns (string, uint256, address, uint256[])
//! getFileHashTimestamps(bytes32 _fileHash) returns (uint256[])
//! ```
//!
//! Every word is 32 bytes, big-endian. Dynamic values (`string`,
//! `uint256[]`) are referenced by a byte offset in the head and stored as
//! length-prefixed data in the tail.

use filemark_contracts::{FileMetadata, Fingerprint, TrackerError, TrackerResult};
use filemark_core::keccak256;

const WORD: usize = 32;

pub const STORE_FILE_HASH: &str = "storeFileHash(bytes32,string,uint256)";
pub const GET_FILE_METADATA: &str = "getFileMetadata(bytes32)";
pub const GET_FILE_HASH_TIMESTAMPS: &str = "getFileHashTimestamps(bytes32)";

/// First four bytes of the Keccak-256 of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// Calldata for `storeFileHash(fingerprint, file_name, file_size)`.
pub fn encode_store_file_hash(fingerprint: &Fingerprint, file_name: &str, file_size: u64) -> Vec<u8> {
    let name = file_name.as_bytes();
    let padded_len = name.len().div_ceil(WORD) * WORD;

    let mut out = Vec::with_capacity(4 + WORD * 4 + padded_len);
    out.extend_from_slice(&selector(STORE_FILE_HASH));
    out.extend_from_slice(fingerprint.as_bytes());
    out.extend_from_slice(&uint_word((3 * WORD) as u64));
    out.extend_from_slice(&uint_word(file_size));
    out.extend_from_slice(&uint_word(name.len() as u64));
    out.extend_from_slice(name);
    out.resize(out.len() + (padded_len - name.len()), 0);
    out
}

/// Calldata for `getFileMetadata(fingerprint)`.
pub fn encode_get_file_metadata(fingerprint: &Fingerprint) -> Vec<u8> {
    encode_single_hash(GET_FILE_METADATA, fingerprint)
}

/// Calldata for `getFileHashTimestamps(fingerprint)`.
pub fn encode_get_file_hash_timestamps(fingerprint: &Fingerprint) -> Vec<u8> {
    encode_single_hash(GET_FILE_HASH_TIMESTAMPS, fingerprint)
}

fn encode_single_hash(signature: &str, fingerprint: &Fingerprint) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(fingerprint.as_bytes());
    out
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// Decode the return data of `getFileMetadata`.
///
/// The zero address is reported as no owner.
pub fn decode_file_metadata(data: &[u8]) -> TrackerResult<FileMetadata> {
    let name_offset = read_offset(data, 0)?;
    let file_size = read_u64(data, WORD)?;
    let owner = read_address(data, 2 * WORD)?;
    let history_offset = read_offset(data, 3 * WORD)?;

    let name_len = read_length(data, name_offset)?;
    let name_bytes = slice(data, name_offset + WORD, name_len)?;
    let file_name = String::from_utf8(name_bytes.to_vec()).map_err(|e| TrackerError::Protocol {
        reason: format!("file name is not valid UTF-8: {e}"),
    })?;

    Ok(FileMetadata {
        file_name,
        file_size,
        owner: (owner != [0u8; 20]).then(|| format!("0x{}", hex::encode(owner))),
        history: read_u64_array(data, history_offset)?,
    })
}

/// Decode the return data of `getFileHashTimestamps`.
pub fn decode_timestamps(data: &[u8]) -> TrackerResult<Vec<u64>> {
    let offset = read_offset(data, 0)?;
    read_u64_array(data, offset)
}

fn read_u64_array(data: &[u8], offset: usize) -> TrackerResult<Vec<u64>> {
    let len = read_length(data, offset)?;
    (0..len)
        .map(|i| read_u64(data, offset + WORD + i * WORD))
        .collect()
}

fn word(data: &[u8], at: usize) -> TrackerResult<&[u8]> {
    slice(data, at, WORD)
}

fn slice(data: &[u8], at: usize, len: usize) -> TrackerResult<&[u8]> {
    at.checked_add(len)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| TrackerError::Protocol {
            reason: format!(
                "ABI data too short: need {len} bytes at offset {at}, have {}",
                data.len()
            ),
        })
}

fn read_u64(data: &[u8], at: usize) -> TrackerResult<u64> {
    let w = word(data, at)?;
    if w[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(TrackerError::Protocol {
            reason: format!("uint256 at offset {at} does not fit in 64 bits"),
        });
    }
    let mut be = [0u8; 8];
    be.copy_from_slice(&w[WORD - 8..]);
    Ok(u64::from_be_bytes(be))
}

fn read_offset(data: &[u8], at: usize) -> TrackerResult<usize> {
    let value = read_u64(data, at)?;
    usize::try_from(value).map_err(|_| TrackerError::Protocol {
        reason: format!("offset {value} out of range"),
    })
}

fn read_length(data: &[u8], at: usize) -> TrackerResult<usize> {
    let len = read_offset(data, at)?;
    // Every element occupies at least one byte of the payload.
    if len > data.len() {
        return Err(TrackerError::Protocol {
            reason: format!("length {len} exceeds ABI data size {}", data.len()),
        });
    }
    Ok(len)
}

fn read_address(data: &[u8], at: usize) -> TrackerResult<[u8; 20]> {
    let w = word(data, at)?;
    if w[..WORD - 20].iter().any(|b| *b != 0) {
        return Err(TrackerError::Protocol {
            reason: format!("address at offset {at} has non-zero padding"),
        });
    }
    let mut address = [0u8; 20];
    address.copy_from_slice(&w[WORD - 20..]);
    Ok(address)
}
