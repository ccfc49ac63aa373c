//! Collaborator traits for the filemark tracker.
//!
//! These two traits are the tracker's only view of the outside world:
//!
//! - `LedgerClient`: the remote, append-only ledger (submit, confirm, query)
//! - `FileSource`: something that can hand over a file's bytes
//!
//! Both are async and object-safe (`async-trait`), so the tracker can hold
//! them as `Arc<dyn …>` and the presentation layer decides which concrete
//! implementations to wire in.

use async_trait::async_trait;

use filemark_contracts::{
    Confirmation, FileMetadata, Fingerprint, SigningCredential, TrackerResult, TxHandle,
};

/// The ledger that stores fingerprints and their registration history.
///
/// Submission and confirmation are separate calls so the tracker can log and
/// report the two failure modes distinctly: a submission failure means the
/// ledger never accepted the transaction, a confirmation failure means it
/// accepted it and later reverted or lost it.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a registration of `fingerprint` signed with `credential`.
    ///
    /// Returns as soon as the ledger acknowledges the transaction. Errors:
    /// `InvalidInput` for an empty name, `InvalidCredential` for an unusable
    /// key, `Connectivity` for transport failures, `Rejected` when the ledger
    /// refuses the transaction.
    async fn register_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        file_name: &str,
        file_size: u64,
        credential: &SigningCredential,
    ) -> TrackerResult<TxHandle>;

    /// Suspend until `tx` is final.
    ///
    /// Imposes no timeout of its own; bounding the wait is the caller's job.
    /// Returns `TransactionReverted` if the ledger executed and rejected it.
    async fn await_confirmation(&self, tx: &TxHandle) -> TrackerResult<Confirmation>;

    /// Read everything stored for `fingerprint`.
    ///
    /// Read-only and idempotent. A fingerprint that was never registered
    /// yields `FileMetadata::default()` rather than an error.
    async fn query_metadata(&self, fingerprint: &Fingerprint) -> TrackerResult<FileMetadata>;

    /// Read only the registration timestamps for `fingerprint`.
    async fn query_history(&self, fingerprint: &Fingerprint) -> TrackerResult<Vec<u64>>;
}

/// A selected file whose bytes can be read on demand.
///
/// `name` and `size` are captured at selection time and are informational;
/// `read_bytes` returns the whole content as one contiguous buffer.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Display name of the file.
    fn name(&self) -> &str;

    /// Byte count observed at selection time.
    fn size(&self) -> u64;

    /// Read the full content.
    ///
    /// Returns `Io` if the read fails and `Hash` if fewer bytes than `size()`
    /// come back.
    async fn read_bytes(&self) -> TrackerResult<Vec<u8>>;
}
