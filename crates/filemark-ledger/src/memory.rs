//! In-process ledger with the file-tracker contract's semantics.
//!
//! Each confirmed registration overwrites the stored name, size and owner
//! and appends the confirmation time to the fingerprint's history. Used by
//! tests and by the CLI when no node is configured.
//!
//! Two knobs make the asynchronous paths observable:
//! - manual confirmation: `await_confirmation` suspends until the test
//!   calls [`InMemoryLedger::release`] or [`InMemoryLedger::release_all`]
//! - one-shot failure injection for the next submission or confirmation

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, info};

use filemark_contracts::{
    Confirmation, FileMetadata, Fingerprint, SigningCredential, TrackerError, TrackerResult,
    TxHandle,
};
use filemark_core::{keccak256, LedgerClient};

use crate::signer::LocalSigner;

#[derive(Debug)]
struct PendingRegistration {
    fingerprint: Fingerprint,
    file_name: String,
    file_size: u64,
    owner: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    files: HashMap<Fingerprint, FileMetadata>,
    pending: HashMap<TxHandle, PendingRegistration>,
    /// Subset of `pending`; entries leave with their transaction.
    released: HashSet<TxHandle>,
    /// Receipts of every confirmed transaction. Kept for the ledger's
    /// lifetime so repeated awaits return the same confirmation, so it grows
    /// with the number of registrations like `files` does.
    confirmed: HashMap<TxHandle, Confirmation>,
    block_number: u64,
    submissions: u64,
    fail_submission: Option<TrackerError>,
    fail_confirmation: Option<TrackerError>,
}

/// A ledger that lives in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    release: Notify,
    manual: bool,
}

impl InMemoryLedger {
    /// A ledger that confirms every transaction as soon as it is awaited.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose confirmations wait for [`release`](Self::release).
    pub fn with_manual_confirmation() -> Self {
        Self {
            manual: true,
            ..Self::default()
        }
    }

    /// Let the confirmation of `tx` complete. No effect unless `tx` is
    /// pending.
    pub fn release(&self, tx: &TxHandle) {
        {
            let mut state = self.lock();
            if !state.pending.contains_key(tx) {
                return;
            }
            state.released.insert(tx.clone());
        }
        self.release.notify_waiters();
    }

    /// Let every currently pending confirmation complete.
    pub fn release_all(&self) {
        {
            let mut state = self.lock();
            let pending: Vec<TxHandle> = state.pending.keys().cloned().collect();
            state.released.extend(pending);
        }
        self.release.notify_waiters();
    }

    /// Make the next `register_fingerprint` call fail with `err`.
    pub fn fail_next_submission(&self, err: TrackerError) {
        self.lock().fail_submission = Some(err);
    }

    /// Make the next confirmation fail with `err`. The transaction is
    /// dropped without touching stored metadata.
    pub fn fail_next_confirmation(&self, err: TrackerError) {
        self.lock().fail_confirmation = Some(err);
    }

    /// Number of submitted transactions not yet confirmed or failed.
    pub fn pending_transactions(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a released registration to the store.
    fn finalize(&self, tx: &TxHandle) -> TrackerResult<Confirmation> {
        let mut state = self.lock();
        if let Some(done) = state.confirmed.get(tx) {
            return Ok(done.clone());
        }
        state.released.remove(tx);

        let Some(registration) = state.pending.remove(tx) else {
            return Err(TrackerError::Protocol {
                reason: format!("unknown transaction {tx}"),
            });
        };

        if let Some(err) = state.fail_confirmation.take() {
            debug!(tx_hash = %tx, error = %err, "injected confirmation failure");
            return Err(match err {
                TrackerError::TransactionReverted { tx_hash: None, reason } => {
                    TrackerError::TransactionReverted {
                        tx_hash: Some(tx.0.clone()),
                        reason,
                    }
                }
                other => other,
            });
        }

        state.block_number += 1;
        let block_number = state.block_number;
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();

        let entry = state.files.entry(registration.fingerprint).or_default();
        entry.file_name = registration.file_name;
        entry.file_size = registration.file_size;
        entry.owner = Some(registration.owner);
        entry.history.push(timestamp);

        let confirmation = Confirmation {
            tx: tx.clone(),
            block_number,
        };
        state.confirmed.insert(tx.clone(), confirmation.clone());

        info!(
            tx_hash = %tx,
            fingerprint = %registration.fingerprint,
            block = block_number,
            timestamp,
            "registration confirmed"
        );
        Ok(confirmation)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn register_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        file_name: &str,
        file_size: u64,
        credential: &SigningCredential,
    ) -> TrackerResult<TxHandle> {
        if file_name.is_empty() {
            return Err(TrackerError::InvalidInput {
                reason: "file name must not be empty".to_string(),
            });
        }
        let owner = LocalSigner::from_credential(credential)?.address_hex();

        let mut state = self.lock();
        if let Some(err) = state.fail_submission.take() {
            debug!(fingerprint = %fingerprint, error = %err, "injected submission failure");
            return Err(err);
        }

        state.submissions += 1;
        let mut seed = fingerprint.as_bytes().to_vec();
        seed.extend_from_slice(&state.submissions.to_be_bytes());
        let tx = TxHandle(format!("0x{}", hex::encode(keccak256(&seed))));

        state.pending.insert(
            tx.clone(),
            PendingRegistration {
                fingerprint: *fingerprint,
                file_name: file_name.to_string(),
                file_size,
                owner,
            },
        );
        debug!(fingerprint = %fingerprint, tx_hash = %tx, "registration submitted");
        Ok(tx)
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> TrackerResult<Confirmation> {
        loop {
            // Created before the check so a release between the check and the
            // await is not missed.
            let released = self.release.notified();
            {
                let state = self.lock();
                let ready = !self.manual
                    || state.released.contains(tx)
                    || state.confirmed.contains_key(tx)
                    || !state.pending.contains_key(tx);
                if ready {
                    break;
                }
            }
            released.await;
        }
        self.finalize(tx)
    }

    async fn query_metadata(&self, fingerprint: &Fingerprint) -> TrackerResult<FileMetadata> {
        Ok(self.lock().files.get(fingerprint).cloned().unwrap_or_default())
    }

    async fn query_history(&self, fingerprint: &Fingerprint) -> TrackerResult<Vec<u64>> {
        Ok(self
            .lock()
            .files
            .get(fingerprint)
            .map(|m| m.history.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use filemark_core::HashEngine;

    use super::*;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn credential() -> SigningCredential {
        SigningCredential::from_hex(DEV_KEY).unwrap()
    }

    #[tokio::test]
    async fn register_then_query_round_trip() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"report");
        let before = Utc::now().timestamp() as u64;

        let tx = ledger
            .register_fingerprint(&fp, "report.pdf", 6, &credential())
            .await
            .unwrap();
        assert_eq!(ledger.pending_transactions(), 1);
        let confirmation = ledger.await_confirmation(&tx).await.unwrap();
        assert_eq!(confirmation.tx, tx);
        assert_eq!(confirmation.block_number, 1);
        assert_eq!(ledger.pending_transactions(), 0);

        let metadata = ledger.query_metadata(&fp).await.unwrap();
        assert_eq!(metadata.file_name, "report.pdf");
        assert_eq!(metadata.file_size, 6);
        assert_eq!(
            metadata.owner.as_deref(),
            Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        assert_eq!(metadata.history.len(), 1);
        assert!(metadata.history[0] >= before);
        assert_eq!(ledger.query_history(&fp).await.unwrap(), metadata.history);
    }

    #[tokio::test]
    async fn query_is_idempotent_and_unknown_is_empty() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"nobody registered this");

        let first = ledger.query_metadata(&fp).await.unwrap();
        let second = ledger.query_metadata(&fp).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_unregistered());
        assert!(ledger.query_history(&fp).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn re_registration_appends_history() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"twice");

        for name in ["first.txt", "second.txt"] {
            let tx = ledger
                .register_fingerprint(&fp, name, 5, &credential())
                .await
                .unwrap();
            ledger.await_confirmation(&tx).await.unwrap();
        }

        let metadata = ledger.query_metadata(&fp).await.unwrap();
        assert_eq!(metadata.file_name, "second.txt");
        assert_eq!(metadata.history.len(), 2);
        assert!(metadata.history[0] <= metadata.history[1]);
    }

    #[tokio::test]
    async fn distinct_submissions_get_distinct_handles() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"same");
        let a = ledger.register_fingerprint(&fp, "a", 1, &credential()).await.unwrap();
        let b = ledger.register_fingerprint(&fp, "a", 1, &credential()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"x");
        assert!(matches!(
            ledger.register_fingerprint(&fp, "", 1, &credential()).await,
            Err(TrackerError::InvalidInput { .. })
        ));
        assert_eq!(ledger.pending_transactions(), 0);
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"flaky");

        ledger.fail_next_submission(TrackerError::Connectivity {
            reason: "connection refused".to_string(),
        });
        assert!(matches!(
            ledger.register_fingerprint(&fp, "f", 1, &credential()).await,
            Err(TrackerError::Connectivity { .. })
        ));

        ledger.fail_next_confirmation(TrackerError::TransactionReverted {
            tx_hash: None,
            reason: "status 0x0".to_string(),
        });
        let tx = ledger.register_fingerprint(&fp, "f", 1, &credential()).await.unwrap();
        match ledger.await_confirmation(&tx).await {
            Err(TrackerError::TransactionReverted { tx_hash, .. }) => {
                assert_eq!(tx_hash, Some(tx.0.clone()));
            }
            other => panic!("expected TransactionReverted, got {other:?}"),
        }
        assert!(ledger.query_metadata(&fp).await.unwrap().is_unregistered());

        let tx = ledger.register_fingerprint(&fp, "f", 1, &credential()).await.unwrap();
        assert!(ledger.await_confirmation(&tx).await.is_ok());
    }

    #[tokio::test]
    async fn manual_confirmation_waits_for_release() {
        let ledger = Arc::new(InMemoryLedger::with_manual_confirmation());
        let fp = HashEngine::compute_fingerprint(b"slow");
        let tx = ledger.register_fingerprint(&fp, "slow", 4, &credential()).await.unwrap();

        let waiter = {
            let ledger = ledger.clone();
            let tx = tx.clone();
            tokio::spawn(async move { ledger.await_confirmation(&tx).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert!(ledger.query_metadata(&fp).await.unwrap().is_unregistered());

        ledger.release(&tx);
        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(ledger.query_history(&fp).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_transaction_is_protocol_error() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.await_confirmation(&TxHandle("0xnope".to_string())).await,
            Err(TrackerError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_credential_is_rejected() {
        let ledger = InMemoryLedger::new();
        let fp = HashEngine::compute_fingerprint(b"x");
        let bad = SigningCredential::from_bytes([0xFF; 32]).unwrap();
        assert!(matches!(
            ledger.register_fingerprint(&fp, "x", 1, &bad).await,
            Err(TrackerError::InvalidCredential { .. })
        ));
    }

    #[tokio::test]
    async fn release_bookkeeping_is_dropped_with_the_transaction() {
        let ledger = InMemoryLedger::with_manual_confirmation();
        let credential = credential();
        let ok = HashEngine::compute_fingerprint(b"kept");
        let bad = HashEngine::compute_fingerprint(b"reverted");

        let tx_ok = ledger
            .register_fingerprint(&ok, "kept.txt", 4, &credential)
            .await
            .unwrap();
        let tx_bad = ledger
            .register_fingerprint(&bad, "reverted.txt", 8, &credential)
            .await
            .unwrap();

        ledger.release(&TxHandle("0xnot-submitted".to_string()));
        assert!(ledger.lock().released.is_empty());

        ledger.release(&tx_ok);
        ledger.await_confirmation(&tx_ok).await.unwrap();

        ledger.fail_next_confirmation(TrackerError::TransactionReverted {
            tx_hash: None,
            reason: "out of gas".to_string(),
        });
        ledger.release(&tx_bad);
        assert!(ledger.await_confirmation(&tx_bad).await.is_err());

        // Releasing a confirmed transaction again leaves nothing behind.
        ledger.release(&tx_ok);

        let state = ledger.lock();
        assert!(state.released.is_empty());
        assert!(state.pending.is_empty());
        assert_eq!(state.confirmed.len(), 1);
    }
}
