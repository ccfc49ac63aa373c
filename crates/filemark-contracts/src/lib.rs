//! # filemark-contracts
//!
//! Shared types, error taxonomy, and ledger contracts for the filemark
//! integrity tracker.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod state;

pub use error::{TrackerError, TrackerResult};
pub use fingerprint::{Fingerprint, FINGERPRINT_LEN};
pub use ledger::{Confirmation, FileMetadata, SigningCredential, TxHandle};
pub use state::{Operation, RecordState, SessionId};
