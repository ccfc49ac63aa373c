//! # filemark-core
//!
//! Content hashing, the integrity record state machine, and the async
//! tracker that drives them against a ledger.
//!
//! This crate provides:
//! - The two collaborator traits (`LedgerClient`, `FileSource`)
//! - `HashEngine`, the Keccak-256 fingerprint function
//! - `IntegrityRecord`, the per-file lifecycle state
//! - The `Tracker` that wires them together and writes the audit log
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use filemark_core::{InMemoryFile, Tracker, TrackerOptions};
//!
//! let tracker = Tracker::new(ledger, credential, TrackerOptions::default());
//! tracker.select_file(Arc::new(InMemoryFile::new("report.pdf", bytes)));
//! let fingerprint = tracker.upload().await?;
//! let registration = tracker.register_on_chain().await?;
//! let verification = tracker.verify_selected().await?;
//! ```

pub mod hash;
pub mod record;
pub mod source;
pub mod tracker;
pub mod traits;

pub use hash::{keccak256, HashEngine};
pub use record::IntegrityRecord;
pub use source::{DiskFile, InMemoryFile};
pub use tracker::{Registration, Tracker, TrackerOptions, TrackerSnapshot, Verification};
pub use traits::{FileSource, LedgerClient};
