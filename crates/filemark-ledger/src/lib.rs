//! # filemark-ledger
//!
//! `LedgerClient` implementations and configuration for filemark.
//!
//! - `InMemoryLedger`: the file-tracker contract's semantics in process
//! - `EvmLedgerClient`: JSON-RPC client for the contract on an EVM chain
//! - `FilemarkConfig`: TOML configuration that validates settings and builds
//!   the configured client, credential and tracker options
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use filemark_core::Tracker;
//! use filemark_ledger::FilemarkConfig;
//!
//! let config = FilemarkConfig::from_file(Path::new("filemark.toml"))?;
//! let tracker = Tracker::new(
//!     config.build_ledger()?,
//!     Arc::new(config.credential()?),
//!     config.tracker_options(),
//! );
//! ```

pub mod abi;
pub mod config;
pub mod evm;
pub mod memory;
pub mod rpc;
pub mod signer;

pub use config::{Backend, FilemarkConfig, Network, DEV_PRIVATE_KEY, LOCAL_RPC_URL};
pub use evm::EvmLedgerClient;
pub use memory::InMemoryLedger;
pub use rpc::JsonRpcTransport;
pub use signer::LocalSigner;

// ── Integration tests ────────────────────────────────────────────────────────
