//! TOML configuration for the ledger, the signing credential, and the
//! tracker.
//!
//! ```toml
//! [ledger]
//! backend = "rpc"                     # or "memory"
//! network = "sepolia"                 # "local" | "sepolia" | "custom"
//! infura_project_id = "..."
//! contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//!
//! [credential]
//! private_key_env = "FILEMARK_PRIVATE_KEY"
//!
//! [tracker]
//! operation_timeout_ms = 120000
//! ```
//!
//! Everything is validated before any client is built; failures are
//! `TrackerError::Config`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use filemark_contracts::{SigningCredential, TrackerError, TrackerResult};
use filemark_core::{LedgerClient, TrackerOptions};

use crate::evm::EvmLedgerClient;
use crate::memory::InMemoryLedger;
use crate::rpc::JsonRpcTransport;
use crate::signer::{parse_address, ADDRESS_LEN};

/// Endpoint of a node started locally with default settings.
pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// Secret key of the first account of a default local development node.
/// Never holds funds on a public network.
pub const DEV_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Which `LedgerClient` implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Rpc,
    Memory,
}

/// Which node the RPC backend talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Local,
    Sepolia,
    Custom,
}

/// The `[ledger]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub network: Network,
    pub rpc_url: Option<String>,
    pub infura_project_id: Option<String>,
    pub contract_address: Option<String>,
    pub chain_id: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            network: Network::default(),
            rpc_url: None,
            infura_project_id: None,
            contract_address: None,
            chain_id: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// The `[credential]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    /// Hex secret key, inline.
    pub private_key: Option<String>,
    /// Name of an environment variable holding the hex secret key.
    pub private_key_env: Option<String>,
}

/// The `[tracker]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    pub operation_timeout_ms: Option<u64>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilemarkConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn config_error(reason: impl Into<String>) -> TrackerError {
    TrackerError::Config {
        reason: reason.into(),
    }
}

impl FilemarkConfig {
    /// An in-memory ledger signed with the development key.
    pub fn in_memory() -> Self {
        Self {
            ledger: LedgerConfig {
                backend: Backend::Memory,
                ..LedgerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> TrackerResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| config_error(format!("failed to parse filemark TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it with [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: &Path) -> TrackerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check every value the selected backend needs.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.ledger.poll_interval_ms == 0 {
            return Err(config_error("ledger.poll_interval_ms must be greater than zero"));
        }
        if self.ledger.request_timeout_ms == 0 {
            return Err(config_error("ledger.request_timeout_ms must be greater than zero"));
        }
        if self.tracker.operation_timeout_ms == Some(0) {
            return Err(config_error("tracker.operation_timeout_ms must be greater than zero"));
        }
        if self.credential.private_key.is_some() && self.credential.private_key_env.is_some() {
            return Err(config_error(
                "set only one of credential.private_key and credential.private_key_env",
            ));
        }
        if self.ledger.backend == Backend::Rpc {
            self.rpc_url()?;
            self.contract_address()?;
        }
        Ok(())
    }

    /// The node endpoint for the configured network.
    pub fn rpc_url(&self) -> TrackerResult<String> {
        let ledger = &self.ledger;
        match ledger.network {
            Network::Local => Ok(ledger
                .rpc_url
                .clone()
                .unwrap_or_else(|| LOCAL_RPC_URL.to_string())),
            Network::Sepolia => {
                let project = ledger
                    .infura_project_id
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| {
                        config_error("ledger.infura_project_id is required for network \"sepolia\"")
                    })?;
                Ok(format!("https://sepolia.infura.io/v3/{}", project.trim()))
            }
            Network::Custom => ledger
                .rpc_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| config_error("ledger.rpc_url is required for network \"custom\"")),
        }
    }

    /// The parsed contract address.
    pub fn contract_address(&self) -> TrackerResult<[u8; ADDRESS_LEN]> {
        let raw = self
            .ledger
            .contract_address
            .as_deref()
            .ok_or_else(|| config_error("ledger.contract_address is required for backend \"rpc\""))?;
        parse_address(raw).map_err(|e| config_error(format!("ledger.contract_address: {e}")))
    }

    /// Load the signing credential.
    ///
    /// The in-memory backend falls back to [`DEV_PRIVATE_KEY`] when no key
    /// is configured; the RPC backend requires one.
    pub fn credential(&self) -> TrackerResult<SigningCredential> {
        let source = &self.credential;
        let hex = match (&source.private_key, &source.private_key_env) {
            (Some(inline), _) => inline.clone(),
            (None, Some(var)) => std::env::var(var).map_err(|e| {
                config_error(format!("credential.private_key_env '{var}': {e}"))
            })?,
            (None, None) if self.ledger.backend == Backend::Memory => {
                debug!("no credential configured, using the development key");
                DEV_PRIVATE_KEY.to_string()
            }
            (None, None) => {
                return Err(config_error(
                    "credential.private_key or credential.private_key_env is required",
                ))
            }
        };
        SigningCredential::from_hex(&hex)
    }

    /// Tracker tunables.
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            operation_timeout: self
                .tracker
                .operation_timeout_ms
                .map(Duration::from_millis),
        }
    }

    /// Build the configured ledger client.
    pub fn build_ledger(&self) -> TrackerResult<Arc<dyn LedgerClient>> {
        match self.ledger.backend {
            Backend::Memory => Ok(Arc::new(InMemoryLedger::new())),
            Backend::Rpc => {
                let url = self.rpc_url()?;
                let transport = JsonRpcTransport::new(
                    url,
                    Duration::from_millis(self.ledger.request_timeout_ms),
                )?;
                Ok(Arc::new(EvmLedgerClient::new(
                    transport,
                    self.contract_address()?,
                    self.ledger.chain_id,
                    Duration::from_millis(self.ledger.poll_interval_ms),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn defaults_apply_to_minimal_rpc_config() {
        let config = FilemarkConfig::from_toml_str(&format!(
            "[ledger]\ncontract_address = \"{CONTRACT}\"\n[credential]\nprivate_key = \"{DEV_PRIVATE_KEY}\"\n"
        ))
        .unwrap();

        assert_eq!(config.ledger.backend, Backend::Rpc);
        assert_eq!(config.ledger.network, Network::Local);
        assert_eq!(config.ledger.poll_interval_ms, 1_000);
        assert_eq!(config.ledger.request_timeout_ms, 10_000);
        assert_eq!(config.rpc_url().unwrap(), LOCAL_RPC_URL);
        assert_eq!(config.contract_address().unwrap()[0], 0x5F);
        assert!(config.tracker_options().operation_timeout.is_none());
        assert!(config.credential().is_ok());
        assert!(config.build_ledger().is_ok());
    }

    #[test]
    fn sepolia_requires_project_id() {
        let missing = format!("[ledger]\nnetwork = \"sepolia\"\ncontract_address = \"{CONTRACT}\"\n");
        assert!(matches!(
            FilemarkConfig::from_toml_str(&missing),
            Err(TrackerError::Config { .. })
        ));

        let config = FilemarkConfig::from_toml_str(&format!(
            "{missing}infura_project_id = \"abc123\"\n"
        ))
        .unwrap();
        assert_eq!(config.rpc_url().unwrap(), "https://sepolia.infura.io/v3/abc123");
    }

    #[test]
    fn custom_network_requires_url() {
        let toml = format!("[ledger]\nnetwork = \"custom\"\ncontract_address = \"{CONTRACT}\"\n");
        assert!(FilemarkConfig::from_toml_str(&toml).is_err());

        let config = FilemarkConfig::from_toml_str(&format!(
            "{toml}rpc_url = \"http://node.internal:8545\"\n"
        ))
        .unwrap();
        assert_eq!(config.rpc_url().unwrap(), "http://node.internal:8545");
    }

    #[test]
    fn rpc_backend_requires_valid_contract() {
        assert!(matches!(
            FilemarkConfig::from_toml_str("[ledger]\nbackend = \"rpc\"\n"),
            Err(TrackerError::Config { .. })
        ));
        let err = FilemarkConfig::from_toml_str("[ledger]\ncontract_address = \"0x1234\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("contract_address"));
    }

    #[test]
    fn memory_backend_needs_nothing_else() {
        let config = FilemarkConfig::from_toml_str("[ledger]\nbackend = \"memory\"\n").unwrap();
        let credential = config.credential().unwrap();
        assert_eq!(credential, SigningCredential::from_hex(DEV_PRIVATE_KEY).unwrap());
        assert!(config.build_ledger().is_ok());
    }

    #[test]
    fn rpc_backend_requires_credential() {
        let config = FilemarkConfig::from_toml_str(&format!(
            "[ledger]\ncontract_address = \"{CONTRACT}\"\n"
        ))
        .unwrap();
        assert!(matches!(config.credential(), Err(TrackerError::Config { .. })));
    }

    #[test]
    fn credential_from_environment() {
        let var = "FILEMARK_TEST_PRIVATE_KEY_FROM_ENV";
        std::env::set_var(var, DEV_PRIVATE_KEY);
        let config = FilemarkConfig::from_toml_str(&format!(
            "[ledger]\nbackend = \"memory\"\n[credential]\nprivate_key_env = \"{var}\"\n"
        ))
        .unwrap();
        assert!(config.credential().is_ok());

        let config = FilemarkConfig::from_toml_str(
            "[credential]\nprivate_key_env = \"FILEMARK_TEST_UNSET_VARIABLE\"\n[ledger]\nbackend = \"memory\"\n",
        )
        .unwrap();
        assert!(matches!(config.credential(), Err(TrackerError::Config { .. })));
    }

    #[test]
    fn rejects_conflicting_and_zero_values() {
        let both = format!(
            "[ledger]\nbackend = \"memory\"\n[credential]\nprivate_key = \"{DEV_PRIVATE_KEY}\"\nprivate_key_env = \"X\"\n"
        );
        assert!(FilemarkConfig::from_toml_str(&both).is_err());
        assert!(FilemarkConfig::from_toml_str("[ledger]\nbackend = \"memory\"\npoll_interval_ms = 0\n").is_err());
        assert!(FilemarkConfig::from_toml_str("[tracker]\noperation_timeout_ms = 0\n[ledger]\nbackend = \"memory\"\n").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FilemarkConfig::from_toml_str("[ledger]\nbackend = \"memory\"\nprovider = \"x\"\n"),
            Err(TrackerError::Config { .. })
        ));
    }

    #[test]
    fn tracker_timeout_is_carried() {
        let config = FilemarkConfig::from_toml_str(
            "[ledger]\nbackend = \"memory\"\n[tracker]\noperation_timeout_ms = 2500\n",
        )
        .unwrap();
        assert_eq!(
            config.tracker_options().operation_timeout,
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FilemarkConfig::from_file(&dir.path().join("filemark.toml")),
            Err(TrackerError::Config { .. })
        ));
    }

    #[test]
    fn loads_config_from_file() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\nbackend = \"memory\"").unwrap();

        let config = FilemarkConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ledger.backend, Backend::Memory);
    }
}
