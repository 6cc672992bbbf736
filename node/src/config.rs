//! Node configuration (TOML) and network configuration sources (JSON).
//!
//! Persistent layout under `data_dir`:
//! - `db/<identifier>.db`: the LMDB environment
//! - `config/<identifier>.json`: the [`NetworkConfig`]
//! - `keystore/account_<address_hex>.json`: per-account keys (read by the
//!   account store, never by the node itself)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dagnet_store_lmdb::{LmdbEnvironment, DEFAULT_MAP_SIZE};
use dagnet_types::{Address, NetworkConfig};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a dagnet node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: PathBuf,

    /// Which network (and so which store and config file) to use.
    pub identifier: String,

    pub log_format: LogFormat,

    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Total orphans held while waiting for parents.
    pub orphan_capacity: usize,

    pub orphan_ttl_secs: u64,

    /// Bound on queued inbound publishes; beyond it publishes are dropped.
    pub admission_queue_capacity: usize,

    /// Bound on queued requests, responses and local submissions. Senders
    /// wait rather than drop.
    pub request_queue_capacity: usize,

    pub max_future_drift_secs: u64,

    pub request_timeout_ms: u64,

    pub query_timeout_ms: u64,

    pub orphan_sweep_interval_ms: u64,

    pub lmdb_map_size: usize,

    /// Scan the store for structural corruption on open.
    pub verify_store_on_open: bool,

    /// Also re-verify every signature during that scan.
    pub verify_signatures_on_open: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./dagnet_data"),
            identifier: "devnet".to_string(),
            log_format: LogFormat::Human,
            log_level: "info".to_string(),
            orphan_capacity: 10_000,
            orphan_ttl_secs: 60,
            admission_queue_capacity: 4_096,
            request_queue_capacity: 1_024,
            max_future_drift_secs: 15,
            request_timeout_ms: 5_000,
            query_timeout_ms: 10_000,
            orphan_sweep_interval_ms: 1_000,
            lmdb_map_size: DEFAULT_MAP_SIZE,
            verify_store_on_open: true,
            verify_signatures_on_open: false,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.identifier.is_empty()
            || self
                .identifier
                .chars()
                .any(|c| matches!(c, '/' | '\\') || c.is_control())
            || self.identifier.starts_with('.')
        {
            return Err(NodeError::Config(format!(
                "identifier {:?} is not usable as a file name",
                self.identifier
            )));
        }
        let bounds = [
            ("orphan_capacity", self.orphan_capacity),
            ("admission_queue_capacity", self.admission_queue_capacity),
            ("request_queue_capacity", self.request_queue_capacity),
        ];
        for (name, value) in bounds {
            if value == 0 {
                return Err(NodeError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        LmdbEnvironment::db_path(&self.data_dir, &self.identifier)
    }

    pub fn network_config_path(&self) -> PathBuf {
        network_config_path(&self.data_dir, &self.identifier)
    }

    pub fn orphan_ttl(&self) -> Duration {
        Duration::from_secs(self.orphan_ttl_secs)
    }

    pub fn max_future_drift(&self) -> Duration {
        Duration::from_secs(self.max_future_drift_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn orphan_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.orphan_sweep_interval_ms.max(1))
    }
}

/// `<data_dir>/config/<identifier>.json`
pub fn network_config_path(data_dir: &Path, identifier: &str) -> PathBuf {
    data_dir.join("config").join(format!("{identifier}.json"))
}

/// `<data_dir>/keystore/account_<address_hex>.json`
pub fn keystore_path(data_dir: &Path, address: &Address) -> PathBuf {
    data_dir
        .join("keystore")
        .join(format!("account_{}.json", address.to_hex()))
}

/// Where the node gets its [`NetworkConfig`] from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<NetworkConfig, NodeError>;
}

/// A network config held in memory.
impl ConfigSource for NetworkConfig {
    fn load(&self) -> Result<NetworkConfig, NodeError> {
        Ok(self.clone())
    }
}

/// Reads a [`NetworkConfig`] from a JSON file.
#[derive(Clone, Debug)]
pub struct JsonConfigSource {
    path: PathBuf,
}

impl JsonConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional location for `identifier` under `data_dir`.
    pub fn in_data_dir(data_dir: &Path, identifier: &str) -> Self {
        Self::new(network_config_path(data_dir, identifier))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `config` as pretty JSON, creating the directory if needed.
    pub fn save(&self, config: &NetworkConfig) -> Result<(), NodeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| NodeError::Config(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ConfigSource for JsonConfigSource {
    fn load(&self) -> Result<NetworkConfig, NodeError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", self.path.display())))?;
        let config: NetworkConfig = serde_json::from_str(&content)
            .map_err(|e| NodeError::Config(format!("{}: {e}", self.path.display())))?;
        if config.alloc.is_empty() {
            return Err(NodeError::Config(format!(
                "{}: alloc must not be empty",
                self.path.display()
            )));
        }
        Ok(config)
    }
}
