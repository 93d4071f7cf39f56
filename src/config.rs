//! Configuration for the dds-gateway service node.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Root directory for gateway data (records and staged files).
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Account address this gateway acts under (stamped on every record).
    #[serde(default)]
    pub service_node_address: String,

    /// Collaborator endpoints.
    #[serde(default)]
    pub collaborators: CollaboratorConfig,

    /// Upload saga configuration.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Base URLs of the external services the gateway talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Storage network (DDS) API base URL.
    #[serde(default = "default_dds_url")]
    pub dds_api_base_url: String,

    /// Billing service API base URL.
    #[serde(default = "default_billing_url")]
    pub billing_api_base_url: String,

    /// Node discovery directory base URL.
    #[serde(default = "default_discovery_url")]
    pub discovery_base_url: String,

    /// Timeout for collaborator HTTP calls in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Upload saga configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Whether the NOTIFYING stage actually calls the storage network.
    ///
    /// The stage always appears in the state machine and stage trace; this
    /// flag only suppresses the network call when the storage network does
    /// its own settlement accounting.
    #[serde(default = "default_notify_payment")]
    pub notify_payment: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            service_node_address: String::new(),
            collaborators: CollaboratorConfig::default(),
            upload: UploadConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            dds_api_base_url: default_dds_url(),
            billing_api_base_url: default_billing_url(),
            discovery_base_url: default_discovery_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            notify_payment: default_notify_payment(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "dds-gateway")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".dds-gateway"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dds_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_billing_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_discovery_url() -> String {
    "http://localhost:3002".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_notify_payment() -> bool {
    true
}

impl GatewayConfig {
    /// Directory holding persisted record files.
    #[must_use]
    pub fn records_dir(&self) -> PathBuf {
        self.root_dir.join("records")
    }

    /// Directory holding staged (not yet uploaded) file bytes.
    #[must_use]
    pub fn files_dir(&self) -> PathBuf {
        self.root_dir.join("files")
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
