//! Configuration file management.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Chain connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name: "localhost" | "baobab" | "cypress" | ...
    #[serde(default = "default_chain")]
    pub name: String,
    /// JSON-RPC endpoint.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
}

/// Reporter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Name of the wallet state, used in logs.
    #[serde(default = "default_state_name")]
    pub state_name: String,
    /// Service whose wallets are loaded from the `reporters` table.
    #[serde(default = "default_service")]
    pub service: String,
    /// Queue consumed by this reporter.
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Jobs carry `<roundId>-<oracle>-<nonce>` ids and are checked for
    /// staleness before reporting.
    #[serde(default = "default_true")]
    pub aggregator_queue: bool,
    /// Number of concurrent workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Pay fees through fee delegation on chains that support it.
    #[serde(default)]
    pub delegated_fee: bool,
    #[serde(default = "default_delegator_url")]
    pub delegator_url: String,
    #[serde(default = "default_signer_url")]
    pub signer_url: String,
    /// Sleep between polls of an empty queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wallet reload period.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Claims older than this are redelivered.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,
    /// Deliveries after which a job that keeps failing retryably is
    /// failed. 0 retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_receipt_poll_attempts")]
    pub receipt_poll_attempts: u32,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Timeout of every outgoing HTTP request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_chain() -> String {
    "localhost".to_string()
}

fn default_provider_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_state_name() -> String {
    "orakl-reporter-state".to_string()
}

fn default_service() -> String {
    "DATA_FEED".to_string()
}

fn default_queue() -> String {
    "orakl-reporter-data-feed".to_string()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    5
}

fn default_delegator_url() -> String {
    "http://127.0.0.1:3002".to_string()
}

fn default_signer_url() -> String {
    "http://127.0.0.1:3003".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_claim_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    10
}

fn default_receipt_poll_attempts() -> u32 {
    30
}

fn default_receipt_poll_interval_ms() -> u64 {
    1000
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: default_chain(),
            provider_url: default_provider_url(),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            state_name: default_state_name(),
            service: default_service(),
            queue: default_queue(),
            aggregator_queue: true,
            concurrency: default_concurrency(),
            delegated_fee: false,
            delegator_url: default_delegator_url(),
            signer_url: default_signer_url(),
            poll_interval_ms: default_poll_interval_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            claim_timeout_secs: default_claim_timeout_secs(),
            max_attempts: default_max_attempts(),
            receipt_poll_attempts: default_receipt_poll_attempts(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ReporterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("ORAKL_DATA_DIR") {
            return PathBuf::from(dir);
        }
        dirs_fallback(".orakl")
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/orakl"))
}
