//! Configuration file support for evpnguardd
//!
//! Loads and validates agent configuration from TOML files.
//! Default location: /etc/evpnguardd.conf

use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/evpnguardd.conf";

/// Syslog source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogConfig {
    /// Path to the system log file carrying BGP adjacency records
    #[serde(default = "default_syslog_path")]
    pub path: PathBuf,
}

/// Management API (eAPI) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EapiConfig {
    /// eAPI command endpoint URL
    #[serde(default = "default_eapi_endpoint")]
    pub endpoint: String,

    /// Optional basic-auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Optional basic-auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_eapi_timeout")]
    pub timeout_secs: u64,
}

/// Failover behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Re-run Ethernet-Segment interface discovery on every health
    /// transition. When false the set discovered at startup is reused.
    #[serde(default = "default_rediscover")]
    pub rediscover_on_transition: bool,

    /// Path of the published status file
    #[serde(default = "default_status_path")]
    pub status_path: PathBuf,
}

/// Complete evpnguardd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Syslog source configuration
    #[serde(default)]
    pub syslog: SyslogConfig,

    /// Management API configuration
    #[serde(default)]
    pub eapi: EapiConfig,

    /// Failover behavior configuration
    #[serde(default)]
    pub failover: FailoverConfig,
}

// Default functions
fn default_syslog_path() -> PathBuf {
    PathBuf::from("/var/log/messages")
}

fn default_eapi_endpoint() -> String {
    "http://127.0.0.1:8080/command-api".to_string()
}

fn default_eapi_timeout() -> u64 {
    10
}

fn default_rediscover() -> bool {
    true
}

fn default_status_path() -> PathBuf {
    PathBuf::from("/var/run/evpnguardd/status.json")
}

// Default implementations
impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            path: default_syslog_path(),
        }
    }
}

impl Default for EapiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_eapi_endpoint(),
            username: None,
            password: None,
            timeout_secs: default_eapi_timeout(),
        }
    }
}

impl EapiConfig {
    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            rediscover_on_transition: default_rediscover(),
            status_path: default_status_path(),
        }
    }
}

impl GuardConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content).map_err(|e| {
                    GuardError::Config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "Config file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(GuardError::Io(e)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.eapi.endpoint.is_empty() {
            return Err(GuardError::Config(
                "eapi.endpoint must not be empty".to_string(),
            ));
        }

        if !self.eapi.endpoint.starts_with("http://") && !self.eapi.endpoint.starts_with("https://")
        {
            return Err(GuardError::Config(format!(
                "eapi.endpoint must be an http(s) URL, got '{}'",
                self.eapi.endpoint
            )));
        }

        if self.eapi.timeout_secs == 0 {
            return Err(GuardError::Config(
                "eapi.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.syslog.path.as_os_str().is_empty() {
            return Err(GuardError::Config(
                "syslog.path must not be empty".to_string(),
            ));
        }

        if self.failover.status_path.as_os_str().is_empty() {
            return Err(GuardError::Config(
                "failover.status_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
