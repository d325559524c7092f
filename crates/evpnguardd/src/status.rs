//! Agent status publication
//!
//! evpnguardd reports its view of the fabric and its own actions as a
//! small key/value set. Operators read it from a JSON status file; an
//! in-memory sink backs the component tests.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Peer health, "UP" or "FAIL"
pub const KEY_HEALTH: &str = "health";
/// Comma-joined Ethernet-Segment interface list
pub const KEY_ESI_INTERFACES: &str = "esi_interfaces";
/// Number of interface enable actions taken
pub const KEY_ENABLE_COUNT: &str = "enable_count";
/// Number of interface disable actions taken
pub const KEY_DISABLE_COUNT: &str = "disable_count";
/// RFC 3339 timestamp of the last enable action
pub const KEY_LAST_ENABLE_TIME: &str = "last_enable_time";
/// RFC 3339 timestamp of the last disable action
pub const KEY_LAST_DISABLE_TIME: &str = "last_disable_time";
/// Agent lifecycle, "running" or "stopped"
pub const KEY_AGENT_STATE: &str = "agent_state";

/// Published when discovery finds no Ethernet-Segment interfaces
pub const NO_ESI_MARKER: &str = "No ESI Interfaces Found";

/// Destination for published status key/values
pub trait StatusSink: Send + Sync {
    /// Publish one key/value pair, replacing any previous value
    fn set(&self, key: &str, value: &str);

    /// Withdraw a previously published key
    fn delete(&self, key: &str);
}

/// Writes the status set to a JSON file on every update
pub struct FileStatusSink {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStatusSink {
    /// Create a sink writing to the given path. The parent directory is
    /// created if missing; failure to do so is reported but not fatal,
    /// the agent keeps running without a readable status file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(
                    path = %parent.display(),
                    error = %e,
                    "Failed to create status directory"
                );
            }
        }

        Self {
            path,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize status");
                return;
            }
        };

        if let Err(e) = fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %e, "Failed to write status file");
        }
    }
}

impl StatusSink for FileStatusSink {
    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn delete(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

/// Keeps the status set in memory. Used by tests to observe what the
/// agent published without touching the filesystem.
#[derive(Default)]
pub struct MemoryStatusSink {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for a key, if published
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Copy of the whole status set
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().clone()
    }
}

impl StatusSink for MemoryStatusSink {
    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
