//! Filesystem change notification for the tailed log
//!
//! Wakes the event loop whenever the watched log file changes. The
//! watch is placed on the parent directory, not the file itself, so
//! deletion and recreation of the file keep producing events.

use crate::error::{GuardError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Holds the running watch; dropping it stops notifications
pub struct LogWatcher {
    _watcher: RecommendedWatcher,
}

impl LogWatcher {
    /// Watch the log file's directory and send a wake-up for every
    /// event touching the file. Bursts of appends may produce several
    /// queued wake-ups; the consumer drains them in one pass.
    pub fn spawn(path: &Path, tx: UnboundedSender<()>) -> Result<Self> {
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| GuardError::Config(format!("Invalid log path {}", path.display())))?
            .to_os_string();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_access() {
                        return;
                    }
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        debug!(kind = ?event.kind, "Log file event");
                        // Receiver gone means the agent is shutting down
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "File watch error");
                }
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %dir.display(), "Watching log directory");

        Ok(Self { _watcher: watcher })
    }
}
