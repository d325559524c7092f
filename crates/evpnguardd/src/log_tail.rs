//! Incremental syslog tailing
//!
//! Reads newly appended records from the system log between wake-ups.
//! The tailer keeps a byte cursor into the file and only ever advances
//! it past complete lines, so a record written in two chunks is parsed
//! exactly once. Truncation and deletion of the log file are detected
//! and recovered from without restarting the agent.

use crate::syslog::{is_adjacency_change, parse_oper_change, OperStatusChange};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Records recognized during one tail pass
#[derive(Debug, Default)]
pub struct TailOutcome {
    /// At least one BGP adjacency change record was appended
    pub adjacency_change: bool,
    /// Interface line-protocol transitions, in file order
    pub oper_changes: Vec<OperStatusChange>,
}

/// Tracks a position in the system log and reads appended records
pub struct LogTailer {
    path: PathBuf,
    file: Option<File>,
    cursor: u64,
    deletion_reported: bool,
}

impl LogTailer {
    /// Open the log file and position the cursor at its current end.
    ///
    /// Only records appended after startup are of interest, so history
    /// is skipped. Failure to open here is fatal; once running, the
    /// tailer recovers from the file disappearing on its own.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = File::open(&path)?;
        let cursor = file.seek(SeekFrom::End(0))?;

        info!(path = %path.display(), cursor, "Tailing system log");

        Ok(Self {
            path,
            file: Some(file),
            cursor,
            deletion_reported: false,
        })
    }

    /// Read and classify records appended since the last call.
    ///
    /// Never fails: transient file errors are logged and yield an empty
    /// outcome, leaving the cursor where it was.
    pub fn tail(&mut self) -> TailOutcome {
        let mut outcome = TailOutcome::default();

        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !self.deletion_reported {
                    error!(
                        path = %self.path.display(),
                        "Log file deleted, waiting for it to reappear"
                    );
                    eprintln!(
                        "evpnguardd: log file {} deleted, waiting for it to reappear",
                        self.path.display()
                    );
                    self.deletion_reported = true;
                }
                self.file = None;
                self.cursor = 0;
                return outcome;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to stat log file");
                return outcome;
            }
        };

        if self.deletion_reported {
            info!(path = %self.path.display(), "Log file reappeared, tailing from start");
            self.deletion_reported = false;
        }

        if self.file.is_none() {
            match File::open(&self.path) {
                Ok(f) => {
                    self.file = Some(f);
                    self.cursor = 0;
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to reopen log file");
                    return outcome;
                }
            }
        }

        if len < self.cursor {
            info!(
                path = %self.path.display(),
                cursor = self.cursor,
                len,
                "Log file truncated, tailing from start"
            );
            match File::open(&self.path) {
                Ok(f) => {
                    self.file = Some(f);
                    self.cursor = 0;
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to reopen log file");
                    self.file = None;
                    self.cursor = 0;
                }
            }
            return outcome;
        }

        let Some(file) = self.file.as_mut() else {
            return outcome;
        };

        if let Err(e) = file.seek(SeekFrom::Start(self.cursor)) {
            warn!(path = %self.path.display(), error = %e, "Failed to seek log file");
            return outcome;
        }

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if buf.last() != Some(&b'\n') {
                        // Incomplete record, re-read once the rest arrives
                        break;
                    }
                    self.cursor += n as u64;

                    let raw = String::from_utf8_lossy(&buf);
                    let line = raw.trim_end_matches(['\n', '\r']);

                    if is_adjacency_change(line) {
                        debug!(line, "BGP adjacency change record");
                        outcome.adjacency_change = true;
                    }
                    if let Some(change) = parse_oper_change(line) {
                        debug!(
                            interface = %change.interface,
                            up = change.up,
                            "Interface line-protocol transition record"
                        );
                        outcome.oper_changes.push(change);
                    }
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to read log file");
                    break;
                }
            }
        }

        outcome
    }
}
