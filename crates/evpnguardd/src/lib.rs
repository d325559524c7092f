//! EVPN failover guard agent
//!
//! Watches a leaf switch's system log for BGP adjacency changes,
//! re-checks EVPN peer health through the management API, and shuts or
//! re-enables the Ethernet-Segment interfaces so a fabric-isolated
//! leaf stops attracting traffic it can no longer forward.

pub mod actuator;
pub mod agent;
pub mod config;
pub mod eapi;
pub mod error;
pub mod esi;
pub mod failover;
pub mod health;
pub mod log_tail;
pub mod status;
pub mod syslog;
pub mod watcher;

pub use actuator::{EapiInterfaceControl, InterfaceActuator, InterfaceControl};
pub use agent::{Agent, AgentEvent};
pub use config::GuardConfig;
pub use eapi::{EapiClient, EapiHttpClient};
pub use error::{GuardError, Result};
pub use esi::EsiDiscovery;
pub use failover::{ActionCounters, FailoverController, PeerHealth};
pub use health::PeerHealthChecker;
pub use log_tail::{LogTailer, TailOutcome};
pub use status::{FileStatusSink, MemoryStatusSink, StatusSink};
pub use syslog::OperStatusChange;
pub use watcher::LogWatcher;
