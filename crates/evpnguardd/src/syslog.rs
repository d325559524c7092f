//! Syslog line classification
//!
//! Matches the log records evpnguardd reacts to. BGP adjacency changes
//! trigger a peer health evaluation; line-protocol transitions are
//! surfaced as events for visibility.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches BGP adjacency change records, case-insensitively.
///
/// Example:
/// `%BGP-5-ADJCHANGE: peer 10.0.0.1 (VRF default AS 65001) old state
/// Established event RecvNotify new state Idle`
static ADJCHANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)BGP-5-ADJCHANGE").expect("Invalid adjacency change regex"));

/// Matches interface line-protocol transitions.
///
/// Example:
/// `%LINEPROTO-5-UPDOWN: Line protocol on Interface Ethernet1, changed
/// state to down`
static OPER_CHANGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)LINEPROTO-5-UPDOWN.*Interface\s+([A-Za-z0-9/\.\-]+),\s+changed state to\s+(up|down)")
        .expect("Invalid line protocol regex")
});

/// An interface operational status transition observed in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperStatusChange {
    /// Interface name as logged, e.g. "Ethernet1" or "Port-Channel10"
    pub interface: String,
    /// True when the line protocol came up
    pub up: bool,
}

/// Check whether a log line records a BGP adjacency change
pub fn is_adjacency_change(line: &str) -> bool {
    ADJCHANGE_PATTERN.is_match(line)
}

/// Parse an interface line-protocol transition from a log line
pub fn parse_oper_change(line: &str) -> Option<OperStatusChange> {
    let caps = OPER_CHANGE_PATTERN.captures(line)?;
    let interface = caps.get(1)?.as_str().to_string();
    let up = caps.get(2)?.as_str().eq_ignore_ascii_case("up");
    Some(OperStatusChange { interface, up })
}
