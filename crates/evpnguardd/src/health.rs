//! EVPN peer health evaluation
//!
//! Queries the BGP EVPN summary and decides whether at least one peer
//! is Established. Platform releases differ in where the peer map
//! lives: newer ones nest it under `vrfs.default.peers`, older ones
//! put `peers` at the top level. When the nested map is present it is
//! authoritative, even when empty; the top-level map is only consulted
//! in its absence so a peer is never counted twice.

use crate::eapi::EapiClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Show command carrying the EVPN peer table
pub const SHOW_EVPN_SUMMARY: &str = "show bgp evpn summary";

const ESTABLISHED: &str = "Established";

#[derive(Debug, Deserialize)]
struct EvpnSummary {
    vrfs: Option<HashMap<String, VrfSummary>>,
    peers: Option<HashMap<String, PeerEntry>>,
}

#[derive(Debug, Deserialize)]
struct VrfSummary {
    peers: Option<HashMap<String, PeerEntry>>,
}

#[derive(Debug, Deserialize)]
struct PeerEntry {
    #[serde(rename = "peerState")]
    peer_state: Option<String>,
}

/// Decides EVPN peer health from the switch's BGP summary
pub struct PeerHealthChecker {
    eapi: Arc<dyn EapiClient>,
}

impl PeerHealthChecker {
    pub fn new(eapi: Arc<dyn EapiClient>) -> Self {
        Self { eapi }
    }

    /// True when at least one EVPN peer is Established.
    ///
    /// A failed or unrecognized query counts as no peers up; the
    /// failover logic treats that the same as a fabric outage.
    pub async fn check_peers_up(&self) -> bool {
        let value = match self.eapi.run_show_command(SHOW_EVPN_SUMMARY).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "EVPN summary query failed, treating peers as down");
                return false;
            }
        };

        let summary: EvpnSummary = match serde_json::from_value(value) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Unrecognized EVPN summary output, treating peers as down");
                return false;
            }
        };

        let established = established_peers(&summary);
        debug!(established, "EVPN peer summary");
        established > 0
    }
}

fn established_peers(summary: &EvpnSummary) -> usize {
    if let Some(vrfs) = &summary.vrfs {
        if let Some(default_vrf) = vrfs.get("default") {
            if let Some(peers) = &default_vrf.peers {
                return count_established(peers);
            }
        }
    }

    if let Some(peers) = &summary.peers {
        return count_established(peers);
    }

    0
}

fn count_established(peers: &HashMap<String, PeerEntry>) -> usize {
    peers
        .values()
        .filter(|p| p.peer_state.as_deref() == Some(ESTABLISHED))
        .count()
}
