//! Failover state machine
//!
//! Decides when Ethernet-Segment interfaces are shut or re-enabled.
//! Health moves between Up and Down with a one-shot latch per outage:
//! a single fabric failure produces many adjacency-change records, but
//! only the first evaluation of a DOWN streak actuates. The latch is
//! cleared exactly on recovery.

use crate::actuator::InterfaceActuator;
use crate::esi::EsiDiscovery;
use crate::health::PeerHealthChecker;
use crate::status::{
    StatusSink, KEY_DISABLE_COUNT, KEY_ENABLE_COUNT, KEY_HEALTH, KEY_LAST_DISABLE_TIME,
    KEY_LAST_ENABLE_TIME,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregate EVPN peer health as published to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerHealth {
    Up,
    Down,
}

impl PeerHealth {
    /// Status text, "UP" or "FAIL"
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerHealth::Up => "UP",
            PeerHealth::Down => "FAIL",
        }
    }
}

/// Actuation counts and timestamps, observability only
#[derive(Debug, Default)]
pub struct ActionCounters {
    pub enables: u64,
    pub disables: u64,
    pub last_enable: Option<DateTime<Utc>>,
    pub last_disable: Option<DateTime<Utc>>,
}

/// Drives interface actuation from peer health transitions
pub struct FailoverController {
    health: PeerHealth,
    latched: bool,
    esi_interfaces: Vec<String>,
    counters: ActionCounters,
    rediscover_on_transition: bool,
    checker: PeerHealthChecker,
    discovery: EsiDiscovery,
    actuator: InterfaceActuator,
    status: Arc<dyn StatusSink>,
}

impl FailoverController {
    pub fn new(
        checker: PeerHealthChecker,
        discovery: EsiDiscovery,
        actuator: InterfaceActuator,
        status: Arc<dyn StatusSink>,
        rediscover_on_transition: bool,
    ) -> Self {
        Self {
            health: PeerHealth::Up,
            latched: false,
            esi_interfaces: Vec::new(),
            counters: ActionCounters::default(),
            rediscover_on_transition,
            checker,
            discovery,
            actuator,
            status,
        }
    }

    /// Discover the initial Ethernet-Segment interface set and publish
    /// the optimistic boot state. Health starts Up; the first adjacency
    /// event with peers actually down still actuates because the latch
    /// starts clear.
    pub async fn init(&mut self) {
        self.esi_interfaces = self.discovery.discover().await;
        self.publish_health();
        self.publish_counters();
    }

    /// Re-check peer health and actuate on transitions.
    ///
    /// Runs to completion before the next event is processed; all
    /// state here is owned by the event loop, so there is no
    /// concurrent mutation to guard against.
    pub async fn evaluate(&mut self) {
        let up = self.checker.check_peers_up().await;

        if up {
            match self.health {
                PeerHealth::Down => {
                    info!("EVPN peers recovered, enabling Ethernet-Segment interfaces");
                    self.refresh_interfaces().await;
                    if !self.actuator.set_admin_enabled(&self.esi_interfaces, true).await {
                        warn!("Enable pass incomplete, interface state uncertain");
                    }
                    self.counters.enables += 1;
                    self.counters.last_enable = Some(Utc::now());
                    self.health = PeerHealth::Up;
                    self.latched = false;
                    self.publish_health();
                    self.publish_counters();
                }
                PeerHealth::Up => {
                    debug!("EVPN peers healthy, no transition");
                    self.publish_health();
                }
            }
        } else if !self.latched {
            warn!("EVPN peers down, disabling Ethernet-Segment interfaces");
            self.refresh_interfaces().await;
            if !self.actuator.set_admin_enabled(&self.esi_interfaces, false).await {
                warn!("Disable pass incomplete, interface state uncertain");
            }
            self.counters.disables += 1;
            self.counters.last_disable = Some(Utc::now());
            self.health = PeerHealth::Down;
            self.latched = true;
            self.publish_health();
            self.publish_counters();
        } else {
            debug!("EVPN peers still down, already actuated for this outage");
        }
    }

    /// Update the rediscovery option at runtime
    pub fn set_rediscover_on_transition(&mut self, enabled: bool) {
        if self.rediscover_on_transition != enabled {
            info!(enabled, "Rediscovery on transition changed");
            self.rediscover_on_transition = enabled;
        }
    }

    pub fn health(&self) -> PeerHealth {
        self.health
    }

    pub fn latched(&self) -> bool {
        self.latched
    }

    pub fn counters(&self) -> &ActionCounters {
        &self.counters
    }

    pub fn esi_interfaces(&self) -> &[String] {
        &self.esi_interfaces
    }

    async fn refresh_interfaces(&mut self) {
        if self.rediscover_on_transition {
            self.esi_interfaces = self.discovery.discover().await;
        }
    }

    fn publish_health(&self) {
        self.status.set(KEY_HEALTH, self.health.as_str());
    }

    fn publish_counters(&self) {
        self.status
            .set(KEY_ENABLE_COUNT, &self.counters.enables.to_string());
        self.status
            .set(KEY_DISABLE_COUNT, &self.counters.disables.to_string());
        if let Some(t) = &self.counters.last_enable {
            self.status.set(
                KEY_LAST_ENABLE_TIME,
                &t.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        if let Some(t) = &self.counters.last_disable {
            self.status.set(
                KEY_LAST_DISABLE_TIME,
                &t.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
    }
}
