//! Integration tests for evpnguardd
//!
//! Tests the failover workflow end to end:
//! - Peer loss detection and interface shutdown
//! - Latch behavior across repeated triggers
//! - Recovery and re-enable
//! - Discovery failure tolerance
//! - Full agent event loop with a real tailed log file

use async_trait::async_trait;
use evpnguardd::actuator::SHOW_PORT_CHANNEL;
use evpnguardd::esi::SHOW_RUNNING_CONFIG;
use evpnguardd::health::SHOW_EVPN_SUMMARY;
use evpnguardd::status::{
    KEY_AGENT_STATE, KEY_DISABLE_COUNT, KEY_ENABLE_COUNT, KEY_ESI_INTERFACES, KEY_HEALTH,
    NO_ESI_MARKER,
};
use evpnguardd::{
    Agent, AgentEvent, EapiClient, EapiInterfaceControl, EsiDiscovery, FailoverController,
    GuardError, InterfaceActuator, LogTailer, MemoryStatusSink, PeerHealth, PeerHealthChecker,
    Result,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Scripted management API: responses keyed by command text. Commands
/// without a scripted response fail, which stands in for transport
/// errors. Config batches are captured for assertions.
struct MockEapi {
    show_responses: Mutex<HashMap<String, Value>>,
    show_counts: Mutex<HashMap<String, u64>>,
    config_calls: Mutex<Vec<Vec<String>>>,
    fail_config_containing: Mutex<Option<String>>,
}

impl MockEapi {
    fn new() -> Self {
        Self {
            show_responses: Mutex::new(HashMap::new()),
            show_counts: Mutex::new(HashMap::new()),
            config_calls: Mutex::new(Vec::new()),
            fail_config_containing: Mutex::new(None),
        }
    }

    fn set_response(&self, cmd: &str, value: Value) {
        self.show_responses.lock().insert(cmd.to_string(), value);
    }

    fn remove_response(&self, cmd: &str) {
        self.show_responses.lock().remove(cmd);
    }

    fn show_count(&self, cmd: &str) -> u64 {
        self.show_counts.lock().get(cmd).copied().unwrap_or(0)
    }

    fn config_calls(&self) -> Vec<Vec<String>> {
        self.config_calls.lock().clone()
    }
}

#[async_trait]
impl EapiClient for MockEapi {
    async fn run_show_command(&self, cmd: &str) -> Result<Value> {
        *self.show_counts.lock().entry(cmd.to_string()).or_insert(0) += 1;
        self.show_responses
            .lock()
            .get(cmd)
            .cloned()
            .ok_or_else(|| GuardError::Eapi(format!("unable to run '{cmd}'")))
    }

    async fn run_config_commands(&self, cmds: &[String]) -> Result<()> {
        if let Some(marker) = self.fail_config_containing.lock().as_deref() {
            if cmds.iter().any(|c| c.contains(marker)) {
                return Err(GuardError::Eapi("command rejected".to_string()));
            }
        }
        self.config_calls.lock().push(cmds.to_vec());
        Ok(())
    }
}

fn peers_response(state: &str) -> Value {
    json!({
        "vrfs": {
            "default": {
                "peers": {
                    "10.0.250.1": {"peerState": state},
                    "10.0.250.2": {"peerState": state},
                }
            }
        }
    })
}

/// Test fixture: scripted eAPI behind a complete controller stack
struct TestSetup {
    eapi: Arc<MockEapi>,
    status: Arc<MemoryStatusSink>,
    controller: FailoverController,
}

impl TestSetup {
    fn new(rediscover: bool) -> Self {
        let eapi = Arc::new(MockEapi::new());
        let status = Arc::new(MemoryStatusSink::new());

        eapi.set_response(SHOW_EVPN_SUMMARY, peers_response("Established"));
        eapi.set_response(
            SHOW_RUNNING_CONFIG,
            json!({
                "cmds": {
                    "interface Port-Channel10": {
                        "cmds": {
                            "evpn ethernet-segment": {
                                "cmds": {"identifier 0000:0000:0000:0000:0010": null}
                            },
                        }
                    },
                    "interface Ethernet1": {
                        "cmds": {"switchport access vlan 10": null}
                    },
                    "router bgp 65001": {
                        "cmds": {"router-id 10.0.0.10": null}
                    },
                }
            }),
        );
        eapi.set_response(
            SHOW_PORT_CHANNEL,
            json!({
                "portChannels": {
                    "Port-Channel10": {
                        "ports": {"Ethernet3": {"lacpMode": "active"}}
                    }
                }
            }),
        );

        let eapi_client: Arc<dyn EapiClient> = eapi.clone();
        let controller = FailoverController::new(
            PeerHealthChecker::new(eapi_client.clone()),
            EsiDiscovery::new(eapi_client.clone(), status.clone()),
            InterfaceActuator::new(Arc::new(EapiInterfaceControl::new(eapi_client))),
            status.clone(),
            rediscover,
        );

        Self {
            eapi,
            status,
            controller,
        }
    }

    fn set_peers_up(&self, up: bool) {
        let state = if up { "Established" } else { "Idle" };
        self.eapi.set_response(SHOW_EVPN_SUMMARY, peers_response(state));
    }
}

#[tokio::test]
async fn test_peer_loss_shuts_esi_member_links() {
    let mut setup = TestSetup::new(true);
    setup.controller.init().await;

    assert_eq!(setup.controller.esi_interfaces(), ["Port-Channel10"]);
    assert_eq!(setup.status.get(KEY_HEALTH).as_deref(), Some("UP"));

    // All peers drop, an adjacency-change trigger arrives
    setup.set_peers_up(false);
    setup.controller.evaluate().await;

    // The aggregate is expanded: only the member link is shut
    let calls = setup.eapi.config_calls();
    assert_eq!(calls, vec![vec!["interface Ethernet3", "shutdown"]]);

    assert_eq!(setup.controller.health(), PeerHealth::Down);
    assert!(setup.controller.latched());
    assert_eq!(setup.status.get(KEY_HEALTH).as_deref(), Some("FAIL"));
    assert_eq!(setup.status.get(KEY_DISABLE_COUNT).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_latch_suppresses_repeat_actuation() {
    let mut setup = TestSetup::new(true);
    setup.controller.init().await;
    setup.set_peers_up(false);
    setup.controller.evaluate().await;
    assert_eq!(setup.eapi.config_calls().len(), 1);

    // Further adjacency-change triggers while still down
    setup.controller.evaluate().await;
    setup.controller.evaluate().await;

    assert_eq!(setup.eapi.config_calls().len(), 1);
    assert_eq!(setup.status.get(KEY_DISABLE_COUNT).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_recovery_reenables_and_resets_latch() {
    let mut setup = TestSetup::new(true);
    setup.controller.init().await;
    setup.set_peers_up(false);
    setup.controller.evaluate().await;

    setup.set_peers_up(true);
    setup.controller.evaluate().await;

    let calls = setup.eapi.config_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], vec!["interface Ethernet3", "no shutdown"]);

    assert_eq!(setup.controller.health(), PeerHealth::Up);
    assert!(!setup.controller.latched());
    assert_eq!(setup.status.get(KEY_HEALTH).as_deref(), Some("UP"));
    assert_eq!(setup.status.get(KEY_ENABLE_COUNT).as_deref(), Some("1"));

    // Round trip: the member ends where it started
    assert_eq!(calls[0], vec!["interface Ethernet3", "shutdown"]);
}

#[tokio::test]
async fn test_discovery_failure_yields_empty_set_and_marker() {
    let mut setup = TestSetup::new(true);
    setup.eapi.remove_response(SHOW_RUNNING_CONFIG);
    setup.controller.init().await;

    assert!(setup.controller.esi_interfaces().is_empty());
    assert_eq!(
        setup.status.get(KEY_ESI_INTERFACES).as_deref(),
        Some(NO_ESI_MARKER)
    );

    // A failure trigger with an empty set still latches without error
    setup.set_peers_up(false);
    setup.controller.evaluate().await;
    assert!(setup.controller.latched());
    assert!(setup.eapi.config_calls().is_empty());
    assert_eq!(setup.status.get(KEY_HEALTH).as_deref(), Some("FAIL"));
}

#[tokio::test]
async fn test_actuations_bounded_by_transitions() {
    let mut setup = TestSetup::new(true);
    setup.controller.init().await;

    // up, down, down, down, up, up, down: two down streaks, one recovery
    let sequence = [true, false, false, false, true, true, false];
    for up in sequence {
        setup.set_peers_up(up);
        setup.controller.evaluate().await;
    }

    assert_eq!(setup.controller.counters().disables, 2);
    assert_eq!(setup.controller.counters().enables, 1);
    assert_eq!(setup.status.get(KEY_DISABLE_COUNT).as_deref(), Some("2"));
    assert_eq!(setup.status.get(KEY_ENABLE_COUNT).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_partial_actuation_failure_still_latches() {
    let mut setup = TestSetup::new(true);

    // Two ESI interfaces: a plain link and an aggregate
    setup.eapi.set_response(
        SHOW_RUNNING_CONFIG,
        json!({
            "cmds": {
                "interface Ethernet5": {
                    "cmds": {"evpn ethernet-segment": {"cmds": {}}}
                },
                "interface Port-Channel10": {
                    "cmds": {"evpn ethernet-segment": {"cmds": {}}}
                },
            }
        }),
    );
    setup.controller.init().await;
    assert_eq!(
        setup.controller.esi_interfaces(),
        ["Ethernet5", "Port-Channel10"]
    );

    // The aggregate member rejects its shutdown command
    *setup.eapi.fail_config_containing.lock() = Some("Ethernet3".to_string());

    setup.set_peers_up(false);
    setup.controller.evaluate().await;

    // Ethernet5 was shut before the failure and stays shut
    assert_eq!(
        setup.eapi.config_calls(),
        vec![vec!["interface Ethernet5", "shutdown"]]
    );

    // The streak is still latched and counted even though the pass
    // was incomplete
    assert!(setup.controller.latched());
    assert_eq!(setup.controller.counters().disables, 1);
    assert_eq!(setup.status.get(KEY_HEALTH).as_deref(), Some("FAIL"));
}

#[tokio::test]
async fn test_rediscovery_follows_config_drift() {
    let mut setup = TestSetup::new(true);
    setup.controller.init().await;
    assert_eq!(setup.controller.esi_interfaces(), ["Port-Channel10"]);

    // ESI config moved to a different interface between boot and outage
    setup.eapi.set_response(
        SHOW_RUNNING_CONFIG,
        json!({
            "cmds": {
                "interface Ethernet7": {
                    "cmds": {"evpn ethernet-segment": {"cmds": {}}}
                },
            }
        }),
    );

    setup.set_peers_up(false);
    setup.controller.evaluate().await;

    assert_eq!(setup.controller.esi_interfaces(), ["Ethernet7"]);
    assert_eq!(
        setup.eapi.config_calls(),
        vec![vec!["interface Ethernet7", "shutdown"]]
    );
}

#[tokio::test]
async fn test_skip_rediscovery_keeps_boot_set() {
    let mut setup = TestSetup::new(false);
    setup.controller.init().await;
    assert_eq!(setup.eapi.show_count(SHOW_RUNNING_CONFIG), 1);

    setup.set_peers_up(false);
    setup.controller.evaluate().await;
    setup.set_peers_up(true);
    setup.controller.evaluate().await;

    // Discovery ran only at initialization
    assert_eq!(setup.eapi.show_count(SHOW_RUNNING_CONFIG), 1);
}

// ---------------------------------------------------------------------------
// Full agent loop
// ---------------------------------------------------------------------------

mod agent_loop {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn wait_for_status(
        status: &MemoryStatusSink,
        key: &str,
        expected: &str,
    ) -> std::result::Result<(), tokio::time::error::Elapsed> {
        timeout(Duration::from_secs(5), async {
            loop {
                if status.get(key).as_deref() == Some(expected) {
                    return;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
    }

    fn append(path: &std::path::Path, line: &str) {
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        writeln!(file, "{line}").unwrap();
    }

    #[tokio::test]
    async fn test_agent_processes_log_trigger_and_stops_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("messages");
        fs::write(&log_path, "").unwrap();

        let setup = TestSetup::new(true);
        setup.set_peers_up(false);
        let status = setup.status.clone();
        let eapi = setup.eapi.clone();

        let tailer = LogTailer::new(&log_path).unwrap();
        let mut agent = Agent::new(
            tailer,
            setup.controller,
            status.clone(),
            dir.path().join("evpnguardd.conf"),
        );
        let wakes = agent.wake_sender();
        let events = agent.event_sender();

        // Records arrive before the loop starts; the queued wake-up
        // must not be lost
        append(
            &log_path,
            "leaf1 Ebra: %LINEPROTO-5-UPDOWN: Line protocol on Interface Ethernet3, \
             changed state to down",
        );
        append(
            &log_path,
            "leaf1 Rib: %BGP-5-ADJCHANGE: peer 10.0.250.1 (VRF default AS 65001) \
             old state Established event RecvNotify new state Idle",
        );
        wakes.send(()).unwrap();

        let handle = tokio::spawn(async move { agent.run().await });

        wait_for_status(&status, KEY_HEALTH, "FAIL")
            .await
            .expect("agent did not reach FAIL state");
        assert_eq!(
            eapi.config_calls(),
            vec![vec!["interface Ethernet3", "shutdown"]]
        );

        events.send(AgentEvent::ShutdownRequested).unwrap();
        let result = timeout(Duration::from_secs(5), handle)
            .await
            .expect("agent did not stop")
            .expect("agent task panicked");
        assert!(result.is_ok());
        assert_eq!(status.get(KEY_AGENT_STATE).as_deref(), Some("stopped"));
    }

    #[tokio::test]
    async fn test_agent_option_reload_disables_rediscovery() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("messages");
        fs::write(&log_path, "").unwrap();

        let config_path = dir.path().join("evpnguardd.conf");
        fs::write(
            &config_path,
            "[failover]\nrediscover_on_transition = false\n",
        )
        .unwrap();

        let setup = TestSetup::new(true);
        setup.set_peers_up(false);
        let status = setup.status.clone();
        let eapi = setup.eapi.clone();

        let tailer = LogTailer::new(&log_path).unwrap();
        let mut agent = Agent::new(tailer, setup.controller, status.clone(), config_path);
        let wakes = agent.wake_sender();
        let events = agent.event_sender();

        append(&log_path, "%BGP-5-ADJCHANGE: peer 10.0.250.1 new state Idle");

        // Reload first, then process the log trigger
        events.send(AgentEvent::OptionChanged).unwrap();
        wakes.send(()).unwrap();

        let handle = tokio::spawn(async move { agent.run().await });

        wait_for_status(&status, KEY_HEALTH, "FAIL")
            .await
            .expect("agent did not reach FAIL state");

        // With rediscovery reloaded off, only the boot discovery ran
        assert_eq!(eapi.show_count(SHOW_RUNNING_CONFIG), 1);

        events.send(AgentEvent::ShutdownRequested).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("agent did not stop")
            .expect("agent task panicked")
            .expect("agent returned error");
    }
}
