//! Interface administrative state actuation
//!
//! Applies a desired admin state to the Ethernet-Segment interface set.
//! Port-Channel aggregates are expanded to their current member links
//! and only the members are touched; shutting the aggregate itself
//! would not signal link-down to the attached host the way dropping
//! its members does.

use crate::eapi::EapiClient;
use crate::error::{GuardError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Show command listing aggregates and their member links
pub const SHOW_PORT_CHANNEL: &str = "show port-channel";

const AGGREGATE_PREFIX: &str = "Port-Channel";
const INTERFACE_PREFIX: &str = "interface ";

/// Low-level interface control surface
#[async_trait]
pub trait InterfaceControl: Send + Sync {
    /// Set the administrative state of one interface
    async fn set_admin_enabled(&self, interface: &str, enabled: bool) -> Result<()>;

    /// Current member links of an aggregate interface
    async fn list_aggregate_members(&self, interface: &str) -> Result<Vec<String>>;
}

/// Applies admin-state changes across an interface set
pub struct InterfaceActuator {
    control: Arc<dyn InterfaceControl>,
}

impl InterfaceActuator {
    pub fn new(control: Arc<dyn InterfaceControl>) -> Self {
        Self { control }
    }

    /// Apply the desired admin state to every interface in the set.
    ///
    /// Returns false as soon as any change fails; interfaces already
    /// changed keep their new state. A false return therefore means
    /// "state uncertain", not "state unchanged".
    pub async fn set_admin_enabled(&self, interfaces: &[String], enabled: bool) -> bool {
        match self.apply(interfaces, enabled).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, enabled, "Interface actuation failed, aborting pass");
                false
            }
        }
    }

    async fn apply(&self, interfaces: &[String], enabled: bool) -> Result<()> {
        for interface in interfaces {
            let name = interface
                .strip_prefix(INTERFACE_PREFIX)
                .unwrap_or(interface);

            if name.starts_with(AGGREGATE_PREFIX) {
                let members = self.control.list_aggregate_members(name).await?;
                if members.is_empty() {
                    debug!(interface = name, "Aggregate has no members, nothing to change");
                    continue;
                }
                for member in &members {
                    self.control.set_admin_enabled(member, enabled).await?;
                    info!(interface = %member, aggregate = name, enabled, "Set member admin state");
                }
            } else {
                self.control.set_admin_enabled(name, enabled).await?;
                info!(interface = name, enabled, "Set interface admin state");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PortChannelDetail {
    #[serde(rename = "portChannels", default)]
    port_channels: HashMap<String, PortChannelEntry>,
}

#[derive(Debug, Deserialize)]
struct PortChannelEntry {
    #[serde(default)]
    ports: HashMap<String, Value>,
}

/// Interface control over the switch management API
pub struct EapiInterfaceControl {
    eapi: Arc<dyn EapiClient>,
}

impl EapiInterfaceControl {
    pub fn new(eapi: Arc<dyn EapiClient>) -> Self {
        Self { eapi }
    }
}

#[async_trait]
impl InterfaceControl for EapiInterfaceControl {
    async fn set_admin_enabled(&self, interface: &str, enabled: bool) -> Result<()> {
        let action = if enabled { "no shutdown" } else { "shutdown" };
        let cmds = vec![format!("interface {interface}"), action.to_string()];
        self.eapi.run_config_commands(&cmds).await
    }

    async fn list_aggregate_members(&self, interface: &str) -> Result<Vec<String>> {
        let value = self.eapi.run_show_command(SHOW_PORT_CHANNEL).await?;
        let detail: PortChannelDetail = serde_json::from_value(value)
            .map_err(|e| GuardError::Eapi(format!("Unrecognized port-channel output: {e}")))?;

        let entry = detail.port_channels.get(interface).ok_or_else(|| {
            GuardError::Eapi(format!("Aggregate {interface} not found in port-channel table"))
        })?;

        let mut members: Vec<String> = entry.ports.keys().cloned().collect();
        members.sort();
        Ok(members)
    }
}
