//! Ethernet-Segment interface discovery
//!
//! Walks the running configuration for Ethernet and Port-Channel
//! interfaces carrying an `evpn ethernet-segment` block. Those are the
//! multi-homed attachment points this agent shuts on fabric isolation.

use crate::eapi::EapiClient;
use crate::status::{StatusSink, KEY_ESI_INTERFACES, NO_ESI_MARKER};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Show command carrying the structured running configuration
pub const SHOW_RUNNING_CONFIG: &str = "show running-config";

const ESI_BLOCK: &str = "evpn ethernet-segment";
const INTERFACE_PREFIX: &str = "interface ";

#[derive(Debug, Deserialize)]
struct RunningConfig {
    #[serde(default)]
    cmds: HashMap<String, Option<ConfigBlock>>,
}

#[derive(Debug, Deserialize)]
struct ConfigBlock {
    #[serde(default)]
    cmds: HashMap<String, Value>,
}

/// Finds interfaces configured as Ethernet-Segment attachment points
pub struct EsiDiscovery {
    eapi: Arc<dyn EapiClient>,
    status: Arc<dyn StatusSink>,
}

impl EsiDiscovery {
    pub fn new(eapi: Arc<dyn EapiClient>, status: Arc<dyn StatusSink>) -> Self {
        Self { eapi, status }
    }

    /// Discover Ethernet-Segment interfaces and publish the list.
    ///
    /// Returns interface names without the `interface ` stanza prefix,
    /// sorted for stable output. A failed or unrecognized query yields
    /// an empty set.
    pub async fn discover(&self) -> Vec<String> {
        let names = match self.eapi.run_show_command(SHOW_RUNNING_CONFIG).await {
            Ok(value) => match serde_json::from_value::<RunningConfig>(value) {
                Ok(config) => esi_interfaces(&config),
                Err(e) => {
                    warn!(error = %e, "Unrecognized running-config output");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "Running-config query failed");
                Vec::new()
            }
        };

        let published = if names.is_empty() {
            NO_ESI_MARKER.to_string()
        } else {
            names.join(", ")
        };

        info!(count = names.len(), interfaces = %published, "Ethernet-Segment interface discovery");
        self.status.set(KEY_ESI_INTERFACES, &published);

        names
    }
}

fn esi_interfaces(config: &RunningConfig) -> Vec<String> {
    let mut names: Vec<String> = config
        .cmds
        .iter()
        .filter_map(|(stanza, block)| {
            let name = stanza.strip_prefix(INTERFACE_PREFIX)?;
            if !name.starts_with("Port-Channel") && !name.starts_with("Ethernet") {
                return None;
            }
            let block = block.as_ref()?;
            block.cmds.contains_key(ESI_BLOCK).then(|| name.to_string())
        })
        .collect();
    names.sort();
    names
}
