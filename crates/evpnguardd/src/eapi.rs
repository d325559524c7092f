//! Management API (eAPI) client
//!
//! Talks JSON-RPC 2.0 to the switch command API. Show commands return
//! the structured output of a single command; config commands run a
//! batch inside an enable/configure session. The response either
//! carries a `result` array with one entry per command, or an `error`
//! member when any command was rejected.

use crate::config::EapiConfig;
use crate::error::{GuardError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const RUN_CMDS_ID: &str = "evpnguardd";

/// Command transport toward the switch management API
#[async_trait]
pub trait EapiClient: Send + Sync {
    /// Run one show command and return its structured output
    async fn run_show_command(&self, cmd: &str) -> Result<Value>;

    /// Run configuration commands inside an enable/configure session
    async fn run_config_commands(&self, cmds: &[String]) -> Result<()>;
}

/// HTTP eAPI client
pub struct EapiHttpClient {
    endpoint: String,
    auth: Option<(String, String)>,
    client: reqwest::Client,
}

impl EapiHttpClient {
    /// Build a client from configuration
    pub fn new(config: &EapiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        let auth = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            (Some(user), None) => Some((user.clone(), String::new())),
            _ => None,
        };

        Ok(Self {
            endpoint: config.endpoint.clone(),
            auth,
            client,
        })
    }

    async fn run_cmds(&self, cmds: Vec<String>) -> Result<Vec<Value>> {
        debug!(count = cmds.len(), first = %cmds.first().map(String::as_str).unwrap_or(""), "Running eAPI commands");

        let body = request_body(&cmds);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        extract_results(body)
    }
}

#[async_trait]
impl EapiClient for EapiHttpClient {
    async fn run_show_command(&self, cmd: &str) -> Result<Value> {
        let mut results = self.run_cmds(vec![cmd.to_string()]).await?;
        if results.is_empty() {
            return Err(GuardError::Eapi(format!("No output for '{cmd}'")));
        }
        Ok(results.remove(0))
    }

    async fn run_config_commands(&self, cmds: &[String]) -> Result<()> {
        let mut all = Vec::with_capacity(cmds.len() + 2);
        all.push("enable".to_string());
        all.push("configure".to_string());
        all.extend(cmds.iter().cloned());
        self.run_cmds(all).await?;
        Ok(())
    }
}

/// Build the runCmds JSON-RPC request body
fn request_body(cmds: &[String]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "runCmds",
        "params": {
            "version": 1,
            "cmds": cmds,
            "format": "json",
        },
        "id": RUN_CMDS_ID,
    })
}

/// Pull the per-command results out of a runCmds response
fn extract_results(body: Value) -> Result<Vec<Value>> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(GuardError::Eapi(format!(
            "runCmds failed ({code}): {message}"
        )));
    }

    match body.get("result") {
        Some(Value::Array(results)) => Ok(results.clone()),
        _ => Err(GuardError::Eapi(
            "Response carries no result array".to_string(),
        )),
    }
}
