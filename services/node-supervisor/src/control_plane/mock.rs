//! In-memory control plane for tests and development.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sealink_id::NodeName;
use tokio::process::Command;
use tracing::{debug, info};

use super::status::NodeDetails;
use super::ControlPlane;
use crate::SupervisorError;

/// Node process used when no script is configured: log a line, then idle.
const DEFAULT_NODE_SCRIPT: &str =
    "echo '2024-01-01T00:00:00 INFO mock node started'; exec sleep 3600";

/// Mock control plane.
///
/// Node processes are `sh -c <script>`. Status, list and identity answers are
/// served from memory, and every delete is recorded so tests can count them.
pub struct MockControlPlane {
    /// Shell snippet run as the node process.
    script: String,

    /// Program used for node processes.
    program: PathBuf,

    /// Configs passed to `create_command`, in order.
    created: Mutex<Vec<String>>,

    /// Names passed to `delete`, in order.
    deleted: Mutex<Vec<NodeName>>,

    /// Canned `show` answers.
    details: Mutex<HashMap<NodeName, NodeDetails>>,

    /// Canned `list` answer.
    listed: Mutex<Vec<NodeName>>,

    /// Whether deletes should fail.
    fail_deletes: AtomicBool,

    /// Artificial delete latency.
    delete_delay: Duration,
}

impl MockControlPlane {
    /// Create a mock whose nodes idle until stopped.
    pub fn new() -> Self {
        Self {
            script: DEFAULT_NODE_SCRIPT.to_string(),
            program: PathBuf::from("sh"),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            details: Mutex::new(HashMap::new()),
            listed: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
            delete_delay: Duration::ZERO,
        }
    }

    /// Create a mock whose node binary does not exist.
    pub fn failing() -> Self {
        Self {
            program: PathBuf::from("/nonexistent/sealink/mock-node"),
            ..Self::new()
        }
    }

    /// Run `script` as the node process.
    pub fn with_node_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    /// Make every delete take `delay`.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    /// Make deletes fail (or succeed again).
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Serve `details` for `show(name)`.
    pub fn set_details(&self, name: &NodeName, details: NodeDetails) {
        lock(&self.details).insert(name.clone(), details);
    }

    /// Report `name` as running with a listener and a Kafka inlet.
    pub fn add_running_node(&self, name: &NodeName, listener: &str, inlet: &str) {
        let details: NodeDetails = serde_json::from_value(serde_json::json!({
            "name": name.as_str(),
            "status": "running",
            "transports": [{"socket": listener, "mode": "listening"}],
            "inlets": [{"bind_address": inlet, "outlet_route": "/secure/api"}],
        }))
        .unwrap_or_default();

        self.set_details(name, details);
        lock(&self.listed).push(name.clone());
    }

    /// Configs passed to `create_command`, in order.
    pub fn created_configs(&self) -> Vec<String> {
        lock(&self.created).clone()
    }

    /// Number of deletes issued for `name`.
    pub fn delete_count(&self, name: &NodeName) -> usize {
        lock(&self.deleted).iter().filter(|n| *n == name).count()
    }

    /// Total deletes issued.
    pub fn total_deletes(&self) -> usize {
        lock(&self.deleted).len()
    }
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    fn binary(&self) -> &Path {
        &self.program
    }

    fn create_command(&self, config: &str) -> Command {
        lock(&self.created).push(config.to_string());

        let mut command = Command::new(&self.program);
        command.arg("-c").arg(&self.script).arg("mock-node").arg(config);
        command
    }

    async fn show(&self, name: &NodeName) -> Result<NodeDetails, SupervisorError> {
        debug!(node = %name, "[MOCK] Showing node");

        if lock(&self.deleted).contains(name) {
            return Err(SupervisorError::StatusQueryFailed {
                name: name.to_string(),
                reason: "node deleted".to_string(),
            });
        }

        if let Some(details) = lock(&self.details).get(name) {
            return Ok(details.clone());
        }

        // A node created through this mock is running until deleted.
        let created = lock(&self.created)
            .iter()
            .any(|config| config.contains(&format!(r#""name":"{name}""#)));
        if created {
            return Ok(NodeDetails {
                name: Some(name.to_string()),
                status: Some("running".to_string()),
                ..NodeDetails::default()
            });
        }

        Err(SupervisorError::StatusQueryFailed {
            name: name.to_string(),
            reason: "node not found".to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<NodeName>, SupervisorError> {
        Ok(lock(&self.listed).clone())
    }

    async fn delete(&self, name: &NodeName) -> Result<(), SupervisorError> {
        info!(node = %name, "[MOCK] Deleting node");

        if !self.delete_delay.is_zero() {
            tokio::time::sleep(self.delete_delay).await;
        }

        lock(&self.deleted).push(name.clone());
        lock(&self.listed).retain(|n| n != name);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SupervisorError::DeleteFailed {
                name: name.to_string(),
                reason: "mock control plane configured to fail".to_string(),
            });
        }

        Ok(())
    }

    async fn create_identity(&self, name: &str) -> Result<String, SupervisorError> {
        let hex: String = name.bytes().map(|b| format!("{b:02x}")).collect();
        Ok(format!("I{hex}"))
    }
}
