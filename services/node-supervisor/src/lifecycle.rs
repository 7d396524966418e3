//! Node lifecycle: create, query, delete.
//!
//! [`NodeLifecycle::create`] turns a [`NodeSpec`] into a running, supervised
//! node: it names the node, renders its configuration, spawns the foreground
//! process and hands back a [`Node`] handle. Creation is all-or-nothing: on
//! any error before the spawn succeeds no process exists and nothing needs
//! cleaning up.
//!
//! A node exits through exactly one delete, whichever of these comes first:
//! - [`Node::delete`]
//! - the node process exiting (crash, external kill, or a stop after the
//!   handle is dropped)

use std::fmt;
use std::sync::Arc;

use sealink_id::NodeName;
use sealink_node_config::{ConfigBuilder, NodeConfig, NodeSpec};
use tracing::{debug, error, info};

use crate::control_plane::ControlPlane;
use crate::process::{MonitoredProcess, ProcessExit, ProcessSupervisor};
use crate::teardown::{NodeState, TeardownCoordinator, TeardownTrigger};
use crate::{SupervisorConfig, SupervisorError};

/// Who is responsible for deleting the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by this supervisor; deleted by it.
    Owned,
    /// Found already running; left alone on delete.
    Adopted,
}

/// Handle to a supervised node.
///
/// Dropping the handle stops an owned node: its process is given the stop
/// grace period to exit and is then killed, and the delete still runs.
pub struct Node {
    name: NodeName,
    config: String,
    ownership: Ownership,
    control_plane: Arc<dyn ControlPlane>,
    teardown: Arc<TeardownCoordinator>,
    process: Option<MonitoredProcess>,
}

impl Node {
    /// The node's name.
    pub fn name(&self) -> &NodeName {
        &self.name
    }

    /// The rendered configuration the node was started with.
    pub fn config(&self) -> &str {
        &self.config
    }

    /// Whether this supervisor owns the node.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.teardown.state()
    }

    /// OS process id of an owned node.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(MonitoredProcess::pid)
    }

    /// Returns true if the control plane reports the node as running.
    ///
    /// A node that has been torn down is never running. Status query failures
    /// count as not running.
    pub async fn is_running(&self) -> bool {
        if self.state().is_torn_down() {
            return false;
        }
        self.control_plane.is_running(&self.name).await
    }

    /// Delete the node.
    ///
    /// Idempotent and safe to race with a process exit: at most one external
    /// delete is issued per node. Adopted nodes are left running.
    pub async fn delete(&self) -> Result<(), SupervisorError> {
        if self.ownership == Ownership::Adopted {
            debug!(node = %self.name, "Leaving adopted node running");
            return Ok(());
        }

        // The external delete takes the process down, so the stop goes first.
        if let Some(process) = &self.process {
            process.stop();
        }
        self.teardown.delete(TeardownTrigger::Explicit).await
    }

    /// Wait for the node process to exit. Returns `None` for adopted nodes.
    pub async fn wait_for_exit(&self) -> Option<ProcessExit> {
        match &self.process {
            Some(process) => process.wait().await,
            None => None,
        }
    }

    /// The process exit, if it has happened.
    pub fn exit(&self) -> Option<ProcessExit> {
        self.process.as_ref().and_then(MonitoredProcess::exit)
    }

    /// Wait until the node reaches a terminal state.
    pub async fn wait_until_terminal(&self) -> NodeState {
        let mut state = self.teardown.subscribe();
        let terminal = match state.wait_for(NodeState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        terminal
    }

    /// Stop an owned node's process without deleting it first. The delete
    /// follows once the process has exited.
    pub fn stop(&self) {
        if let Some(process) = &self.process {
            process.stop();
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("ownership", &self.ownership)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish()
    }
}

/// Creates and adopts nodes.
pub struct NodeLifecycle {
    config: SupervisorConfig,
    control_plane: Arc<dyn ControlPlane>,
    builder: ConfigBuilder,
    processes: ProcessSupervisor,
}

impl NodeLifecycle {
    /// Create a lifecycle manager.
    pub fn new(config: SupervisorConfig, control_plane: Arc<dyn ControlPlane>) -> Self {
        let builder = ConfigBuilder::new(config.layout);
        let processes = ProcessSupervisor::new(config.stop_grace);

        Self {
            config,
            control_plane,
            builder,
            processes,
        }
    }

    /// Supervisor configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// The control plane nodes are driven through.
    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    /// Render the configuration for `spec` without creating anything.
    pub fn render(&self, spec: &NodeSpec) -> Result<NodeConfig, SupervisorError> {
        Ok(self.builder.build(spec)?)
    }

    /// Create and start a node.
    pub async fn create(&self, spec: &NodeSpec) -> Result<Node, SupervisorError> {
        let name = NodeName::generate(&self.config.name_prefix)?;
        let config = self.render(spec)?.with_name(name.as_str()).to_json()?;

        let teardown = Arc::new(TeardownCoordinator::new(
            name.clone(),
            Arc::clone(&self.control_plane),
        ));
        teardown.mark_starting();

        info!(
            node = %name,
            binary = %self.control_plane.binary().display(),
            inlet = %spec.inlet.from,
            outlet = %spec.outlet.bootstrap_server,
            "Creating node"
        );

        let command = self.control_plane.create_command(&config);
        let process = match self.processes.spawn(command, &name, Arc::clone(&teardown)) {
            Ok(process) => process,
            Err(source) => {
                teardown.mark_failed();
                let err = SupervisorError::SpawnFailed {
                    name: name.to_string(),
                    binary: self.control_plane.binary().display().to_string(),
                    source,
                };
                error!(node = %name, error = %err, "Failed to start node");
                return Err(err);
            }
        };

        teardown.mark_running();
        info!(node = %name, pid = ?process.pid(), "Node process started");

        Ok(Node {
            name,
            config,
            ownership: Ownership::Owned,
            control_plane: Arc::clone(&self.control_plane),
            teardown,
            process: Some(process),
        })
    }

    /// Wrap a node this supervisor did not create. Deleting the handle leaves
    /// the node running.
    pub fn adopt(&self, name: NodeName, config: String) -> Node {
        let teardown = Arc::new(TeardownCoordinator::new(
            name.clone(),
            Arc::clone(&self.control_plane),
        ));
        teardown.mark_starting();
        teardown.mark_running();

        info!(node = %name, "Adopted existing node");

        Node {
            name,
            config,
            ownership: Ownership::Adopted,
            control_plane: Arc::clone(&self.control_plane),
            teardown,
            process: None,
        }
    }
}
