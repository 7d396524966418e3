//! Node supervisor: the entry point bridges and binaries use.
//!
//! Bundles the pieces a caller needs to stand up a node:
//!
//! ```text
//! NodeSupervisor
//! ├── NodeLifecycle       create / adopt / render
//! │   └── ProcessSupervisor
//! ├── AddressAllocator    free local addresses
//! └── NodeRepository      reusable running nodes
//! ```

use std::sync::Arc;

use sealink_id::NodeName;
use sealink_networking::AddressAllocator;
use sealink_node_config::NodeSpec;
use tracing::info;

use crate::control_plane::{CliControlPlane, ControlPlane};
use crate::lifecycle::{Node, NodeLifecycle};
use crate::registry::{self, ControlPlaneRegistry, ListenerPlan, NodeRepository};
use crate::{SupervisorConfig, SupervisorError};

/// Root object for supervising nodes.
pub struct NodeSupervisor {
    lifecycle: NodeLifecycle,
    allocator: AddressAllocator,
    repository: Arc<dyn NodeRepository>,
}

impl NodeSupervisor {
    /// Create a supervisor driving `control_plane`.
    pub fn new(config: SupervisorConfig, control_plane: Arc<dyn ControlPlane>) -> Self {
        let repository = Arc::new(ControlPlaneRegistry::new(Arc::clone(&control_plane)));

        Self {
            lifecycle: NodeLifecycle::new(config, control_plane),
            allocator: AddressAllocator::localhost(),
            repository,
        }
    }

    /// Create a supervisor driving the configured node binary.
    pub fn from_config(config: SupervisorConfig) -> Self {
        let control_plane = Arc::new(CliControlPlane::from_config(&config));
        Self::new(config, control_plane)
    }

    /// Use a different repository for node reuse.
    pub fn with_repository(mut self, repository: Arc<dyn NodeRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// Allocate on a different allocator.
    pub fn with_allocator(mut self, allocator: AddressAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// The lifecycle used to create and adopt nodes.
    pub fn lifecycle(&self) -> &NodeLifecycle {
        &self.lifecycle
    }

    /// The allocator used for fresh listener addresses.
    pub fn allocator(&self) -> &AddressAllocator {
        &self.allocator
    }

    /// The control plane nodes are driven through.
    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        self.lifecycle.control_plane()
    }

    /// Allocate a free local address as `host:port`.
    pub fn allocate_address(&self) -> Result<String, SupervisorError> {
        Ok(self.allocator.find_free()?.to_string())
    }

    /// Resolve where a node should listen. See [`registry::plan_listener`].
    pub async fn plan_listener(
        &self,
        requested: Option<&str>,
    ) -> Result<ListenerPlan, SupervisorError> {
        registry::plan_listener(&self.allocator, self.repository.as_ref(), requested).await
    }

    /// Return the identifier for identity `name`, creating it if needed.
    pub async fn identifier(&self, name: &str) -> Result<String, SupervisorError> {
        self.control_plane().create_identity(name).await
    }

    /// Create a node, allocating a listener address first if the spec has
    /// none.
    pub async fn launch(&self, mut spec: NodeSpec) -> Result<Node, SupervisorError> {
        if spec.listener_address.is_none() {
            let listener = self.allocate_address()?;
            info!(listener = %listener, "Allocated node listener address");
            spec.listener_address = Some(listener);
        }

        self.lifecycle.create(&spec).await
    }

    /// Wrap an existing node without taking ownership of it.
    pub fn adopt(&self, name: NodeName, config: String) -> Node {
        self.lifecycle.adopt(name, config)
    }
}
