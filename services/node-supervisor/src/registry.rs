//! Discovery of already-running nodes.
//!
//! When a requested listener address is taken, the occupant may be a node
//! started earlier (by this host or a previous run). If it is running and
//! exposes a Kafka inlet, the caller reuses it instead of failing.

use std::sync::Arc;

use async_trait::async_trait;
use sealink_id::NodeName;
use sealink_networking::AddressAllocator;
use sealink_node_config::DEFAULT_INLET_ROUTE;
use tracing::{debug, info};

use crate::control_plane::ControlPlane;
use crate::SupervisorError;

/// A running node that can be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReusableNode {
    /// The node's name.
    pub name: NodeName,

    /// Where its Kafka inlet accepts connections.
    pub inlet_address: String,
}

/// Finds running nodes by listener address.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Find a running node listening on `address` that exposes a Kafka inlet.
    ///
    /// Returns [`SupervisorError::NodeNotFound`] if there is none.
    async fn find_by_listener(&self, address: &str) -> Result<ReusableNode, SupervisorError>;
}

/// Repository backed by the control plane's `node list` and `node show`.
pub struct ControlPlaneRegistry {
    control_plane: Arc<dyn ControlPlane>,
    inlet_marker: String,
}

impl ControlPlaneRegistry {
    /// Look for inlets routed to the default Kafka route.
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            inlet_marker: DEFAULT_INLET_ROUTE.to_string(),
        }
    }

    /// Look for inlets whose route contains `marker`.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.inlet_marker = marker.into();
        self
    }
}

#[async_trait]
impl NodeRepository for ControlPlaneRegistry {
    async fn find_by_listener(&self, address: &str) -> Result<ReusableNode, SupervisorError> {
        let names = self.control_plane.list().await.map_err(|e| {
            SupervisorError::NodeReuseLookupFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        for name in names {
            let details = match self.control_plane.show(&name).await {
                Ok(details) => details,
                Err(e) => {
                    debug!(node = %name, error = %e, "Skipping node with unreadable status");
                    continue;
                }
            };

            if !details.is_running() || !details.listens_on(address) {
                continue;
            }

            match details
                .inlet_routed_to(&self.inlet_marker)
                .and_then(|inlet| inlet.bind_address.clone())
            {
                Some(inlet_address) => {
                    info!(node = %name, address, inlet = %inlet_address, "Found reusable node");
                    return Ok(ReusableNode {
                        name,
                        inlet_address,
                    });
                }
                None => {
                    debug!(node = %name, address, "Node listens on address but has no Kafka inlet");
                }
            }
        }

        Err(SupervisorError::NodeNotFound {
            address: address.to_string(),
        })
    }
}

/// Outcome of resolving a listener address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerPlan {
    /// Start a new node listening here.
    Fresh { listener: String },
    /// A suitable node already listens on the requested address.
    Reuse(ReusableNode),
}

/// Decide where a new node should listen.
///
/// With no request, a free address is allocated. A free requested address is
/// used as-is. A taken one is reused if a suitable node holds it, and is
/// otherwise [`SupervisorError::AddressInUse`].
pub async fn plan_listener(
    allocator: &AddressAllocator,
    repository: &dyn NodeRepository,
    requested: Option<&str>,
) -> Result<ListenerPlan, SupervisorError> {
    let Some(address) = requested else {
        let listener = allocator.find_free()?.to_string();
        return Ok(ListenerPlan::Fresh { listener });
    };

    if allocator.probe(address)?.was_free {
        return Ok(ListenerPlan::Fresh {
            listener: address.to_string(),
        });
    }

    debug!(address, "Requested listener address is taken, looking for a reusable node");
    match repository.find_by_listener(address).await {
        Ok(node) => Ok(ListenerPlan::Reuse(node)),
        Err(SupervisorError::NodeNotFound { .. }) => Err(SupervisorError::AddressInUse {
            address: address.to_string(),
        }),
        Err(e) => Err(e),
    }
}
