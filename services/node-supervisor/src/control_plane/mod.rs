//! Control-plane interface.
//!
//! The control plane is the external node binary. Every node operation the
//! supervisor performs goes through it:
//! - `node create` (foreground, long-lived, owned by the process supervisor)
//! - `node show`, `node list` (status and discovery)
//! - `node delete` (teardown)
//! - `identity create` (identifier lookup)
//!
//! [`CliControlPlane`] drives the real binary. [`MockControlPlane`] is an
//! in-memory implementation for tests and development.

mod cli;
mod mock;
mod status;

use std::path::Path;

use async_trait::async_trait;
use sealink_id::NodeName;
use tokio::process::Command;
use tracing::debug;

use crate::SupervisorError;

pub use cli::{CliControlPlane, BASE_ENV, LOGGING_ENV, LOG_LEVEL_ENV};
pub use mock::MockControlPlane;
pub use status::{
    parse_node_list, same_socket, status_is_running, InletBinding, NodeDetails,
    TransportBinding, RUNNING_STATUSES,
};

/// Operations against the external node binary.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Path or name of the binary being driven.
    fn binary(&self) -> &Path;

    /// Build the foreground `node create` command for a rendered config.
    ///
    /// The command is returned unspawned; the process supervisor owns it.
    fn create_command(&self, config: &str) -> Command;

    /// Query one node's status.
    async fn show(&self, name: &NodeName) -> Result<NodeDetails, SupervisorError>;

    /// List node names known to the control plane.
    async fn list(&self) -> Result<Vec<NodeName>, SupervisorError>;

    /// Delete a node.
    async fn delete(&self, name: &NodeName) -> Result<(), SupervisorError>;

    /// Create an identity, or return the identifier of an existing one.
    async fn create_identity(&self, name: &str) -> Result<String, SupervisorError>;

    /// Returns true if the control plane reports the node as running.
    ///
    /// Any failure to query or parse counts as not running.
    async fn is_running(&self, name: &NodeName) -> bool {
        match self.show(name).await {
            Ok(details) => details.is_running(),
            Err(e) => {
                debug!(node = %name, error = %e, "Status query failed, treating node as not running");
                false
            }
        }
    }
}
