//! Supervisor errors.
//!
//! Construction-time errors (everything up to a successful spawn) propagate to
//! the caller. Runtime conditions (process death, failed deletes, failed
//! status queries) are logged where they happen and only show up as a node
//! that is no longer running.

use std::io;

use sealink_id::NameError;
use sealink_networking::NetworkError;
use sealink_node_config::ConfigError;
use thiserror::Error;

/// Errors from supervising overlay nodes.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// An explicit address is bound by something that is not a reusable node.
    #[error("address {address} is already in use and no reusable node listens on it")]
    AddressInUse { address: String },

    /// Probing or allocating a local address failed.
    #[error("address allocation failed: {0}")]
    AllocationFailed(#[from] NetworkError),

    /// The node configuration could not be built. Indicates a builder defect
    /// or an invalid spec, never a runtime fault.
    #[error("failed to build node configuration: {0}")]
    ConfigBuildFailed(#[from] ConfigError),

    /// A node name could not be generated or parsed.
    #[error("invalid node name: {0}")]
    InvalidName(#[from] NameError),

    /// The node binary is missing or could not be started.
    #[error("failed to start node {name} using {binary}: {source}")]
    SpawnFailed {
        name: String,
        binary: String,
        #[source]
        source: io::Error,
    },

    /// The node process died without being asked to.
    #[error("node {name} exited unexpectedly: {exit}")]
    ProcessExitedUnexpectedly { name: String, exit: String },

    /// The delete subcommand failed.
    #[error("failed to delete node {name}: {reason}")]
    DeleteFailed { name: String, reason: String },

    /// The status subcommand failed or returned something unreadable.
    #[error("status query for node {name} failed: {reason}")]
    StatusQueryFailed { name: String, reason: String },

    /// Listing nodes failed.
    #[error("listing nodes failed: {reason}")]
    ListFailed { reason: String },

    /// No running node listens on the requested address.
    #[error("no running node with a Kafka inlet listens on {address}")]
    NodeNotFound { address: String },

    /// Looking for a node to reuse failed.
    #[error("looking up a reusable node on {address} failed: {reason}")]
    NodeReuseLookupFailed { address: String, reason: String },

    /// Creating or fetching an identity failed.
    #[error("failed to create identity {name}: {reason}")]
    IdentityFailed { name: String, reason: String },

    /// The node has already been torn down.
    #[error("node {name} is not running")]
    NotRunning { name: String },
}

impl SupervisorError {
    /// Returns true if a retry with a freshly allocated address may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SupervisorError::AddressInUse { .. }
                | SupervisorError::AllocationFailed(NetworkError::Exhausted(_))
        )
    }

    /// Returns true if this error is the reuse lookup coming up empty.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SupervisorError::NodeNotFound { .. })
    }
}
