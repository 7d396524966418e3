//! Kafka data-plane bridges.
//!
//! A bridge pairs an opaque Kafka client with a supervised node. The client
//! is pointed at the node's local inlet instead of the real brokers, and the
//! node forwards over the secure overlay to the broker (consumer side) or to
//! the remote consumer node (producer side).
//!
//! The Kafka client itself is out of scope here; it only has to implement
//! [`BatchReader`] or [`BatchWriter`].

mod input;
mod output;

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::lifecycle::{Node, Ownership};
use crate::SupervisorError;

pub use input::{InputSettings, KafkaInputBridge, DEFAULT_NODE_ADDRESS};
pub use output::{KafkaOutputBridge, OutputSettings};

/// Errors from bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bridge settings are unusable.
    #[error("invalid bridge settings: {0}")]
    Settings(String),

    /// The node could not be set up or is gone.
    #[error(transparent)]
    Node(#[from] SupervisorError),

    /// The Kafka client failed.
    #[error("kafka client error: {0:#}")]
    Client(#[source] anyhow::Error),

    /// The Kafka client failed after the node was torn down. Expected during
    /// shutdown.
    #[error("kafka client error during shutdown: {0:#}")]
    Shutdown(#[source] anyhow::Error),
}

impl BridgeError {
    /// Returns true if this error is a consequence of shutting down.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, BridgeError::Shutdown(_))
    }
}

/// Consumer-side Kafka client.
#[async_trait]
pub trait BatchReader: Send {
    /// A batch of consumed records.
    type Batch: Send;

    async fn connect(&mut self) -> anyhow::Result<()>;

    async fn read_batch(&mut self) -> anyhow::Result<Self::Batch>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Producer-side Kafka client.
#[async_trait]
pub trait BatchWriter: Send {
    /// A batch of records to produce.
    type Batch: Send;

    async fn connect(&mut self) -> anyhow::Result<()>;

    async fn write_batch(&mut self, batch: Self::Batch) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

/// First broker of a seed list. Entries may themselves be comma-separated.
pub fn first_bootstrap_server(seed_brokers: &[String]) -> Result<String, BridgeError> {
    seed_brokers
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .find(|broker| !broker.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BridgeError::Settings("seed_brokers must name at least one broker".into()))
}

/// Refuse to use a client whose owned node has been torn down.
fn ensure_node_usable(node: &Node) -> Result<(), BridgeError> {
    if node.ownership() == Ownership::Owned && node.state().is_torn_down() {
        return Err(SupervisorError::NotRunning {
            name: node.name().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Classify a client error by whether the node is already gone.
fn client_error(node: &Node, err: anyhow::Error) -> BridgeError {
    if node.ownership() == Ownership::Owned && node.state().is_torn_down() {
        BridgeError::Shutdown(err)
    } else {
        BridgeError::Client(err)
    }
}

/// Close the client, then delete the node.
///
/// A failed node delete is logged and does not fail the close.
async fn shut_down<F>(node: &Node, close_client: F) -> Result<(), BridgeError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let client_result = close_client.await.map_err(|e| client_error(node, e));

    if let Err(e) = node.delete().await {
        warn!(node = %node.name(), error = %e, "Node delete failed while closing bridge");
    }

    if let Err(e) = &client_result {
        debug!(node = %node.name(), error = %e, shutdown = e.is_shutdown(), "Client close failed");
    }
    client_result
}
