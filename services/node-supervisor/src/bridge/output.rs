//! Producer-side bridge.

use serde::Deserialize;
use sealink_node_config::{InletDescriptor, NodeSpec, OutletDescriptor, DEFAULT_INLET_ROUTE};
use tracing::info;

use super::{client_error, ensure_node_usable, first_bootstrap_server, shut_down};
use super::{BatchWriter, BridgeError};
use crate::lifecycle::Node;
use crate::NodeSupervisor;

/// Producer bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputSettings {
    /// Real broker addresses. Only the first is used, as the outlet target.
    pub seed_brokers: Vec<String>,

    /// Enrollment ticket for the producer node.
    pub ticket: String,

    /// Route to the consumer node.
    pub route_to_consumer: String,

    /// Relay to register, if any.
    #[serde(default)]
    pub relay: Option<String>,

    /// Whether the outlet talks TLS to the broker.
    #[serde(default)]
    pub tls: bool,
}

impl OutputSettings {
    pub fn new(
        seed_brokers: Vec<String>,
        ticket: impl Into<String>,
        route_to_consumer: impl Into<String>,
    ) -> Self {
        Self {
            seed_brokers,
            ticket: ticket.into(),
            route_to_consumer: route_to_consumer.into(),
            relay: None,
            tls: false,
        }
    }

    pub fn with_relay(mut self, relay: impl Into<String>) -> Self {
        self.relay = Some(relay.into());
        self
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.ticket.trim().is_empty() {
            return Err(BridgeError::Settings("ticket cannot be empty".into()));
        }
        if self.route_to_consumer.trim().is_empty() {
            return Err(BridgeError::Settings(
                "route_to_consumer cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Kafka producer routed through a producer node.
pub struct KafkaOutputBridge<W> {
    writer: W,
    node: Node,
    inlet_address: String,
}

impl<W: BatchWriter> KafkaOutputBridge<W> {
    /// Set up the producer node and the client.
    ///
    /// `make_writer` receives the seed brokers the client must use: the
    /// node's inlet address.
    pub async fn new<F>(
        supervisor: &NodeSupervisor,
        settings: OutputSettings,
        make_writer: F,
    ) -> Result<Self, BridgeError>
    where
        F: FnOnce(Vec<String>) -> anyhow::Result<W>,
    {
        settings.validate()?;
        let bootstrap_server = first_bootstrap_server(&settings.seed_brokers)?;
        let inlet_address = supervisor.allocate_address()?;

        let mut spec = NodeSpec::new(
            InletDescriptor::new(&inlet_address, DEFAULT_INLET_ROUTE)
                .avoid_publishing(true)
                .with_consumer(&settings.route_to_consumer),
            OutletDescriptor::new(bootstrap_server).tls(settings.tls),
        )
        .with_ticket(&settings.ticket);
        if let Some(relay) = &settings.relay {
            spec = spec.with_relay(relay);
        }

        let writer = make_writer(vec![inlet_address.clone()]).map_err(BridgeError::Client)?;
        let node = supervisor.launch(spec).await?;

        info!(node = %node.name(), inlet = %inlet_address, "Producer bridge ready");

        Ok(Self {
            writer,
            node,
            inlet_address,
        })
    }

    /// The node behind this bridge.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Address the client was pointed at.
    pub fn inlet_address(&self) -> &str {
        &self.inlet_address
    }

    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        ensure_node_usable(&self.node)?;
        self.writer
            .connect()
            .await
            .map_err(|e| client_error(&self.node, e))
    }

    pub async fn write_batch(&mut self, batch: W::Batch) -> Result<(), BridgeError> {
        self.writer
            .write_batch(batch)
            .await
            .map_err(|e| client_error(&self.node, e))
    }

    /// Close the client, then delete the node.
    pub async fn close(&mut self) -> Result<(), BridgeError> {
        shut_down(&self.node, self.writer.close()).await
    }
}
