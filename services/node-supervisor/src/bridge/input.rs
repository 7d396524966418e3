//! Consumer-side bridge.

use serde::Deserialize;
use sealink_node_config::{
    InletDescriptor, NodeSpec, OutletDescriptor, Predicate, DEFAULT_INLET_ROUTE,
};
use tracing::info;

use super::{client_error, ensure_node_usable, first_bootstrap_server, shut_down};
use super::{BatchReader, BridgeError};
use crate::lifecycle::Node;
use crate::registry::ListenerPlan;
use crate::{NodeSupervisor, SupervisorError};

/// Listener address used when none is configured.
pub const DEFAULT_NODE_ADDRESS: &str = "127.0.0.1:4000";

/// Identity the consumer node runs as.
const CONSUMER_IDENTITY: &str = "consumer";

/// Identity producers authenticate as.
const PRODUCER_IDENTITY: &str = "producer";

fn default_node_address() -> String {
    DEFAULT_NODE_ADDRESS.to_string()
}

/// Consumer bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputSettings {
    /// Real broker addresses. Only the first is used, as the outlet target.
    pub seed_brokers: Vec<String>,

    /// Identifier allowed to consume. Looked up when unset.
    #[serde(default)]
    pub consumer_identifier: Option<String>,

    /// Identifier allowed to produce. Looked up when unset.
    #[serde(default)]
    pub producer_identifier: Option<String>,

    /// Whether the outlet talks TLS to the broker.
    #[serde(default)]
    pub tls: bool,

    /// Node listener address. An existing node here is reused.
    #[serde(default = "default_node_address")]
    pub node_address: String,
}

impl InputSettings {
    pub fn new(seed_brokers: Vec<String>) -> Self {
        Self {
            seed_brokers,
            consumer_identifier: None,
            producer_identifier: None,
            tls: false,
            node_address: default_node_address(),
        }
    }

    pub fn with_identifiers(
        mut self,
        consumer: impl Into<String>,
        producer: impl Into<String>,
    ) -> Self {
        self.consumer_identifier = Some(consumer.into());
        self.producer_identifier = Some(producer.into());
        self
    }

    pub fn with_node_address(mut self, address: impl Into<String>) -> Self {
        self.node_address = address.into();
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }
}

/// Kafka consumer routed through a consumer node.
pub struct KafkaInputBridge<R> {
    reader: R,
    node: Node,
    inlet_address: String,
}

impl<R: BatchReader> KafkaInputBridge<R> {
    /// Set up the consumer node and the client.
    ///
    /// `make_reader` receives the seed brokers the client must use: the
    /// node's inlet address.
    pub async fn new<F>(
        supervisor: &NodeSupervisor,
        settings: InputSettings,
        make_reader: F,
    ) -> Result<Self, BridgeError>
    where
        F: FnOnce(Vec<String>) -> anyhow::Result<R>,
    {
        let bootstrap_server = first_bootstrap_server(&settings.seed_brokers)?;

        let consumer = match settings.consumer_identifier {
            Some(id) => id,
            None => supervisor.identifier(CONSUMER_IDENTITY).await?,
        };
        let producer = match settings.producer_identifier {
            Some(id) => id,
            None => supervisor.identifier(PRODUCER_IDENTITY).await?,
        };

        let plan = supervisor.plan_listener(Some(&settings.node_address)).await?;
        let (inlet_address, reuse) = match plan {
            ListenerPlan::Reuse(existing) => (existing.inlet_address, Some(existing.name)),
            ListenerPlan::Fresh { .. } => (supervisor.allocate_address()?, None),
        };

        let consumer_allowed = Predicate::identifier_equals(&consumer);
        let spec = NodeSpec::new(
            InletDescriptor::new(&inlet_address, DEFAULT_INLET_ROUTE)
                .avoid_publishing(true)
                .allow_producer(Predicate::identifier_equals(&producer))
                .allow(consumer_allowed.clone()),
            OutletDescriptor::new(bootstrap_server)
                .tls(settings.tls)
                .allow(consumer_allowed),
        )
        .with_identity(CONSUMER_IDENTITY)
        .with_listener(&settings.node_address);

        let reader = make_reader(vec![inlet_address.clone()]).map_err(BridgeError::Client)?;

        let node = match reuse {
            Some(name) => {
                let config = supervisor
                    .lifecycle()
                    .render(&spec)?
                    .with_name(name.as_str())
                    .to_json()
                    .map_err(SupervisorError::from)?;
                supervisor.adopt(name, config)
            }
            None => supervisor.lifecycle().create(&spec).await?,
        };

        info!(
            node = %node.name(),
            inlet = %inlet_address,
            listener = %settings.node_address,
            "Consumer bridge ready"
        );

        Ok(Self {
            reader,
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
        self.reader
            .connect()
            .await
            .map_err(|e| client_error(&self.node, e))
    }

    pub async fn read_batch(&mut self) -> Result<R::Batch, BridgeError> {
        self.reader
            .read_batch()
            .await
            .map_err(|e| client_error(&self.node, e))
    }

    /// Close the client, then delete the node if this bridge created it.
    pub async fn close(&mut self) -> Result<(), BridgeError> {
        shut_down(&self.node, self.reader.close()).await
    }
}
