//! Kafka bridges over the mock control plane with fake clients.

#![cfg(unix)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sealink_id::NodeName;
use sealink_node_config::{NodeConfig, Predicate};
use sealink_supervisor::bridge::{
    BatchReader, BatchWriter, BridgeError, InputSettings, KafkaInputBridge, KafkaOutputBridge,
    OutputSettings,
};
use sealink_supervisor::{
    ControlPlane, MockControlPlane, NodeState, NodeSupervisor, Ownership, SupervisorConfig,
    SupervisorError,
};

/// What a fake client saw.
#[derive(Debug, Default)]
struct ClientLog {
    seed_brokers: Vec<String>,
    connected: bool,
    closed: bool,
    deletes_at_close: Option<usize>,
    written: Vec<String>,
}

struct FakeClient {
    log: Arc<Mutex<ClientLog>>,
    control_plane: Arc<MockControlPlane>,
    fail: bool,
}

impl FakeClient {
    fn factory(
        log: &Arc<Mutex<ClientLog>>,
        control_plane: &Arc<MockControlPlane>,
        fail: bool,
    ) -> impl FnOnce(Vec<String>) -> anyhow::Result<FakeClient> {
        let log = log.clone();
        let control_plane = control_plane.clone();
        move |seed_brokers| {
            log.lock().unwrap().seed_brokers = seed_brokers;
            Ok(FakeClient {
                log,
                control_plane,
                fail,
            })
        }
    }

    fn record_close(&self) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.closed = true;
        log.deletes_at_close = Some(self.control_plane.total_deletes());
        Ok(())
    }
}

#[async_trait]
impl BatchReader for FakeClient {
    type Batch = Vec<String>;

    async fn connect(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().connected = true;
        Ok(())
    }

    async fn read_batch(&mut self) -> anyhow::Result<Vec<String>> {
        if self.fail {
            anyhow::bail!("connection reset by peer");
        }
        Ok(vec!["record".to_string()])
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.record_close()
    }
}

#[async_trait]
impl BatchWriter for FakeClient {
    type Batch = Vec<String>;

    async fn connect(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().connected = true;
        Ok(())
    }

    async fn write_batch(&mut self, batch: Vec<String>) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("broken pipe");
        }
        self.log.lock().unwrap().written.extend(batch);
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.record_close()
    }
}

fn supervisor(control_plane: &Arc<MockControlPlane>) -> NodeSupervisor {
    let config = SupervisorConfig::default().with_stop_grace(Duration::from_millis(200));
    NodeSupervisor::new(config, control_plane.clone())
}

fn free_address(supervisor: &NodeSupervisor) -> String {
    supervisor.allocate_address().unwrap()
}

#[tokio::test]
async fn test_input_bridge_creates_consumer_node() {
    let control_plane = Arc::new(MockControlPlane::new());
    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));

    let settings = InputSettings::new(vec!["b1:9092,b2:9092".to_string()])
        .with_node_address(free_address(&supervisor));
    let mut bridge = KafkaInputBridge::<FakeClient>::new(
        &supervisor,
        settings.clone(),
        FakeClient::factory(&log, &control_plane, false),
    )
    .await
    .unwrap();

    assert_eq!(bridge.node().ownership(), Ownership::Owned);
    assert_eq!(log.lock().unwrap().seed_brokers, [bridge.inlet_address()]);

    let config = NodeConfig::from_json(&control_plane.created_configs()[0]).unwrap();
    let consumer = control_plane.create_identity("consumer").await.unwrap();
    let producer = control_plane.create_identity("producer").await.unwrap();

    assert_eq!(config.identity.as_deref(), Some("consumer"));
    assert_eq!(
        config.tcp_listener_address.as_deref(),
        Some(settings.node_address.as_str())
    );
    let inlet = config.inlet().unwrap();
    assert_eq!(inlet.from, bridge.inlet_address());
    assert_eq!(inlet.to, "/secure/api");
    assert!(inlet.avoid_publishing);
    assert_eq!(inlet.allow, Some(Predicate::identifier_equals(&consumer)));
    assert_eq!(
        inlet.allow_producer,
        Some(Predicate::identifier_equals(&producer))
    );
    let outlet = config.outlet().unwrap();
    assert_eq!(outlet.bootstrap_server, "b1:9092");
    assert_eq!(outlet.allow, Some(Predicate::identifier_equals(&consumer)));

    bridge.connect().await.unwrap();
    assert_eq!(bridge.read_batch().await.unwrap(), ["record"]);

    let name = bridge.node().name().clone();
    bridge.close().await.unwrap();

    let log = log.lock().unwrap();
    assert!(log.connected);
    assert!(log.closed);
    assert_eq!(log.deletes_at_close, Some(0));
    assert_eq!(control_plane.delete_count(&name), 1);
}

#[tokio::test]
async fn test_input_bridge_uses_given_identifiers() {
    let control_plane = Arc::new(MockControlPlane::new());
    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));

    let settings = InputSettings::new(vec!["b1:9092".to_string()])
        .with_identifiers("Iaaaa", "Ibbbb")
        .with_node_address(free_address(&supervisor))
        .with_tls(true);
    let mut bridge = KafkaInputBridge::<FakeClient>::new(
        &supervisor,
        settings,
        FakeClient::factory(&log, &control_plane, false),
    )
    .await
    .unwrap();

    let config = NodeConfig::from_json(bridge.node().config()).unwrap();
    let inlet = config.inlet().unwrap();
    assert_eq!(inlet.allow, Some(Predicate::identifier_equals("Iaaaa")));
    assert_eq!(inlet.allow_producer, Some(Predicate::identifier_equals("Ibbbb")));
    assert!(config.outlet().unwrap().tls);

    bridge.close().await.unwrap();
}

#[tokio::test]
async fn test_input_bridge_reuses_running_node() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let control_plane = Arc::new(MockControlPlane::new());
    let existing = NodeName::parse("bridge-00001234").unwrap();
    control_plane.add_running_node(&existing, &address, "127.0.0.1:5999");

    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));
    let mut bridge = KafkaInputBridge::<FakeClient>::new(
        &supervisor,
        InputSettings::new(vec!["b1:9092".to_string()]).with_node_address(&address),
        FakeClient::factory(&log, &control_plane, false),
    )
    .await
    .unwrap();

    assert_eq!(bridge.node().name(), &existing);
    assert_eq!(bridge.node().ownership(), Ownership::Adopted);
    assert_eq!(bridge.inlet_address(), "127.0.0.1:5999");
    assert_eq!(log.lock().unwrap().seed_brokers, ["127.0.0.1:5999"]);
    assert!(control_plane.created_configs().is_empty());

    bridge.connect().await.unwrap();
    bridge.close().await.unwrap();
    assert_eq!(control_plane.total_deletes(), 0);
    assert!(control_plane.is_running(&existing).await);
}

#[tokio::test]
async fn test_input_bridge_address_held_by_stranger() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let control_plane = Arc::new(MockControlPlane::new());
    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));

    let result = KafkaInputBridge::<FakeClient>::new(
        &supervisor,
        InputSettings::new(vec!["b1:9092".to_string()]).with_node_address(&address),
        FakeClient::factory(&log, &control_plane, false),
    )
    .await;

    assert!(matches!(
        result,
        Err(BridgeError::Node(SupervisorError::AddressInUse { .. }))
    ));
    assert!(control_plane.created_configs().is_empty());
}

#[tokio::test]
async fn test_empty_seed_brokers_rejected() {
    let control_plane = Arc::new(MockControlPlane::new());
    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));

    let result = KafkaOutputBridge::<FakeClient>::new(
        &supervisor,
        OutputSettings::new(vec![], "ticket", "/route"),
        FakeClient::factory(&log, &control_plane, false),
    )
    .await;

    assert!(matches!(result, Err(BridgeError::Settings(_))));
    assert!(control_plane.created_configs().is_empty());
}

#[tokio::test]
async fn test_output_bridge_creates_producer_node() {
    let control_plane = Arc::new(MockControlPlane::new());
    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));

    let settings = OutputSettings::new(
        vec!["broker:9093".to_string()],
        "enrollment-ticket",
        "/project/default/service/forward_to_consumer/secure/api",
    )
    .with_relay("consumer");
    let mut bridge = KafkaOutputBridge::<FakeClient>::new(
        &supervisor,
        settings,
        FakeClient::factory(&log, &control_plane, false),
    )
    .await
    .unwrap();

    let config = NodeConfig::from_json(bridge.node().config()).unwrap();
    assert_eq!(config.ticket.as_deref(), Some("enrollment-ticket"));
    assert_eq!(config.relay.as_deref(), Some("consumer"));
    assert!(config.tcp_listener_address.is_some());
    let inlet = config.inlet().unwrap();
    assert_eq!(inlet.from, bridge.inlet_address());
    assert_eq!(
        inlet.consumer.as_deref(),
        Some("/project/default/service/forward_to_consumer/secure/api")
    );
    assert!(inlet.avoid_publishing);
    assert_eq!(config.outlet().unwrap().bootstrap_server, "broker:9093");

    bridge.connect().await.unwrap();
    bridge.write_batch(vec!["a".into(), "b".into()]).await.unwrap();
    bridge.close().await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.written, ["a", "b"]);
    assert_eq!(log.deletes_at_close, Some(0));
    assert_eq!(control_plane.delete_count(bridge.node().name()), 1);
}

#[tokio::test]
async fn test_bridge_after_node_crash() {
    let control_plane = Arc::new(MockControlPlane::new().with_node_script("exit 3"));
    let supervisor = supervisor(&control_plane);
    let log = Arc::new(Mutex::new(ClientLog::default()));

    let mut bridge = KafkaOutputBridge::<FakeClient>::new(
        &supervisor,
        OutputSettings::new(vec!["broker:9092".to_string()], "ticket", "/route"),
        FakeClient::factory(&log, &control_plane, true),
    )
    .await
    .unwrap();

    assert_eq!(bridge.node().wait_until_terminal().await, NodeState::Deleted);

    let err = bridge.connect().await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Node(SupervisorError::NotRunning { .. })
    ));

    let err = bridge.write_batch(vec!["a".into()]).await.unwrap_err();
    assert!(err.is_shutdown());

    bridge.close().await.unwrap();
    assert_eq!(control_plane.total_deletes(), 1);
}
