//! End-to-end behaviour of the CLI control plane against a fake node binary.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use sealink_id::NodeName;
use sealink_node_config::{InletDescriptor, NodeSpec, OutletDescriptor, DEFAULT_INLET_ROUTE};
use sealink_supervisor::registry::{ControlPlaneRegistry, NodeRepository};
use sealink_supervisor::{
    CliControlPlane, ControlPlane, NodeLifecycle, NodeState, SupervisorConfig, SupervisorError,
};
use sealink_testing::FakeNodeBinary;

fn spec() -> NodeSpec {
    NodeSpec::new(
        InletDescriptor::new("127.0.0.1:5000", DEFAULT_INLET_ROUTE),
        OutletDescriptor::new("broker:9092"),
    )
}

fn lifecycle(fake: &FakeNodeBinary) -> NodeLifecycle {
    let config = SupervisorConfig::default()
        .with_binary(fake.path())
        .with_stop_grace(Duration::from_secs(2));
    let control_plane = Arc::new(CliControlPlane::from_config(&config));
    NodeLifecycle::new(config, control_plane)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not met within 10s");
}

#[tokio::test]
async fn test_create_run_delete() {
    let fake = FakeNodeBinary::install().unwrap();
    let node = lifecycle(&fake).create(&spec()).await.unwrap();

    eventually(|| fake.status().as_deref() == Some("running")).await;
    assert!(node.is_running().await);

    let create = fake
        .invocations()
        .into_iter()
        .find(|line| line.starts_with("node create"))
        .unwrap();
    assert!(create.starts_with("node create --node-config {"));
    assert!(create.contains(node.name().as_str()));
    assert!(create.ends_with(" -f"));

    node.delete().await.unwrap();
    assert_eq!(fake.count("node delete"), 1);

    let exit = node.wait_for_exit().await.unwrap();
    assert_eq!(exit.code, Some(0));
    assert!(exit.stop_requested);

    assert_eq!(node.wait_until_terminal().await, NodeState::Deleted);
    assert!(!node.is_running().await);
    assert_eq!(fake.status().as_deref(), Some("stopped"));
    assert_eq!(fake.count("node delete"), 1);
}

#[tokio::test]
async fn test_crashing_node_is_deleted_once() {
    let fake = FakeNodeBinary::crashing(7).unwrap();
    let node = lifecycle(&fake).create(&spec()).await.unwrap();

    let exit = node.wait_for_exit().await.unwrap();
    assert_eq!(exit.code, Some(7));

    assert_eq!(node.wait_until_terminal().await, NodeState::Deleted);
    assert_eq!(fake.count("node delete"), 1);

    node.delete().await.unwrap();
    assert_eq!(fake.count("node delete"), 1);
}

#[tokio::test]
async fn test_delete_arguments() {
    let fake = FakeNodeBinary::install().unwrap();
    let control_plane = CliControlPlane::new(fake.path(), "info");
    let name = NodeName::parse("bridge-00000001").unwrap();

    control_plane.delete(&name).await.unwrap();
    assert_eq!(fake.invocations(), ["node delete bridge-00000001 --force --yes"]);
}

#[tokio::test]
async fn test_show_reports_status() {
    let fake = FakeNodeBinary::install().unwrap();
    let control_plane = CliControlPlane::new(fake.path(), "info");
    let name = NodeName::parse("bridge-00000002").unwrap();

    // Unknown node: non-zero exit.
    assert!(matches!(
        control_plane.show(&name).await,
        Err(SupervisorError::StatusQueryFailed { .. })
    ));
    assert!(!control_plane.is_running(&name).await);

    fake.set_show_payload(r#"{"name": "bridge-00000002", "status": "UP"}"#)
        .unwrap();
    assert!(control_plane.is_running(&name).await);

    fake.set_show_payload("not json").unwrap();
    assert!(!control_plane.is_running(&name).await);

    assert_eq!(
        fake.invocations().last().map(String::as_str),
        Some("node show bridge-00000002 --output json")
    );
}

#[tokio::test]
async fn test_identity_is_trimmed() {
    let fake = FakeNodeBinary::install().unwrap();
    let control_plane = CliControlPlane::new(fake.path(), "info");

    let identifier = control_plane.create_identity("consumer").await.unwrap();
    assert_eq!(identifier, "Iconsumer0001");
    assert_eq!(fake.invocations(), ["identity create consumer"]);
}

#[tokio::test]
async fn test_registry_over_cli() {
    let fake = FakeNodeBinary::install().unwrap();
    fake.set_list_payload(r#"[{"name": "bridge-0000000a"}]"#)
        .unwrap();
    fake.set_show_payload(
        r#"{
            "name": "bridge-0000000a",
            "status": "running",
            "transports": [{"socket_addr": "0.0.0.0:4000", "mode": "listening"}],
            "inlets": [{"bind_addr": "127.0.0.1:5100", "outlet_addr": "/secure/api"}]
        }"#,
    )
    .unwrap();

    let control_plane: Arc<dyn ControlPlane> = Arc::new(CliControlPlane::new(fake.path(), "info"));
    let registry = ControlPlaneRegistry::new(control_plane);

    let found = registry.find_by_listener("127.0.0.1:4000").await.unwrap();
    assert_eq!(found.name.as_str(), "bridge-0000000a");
    assert_eq!(found.inlet_address, "127.0.0.1:5100");

    assert!(registry.find_by_listener("127.0.0.1:4001").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_missing_binary_fails_spawn() {
    let config = SupervisorConfig::default().with_binary("/nonexistent/sealink/ockam");
    let control_plane = Arc::new(CliControlPlane::from_config(&config));

    let err = NodeLifecycle::new(config, control_plane)
        .create(&spec())
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnFailed { .. }));
}
