//! sealink Node Daemon
//!
//! Starts one secure overlay node from a spec file and keeps it supervised
//! until Ctrl-C or until the node exits, then deletes it.
//!
//! ## Environment
//!
//! - `SEALINK_NODE_SPEC`: path to the node spec (JSON), required
//! - `SEALINK_NODE_BINARY`, `SEALINK_NODE_LOG_LEVEL`, `SEALINK_NODE_PREFIX`,
//!   `SEALINK_CONFIG_LAYOUT`, `SEALINK_STOP_GRACE_SECS`: see [`SupervisorConfig`]
//! - `RUST_LOG`: log filter, default `info`

use anyhow::{Context, Result};
use sealink_node_config::NodeSpec;
use sealink_supervisor::{ListenerPlan, NodeSupervisor, SupervisorConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting sealink node daemon");

    let config = SupervisorConfig::from_env()?;
    info!(
        binary = %config.binary.display(),
        layout = %config.layout,
        stop_grace_secs = config.stop_grace.as_secs(),
        "Configuration loaded"
    );

    let spec_path =
        std::env::var("SEALINK_NODE_SPEC").context("SEALINK_NODE_SPEC must name a spec file")?;
    let raw = std::fs::read_to_string(&spec_path)
        .with_context(|| format!("failed to read node spec {spec_path}"))?;
    let mut spec: NodeSpec =
        serde_json::from_str(&raw).with_context(|| format!("invalid node spec {spec_path}"))?;

    let supervisor = NodeSupervisor::from_config(config);

    match supervisor
        .plan_listener(spec.listener_address.as_deref())
        .await?
    {
        ListenerPlan::Reuse(existing) => {
            info!(
                node = %existing.name,
                inlet = %existing.inlet_address,
                "A node is already serving this listener, nothing to do"
            );
            return Ok(());
        }
        ListenerPlan::Fresh { listener } => spec.listener_address = Some(listener),
    }

    let node = supervisor.lifecycle().create(&spec).await?;
    info!(
        node = %node.name(),
        inlet = %spec.inlet.from,
        listener = spec.listener_address.as_deref().unwrap_or_default(),
        "Node started"
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        exit = node.wait_for_exit() => {
            match exit {
                Some(exit) => warn!(node = %node.name(), exit = %exit, "Node process exited"),
                None => warn!(node = %node.name(), "Node monitor stopped"),
            }
        }
    }

    if let Err(e) = node.delete().await {
        error!(node = %node.name(), error = %e, "Failed to delete node");
    }

    let state = node.wait_until_terminal().await;
    node.wait_for_exit().await;

    info!(node = %node.name(), state = %state, "Node daemon shutdown complete");
    Ok(())
}
