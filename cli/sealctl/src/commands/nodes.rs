//! Node commands.

use anyhow::Result;
use clap::Args;
use sealink_id::NodeName;
use sealink_supervisor::NodeDetails;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{display_option, print_output, print_single, print_success};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Node name.
    name: String,
}

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Skip the per-node status query.
    #[arg(long)]
    names_only: bool,
}

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Node name.
    name: String,
}

#[derive(Debug, Args)]
pub struct IdentityCommand {
    /// Identity name.
    name: String,
}

/// One node, as shown by `status` and `list`.
#[derive(Debug, Clone, Serialize, Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Status", display = "display_option")]
    status: Option<String>,

    #[tabled(rename = "Running")]
    running: bool,

    #[tabled(rename = "Listeners")]
    listeners: String,

    #[tabled(rename = "Kafka Inlets")]
    inlets: String,
}

impl NodeRow {
    fn new(name: &NodeName, details: &NodeDetails) -> Self {
        let listeners = details
            .transports
            .iter()
            .filter_map(|t| t.socket_address.as_deref())
            .collect::<Vec<_>>()
            .join(", ");

        let inlets = details
            .inlets
            .iter()
            .filter_map(|inlet| match (&inlet.bind_address, &inlet.outlet_route) {
                (Some(from), Some(to)) => Some(format!("{from} -> {to}")),
                (Some(from), None) => Some(from.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            name: name.to_string(),
            status: details.status.clone(),
            running: details.is_running(),
            listeners,
            inlets,
        }
    }

    fn unknown(name: &NodeName) -> Self {
        Self {
            name: name.to_string(),
            status: None,
            running: false,
            listeners: String::new(),
            inlets: String::new(),
        }
    }
}

fn parse_name(name: &str) -> Result<NodeName, CliError> {
    NodeName::parse(name).map_err(|e| CliError::Supervisor(e.into()))
}

impl StatusCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let name = parse_name(&self.name)?;
        let details = ctx
            .control_plane
            .show(&name)
            .await
            .map_err(CliError::from)?;

        print_single(&NodeRow::new(&name, &details), ctx.format);
        Ok(())
    }
}

impl ListCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let names = ctx.control_plane.list().await.map_err(CliError::from)?;

        let mut rows = Vec::with_capacity(names.len());
        for name in &names {
            let row = if self.names_only {
                NodeRow::unknown(name)
            } else {
                match ctx.control_plane.show(name).await {
                    Ok(details) => NodeRow::new(name, &details),
                    Err(_) => NodeRow::unknown(name),
                }
            };
            rows.push(row);
        }

        print_output(&rows, ctx.format);
        Ok(())
    }
}

impl DeleteCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let name = parse_name(&self.name)?;
        ctx.control_plane
            .delete(&name)
            .await
            .map_err(CliError::from)?;

        print_success(&format!("Deleted node {name}"));
        Ok(())
    }
}

#[derive(Debug, Serialize, Tabled)]
struct IdentityRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Identifier")]
    identifier: String,
}

impl IdentityCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let identifier = ctx
            .control_plane
            .create_identity(&self.name)
            .await
            .map_err(CliError::from)?;

        print_single(
            &IdentityRow {
                name: self.name,
                identifier,
            },
            ctx.format,
        );
        Ok(())
    }
}
