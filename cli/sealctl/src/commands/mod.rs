//! CLI commands.

mod address;
mod nodes;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sealink_node_config::ConfigLayout;
use sealink_supervisor::{CliControlPlane, ControlPlane, SupervisorConfig};

use crate::error::CliError;
use crate::output::OutputFormat;

/// sealink CLI - Inspect and manage secure overlay nodes.
#[derive(Debug, Parser)]
#[command(name = "sealctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Node binary to drive.
    #[arg(long, global = true, env = "SEALINK_NODE_BINARY")]
    binary: Option<PathBuf>,

    /// Section layout for rendered configuration (object or list).
    #[arg(long, global = true, env = "SEALINK_CONFIG_LAYOUT")]
    layout: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render the node configuration for a spec file without creating a node.
    Render(render::RenderCommand),

    /// Allocate free local addresses.
    FreeAddress(address::FreeAddressCommand),

    /// Check whether a local address is free.
    Probe(address::ProbeCommand),

    /// Show a node's status.
    Status(nodes::StatusCommand),

    /// List nodes known to the control plane.
    List(nodes::ListCommand),

    /// Delete a node.
    Delete(nodes::DeleteCommand),

    /// Create an identity, or print the identifier of an existing one.
    Identity(nodes::IdentityCommand),
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let path = std::env::var("PATH").ok();
        let config = self.apply_overrides(SupervisorConfig::from_env()?, path.as_deref())?;

        let ctx = CommandContext {
            control_plane: Arc::new(CliControlPlane::from_config(&config)),
            config,
            format: self.format,
        };

        match self.command {
            Commands::Render(cmd) => cmd.run(ctx).await,
            Commands::FreeAddress(cmd) => cmd.run(ctx).await,
            Commands::Probe(cmd) => cmd.run(ctx).await,
            Commands::Status(cmd) => cmd.run(ctx).await,
            Commands::List(cmd) => cmd.run(ctx).await,
            Commands::Delete(cmd) => cmd.run(ctx).await,
            Commands::Identity(cmd) => cmd.run(ctx).await,
        }
    }

    /// Apply the global flags on top of the environment configuration.
    /// A `--binary` bare name is looked up on `path` like the environment one.
    fn apply_overrides(
        &self,
        mut config: SupervisorConfig,
        path: Option<&str>,
    ) -> Result<SupervisorConfig, CliError> {
        if let Some(binary) = &self.binary {
            config = config.with_resolved_binary(binary, path);
        }
        if let Some(layout) = &self.layout {
            config.layout = layout.parse::<ConfigLayout>()?;
        }
        Ok(config)
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: SupervisorConfig,
    pub control_plane: Arc<dyn ControlPlane>,
    pub format: OutputFormat,
}
