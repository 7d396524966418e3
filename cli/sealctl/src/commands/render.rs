//! Dry-run configuration rendering.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use sealink_networking::AddressAllocator;
use sealink_node_config::{ConfigBuilder, NodeSpec};

use crate::error::CliError;
use crate::output::format_json;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct RenderCommand {
    /// Node spec file (JSON).
    #[arg(long)]
    spec: PathBuf,

    /// Fill in a free listener address when the spec has none.
    #[arg(long)]
    allocate_listener: bool,
}

impl RenderCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut spec = load_spec(&self.spec)?;

        if self.allocate_listener && spec.listener_address.is_none() {
            let address = AddressAllocator::localhost()
                .find_free()
                .map_err(CliError::from_network)?;
            spec.listener_address = Some(address.to_string());
        }

        // The rendered document carries no name; one is assigned at creation.
        let config = ConfigBuilder::new(ctx.config.layout)
            .build(&spec)
            .map_err(CliError::from)?;

        println!("{}", format_json(&config, "{}"));
        Ok(())
    }
}

/// Read and parse a spec file.
pub fn load_spec(path: &Path) -> Result<NodeSpec, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::SpecFile {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| CliError::SpecParse {
        path: path.display().to_string(),
        source,
    })
}
