//! Local address commands.

use anyhow::Result;
use clap::Args;
use sealink_networking::AddressAllocator;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_output, print_single};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct FreeAddressCommand {
    /// Number of distinct addresses to allocate.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub count: u16,
}

#[derive(Debug, Args)]
pub struct ProbeCommand {
    /// Address to probe (host:port).
    address: String,
}

#[derive(Debug, Serialize, Tabled)]
struct AddressRow {
    #[tabled(rename = "Address")]
    address: String,
}

#[derive(Debug, Serialize, Tabled)]
struct ProbeRow {
    #[tabled(rename = "Address")]
    address: String,

    #[tabled(rename = "Free")]
    free: bool,
}

impl FreeAddressCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let allocator = AddressAllocator::localhost();

        let rows = (0..self.count)
            .map(|_| {
                allocator
                    .find_free()
                    .map(|address| AddressRow {
                        address: address.to_string(),
                    })
                    .map_err(CliError::from_network)
            })
            .collect::<Result<Vec<_>, _>>()?;

        print_output(&rows, ctx.format);
        Ok(())
    }
}

impl ProbeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let lease = sealink_networking::probe(&self.address).map_err(CliError::from_network)?;

        print_single(
            &ProbeRow {
                address: lease.address.to_string(),
                free: lease.was_free,
            },
            ctx.format,
        );
        Ok(())
    }
}
