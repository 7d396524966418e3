//! Error handling and display for the CLI.

use colored::Colorize;
use sealink_networking::NetworkError;
use sealink_node_config::ConfigError;
use sealink_supervisor::SupervisorError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read spec file {path}: {source}")]
    SpecFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Spec file {path} is not a valid node spec: {source}")]
    SpecParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Supervisor(#[from] SupervisorError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Wrap an address probing or allocation error.
    pub fn from_network(err: NetworkError) -> Self {
        Self::Supervisor(SupervisorError::AllocationFailed(err))
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = err.downcast_ref::<CliError>().and_then(hint) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint(err: &CliError) -> Option<&'static str> {
    match err {
        CliError::SpecParse { .. } => {
            Some("A spec needs at least `inlet.from` and `outlet.bootstrap_server`.")
        }
        CliError::Config(ConfigError::UnknownLayout(_)) => {
            Some("Supported layouts are `object` and `list`.")
        }
        CliError::Supervisor(
            SupervisorError::StatusQueryFailed { .. }
            | SupervisorError::DeleteFailed { .. }
            | SupervisorError::ListFailed { .. },
        ) => Some("Check the node name with `sealctl list`, and SEALINK_NODE_BINARY or --binary."),
        CliError::Supervisor(SupervisorError::AllocationFailed(NetworkError::InvalidAddress(_))) => {
            Some("Addresses are written host:port, e.g. 127.0.0.1:4000.")
        }
        CliError::Supervisor(SupervisorError::AddressInUse { .. }) => {
            Some("Pick another address, or run `sealctl free-address`.")
        }
        _ => None,
    }
}
