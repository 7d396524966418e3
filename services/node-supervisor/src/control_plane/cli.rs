//! Control plane backed by the node binary's command line.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use sealink_id::NodeName;
use tokio::process::Command;
use tracing::{debug, info};

use super::status::{parse_node_list, NodeDetails};
use super::ControlPlane;
use crate::{SupervisorConfig, SupervisorError};

/// Environment set on every invocation of the node binary. Disables prompts,
/// colour, upgrade checks and telemetry export.
pub const BASE_ENV: [(&str, &str); 4] = [
    ("NO_INPUT", "true"),
    ("NO_COLOR", "true"),
    ("OCKAM_DISABLE_UPGRADE_CHECK", "true"),
    ("OCKAM_OPENTELEMETRY_EXPORT", "false"),
];

/// Enables node logging on stdout (node processes only).
pub const LOGGING_ENV: &str = "OCKAM_LOGGING";

/// Node log level (node processes only).
pub const LOG_LEVEL_ENV: &str = "OCKAM_LOG_LEVEL";

/// Drives the node binary through its subcommands.
#[derive(Debug, Clone)]
pub struct CliControlPlane {
    binary: PathBuf,
    log_level: String,
}

impl CliControlPlane {
    /// Create a control plane for `binary`, starting nodes at `log_level`.
    pub fn new(binary: impl Into<PathBuf>, log_level: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            log_level: log_level.into(),
        }
    }

    /// Create a control plane from supervisor configuration.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(&config.binary, &config.node_log_level)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.envs(BASE_ENV).stdin(Stdio::null()).kill_on_drop(true);
        command
    }

    /// Run a short-lived subcommand and return its stdout.
    ///
    /// Non-zero exit is an error carrying the trimmed stderr.
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, String> {
        debug!(binary = %self.binary.display(), args = ?args, "Running control plane command");

        let output = self
            .command()
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "`{}` exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            ));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ControlPlane for CliControlPlane {
    fn binary(&self) -> &Path {
        &self.binary
    }

    fn create_command(&self, config: &str) -> Command {
        let mut command = self.command();
        command
            .args(["node", "create", "--node-config", config, "-f"])
            .env(LOGGING_ENV, "true")
            .env(LOG_LEVEL_ENV, &self.log_level);
        command
    }

    async fn show(&self, name: &NodeName) -> Result<NodeDetails, SupervisorError> {
        let stdout = self
            .run(&["node", "show", name.as_str(), "--output", "json"])
            .await
            .map_err(|reason| SupervisorError::StatusQueryFailed {
                name: name.to_string(),
                reason,
            })?;

        NodeDetails::from_json(&stdout).map_err(|e| SupervisorError::StatusQueryFailed {
            name: name.to_string(),
            reason: format!("unreadable status output: {e}"),
        })
    }

    async fn list(&self) -> Result<Vec<NodeName>, SupervisorError> {
        let stdout = self
            .run(&["node", "list", "--output", "json"])
            .await
            .map_err(|reason| SupervisorError::ListFailed { reason })?;

        parse_node_list(&stdout).map_err(|e| SupervisorError::ListFailed {
            reason: format!("unreadable list output: {e}"),
        })
    }

    async fn delete(&self, name: &NodeName) -> Result<(), SupervisorError> {
        self.run(&["node", "delete", name.as_str(), "--force", "--yes"])
            .await
            .map_err(|reason| SupervisorError::DeleteFailed {
                name: name.to_string(),
                reason,
            })?;

        info!(node = %name, "Node deleted via control plane");
        Ok(())
    }

    async fn create_identity(&self, name: &str) -> Result<String, SupervisorError> {
        let stdout = self
            .run(&["identity", "create", name])
            .await
            .map_err(|reason| SupervisorError::IdentityFailed {
                name: name.to_string(),
                reason,
            })?;

        let identifier = String::from_utf8_lossy(&stdout).trim().to_string();
        if identifier.is_empty() {
            return Err(SupervisorError::IdentityFailed {
                name: name.to_string(),
                reason: "empty identifier".to_string(),
            });
        }

        Ok(identifier)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn env_of(command: &Command, key: &str) -> Option<String> {
        command
            .as_std()
            .get_envs()
            .find(|(k, _)| *k == OsStr::new(key))
            .and_then(|(_, v)| v)
            .map(|v| v.to_string_lossy().into_owned())
    }

    #[test]
    fn test_create_command_arguments() {
        let control_plane = CliControlPlane::new("/usr/local/bin/ockam", "debug");
        let command = control_plane.create_command(r#"{"name":"bridge-00000001"}"#);

        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "node",
                "create",
                "--node-config",
                r#"{"name":"bridge-00000001"}"#,
                "-f"
            ]
        );
        assert_eq!(command.as_std().get_program(), "/usr/local/bin/ockam");
    }

    #[test]
    fn test_create_command_environment() {
        let control_plane = CliControlPlane::new("ockam", "warn");
        let command = control_plane.create_command("{}");

        for (key, value) in BASE_ENV {
            assert_eq!(env_of(&command, key).as_deref(), Some(value), "{key}");
        }
        assert_eq!(env_of(&command, LOGGING_ENV).as_deref(), Some("true"));
        assert_eq!(env_of(&command, LOG_LEVEL_ENV).as_deref(), Some("warn"));
    }

    #[test]
    fn test_short_commands_skip_node_logging() {
        let command = CliControlPlane::new("ockam", "info").command();
        assert_eq!(env_of(&command, "NO_INPUT").as_deref(), Some("true"));
        assert!(env_of(&command, LOGGING_ENV).is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let control_plane = CliControlPlane::new("/nonexistent/sealink/ockam", "info");
        let name = NodeName::parse("bridge-00000001").unwrap();

        assert!(matches!(
            control_plane.delete(&name).await,
            Err(SupervisorError::DeleteFailed { .. })
        ));
        assert!(matches!(
            control_plane.show(&name).await,
            Err(SupervisorError::StatusQueryFailed { .. })
        ));
        assert!(!control_plane.is_running(&name).await);
    }
}
