//! Configuration for the node supervisor.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use sealink_node_config::ConfigLayout;

/// Default control-plane binary, looked up on `PATH`.
pub const DEFAULT_BINARY: &str = "ockam";

/// Default node name prefix.
pub const DEFAULT_NAME_PREFIX: &str = "bridge";

/// Default log level handed to node processes.
pub const DEFAULT_NODE_LOG_LEVEL: &str = "info";

/// Default grace period between a stop request and a forced kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Node supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Control-plane binary. Resolved against `PATH` when given as a bare name.
    pub binary: PathBuf,

    /// Log level requested from node processes (debug, info, warn, error).
    pub node_log_level: String,

    /// Prefix for generated node names.
    pub name_prefix: String,

    /// Section layout used when rendering node configuration.
    pub layout: ConfigLayout,

    /// How long a node process gets to exit after a stop request.
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let binary = lookup("SEALINK_NODE_BINARY")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BINARY.to_string());
        let binary = resolve_binary(Path::new(&binary), lookup("PATH").as_deref());

        let node_log_level = lookup("SEALINK_NODE_LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_NODE_LOG_LEVEL.to_string());

        let name_prefix =
            lookup("SEALINK_NODE_PREFIX").unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string());

        let layout = match lookup("SEALINK_CONFIG_LAYOUT") {
            Some(value) => value
                .parse()
                .with_context(|| format!("invalid SEALINK_CONFIG_LAYOUT: {value}"))?,
            None => ConfigLayout::default(),
        };

        let stop_grace = match lookup("SEALINK_STOP_GRACE_SECS") {
            Some(value) => Duration::from_secs(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid SEALINK_STOP_GRACE_SECS: {value}"))?,
            ),
            None => DEFAULT_STOP_GRACE,
        };

        Ok(Self {
            binary,
            node_log_level,
            name_prefix,
            layout,
            stop_grace,
        })
    }

    /// Use a specific binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Use `binary`, resolving a bare name against the `path` search list
    /// the same way `from_vars` does.
    pub fn with_resolved_binary(mut self, binary: impl AsRef<Path>, path: Option<&str>) -> Self {
        self.binary = resolve_binary(binary.as_ref(), path);
        self
    }

    /// Use a specific stop grace period.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            node_log_level: DEFAULT_NODE_LOG_LEVEL.to_string(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            layout: ConfigLayout::default(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

/// Resolve a bare binary name against `path`. Anything containing a path
/// separator, or a name that is not found, is returned unchanged so the spawn
/// error names what was asked for.
fn resolve_binary(binary: &Path, path: Option<&str>) -> PathBuf {
    if binary.components().count() != 1 {
        return binary.to_path_buf();
    }

    path.into_iter()
        .flat_map(|p| env::split_paths(OsStr::new(p)).collect::<Vec<_>>())
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| binary.to_path_buf())
}
