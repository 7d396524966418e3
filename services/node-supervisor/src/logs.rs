//! Forwarding of node process output into the host's tracing pipeline.
//!
//! Node processes print lines shaped `<timestamp> <LEVEL> <message>`. Lines
//! with a recognised level are re-emitted under [`NODE_LOG_TARGET`]; anything
//! else is dropped.

use std::fmt;

use sealink_id::NodeName;
use tracing::{debug, error, info, warn};

/// Tracing target for forwarded node output.
pub const NODE_LOG_TARGET: &str = "sealink::node";

/// Level of a node log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse the level token. Case-sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARN" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// One parsed line of node output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    /// Parse a line. Returns `None` for fewer than three whitespace-separated
    /// fields or an unknown level.
    pub fn parse(line: &str) -> Option<Self> {
        let (timestamp, rest) = split_field(line)?;
        let (level, message) = split_field(rest)?;

        Some(Self {
            timestamp: timestamp.to_string(),
            level: LogLevel::parse(level)?,
            message: message.to_string(),
        })
    }

    /// Emit this record at its level. The timestamp is not forwarded.
    pub fn forward(&self, node: &NodeName) {
        let message = self.message.as_str();
        match self.level {
            LogLevel::Debug => debug!(target: NODE_LOG_TARGET, node = %node, "{message}"),
            LogLevel::Info => info!(target: NODE_LOG_TARGET, node = %node, "{message}"),
            LogLevel::Warn => warn!(target: NODE_LOG_TARGET, node = %node, "{message}"),
            LogLevel::Error => error!(target: NODE_LOG_TARGET, node = %node, "{message}"),
        }
    }
}

/// Split off the first field at the first whitespace run. The remainder may
/// be empty but the separator must exist.
fn split_field(s: &str) -> Option<(&str, &str)> {
    let (head, tail) = s.split_once(char::is_whitespace)?;
    Some((head, tail.trim_start()))
}

/// Parse and forward one line; unrecognised lines are dropped.
pub fn forward_line(node: &NodeName, line: &str) {
    if let Some(record) = LogRecord::parse(line) {
        record.forward(node);
    }
}
