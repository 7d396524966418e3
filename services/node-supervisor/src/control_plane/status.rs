//! Parsing of `node show` and `node list` output.
//!
//! Output shapes vary between control-plane versions, so parsing is tolerant:
//! unknown fields are ignored and the fields we care about accept several
//! spellings.

use std::net::SocketAddr;

use sealink_id::NodeName;
use serde::Deserialize;

/// Status strings that mean the node is up. Compared case-insensitively.
pub const RUNNING_STATUSES: [&str; 2] = ["running", "up"];

/// Returns true if a reported status string means running.
pub fn status_is_running(status: &str) -> bool {
    let status = status.trim();
    RUNNING_STATUSES
        .iter()
        .any(|running| status.eq_ignore_ascii_case(running))
}

/// Node details as reported by `node show --output json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeDetails {
    #[serde(default, alias = "node_name")]
    pub name: Option<String>,

    #[serde(default, alias = "node_status")]
    pub status: Option<String>,

    #[serde(default, alias = "tcp_listeners", alias = "tcp-listeners")]
    pub transports: Vec<TransportBinding>,

    #[serde(
        default,
        alias = "kafka_inlets",
        alias = "kafka-inlets",
        alias = "tcp_inlets",
        alias = "tcp-inlets"
    )]
    pub inlets: Vec<InletBinding>,
}

/// A transport the node is listening on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransportBinding {
    #[serde(
        default,
        alias = "socket_addr",
        alias = "socket",
        alias = "address",
        alias = "addr"
    )]
    pub socket_address: Option<String>,

    #[serde(default)]
    pub mode: Option<String>,
}

/// An inlet the node exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InletBinding {
    #[serde(default, alias = "bind_addr", alias = "from", alias = "listen_address")]
    pub bind_address: Option<String>,

    #[serde(default, alias = "outlet_addr", alias = "to", alias = "route")]
    pub outlet_route: Option<String>,
}

impl NodeDetails {
    /// Parse `node show` output.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Returns true if the reported status means running.
    pub fn is_running(&self) -> bool {
        self.status.as_deref().is_some_and(status_is_running)
    }

    /// Returns true if any transport listens on `address`.
    pub fn listens_on(&self, address: &str) -> bool {
        self.transports.iter().any(|t| {
            !t.mode
                .as_deref()
                .is_some_and(|mode| mode.eq_ignore_ascii_case("outgoing"))
                && t.socket_address
                    .as_deref()
                    .is_some_and(|socket| same_socket(socket, address))
        })
    }

    /// The first inlet whose route contains `marker`.
    pub fn inlet_routed_to(&self, marker: &str) -> Option<&InletBinding> {
        self.inlets.iter().find(|inlet| {
            inlet.bind_address.is_some()
                && inlet
                    .outlet_route
                    .as_deref()
                    .is_some_and(|route| route.contains(marker))
        })
    }
}

/// Compare two `host:port` strings as socket addresses.
///
/// An unspecified IP (`0.0.0.0`, `::`) on either side matches any IP on the
/// same port. Strings that are not socket addresses compare verbatim.
pub fn same_socket(a: &str, b: &str) -> bool {
    match (a.trim().parse::<SocketAddr>(), b.trim().parse::<SocketAddr>()) {
        (Ok(a), Ok(b)) => {
            a.port() == b.port()
                && (a.ip() == b.ip() || a.ip().is_unspecified() || b.ip().is_unspecified())
        }
        _ => a.trim() == b.trim(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListEntry {
    Name(String),
    Node {
        #[serde(alias = "node_name")]
        name: String,
    },
}

/// Parse `node list --output json`. Entries that are not valid node names
/// are skipped.
pub fn parse_node_list(bytes: &[u8]) -> Result<Vec<NodeName>, serde_json::Error> {
    let entries: Vec<ListEntry> = serde_json::from_slice(bytes)?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let name = match entry {
                ListEntry::Name(name) | ListEntry::Node { name } => name,
            };
            NodeName::parse(&name).ok()
        })
        .collect())
}
