//! Node specification types.
//!
//! These structures describe what a node should do. They map one-to-one onto
//! the rendered configuration but keep optional parts optional, so a spec can
//! be loaded from a file and completed by the supervisor (listener address).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Route the Kafka inlet forwards to on the remote side.
pub const DEFAULT_INLET_ROUTE: &str = "/secure/api";

/// Opaque access-control expression evaluated by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(String);

impl Predicate {
    /// Wraps an expression verbatim.
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Predicate allowing exactly one identity: `(= subject.identifier "<id>")`.
    ///
    /// Quotes and backslashes inside `identifier` are escaped so the
    /// expression stays a single string literal.
    pub fn identifier_equals(identifier: &str) -> Self {
        let mut escaped = String::with_capacity(identifier.len());
        for c in identifier.chars() {
            if c == '"' || c == '\\' {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        Self(format!("(= subject.identifier \"{escaped}\")"))
    }

    /// Returns the expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local inlet accepting Kafka client connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InletDescriptor {
    /// Local bind address (`host:port`).
    pub from: String,
    /// Logical destination route.
    #[serde(default = "default_route")]
    pub to: String,
    /// Do not publish this inlet to the project.
    #[serde(default)]
    pub avoid_publishing: bool,
    /// Route to the consumer side (producers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    /// Who may consume through this inlet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_consumer: Option<Predicate>,
    /// Who may produce through this inlet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_producer: Option<Predicate>,
    /// Who may connect to this inlet at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Predicate>,
}

fn default_route() -> String {
    DEFAULT_INLET_ROUTE.to_string()
}

impl InletDescriptor {
    /// Create an inlet bound to `from` forwarding to `to`.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            avoid_publishing: false,
            consumer: None,
            allow_consumer: None,
            allow_producer: None,
            allow: None,
        }
    }

    /// Set the avoid-publishing flag.
    pub fn avoid_publishing(mut self, avoid: bool) -> Self {
        self.avoid_publishing = avoid;
        self
    }

    /// Set the consumer route.
    pub fn with_consumer(mut self, route: impl Into<String>) -> Self {
        self.consumer = Some(route.into());
        self
    }

    /// Set the `allow` predicate.
    pub fn allow(mut self, predicate: Predicate) -> Self {
        self.allow = Some(predicate);
        self
    }

    /// Set the `allow-consumer` predicate.
    pub fn allow_consumer(mut self, predicate: Predicate) -> Self {
        self.allow_consumer = Some(predicate);
        self
    }

    /// Set the `allow-producer` predicate.
    pub fn allow_producer(mut self, predicate: Predicate) -> Self {
        self.allow_producer = Some(predicate);
        self
    }
}

/// Egress side forwarding to the real Kafka bootstrap server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletDescriptor {
    /// Upstream bootstrap server (`host:port`).
    pub bootstrap_server: String,
    /// Connect to the upstream over TLS.
    #[serde(default)]
    pub tls: bool,
    /// Who may reach the upstream through this outlet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Predicate>,
}

impl OutletDescriptor {
    /// Create an outlet to the given bootstrap server.
    pub fn new(bootstrap_server: impl Into<String>) -> Self {
        Self {
            bootstrap_server: bootstrap_server.into(),
            tls: false,
            allow: None,
        }
    }

    /// Enable or disable TLS to the upstream.
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set the `allow` predicate.
    pub fn allow(mut self, predicate: Predicate) -> Self {
        self.allow = Some(predicate);
        self
    }
}

/// Immutable intent for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Identity the node runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Control-plane listener address; chosen by the supervisor when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_address: Option<String>,
    /// Enrollment ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Relay target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
    /// The Kafka inlet.
    pub inlet: InletDescriptor,
    /// The Kafka outlet.
    pub outlet: OutletDescriptor,
}

impl NodeSpec {
    /// Create a spec for the given inlet and outlet.
    pub fn new(inlet: InletDescriptor, outlet: OutletDescriptor) -> Self {
        Self {
            identity: None,
            listener_address: None,
            ticket: None,
            relay: None,
            inlet,
            outlet,
        }
    }

    /// Set the identity name.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set the listener address.
    pub fn with_listener(mut self, address: impl Into<String>) -> Self {
        self.listener_address = Some(address.into());
        self
    }

    /// Set the enrollment ticket.
    pub fn with_ticket(mut self, ticket: impl Into<String>) -> Self {
        self.ticket = Some(ticket.into());
        self
    }

    /// Set the relay target.
    pub fn with_relay(mut self, relay: impl Into<String>) -> Self {
        self.relay = Some(relay.into());
        self
    }

    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inlet.from.trim().is_empty() {
            return Err(ConfigError::invalid("kafka-inlet.from", "cannot be empty"));
        }
        validate_host_port("kafka-inlet.from", &self.inlet.from)?;

        if self.inlet.to.trim().is_empty() {
            return Err(ConfigError::invalid("kafka-inlet.to", "cannot be empty"));
        }

        if self.outlet.bootstrap_server.trim().is_empty() {
            return Err(ConfigError::invalid(
                "kafka-outlet.bootstrap-server",
                "cannot be empty",
            ));
        }

        if let Some(listener) = &self.listener_address {
            validate_host_port("tcp-listener-address", listener)?;
        }

        for (field, value) in [("identity", &self.identity), ("ticket", &self.ticket)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::invalid(field, "cannot be empty when set"));
            }
        }

        Ok(())
    }
}

/// Check that `value` looks like `host:port`.
fn validate_host_port(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let Some((host, port)) = value.rsplit_once(':') else {
        return Err(ConfigError::invalid(
            field,
            format!("'{value}' is not in host:port form"),
        ));
    };

    if host.is_empty() {
        return Err(ConfigError::invalid(field, format!("'{value}' has no host")));
    }

    port.parse::<u16>()
        .map_err(|_| ConfigError::invalid(field, format!("'{value}' has an invalid port")))?;

    Ok(())
}
