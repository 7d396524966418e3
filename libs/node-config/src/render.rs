//! Rendered node configuration.
//!
//! These structures map to the configuration document accepted by the
//! control plane's `node create --node-config` flag. Keys are kebab-case and
//! optional keys are left out entirely when unset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::spec::{InletDescriptor, NodeSpec, OutletDescriptor, Predicate};
use crate::ConfigError;

/// Shape of the `kafka-inlet` and `kafka-outlet` sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLayout {
    /// A single object per section.
    #[default]
    Object,
    /// A single-element list per section (older control planes).
    List,
}

impl fmt::Display for ConfigLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::List => f.write_str("list"),
        }
    }
}

impl FromStr for ConfigLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "object" => Ok(Self::Object),
            "list" => Ok(Self::List),
            other => Err(ConfigError::UnknownLayout(other.to_string())),
        }
    }
}

/// A configuration section rendered either as an object or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section<T> {
    One(T),
    List(Vec<T>),
}

impl<T> Section<T> {
    fn render(value: T, layout: ConfigLayout) -> Self {
        match layout {
            ConfigLayout::Object => Self::One(value),
            ConfigLayout::List => Self::List(vec![value]),
        }
    }

    /// Returns the first (usually only) entry.
    pub fn first(&self) -> Option<&T> {
        match self {
            Self::One(value) => Some(value),
            Self::List(values) => values.first(),
        }
    }

    /// Returns the layout this section was rendered with.
    pub fn layout(&self) -> ConfigLayout {
        match self {
            Self::One(_) => ConfigLayout::Object,
            Self::List(_) => ConfigLayout::List,
        }
    }
}

/// Rendered `kafka-inlet` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InletConfig {
    pub from: String,
    pub to: String,
    pub avoid_publishing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_consumer: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_producer: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Predicate>,
}

impl From<&InletDescriptor> for InletConfig {
    fn from(inlet: &InletDescriptor) -> Self {
        Self {
            from: inlet.from.clone(),
            to: inlet.to.clone(),
            avoid_publishing: inlet.avoid_publishing,
            consumer: inlet.consumer.clone(),
            allow_consumer: inlet.allow_consumer.clone(),
            allow_producer: inlet.allow_producer.clone(),
            allow: inlet.allow.clone(),
        }
    }
}

/// Rendered `kafka-outlet` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutletConfig {
    pub bootstrap_server: String,
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Predicate>,
}

impl From<&OutletDescriptor> for OutletConfig {
    fn from(outlet: &OutletDescriptor) -> Self {
        Self {
            bootstrap_server: outlet.bootstrap_server.clone(),
            tls: outlet.tls,
            allow: outlet.allow.clone(),
        }
    }
}

/// Full node configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_listener_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
    pub kafka_inlet: Section<InletConfig>,
    pub kafka_outlet: Section<OutletConfig>,
}

impl NodeConfig {
    /// Set the node name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Serialize to the compact JSON passed on the command line.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON for display.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a previously rendered configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The inlet entry.
    pub fn inlet(&self) -> Option<&InletConfig> {
        self.kafka_inlet.first()
    }

    /// The outlet entry.
    pub fn outlet(&self) -> Option<&OutletConfig> {
        self.kafka_outlet.first()
    }
}

/// Renders node specs into configuration documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigBuilder {
    layout: ConfigLayout,
}

impl ConfigBuilder {
    /// Create a builder using the given section layout.
    pub fn new(layout: ConfigLayout) -> Self {
        Self { layout }
    }

    /// Returns the section layout.
    pub fn layout(&self) -> ConfigLayout {
        self.layout
    }

    /// Validate and render a spec. The result carries no name.
    pub fn build(&self, spec: &NodeSpec) -> Result<NodeConfig, ConfigError> {
        spec.validate()?;

        Ok(NodeConfig {
            name: None,
            identity: spec.identity.clone(),
            tcp_listener_address: spec.listener_address.clone(),
            ticket: spec.ticket.clone(),
            relay: spec.relay.clone(),
            kafka_inlet: Section::render(InletConfig::from(&spec.inlet), self.layout),
            kafka_outlet: Section::render(OutletConfig::from(&spec.outlet), self.layout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_INLET_ROUTE;

    fn spec() -> NodeSpec {
        NodeSpec::new(
            InletDescriptor::new("127.0.0.1:5000", DEFAULT_INLET_ROUTE).avoid_publishing(true),
            OutletDescriptor::new("broker:9092").tls(true),
        )
    }

    #[test]
    fn test_object_layout() {
        let config = ConfigBuilder::default().build(&spec()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

        assert_eq!(value["kafka-inlet"]["from"], "127.0.0.1:5000");
        assert_eq!(value["kafka-inlet"]["to"], "/secure/api");
        assert_eq!(value["kafka-inlet"]["avoid-publishing"], true);
        assert_eq!(value["kafka-outlet"]["bootstrap-server"], "broker:9092");
        assert_eq!(value["kafka-outlet"]["tls"], true);
    }

    #[test]
    fn test_list_layout() {
        let config = ConfigBuilder::new(ConfigLayout::List).build(&spec()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

        let inlets = value["kafka-inlet"].as_array().unwrap();
        assert_eq!(inlets.len(), 1);
        assert_eq!(inlets[0]["from"], "127.0.0.1:5000");
        assert_eq!(value["kafka-outlet"].as_array().unwrap().len(), 1);

        let parsed = NodeConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed.kafka_inlet.layout(), ConfigLayout::List);
        assert_eq!(parsed.inlet().unwrap().from, "127.0.0.1:5000");
    }

    #[test]
    fn test_unset_keys_are_omitted() {
        let json = ConfigBuilder::default().build(&spec()).unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();

        for key in ["name", "identity", "tcp-listener-address", "ticket", "relay"] {
            assert!(!object.contains_key(key), "unexpected key {key}");
        }
        assert!(!value["kafka-inlet"].as_object().unwrap().contains_key("allow"));
    }

    #[test]
    fn test_build_is_pure() {
        let builder = ConfigBuilder::default();
        let a = builder.build(&spec()).unwrap().to_json().unwrap();
        let b = builder.build(&spec()).unwrap().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_name() {
        let config = ConfigBuilder::default()
            .build(&spec())
            .unwrap()
            .with_name("bridge-0000002a");
        let json = config.to_json().unwrap();
        assert!(json.starts_with(r#"{"name":"bridge-0000002a""#));
    }

    #[test]
    fn test_build_rejects_invalid_spec() {
        let bad = spec().with_listener("nope");
        assert!(matches!(
            ConfigBuilder::default().build(&bad),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("object".parse::<ConfigLayout>().unwrap(), ConfigLayout::Object);
        assert_eq!(" LIST ".parse::<ConfigLayout>().unwrap(), ConfigLayout::List);
        assert!("yaml".parse::<ConfigLayout>().is_err());
    }
}
