//! Node specifications and configuration rendering.
//!
//! A [`NodeSpec`] is the immutable intent for one secure overlay node: who it
//! is, where it listens, and the single Kafka inlet/outlet pair it provides.
//! [`ConfigBuilder`] turns a spec into a typed [`NodeConfig`] document that is
//! serialized to JSON and handed to the control-plane binary as
//! `--node-config`.
//!
//! The builder never assigns the node name. The supervisor injects it with
//! [`NodeConfig::with_name`] when it actually creates the node, so the same
//! spec can be rendered for inspection without committing to a name.
//!
//! Access predicates are opaque: they are embedded verbatim and only quoted by
//! the JSON serializer.

mod error;
mod render;
mod spec;

pub use error::ConfigError;
pub use render::{ConfigBuilder, ConfigLayout, InletConfig, NodeConfig, OutletConfig, Section};
pub use spec::{InletDescriptor, NodeSpec, OutletDescriptor, Predicate, DEFAULT_INLET_ROUTE};
