//! # sealink-id
//!
//! Names for secure overlay nodes managed by sealink.
//!
//! ## Design Principles
//!
//! - Names are system-generated for nodes the supervisor creates
//! - Generated names carry a prefix so they never collide with nodes
//!   created by hand or by unrelated tooling on the same host
//! - Names of foreign nodes (found when reusing an existing node) are still
//!   representable, so parsing is lenient about the shape
//!
//! ## Name Format
//!
//! Generated names use `{prefix}-{suffix}` where the suffix is a random
//! 32-bit value rendered as 8 lowercase hex digits.
//!
//! Examples:
//! - `bridge-0a1b2c3d`
//! - `kafka-input-ffee0012`

mod error;
mod name;

pub use error::NameError;
pub use name::NodeName;
