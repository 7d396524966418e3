//! sealink Node Supervisor Library
//!
//! Runs secure overlay nodes next to Kafka clients. Each node is an external
//! binary started in the foreground; the supervisor renders its
//! configuration, spawns and monitors the process, forwards its logs, and
//! makes sure it is deleted exactly once when it is no longer wanted.
//!
//! ## Architecture
//!
//! ```text
//! NodeSupervisor
//! ├── NodeLifecycle           (create / adopt / render)
//! │   ├── ConfigBuilder       (spec -> node configuration)
//! │   └── ProcessSupervisor   (one monitor task per node process)
//! │       └── TeardownCoordinator (exactly-once delete)
//! ├── AddressAllocator        (free local addresses)
//! └── NodeRepository          (reuse of running nodes)
//! ```
//!
//! ## Modules
//!
//! - `control_plane`: Node binary interface, CLI and mock implementations
//! - `lifecycle`: Node creation and the [`Node`] handle
//! - `process`: Process spawning and monitoring
//! - `teardown`: Delete coordination and node states
//! - `registry`: Discovery of reusable nodes
//! - `bridge`: Kafka consumer/producer bridges over a node

pub mod bridge;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod lifecycle;
pub mod logs;
pub mod process;
pub mod registry;
pub mod supervisor;
pub mod teardown;

// Re-export commonly used types
pub use config::SupervisorConfig;
pub use control_plane::{CliControlPlane, ControlPlane, MockControlPlane, NodeDetails};
pub use error::SupervisorError;
pub use lifecycle::{Node, NodeLifecycle, Ownership};
pub use registry::{ListenerPlan, ReusableNode};
pub use supervisor::NodeSupervisor;
pub use teardown::NodeState;
