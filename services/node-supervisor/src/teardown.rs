//! Node teardown coordination.
//!
//! Two paths can tear a node down: an explicit delete from the owner, and the
//! process monitor noticing the node process is gone. Both may run at the same
//! time. The coordinator owns the node's state and makes sure exactly one of
//! them issues the external delete.
//!
//! ```text
//!   Created ──► Starting ──► Running ──► Deleting ──► Deleted
//!                  │            ▲
//!                  └──► Failed  └── (process exit or explicit delete)
//! ```

use std::fmt;
use std::sync::Arc;

use sealink_id::NodeName;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::process::ProcessExit;
use crate::SupervisorError;

/// Lifecycle state of a supervised node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Name assigned and config built, process not yet spawned.
    Created,
    /// Process spawn in progress.
    Starting,
    /// Process spawned and monitored.
    Running,
    /// External delete in flight.
    Deleting,
    /// Delete issued. Terminal.
    Deleted,
    /// Spawn failed. Terminal.
    Failed,
}

impl NodeState {
    /// Returns true if the node is gone or going.
    pub fn is_torn_down(&self) -> bool {
        matches!(self, Self::Deleting | Self::Deleted | Self::Failed)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted | Self::Failed)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Failed => "failed",
        })
    }
}

/// What asked for the teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownTrigger {
    /// The owner called delete.
    Explicit,
    /// The node process exited.
    ProcessExit,
}

impl fmt::Display for TeardownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::ProcessExit => "process_exit",
        })
    }
}

/// Ensures each node is deleted exactly once.
pub struct TeardownCoordinator {
    name: NodeName,
    control_plane: Arc<dyn ControlPlane>,
    state: watch::Sender<NodeState>,
}

impl TeardownCoordinator {
    /// Create a coordinator for a node in the `Created` state.
    pub fn new(name: NodeName, control_plane: Arc<dyn ControlPlane>) -> Self {
        let (state, _) = watch::channel(NodeState::Created);
        Self {
            name,
            control_plane,
            state,
        }
    }

    /// The node this coordinator tears down.
    pub fn name(&self) -> &NodeName {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> NodeState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<NodeState> {
        self.state.subscribe()
    }

    /// Move from `from` to `to`. Returns false if the node was not in `from`.
    fn transition(&self, from: NodeState, to: NodeState) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });

        if moved {
            debug!(node = %self.name, from = %from, to = %to, "Node state transition");
        }
        moved
    }

    pub(crate) fn mark_starting(&self) -> bool {
        self.transition(NodeState::Created, NodeState::Starting)
    }

    pub(crate) fn mark_running(&self) -> bool {
        self.transition(NodeState::Starting, NodeState::Running)
    }

    pub(crate) fn mark_failed(&self) -> bool {
        self.transition(NodeState::Starting, NodeState::Failed)
    }

    /// Delete the node unless another path already has.
    ///
    /// The first caller claims the `Deleting` state and issues the external
    /// delete; later callers return immediately. The node ends up `Deleted`
    /// whether or not the delete succeeded, since a failed delete is not
    /// retried.
    pub async fn delete(&self, trigger: TeardownTrigger) -> Result<(), SupervisorError> {
        let mut previous = NodeState::Created;
        let claimed = self.state.send_if_modified(|state| {
            previous = *state;
            match state {
                NodeState::Created | NodeState::Starting | NodeState::Running => {
                    *state = NodeState::Deleting;
                    true
                }
                NodeState::Deleting | NodeState::Deleted | NodeState::Failed => false,
            }
        });

        if !claimed {
            debug!(
                node = %self.name,
                state = %previous,
                trigger = %trigger,
                "Node already torn down, skipping delete"
            );
            return Ok(());
        }

        info!(node = %self.name, trigger = %trigger, "Deleting node");
        let result = self.control_plane.delete(&self.name).await;
        self.state.send_replace(NodeState::Deleted);

        match result {
            Ok(()) => {
                info!(node = %self.name, trigger = %trigger, "Node deleted");
                Ok(())
            }
            Err(e) => {
                warn!(node = %self.name, trigger = %trigger, error = %e, "Node delete failed");
                Err(e)
            }
        }
    }

    /// Called by the process monitor once the node process has exited.
    pub async fn on_process_exit(&self, exit: &ProcessExit) {
        if let Some(err) = self.unexpected_exit(exit) {
            warn!(node = %self.name, error = %err, "Tearing down node after unexpected exit");
        }

        // Failures are already logged by delete.
        let _ = self.delete(TeardownTrigger::ProcessExit).await;
    }

    /// The error to report for `exit`, unless the exit was asked for or the
    /// node is already being torn down.
    fn unexpected_exit(&self, exit: &ProcessExit) -> Option<SupervisorError> {
        if exit.stop_requested || self.state().is_torn_down() {
            return None;
        }
        Some(SupervisorError::ProcessExitedUnexpectedly {
            name: self.name.to_string(),
            exit: exit.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::control_plane::MockControlPlane;

    fn coordinator(control_plane: Arc<MockControlPlane>) -> Arc<TeardownCoordinator> {
        Arc::new(TeardownCoordinator::new(
            NodeName::parse("bridge-0000beef").unwrap(),
            control_plane,
        ))
    }

    #[tokio::test]
    async fn test_delete_once() {
        let control_plane = Arc::new(MockControlPlane::new());
        let teardown = coordinator(control_plane.clone());
        assert!(teardown.mark_starting());
        assert!(teardown.mark_running());

        teardown.delete(TeardownTrigger::Explicit).await.unwrap();
        teardown.delete(TeardownTrigger::Explicit).await.unwrap();

        assert_eq!(teardown.state(), NodeState::Deleted);
        assert_eq!(control_plane.total_deletes(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_delete_paths() {
        let control_plane =
            Arc::new(MockControlPlane::new().with_delete_delay(Duration::from_millis(50)));
        let teardown = coordinator(control_plane.clone());
        teardown.mark_starting();
        teardown.mark_running();

        let exit = ProcessExit {
            code: Some(3),
            success: false,
            error: None,
            stop_requested: false,
        };

        let explicit = {
            let teardown = teardown.clone();
            tokio::spawn(async move { teardown.delete(TeardownTrigger::Explicit).await })
        };
        let crashed = {
            let teardown = teardown.clone();
            tokio::spawn(async move { teardown.on_process_exit(&exit).await })
        };

        explicit.await.unwrap().unwrap();
        crashed.await.unwrap();

        assert_eq!(teardown.state(), NodeState::Deleted);
        assert_eq!(control_plane.total_deletes(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_still_terminal() {
        let control_plane = Arc::new(MockControlPlane::new());
        control_plane.set_fail_deletes(true);
        let teardown = coordinator(control_plane.clone());
        teardown.mark_starting();
        teardown.mark_running();

        let result = teardown.delete(TeardownTrigger::Explicit).await;
        assert!(matches!(result, Err(SupervisorError::DeleteFailed { .. })));
        assert_eq!(teardown.state(), NodeState::Deleted);

        teardown.delete(TeardownTrigger::Explicit).await.unwrap();
        assert_eq!(control_plane.total_deletes(), 1);
    }

    #[tokio::test]
    async fn test_failed_spawn_is_never_deleted() {
        let control_plane = Arc::new(MockControlPlane::new());
        let teardown = coordinator(control_plane.clone());
        teardown.mark_starting();
        assert!(teardown.mark_failed());

        teardown.delete(TeardownTrigger::Explicit).await.unwrap();
        assert_eq!(teardown.state(), NodeState::Failed);
        assert_eq!(control_plane.total_deletes(), 0);
    }

    #[tokio::test]
    async fn test_unexpected_exit_reporting() {
        let teardown = coordinator(Arc::new(MockControlPlane::new()));
        let crash = ProcessExit {
            code: Some(2),
            success: false,
            error: None,
            stop_requested: false,
        };

        // Exits before the node was marked running still count.
        teardown.mark_starting();
        assert!(matches!(
            teardown.unexpected_exit(&crash),
            Some(SupervisorError::ProcessExitedUnexpectedly { .. })
        ));

        teardown.mark_running();
        assert!(teardown.unexpected_exit(&crash).is_some());

        let stopped = ProcessExit {
            stop_requested: true,
            ..crash.clone()
        };
        assert!(teardown.unexpected_exit(&stopped).is_none());

        teardown.delete(TeardownTrigger::Explicit).await.unwrap();
        assert!(teardown.unexpected_exit(&crash).is_none());
    }

    #[test]
    fn test_transitions_require_source_state() {
        let teardown = coordinator(Arc::new(MockControlPlane::new()));
        assert!(!teardown.mark_running());
        assert!(teardown.mark_starting());
        assert!(!teardown.mark_starting());
        assert!(teardown.mark_running());
        assert!(!teardown.mark_failed());
        assert!(!NodeState::Running.is_torn_down());
        assert!(NodeState::Deleting.is_torn_down());
        assert!(!NodeState::Deleting.is_terminal());
    }
}
