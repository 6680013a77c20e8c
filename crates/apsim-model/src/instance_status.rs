use serde::{Deserialize, Serialize};

/// Lifecycle state of a backend instance.
///
/// Transitions only ever go forward: `Created -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    /// Constructed, process not spawned yet.
    Created,
    /// Process spawned and owned by the instance.
    Running,
    /// Process killed and files cleaned up. Terminal.
    Stopped,
}

impl InstanceStatus {
    /// Returns `true` if the instance can never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceStatus::Running)
    }
}
