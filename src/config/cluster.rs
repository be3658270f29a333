use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Shape of the in-process cluster: how many task-manager workers to spawn
/// and how many task slots each of them offers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterTopology {
    #[serde(default = "default_task_managers")]
    pub task_managers: usize,

    #[serde(default = "default_task_slots")]
    pub task_slots: usize,
}

impl Default for ClusterTopology {
    fn default() -> Self {
        Self {
            task_managers: default_task_managers(),
            task_slots: default_task_slots(),
        }
    }
}

impl ClusterTopology {
    /// Validates topology consistency
    /// # Errors
    /// Returns `Error::InvalidConfig` if any configuration rules are violated
    pub fn validate(&self) -> Result<()> {
        if self.task_managers == 0 {
            return Err(Error::InvalidConfig(
                "task_managers must be at least 1".into(),
            ));
        }
        if self.task_slots == 0 {
            return Err(Error::InvalidConfig("task_slots must be at least 1".into()));
        }
        Ok(())
    }

    /// Total task slots across all workers; also the default parallelism for
    /// jobs submitted without an explicit one.
    pub fn total_slots(&self) -> usize {
        self.task_managers * self.task_slots
    }
}

fn default_task_managers() -> usize {
    1
}
fn default_task_slots() -> usize {
    4
}
