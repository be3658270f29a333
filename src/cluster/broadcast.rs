use std::collections::HashMap;

use tracing::debug;

/// Tracks broadcast-variable references held by one worker.
///
/// A task registers one reference per broadcast set it reads; references are
/// released when the task completes. Anything still registered at shutdown
/// time is a leak in the system under test.
#[derive(Debug, Default)]
pub(crate) struct BroadcastVariableManager {
    // (job_id, set name) -> reference count
    refs: HashMap<(String, String), usize>,
}

impl BroadcastVariableManager {
    pub fn register(
        &mut self,
        job_id: &str,
        name: &str,
    ) {
        let count = self
            .refs
            .entry((job_id.to_string(), name.to_string()))
            .or_insert(0);
        *count += 1;
        debug!("Registered broadcast variable '{name}' for job {job_id} (refs: {count}).");
    }

    /// Releases every reference the given job still holds.
    pub fn release_job(
        &mut self,
        job_id: &str,
    ) {
        self.refs.retain(|(job, _), _| job != job_id);
    }

    /// Outstanding references across all jobs.
    pub fn outstanding(&self) -> usize {
        self.refs.values().sum()
    }
}
