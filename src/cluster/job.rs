use std::sync::Arc;

use nanoid::nanoid;

/// A single serialized element flowing through the cluster.
pub(crate) type Record = Vec<u8>;

/// A broadcast dataset shared read-only from the dispatcher to every worker
/// running a task of the job. Workers register one reference per registered
/// set and must release it when the task completes.
#[derive(Debug, Clone)]
pub(crate) struct BroadcastSet {
    pub name: String,
    #[allow(dead_code)]
    pub records: Vec<Record>,
}

/// Logical description of a job submitted to the mini-cluster.
///
/// Records are already serialized; the typed surface lives on
/// [`crate::DataSet`].
#[derive(Debug)]
pub struct JobGraph {
    pub(crate) job_id: String,
    pub(crate) name: String,
    pub(crate) records: Vec<Record>,
    pub(crate) broadcast_sets: Arc<Vec<BroadcastSet>>,
    pub(crate) parallelism: Option<usize>,
    pub(crate) retain_broadcast_refs: bool,
    pub(crate) retain_connections: bool,
}

impl JobGraph {
    pub(crate) fn new(records: Vec<Record>) -> Self {
        let job_id = nanoid!();
        Self {
            name: format!("job-{job_id}"),
            job_id,
            records,
            broadcast_sets: Arc::new(Vec::new()),
            parallelism: None,
            retain_broadcast_refs: false,
            retain_connections: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One parallel subtask of a job, deployed to a single worker slot.
#[derive(Debug)]
pub(crate) struct TaskDeployment {
    pub job_id: String,
    pub subtask_index: usize,
    pub records: Vec<Record>,
    pub broadcast_sets: Arc<Vec<BroadcastSet>>,
    pub retain_broadcast_refs: bool,
    pub retain_connections: bool,
}

/// Splits records round-robin into `parallelism` partitions, preserving the
/// relative order of records within each partition.
pub(crate) fn partition_round_robin(
    records: Vec<Record>,
    parallelism: usize,
) -> Vec<Vec<Record>> {
    let mut partitions: Vec<Vec<Record>> = (0..parallelism).map(|_| Vec::new()).collect();
    for (i, record) in records.into_iter().enumerate() {
        partitions[i % parallelism].push(record);
    }
    partitions
}
