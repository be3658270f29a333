//! The implicit execution target.
//!
//! While a harness is running, its cluster is installed into a process-global
//! slot so arbitrary code in the test body can obtain an
//! [`ExecutionEnvironment`] and submit jobs without holding a reference to
//! the harness. The slot is de-installed on teardown regardless of earlier
//! teardown failures.

use std::marker::PhantomData;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cluster::BroadcastSet;
use crate::cluster::ClusterClient;
use crate::JobError;
use crate::JobGraph;
use crate::Result;

lazy_static! {
    static ref EXECUTION_CONTEXT: ArcSwapOption<ExecutionContext> = ArcSwapOption::const_empty();
}

/// Runtime binding between test code and the cluster of the active harness.
pub struct ExecutionContext {
    pub(crate) client: ClusterClient,
    pub(crate) default_parallelism: usize,
}

pub(crate) fn install(context: ExecutionContext) {
    debug!("Installing cluster as the default execution target.");
    EXECUTION_CONTEXT.store(Some(Arc::new(context)));
}

pub(crate) fn deinstall() {
    debug!("De-installing the default execution target.");
    EXECUTION_CONTEXT.store(None);
}

/// Entry point test bodies use to run jobs against the active cluster.
///
/// ```ignore
/// let env = ExecutionEnvironment::try_default()?;
/// let out: Vec<i64> = env.from_elements([1, 2, 3, 4])?.collect().await?;
/// ```
pub struct ExecutionEnvironment {
    context: Arc<ExecutionContext>,
}

impl ExecutionEnvironment {
    /// Binds to the installed execution target.
    ///
    /// # Errors
    /// Returns `JobError::NoExecutionContext` when no harness is running.
    pub fn try_default() -> Result<Self> {
        match EXECUTION_CONTEXT.load_full() {
            Some(context) => Ok(Self { context }),
            None => Err(JobError::NoExecutionContext.into()),
        }
    }

    pub fn default_parallelism(&self) -> usize {
        self.context.default_parallelism
    }

    /// Creates a dataset from local elements, serializing them into records.
    pub fn from_elements<T>(
        &self,
        elements: impl IntoIterator<Item = T>,
    ) -> Result<DataSet<T>>
    where
        T: Serialize,
    {
        let records = elements
            .into_iter()
            .map(|element| bincode::serialize(&element))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(JobError::Codec)?;

        Ok(DataSet {
            context: self.context.clone(),
            records,
            name: None,
            parallelism: None,
            broadcast_sets: Vec::new(),
            retain_broadcast_refs: false,
            retain_connections: false,
            _marker: PhantomData,
        })
    }
}

/// A distributed collection pending execution on the active cluster.
pub struct DataSet<T> {
    context: Arc<ExecutionContext>,
    records: Vec<Vec<u8>>,
    name: Option<String>,
    parallelism: Option<usize>,
    broadcast_sets: Vec<BroadcastSet>,
    retain_broadcast_refs: bool,
    retain_connections: bool,
    _marker: PhantomData<T>,
}

impl<T> DataSet<T> {
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parallelism(
        mut self,
        parallelism: usize,
    ) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Attaches a broadcast dataset shared read-only with every subtask.
    pub fn with_broadcast_set<B>(
        mut self,
        name: impl Into<String>,
        elements: impl IntoIterator<Item = B>,
    ) -> Result<Self>
    where
        B: Serialize,
    {
        let records = elements
            .into_iter()
            .map(|element| bincode::serialize(&element))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(JobError::Codec)?;
        self.broadcast_sets.push(BroadcastSet {
            name: name.into(),
            records,
        });
        Ok(self)
    }

    /// Fault injection: keep broadcast references registered after the job
    /// completes, so shutdown leak accounting can be exercised.
    pub fn retain_broadcast_refs(mut self) -> Self {
        self.retain_broadcast_refs = true;
        self
    }

    /// Fault injection: keep data-exchange connections open after the job
    /// completes, so shutdown leak accounting can be exercised.
    pub fn retain_connections(mut self) -> Self {
        self.retain_connections = true;
        self
    }

    /// Submits the job and gathers the decoded output records in order.
    pub async fn collect(self) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut graph = JobGraph::new(self.records);
        if let Some(name) = self.name {
            graph.name = name;
        }
        graph.parallelism = self.parallelism;
        graph.broadcast_sets = Arc::new(self.broadcast_sets);
        graph.retain_broadcast_refs = self.retain_broadcast_refs;
        graph.retain_connections = self.retain_connections;

        let outputs = self.context.client.submit(graph).await?;
        outputs
            .iter()
            .map(|record| bincode::deserialize(record))
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| JobError::Codec(e).into())
    }

    /// Submits the job and returns only the number of output records.
    pub async fn count(self) -> Result<usize>
    where
        T: DeserializeOwned,
    {
        Ok(self.collect().await?.len())
    }
}
