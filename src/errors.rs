//! Harness Error Hierarchy
//!
//! Defines the error types of the mini-cluster test harness, categorized by
//! lifecycle phase (startup, job execution, teardown) and configuration
//! concerns.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cluster or coordination-service startup failures
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Teardown failures, including resource-leak detection
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// Job submission and execution failures
    #[error(transparent)]
    Job(#[from] JobError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Unrecoverable failures requiring the test to abort
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Failures raised while bringing the cluster up.
///
/// Each variant is fatal: the harness transitions to `Failed` and the error is
/// propagated to the test framework.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// `start()` called on a harness that is already starting or running
    #[error("Harness is already running")]
    AlreadyRunning,

    /// Embedded coordination service could not be launched
    #[error("Coordination service failed to start")]
    CoordinationService(#[source] std::io::Error),

    /// Configured quorum did not answer the liveness probe
    #[error("Coordination quorum {quorum} is not reachable")]
    QuorumUnreachable { quorum: String },

    /// Ephemeral port allocation failed
    #[error("Failed to allocate an ephemeral port")]
    PortAllocation(#[source] std::io::Error),

    /// Dashboard could not bind its listen port
    #[error("Web UI failed to bind port {port}")]
    WebUiBind {
        port: u16,
        #[source]
        source: warp::Error,
    },

    /// Cluster construction failed
    #[error("Cluster failed to start: {0}")]
    ClusterStart(String),
}

/// Failures raised while tearing the cluster down.
///
/// None of these are swallowed: the stop sequence runs to the end and
/// reports the first failure it recorded.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// A job left broadcast-variable references registered on some worker
    #[error("Not all broadcast variables were released ({count} outstanding)")]
    UnreleasedBroadcastVariables { count: usize },

    /// A job left data-exchange connections open on some worker
    #[error("Not all data-exchange connections were closed ({count} active)")]
    ActiveConnections { count: usize },

    /// A worker did not answer its accounting query in time
    #[error("Shutdown accounting timed out after {timeout:?}")]
    AccountingTimeout { timeout: Duration },

    /// A worker dropped its reply channel before answering
    #[error("Worker {worker_id} dropped its accounting reply")]
    WorkerUnreachable { worker_id: u32 },

    /// Worker or dashboard task failed to join during cluster stop
    #[error("Cluster stop failed: {0}")]
    ClusterStop(String),

    /// Coordination service did not shut down cleanly
    #[error("Coordination service stop failed: {0}")]
    CoordinationStop(String),
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No cluster has been installed as the default execution target
    #[error("No execution context installed; did the harness start?")]
    NoExecutionContext,

    /// The cluster behind the execution context is not running
    #[error("Cluster is not running")]
    ClusterNotRunning,

    /// A deployed task failed on a worker
    #[error("Task {subtask_index} failed on worker {worker_id}: {reason}")]
    TaskFailed {
        worker_id: u32,
        subtask_index: usize,
        reason: String,
    },

    /// The job did not finish within the configured job timeout
    #[error("Job did not finish within {timeout:?}")]
    Timeout { timeout: Duration },

    /// Record serialization failures
    #[error("Record codec error")]
    Codec(#[from] bincode::Error),
}
