//! The in-process mini-cluster: dispatcher role plus task-executor workers.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use nanoid::nanoid;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::job::partition_round_robin;
use super::job::Record;
use super::job::TaskDeployment;
use super::web;
use super::JobGraph;
use super::TaskExecutor;
use super::WorkerHandle;
use crate::coordination;
use crate::metrics;
use crate::ClusterTopology;
use crate::HarnessSettings;
use crate::JobError;
use crate::Result;
use crate::RuntimeContext;
use crate::ShutdownError;
use crate::StartupError;

/// Lifecycle of one submitted job, visible on the dashboard and to tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
}

pub(crate) struct ClusterCore {
    pub cluster_id: String,
    pub topology: ClusterTopology,
    pub workers: Vec<WorkerHandle>,
    pub running: AtomicBool,
    pub finished_jobs: AtomicU64,
    pub jobs: DashMap<String, JobStatus>,
    pub job_timeout: Duration,
}

/// An in-process emulation of a multi-node dataflow deployment.
///
/// Exclusively owned by one harness instance for one start/stop cycle. Test
/// code does not talk to it directly; jobs arrive through the installed
/// execution context.
pub struct MiniCluster {
    core: Arc<ClusterCore>,
    worker_tasks: Vec<JoinHandle<()>>,
    web_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<()>,
}

impl MiniCluster {
    /// Starts workers and, when configured, the dashboard.
    ///
    /// When a coordination quorum is present in the runtime context it must
    /// answer the liveness probe before any cluster resource is created; the
    /// cluster reads the quorum address at construction time.
    pub(crate) async fn start(
        settings: &HarnessSettings,
        runtime: &RuntimeContext,
    ) -> Result<Self> {
        if let Some(quorum) = &runtime.quorum {
            let probe_timeout = settings.timeouts.quorum_probe_timeout();
            if !coordination::probe_quorum(quorum, probe_timeout).await {
                return Err(StartupError::QuorumUnreachable {
                    quorum: quorum.clone(),
                }
                .into());
            }
            debug!("Coordination quorum {} answered the liveness probe.", quorum);
        }

        metrics::register_custom_metrics();

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let mut workers = Vec::with_capacity(settings.cluster.task_managers);
        let mut worker_tasks = Vec::with_capacity(settings.cluster.task_managers);
        for worker_id in 1..=settings.cluster.task_managers as u32 {
            let (handle, join) = TaskExecutor::spawn(worker_id, shutdown_rx.clone());
            workers.push(handle);
            worker_tasks.push(join);
        }

        let core = Arc::new(ClusterCore {
            cluster_id: nanoid!(),
            topology: settings.cluster.clone(),
            workers,
            running: AtomicBool::new(false),
            finished_jobs: AtomicU64::new(0),
            jobs: DashMap::new(),
            job_timeout: settings.timeouts.job_timeout(),
        });

        let mut cluster = Self {
            core: core.clone(),
            worker_tasks,
            web_task: None,
            shutdown_tx,
        };
        // stop() subtracts this unconditionally
        metrics::ACTIVE_WORKERS.add(core.topology.task_managers as i64);

        if let Some(port) = runtime.web_port {
            match web::try_start_web_server(core.clone(), port, shutdown_rx) {
                Ok(join) => cluster.web_task = Some(join),
                Err(e) => {
                    // best-effort cleanup of the already-spawned workers
                    let _ = cluster.stop().await;
                    return Err(e);
                }
            }
        }

        cluster.core.running.store(true, Ordering::SeqCst);
        metrics::CLUSTERS_STARTED.inc();

        info!(
            "Mini-cluster {} started with {} task manager(s), {} slot(s) each.",
            cluster.core.cluster_id,
            cluster.core.topology.task_managers,
            cluster.core.topology.task_slots
        );
        Ok(cluster)
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.core.workers
    }

    pub fn cluster_id(&self) -> &str {
        &self.core.cluster_id
    }

    /// The same summary the dashboard serves under `/overview`.
    pub fn overview(&self) -> super::ClusterOverview {
        web::overview(&self.core)
    }

    pub fn job_status(
        &self,
        job_id: &str,
    ) -> Option<JobStatus> {
        self.core.jobs.get(job_id).map(|s| *s)
    }

    pub(crate) fn client(&self) -> ClusterClient {
        ClusterClient {
            core: self.core.clone(),
        }
    }

    /// Signals every worker (and the dashboard) to shut down and joins their
    /// tasks. Later joins still run when an earlier one fails; the first
    /// failure is reported.
    pub(crate) async fn stop(mut self) -> Result<()> {
        info!("Stopping mini-cluster {}.", self.core.cluster_id);
        self.core.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let mut first_failure: Option<ShutdownError> = None;
        for join in self.worker_tasks.drain(..) {
            if let Err(e) = join.await {
                error!("Worker task failed to join: {e}");
                first_failure
                    .get_or_insert(ShutdownError::ClusterStop(format!("worker task: {e}")));
            }
        }
        if let Some(join) = self.web_task.take() {
            if let Err(e) = join.await {
                error!("Dashboard task failed to join: {e}");
                first_failure
                    .get_or_insert(ShutdownError::ClusterStop(format!("dashboard task: {e}")));
            }
        }

        metrics::ACTIVE_WORKERS.sub(self.core.topology.task_managers as i64);
        match first_failure {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }
}

/// Job-submission handle shared with the installed execution context.
#[derive(Clone)]
pub(crate) struct ClusterClient {
    core: Arc<ClusterCore>,
}

impl ClusterClient {
    /// Runs one job: partition round-robin across slots, deploy one subtask
    /// per partition to the workers, gather outputs in original record
    /// order.
    pub(crate) async fn submit(
        &self,
        job: JobGraph,
    ) -> Result<Vec<Record>> {
        if !self.core.running.load(Ordering::Acquire) {
            return Err(JobError::ClusterNotRunning.into());
        }

        let total_slots = self.core.topology.total_slots();
        let parallelism = job
            .parallelism
            .unwrap_or(total_slots)
            .clamp(1, total_slots);

        debug!(
            "Submitting job {} ('{}') with parallelism {}.",
            job.job_id, job.name, parallelism
        );
        self.core.jobs.insert(job.job_id.clone(), JobStatus::Running);

        let partitions = partition_round_robin(job.records, parallelism);
        let deployments = partitions.into_iter().enumerate().map(|(subtask_index, records)| {
            let worker = &self.core.workers[subtask_index % self.core.workers.len()];
            worker.deploy(TaskDeployment {
                job_id: job.job_id.clone(),
                subtask_index,
                records,
                broadcast_sets: job.broadcast_sets.clone(),
                retain_broadcast_refs: job.retain_broadcast_refs,
                retain_connections: job.retain_connections,
            })
        });

        let job_timeout = self.core.job_timeout;
        let outputs = match time::timeout(
            job_timeout,
            futures::future::try_join_all(deployments),
        )
        .await
        {
            Err(_) => {
                self.core.jobs.insert(job.job_id.clone(), JobStatus::Failed);
                return Err(JobError::Timeout {
                    timeout: job_timeout,
                }
                .into());
            }
            Ok(Err(e)) => {
                self.core.jobs.insert(job.job_id.clone(), JobStatus::Failed);
                return Err(e.into());
            }
            Ok(Ok(outputs)) => outputs,
        };

        self.core.jobs.insert(job.job_id.clone(), JobStatus::Finished);
        self.core.finished_jobs.fetch_add(1, Ordering::Relaxed);
        metrics::JOBS_FINISHED.inc();

        Ok(reassemble_round_robin(outputs))
    }
}

/// Inverse of [`partition_round_robin`]: interleaves per-subtask outputs back
/// into the original record order.
fn reassemble_round_robin(mut outputs: Vec<Vec<Record>>) -> Vec<Record> {
    let total: usize = outputs.iter().map(|o| o.len()).sum();
    let mut records = Vec::with_capacity(total);
    let mut round = 0;
    while records.len() < total {
        for output in outputs.iter_mut() {
            if round < output.len() {
                records.push(std::mem::take(&mut output[round]));
            }
        }
        round += 1;
    }
    records
}
