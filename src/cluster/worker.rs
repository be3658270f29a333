//! Task-executor worker role.
//!
//! Each worker is a single tokio task draining a typed command channel:
//! task deployments from the dispatcher and accounting queries from the
//! harness, answered over oneshot reply channels. Shutdown is cooperative
//! via a watch signal shared by the whole cluster.

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use super::BroadcastVariableManager;
use super::Record;
use super::TaskDeployment;
use crate::JobError;
use crate::ShutdownError;

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Typed messages a worker answers.
pub(crate) enum WorkerCommand {
    /// Run one parallel subtask; records in, records out
    Deploy {
        task: TaskDeployment,
        reply: oneshot::Sender<std::result::Result<Vec<Record>, String>>,
    },

    /// Outstanding broadcast-variable references on this worker
    QueryBroadcastRefs { reply: oneshot::Sender<usize> },

    /// Open data-exchange connections on this worker
    QueryActiveConnections { reply: oneshot::Sender<usize> },
}

/// Cheap cloneable handle to one worker's command channel.
#[derive(Clone)]
pub struct WorkerHandle {
    pub(crate) worker_id: u32,
    pub(crate) command_tx: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub(crate) async fn deploy(
        &self,
        task: TaskDeployment,
    ) -> std::result::Result<Vec<Record>, JobError> {
        let worker_id = self.worker_id;
        let subtask_index = task.subtask_index;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(WorkerCommand::Deploy {
                task,
                reply: reply_tx,
            })
            .await
            .map_err(|_| JobError::TaskFailed {
                worker_id,
                subtask_index,
                reason: "worker command channel closed".to_string(),
            })?;

        reply_rx
            .await
            .map_err(|_| JobError::TaskFailed {
                worker_id,
                subtask_index,
                reason: "worker dropped the task reply".to_string(),
            })?
            .map_err(|reason| JobError::TaskFailed {
                worker_id,
                subtask_index,
                reason,
            })
    }

    pub(crate) async fn query_broadcast_refs(&self) -> std::result::Result<usize, ShutdownError> {
        self.query(|reply| WorkerCommand::QueryBroadcastRefs { reply }).await
    }

    pub(crate) async fn query_active_connections(
        &self
    ) -> std::result::Result<usize, ShutdownError> {
        self.query(|reply| WorkerCommand::QueryActiveConnections { reply }).await
    }

    async fn query(
        &self,
        command: impl FnOnce(oneshot::Sender<usize>) -> WorkerCommand,
    ) -> std::result::Result<usize, ShutdownError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| ShutdownError::WorkerUnreachable {
                worker_id: self.worker_id,
            })?;
        reply_rx.await.map_err(|_| ShutdownError::WorkerUnreachable {
            worker_id: self.worker_id,
        })
    }
}

/// One task-manager worker: broadcast registry, connection accounting and the
/// command loop.
pub(crate) struct TaskExecutor {
    worker_id: u32,
    broadcast: BroadcastVariableManager,
    active_connections: usize,
}

impl TaskExecutor {
    /// Spawns the worker loop and returns its handle plus the join handle the
    /// cluster keeps for shutdown.
    pub fn spawn(
        worker_id: u32,
        shutdown_signal: watch::Receiver<()>,
    ) -> (WorkerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let executor = Self {
            worker_id,
            broadcast: BroadcastVariableManager::default(),
            active_connections: 0,
        };
        let join = tokio::spawn(executor.run(command_rx, shutdown_signal));

        (
            WorkerHandle {
                worker_id,
                command_tx,
            },
            join,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<WorkerCommand>,
        mut shutdown_signal: watch::Receiver<()>,
    ) {
        debug!("Worker {} started.", self.worker_id);
        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    debug!("Worker {} received shutdown signal.", self.worker_id);
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("Worker {} command channel closed.", self.worker_id);
                        break;
                    }
                }
            }
        }
    }

    fn handle(
        &mut self,
        command: WorkerCommand,
    ) {
        match command {
            WorkerCommand::Deploy { task, reply } => {
                let result = self.execute(task);
                if reply.send(result).is_err() {
                    warn!("Worker {} task reply receiver dropped.", self.worker_id);
                }
            }
            WorkerCommand::QueryBroadcastRefs { reply } => {
                let _ = reply.send(self.broadcast.outstanding());
            }
            WorkerCommand::QueryActiveConnections { reply } => {
                let _ = reply.send(self.active_connections);
            }
        }
    }

    fn execute(
        &mut self,
        task: TaskDeployment,
    ) -> std::result::Result<Vec<Record>, String> {
        // One data-exchange connection back to the dispatcher per subtask.
        self.active_connections += 1;

        for set in task.broadcast_sets.iter() {
            self.broadcast.register(&task.job_id, &set.name);
        }

        // The pipeline itself belongs to the engine under test; the harness
        // emulation forwards records unchanged.
        let output = task.records;

        if !task.retain_broadcast_refs {
            self.broadcast.release_job(&task.job_id);
        }
        if !task.retain_connections {
            self.active_connections -= 1;
        }

        debug!(
            "Worker {} finished subtask {} of job {}.",
            self.worker_id, task.subtask_index, task.job_id
        );
        Ok(output)
    }
}
