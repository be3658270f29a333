//! In-process emulation of a multi-node dataflow deployment: one dispatcher
//! role and one or more task-executor worker roles, wired over typed async
//! channels instead of real network hosts.

mod broadcast;
mod job;
mod mini_cluster;
mod web;
mod worker;

pub use job::*;
pub use mini_cluster::*;
pub use web::ClusterOverview;
pub use worker::WorkerHandle;

pub(crate) use broadcast::BroadcastVariableManager;
pub(crate) use job::BroadcastSet;
pub(crate) use mini_cluster::ClusterClient;
pub(crate) use worker::TaskExecutor;
pub(crate) use worker::WorkerCommand;
