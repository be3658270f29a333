//! Shutdown-time resource-leak verification.
//!
//! Every worker in a running cluster is asked for its outstanding
//! broadcast-variable references and its open data-exchange connections; each
//! request-type batch is awaited in parallel under a bounded timeout and the
//! sums must be zero before a shutdown counts as clean. A late or missing
//! reply is a hard teardown error, not silently ignored.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
#[cfg(test)]
use mockall::automock;
use tokio::time;
use tracing::debug;

use crate::ShutdownError;
use crate::WorkerHandle;

/// Per-worker accounting query surface.
#[cfg_attr(test, automock)]
#[async_trait]
pub(crate) trait ShutdownAccounting: Sync {
    async fn outstanding_broadcast_refs(&self) -> std::result::Result<usize, ShutdownError>;

    async fn open_exchange_connections(&self) -> std::result::Result<usize, ShutdownError>;
}

#[async_trait]
impl ShutdownAccounting for WorkerHandle {
    async fn outstanding_broadcast_refs(&self) -> std::result::Result<usize, ShutdownError> {
        self.query_broadcast_refs().await
    }

    async fn open_exchange_connections(&self) -> std::result::Result<usize, ShutdownError> {
        self.query_active_connections().await
    }
}

/// Aggregated leak counters computed fresh on every teardown.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeakReport {
    pub unreleased_broadcast_refs: usize,
    pub active_connections: usize,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.unreleased_broadcast_refs == 0 && self.active_connections == 0
    }

    pub(crate) fn assert_clean(&self) -> std::result::Result<(), ShutdownError> {
        if self.unreleased_broadcast_refs > 0 {
            return Err(ShutdownError::UnreleasedBroadcastVariables {
                count: self.unreleased_broadcast_refs,
            });
        }
        if self.active_connections > 0 {
            return Err(ShutdownError::ActiveConnections {
                count: self.active_connections,
            });
        }
        Ok(())
    }
}

/// Queries every worker and aggregates the counts.
///
/// One request per worker per counter; batches awaited in parallel, one
/// request type at a time, each batch bounded by `timeout`.
pub(crate) async fn collect_shutdown_accounting<A>(
    workers: &[A],
    timeout: Duration,
) -> std::result::Result<LeakReport, ShutdownError>
where
    A: ShutdownAccounting,
{
    let broadcast_refs = time::timeout(
        timeout,
        try_join_all(workers.iter().map(|w| w.outstanding_broadcast_refs())),
    )
    .await
    .map_err(|_| ShutdownError::AccountingTimeout { timeout })??;

    let connections = time::timeout(
        timeout,
        try_join_all(workers.iter().map(|w| w.open_exchange_connections())),
    )
    .await
    .map_err(|_| ShutdownError::AccountingTimeout { timeout })??;

    let report = LeakReport {
        unreleased_broadcast_refs: broadcast_refs.into_iter().sum(),
        active_connections: connections.into_iter().sum(),
    };
    debug!(
        "Shutdown accounting: {} broadcast ref(s), {} connection(s).",
        report.unreleased_broadcast_refs, report.active_connections
    );
    Ok(report)
}
