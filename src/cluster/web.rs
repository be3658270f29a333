use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use warp::Filter;

use super::mini_cluster::ClusterCore;
use crate::metrics;
use crate::Result;
use crate::StartupError;

/// Body of `GET /overview`, the dashboard summary test code polls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterOverview {
    pub cluster_id: String,
    pub taskmanagers: usize,
    pub slots_total: usize,
    pub jobs_finished: u64,
}

pub(crate) fn overview(core: &ClusterCore) -> ClusterOverview {
    ClusterOverview {
        cluster_id: core.cluster_id.clone(),
        taskmanagers: core.topology.task_managers,
        slots_total: core.topology.total_slots(),
        jobs_finished: core.finished_jobs.load(Ordering::Relaxed),
    }
}

/// Binds the dashboard on the loopback interface with graceful shutdown.
///
/// The port comes pre-resolved from the harness runtime context (explicit or
/// freshly allocated); a bind failure is a startup error, not a panic.
pub(crate) fn try_start_web_server(
    core: Arc<ClusterCore>,
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<JoinHandle<()>> {
    let overview_route = warp::path!("overview").map(move || warp::reply::json(&overview(&core)));
    let metrics_route = warp::path!("metrics").map(|| metrics::gather_metrics_body());
    let routes = overview_route.or(metrics_route);

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown((Ipv4Addr::LOCALHOST, port), async move {
            let _ = shutdown_signal.changed().await;
        })
        .map_err(|source| StartupError::WebUiBind { port, source })?;

    info!("Web dashboard listening on http://{}/overview", bound);
    Ok(tokio::spawn(server))
}
