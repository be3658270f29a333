//! The cluster lifecycle manager.
//!
//! `start()` brings resources up in dependency order (coordination service,
//! web port, cluster, execution context); `stop()` tears them down in the
//! exact reverse order with leak verification in between. Teardown steps are
//! attempted best-effort in fixed order regardless of earlier failures
//! within the same call, and at most one aggregated failure is reported. No
//! step is ever retried automatically.

use tracing::debug;
use tracing::error;
use tracing::info;

use super::collect_shutdown_accounting;
use super::context;
use super::context::ExecutionContext;
use super::HarnessBuilder;
use crate::CoordinationService;
use crate::Error;
use crate::HarnessSettings;
use crate::MiniCluster;
use crate::Result;
use crate::StartupError;

/// Lifecycle states of one harness instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// `start()` failed partway; `stop()` still cleans up whatever was
    /// acquired
    Failed,
}

/// Values discovered during startup, owned by the harness.
///
/// Caller-supplied [`HarnessSettings`] stay immutable; the resolved web port
/// and the coordination quorum address live here instead.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    pub web_port: Option<u16>,
    pub quorum: Option<String>,
}

/// The harness rule: boots an in-process mini-cluster before a test body
/// runs and tears it down afterward.
///
/// One cluster per harness lifetime, sequential use; the harness is not
/// designed for concurrent reuse across simultaneous test runs.
pub struct ClusterHarness {
    settings: HarnessSettings,
    state: HarnessState,
    runtime: Option<RuntimeContext>,
    cluster: Option<MiniCluster>,
    coordination: Option<CoordinationService>,
}

impl ClusterHarness {
    /// Creates a harness from validated settings. Nothing is started yet.
    pub fn new(settings: HarnessSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state: HarnessState::NotStarted,
            runtime: None,
            cluster: None,
            coordination: None,
        })
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// The port the web dashboard is reachable on.
    ///
    /// `None` when the UI is disabled, or when the auto-assign sentinel has
    /// not been resolved yet (before `start()`).
    pub fn web_ui_port(&self) -> Option<u16> {
        if !self.settings.web.enabled {
            return None;
        }
        if !self.settings.web.is_auto() {
            return Some(self.settings.web.port);
        }
        self.runtime.as_ref().and_then(|runtime| runtime.web_port)
    }

    /// The coordination quorum address the cluster was constructed with, if
    /// HA mode is active and the harness is started.
    pub fn coordination_quorum(&self) -> Option<&str> {
        self.runtime.as_ref().and_then(|runtime| runtime.quorum.as_deref())
    }

    /// Brings the cluster up and installs it as the default execution
    /// target.
    ///
    /// Startup order: coordination service (its discovered address must be
    /// known before the cluster reads it at construction time), web port
    /// allocation, cluster start, execution-context registration.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            HarnessState::NotStarted | HarnessState::Stopped => {}
            _ => return Err(StartupError::AlreadyRunning.into()),
        }

        info!("Starting cluster harness.");
        self.state = HarnessState::Starting;
        match self.try_start().await {
            Ok(()) => {
                self.state = HarnessState::Running;
                info!("Cluster harness is running.");
                Ok(())
            }
            Err(e) => {
                error!("Cluster harness failed to start: {e}");
                self.state = HarnessState::Failed;
                Err(e)
            }
        }
    }

    async fn try_start(&mut self) -> Result<()> {
        let mut runtime = RuntimeContext::default();

        if self.settings.ha.is_enabled() {
            match &self.settings.ha.quorum {
                Some(quorum) => {
                    debug!("Using pre-provisioned coordination quorum {quorum}.");
                    runtime.quorum = Some(quorum.clone());
                }
                None => {
                    info!("Coordination service selected for HA. Starting embedded ensemble member...");
                    let service = CoordinationService::start().await?;
                    runtime.quorum = Some(service.quorum());
                    self.coordination = Some(service);
                }
            }
        }

        if self.settings.web.enabled {
            let port = if self.settings.web.is_auto() {
                crate::utils::net::acquire_available_port()?
            } else {
                self.settings.web.port
            };
            runtime.web_port = Some(port);
        }

        let cluster = MiniCluster::start(&self.settings, &runtime).await?;
        context::install(ExecutionContext {
            client: cluster.client(),
            default_parallelism: self.settings.cluster.total_slots(),
        });
        self.cluster = Some(cluster);
        self.runtime = Some(runtime);
        Ok(())
    }

    /// Tears everything down in reverse startup order.
    ///
    /// Safe to call after a partial `start()` failure and idempotent after a
    /// successful stop: already-stopped resources are not contacted again.
    /// Leak accounting runs only when the cluster actually reached running;
    /// its counters are otherwise treated as zero.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            HarnessState::NotStarted | HarnessState::Stopped => return Ok(()),
            _ => {}
        }

        info!("Stopping cluster harness.");
        self.state = HarnessState::Stopping;
        let mut first_failure: Option<Error> = None;

        if let Some(cluster) = self.cluster.take() {
            if cluster.is_running() {
                let timeout = self.settings.timeouts.accounting_timeout();
                match collect_shutdown_accounting(cluster.workers(), timeout).await {
                    Ok(report) => {
                        if let Err(e) = report.assert_clean() {
                            error!("Resource leak detected on shutdown: {e}");
                            first_failure.get_or_insert(e.into());
                        }
                    }
                    Err(e) => {
                        error!("Shutdown accounting failed: {e}");
                        first_failure.get_or_insert(e.into());
                    }
                }
            } else {
                debug!("Cluster never reached running; skipping leak verification.");
            }

            if let Err(e) = cluster.stop().await {
                first_failure.get_or_insert(e);
            }
        }

        if let Some(service) = self.coordination.take() {
            if let Err(e) = service.stop().await {
                error!("Coordination service stop failed: {e}");
                first_failure.get_or_insert(e);
            }
        }

        // De-register the execution target even if earlier steps failed.
        context::deinstall();
        self.runtime = None;
        self.state = HarnessState::Stopped;

        match first_failure {
            None => {
                info!("Cluster harness stopped cleanly.");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

impl Drop for ClusterHarness {
    fn drop(&mut self) {
        if matches!(self.state, HarnessState::Starting | HarnessState::Running) {
            error!("ClusterHarness dropped without calling stop() - cluster tasks may leak");
        }
    }
}
