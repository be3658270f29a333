//! A builder pattern implementation for constructing a [`ClusterHarness`].
//!
//! Provides a fluent interface over [`HarnessSettings`] for the options test
//! authors touch most: worker count, slots per worker, web UI mode and
//! high-availability mode.

use std::time::Duration;

use crate::ClusterHarness;
use crate::HaMode;
use crate::HarnessSettings;
use crate::Result;
use crate::WebUiConfig;

/// Builder for [`ClusterHarness`].
///
/// ## Example
/// ```ignore
/// let mut harness = HarnessBuilder::new()
///     .task_managers(1)
///     .task_slots(4)
///     .with_web_ui(9091)
///     .build()?;
/// harness.start().await?;
/// ```
#[derive(Debug, Default)]
pub struct HarnessBuilder {
    settings: HarnessSettings,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            settings: HarnessSettings::default(),
        }
    }

    /// Starts from pre-assembled settings (e.g. loaded from a file).
    pub fn from_settings(settings: HarnessSettings) -> Self {
        Self { settings }
    }

    /// Number of task-manager workers to spawn.
    pub fn task_managers(
        mut self,
        task_managers: usize,
    ) -> Self {
        self.settings.cluster.task_managers = task_managers;
        self
    }

    /// Task slots offered by each worker.
    pub fn task_slots(
        mut self,
        task_slots: usize,
    ) -> Self {
        self.settings.cluster.task_slots = task_slots;
        self
    }

    /// Enables the web dashboard on an explicit port.
    pub fn with_web_ui(
        mut self,
        port: u16,
    ) -> Self {
        self.settings.web.enabled = true;
        self.settings.web.port = port;
        self
    }

    /// Enables the web dashboard on an automatically assigned ephemeral
    /// port.
    pub fn with_web_ui_auto(mut self) -> Self {
        self.settings.web.enabled = true;
        self.settings.web.port = WebUiConfig::AUTO_PORT;
        self
    }

    /// Selects coordination-service high availability; the harness launches
    /// an embedded ensemble member unless an external quorum is supplied.
    pub fn with_high_availability(mut self) -> Self {
        self.settings.ha.mode = HaMode::CoordinationService;
        self
    }

    /// Uses a pre-provisioned coordination quorum instead of launching an
    /// embedded one. Implies high availability.
    pub fn with_external_quorum(
        mut self,
        quorum: impl Into<String>,
    ) -> Self {
        self.settings.ha.mode = HaMode::CoordinationService;
        self.settings.ha.quorum = Some(quorum.into());
        self
    }

    /// Bounded wait for per-worker shutdown accounting replies.
    pub fn accounting_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.settings.timeouts.accounting_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Validates the assembled settings and constructs the harness.
    pub fn build(self) -> Result<ClusterHarness> {
        ClusterHarness::new(self.settings)
    }
}
