//! Configuration management for the mini-cluster harness.
//!
//! Settings are layered from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Optional TOML file supplied by the caller
//! 3. Environment variables (highest priority, prefix `HARNESS`)
//!
//! The assembled [`HarnessSettings`] value is immutable: the lifecycle
//! manager never writes discovered values (ephemeral web port, coordination
//! quorum address) back into it, but derives a separately-owned runtime
//! context instead.

mod cluster;
mod ha;
mod web;
pub use cluster::*;
pub use ha::*;
pub use web::*;

#[cfg(test)]
mod config_test;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HarnessSettings {
    /// Cluster topology (task managers, task slots)
    #[serde(default)]
    pub cluster: ClusterTopology,

    /// Web dashboard settings
    #[serde(default)]
    pub web: WebUiConfig,

    /// High-availability mode and quorum discovery
    #[serde(default)]
    pub ha: HighAvailabilityConfig,

    /// Bounded waits used during startup, jobs and teardown
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl HarnessSettings {
    /// Load settings from defaults, an optional TOML file and `HARNESS__*`
    /// environment variables, in that priority order.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(p) = path {
            config = config.add_source(File::with_name(p).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("HARNESS")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Self = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates every settings section.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if any section violates its rules.
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.web.validate()?;
        self.ha.validate()?;
        self.timeouts.validate()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Bounded wait for per-worker shutdown accounting replies
    #[serde(default = "default_accounting_timeout_ms")]
    pub accounting_timeout_ms: u64,

    /// Bounded wait for a submitted job to finish
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,

    /// Bounded wait for the coordination quorum liveness probe
    #[serde(default = "default_quorum_probe_timeout_ms")]
    pub quorum_probe_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            accounting_timeout_ms: default_accounting_timeout_ms(),
            job_timeout_ms: default_job_timeout_ms(),
            quorum_probe_timeout_ms: default_quorum_probe_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.accounting_timeout_ms == 0 {
            return Err(Error::InvalidConfig("accounting_timeout_ms cannot be 0".into()));
        }
        if self.job_timeout_ms == 0 {
            return Err(Error::InvalidConfig("job_timeout_ms cannot be 0".into()));
        }
        if self.quorum_probe_timeout_ms == 0 {
            return Err(Error::InvalidConfig("quorum_probe_timeout_ms cannot be 0".into()));
        }
        Ok(())
    }

    pub fn accounting_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.accounting_timeout_ms)
    }

    pub fn job_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.job_timeout_ms)
    }

    pub fn quorum_probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.quorum_probe_timeout_ms)
    }
}

fn default_accounting_timeout_ms() -> u64 {
    1_000
}
fn default_job_timeout_ms() -> u64 {
    10_000
}
fn default_quorum_probe_timeout_ms() -> u64 {
    5_000
}
