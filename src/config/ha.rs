use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// High-availability mode selector.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HaMode {
    /// Single-coordinator cluster, no external coordination
    #[default]
    None,

    /// Leader election and metadata storage backed by a coordination-service
    /// ensemble
    CoordinationService,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HighAvailabilityConfig {
    #[serde(default)]
    pub mode: HaMode,

    /// Pre-provisioned quorum address (`host:port`). When absent and HA is
    /// active, the harness launches an embedded ensemble member and uses its
    /// discovered address instead.
    #[serde(default)]
    pub quorum: Option<String>,
}

impl HighAvailabilityConfig {
    pub fn is_enabled(&self) -> bool {
        self.mode == HaMode::CoordinationService
    }

    /// Validates HA configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when a quorum address is supplied
    /// without HA mode, or is malformed
    pub fn validate(&self) -> Result<()> {
        if let Some(quorum) = &self.quorum {
            if self.mode == HaMode::None {
                return Err(Error::InvalidConfig(
                    "ha.quorum is set but ha.mode is 'none'".into(),
                ));
            }
            if quorum.parse::<std::net::SocketAddr>().is_err() {
                return Err(Error::InvalidConfig(format!(
                    "ha.quorum '{quorum}' is not a valid host:port address"
                )));
            }
        }
        Ok(())
    }
}
