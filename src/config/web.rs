use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Web dashboard settings.
///
/// `port` supports a reserved sentinel, [`WebUiConfig::AUTO_PORT`], meaning
/// "assign an ephemeral port automatically at startup". The resolved port is
/// recorded in the harness runtime context, never written back here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebUiConfig {
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,

    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            port: default_web_port(),
        }
    }
}

impl WebUiConfig {
    /// Reserved sentinel: assign an available ephemeral port automatically.
    pub const AUTO_PORT: u16 = 0;

    pub fn is_auto(&self) -> bool {
        self.port == Self::AUTO_PORT
    }

    /// Validates dashboard configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when the UI is enabled on a privileged
    /// port
    pub fn validate(&self) -> Result<()> {
        if self.enabled && !self.is_auto() && self.port < 1024 {
            return Err(Error::InvalidConfig(format!(
                "web port {} is a privileged port (requires root)",
                self.port
            )));
        }
        Ok(())
    }
}

fn default_web_enabled() -> bool {
    false
}
fn default_web_port() -> u16 {
    WebUiConfig::AUTO_PORT
}
