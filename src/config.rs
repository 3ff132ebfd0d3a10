//! Playback configuration.
//!
//! ```toml
//! port_count = 2
//! bend_range = 2.0
//! synths = ["fluid", "pianoteq"]
//! backend = "midir"
//! client_name = "cantus"
//! panic_delay_ms = 50
//! ```

use crate::{Error, Result};
use cantus_midi::BendRange;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest number of output ports a run may address.
pub const MAX_PORTS: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hardware and virtual ports through midir.
    #[default]
    Midir,
    /// Messages are recorded in memory and never leave the process.
    Capture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output ports per synth; logical channels run from 1 to `16 * port_count`.
    pub port_count: usize,
    /// Semitones of a full pitch wheel deflection, as set on the receiving synths.
    pub bend_range: f64,
    /// Port name patterns, one set of clients per entry. Empty means any port.
    pub synths: Vec<String>,
    pub backend: BackendKind,
    pub client_name: String,
    pub panic_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            port_count: 1,
            bend_range: 2.0,
            synths: Vec::new(),
            backend: BackendKind::default(),
            client_name: "cantus".to_string(),
            panic_delay_ms: 50,
        }
    }
}

impl PlaybackConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port_count == 0 || self.port_count > MAX_PORTS {
            return Err(Error::InvalidConfig(format!(
                "port_count {} out of range (1-{})",
                self.port_count, MAX_PORTS
            )));
        }
        if self.client_name.trim().is_empty() {
            return Err(Error::InvalidConfig("client_name must not be empty".into()));
        }
        if self.synths.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig("synth names must not be empty".into()));
        }
        self.bend_range()?;
        Ok(())
    }

    pub fn bend_range(&self) -> Result<BendRange> {
        Ok(BendRange::new(self.bend_range)?)
    }

    pub fn panic_delay(&self) -> Duration {
        Duration::from_millis(self.panic_delay_ms)
    }
}
