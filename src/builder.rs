//! Builder for configuring and constructing a [`Session`].

use crate::config::{BackendKind, PlaybackConfig};
use crate::session::{Interrupt, Session};
use crate::Result;
use cantus_midi_io::{CaptureBackend, ClientRegistry, OutputBackend};
use std::time::Duration;

/// Starts from [`PlaybackConfig::default`] or a loaded config; individual
/// setters override single fields.
///
/// # Example
///
/// ```ignore
/// use cantus::prelude::*;
///
/// let session = Session::builder()
///     .port_count(2)
///     .bend_range(12.0)
///     .synth("pianoteq")
///     .build()?;
///
/// session.process(&composition, Destination::Play)?;
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    config: PlaybackConfig,
    backend: Option<Box<dyn OutputBackend>>,
    keep_open: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn port_count(mut self, port_count: usize) -> Self {
        self.config.port_count = port_count;
        self
    }

    pub fn bend_range(mut self, semitones: f64) -> Self {
        self.config.bend_range = semitones;
        self
    }

    /// Adds a synth: every port fans out to one client per synth.
    pub fn synth(mut self, pattern: impl Into<String>) -> Self {
        self.config.synths.push(pattern.into());
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn panic_delay(mut self, delay: Duration) -> Self {
        self.config.panic_delay_ms = delay.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    /// Records messages in memory instead of sending them.
    pub fn capture(mut self) -> Self {
        self.config.backend = BackendKind::Capture;
        self
    }

    /// Uses `backend` regardless of the configured backend kind.
    pub fn backend(mut self, backend: impl OutputBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Opens the output clients once at build time and keeps them open
    /// across runs until [`Session::close`].
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    pub fn build(self) -> Result<Session> {
        let config = self.config;
        config.validate()?;
        let bend_range = config.bend_range()?;

        let mut capture = None;
        let backend: Box<dyn OutputBackend> = match self.backend {
            Some(backend) => backend,
            None => match config.backend {
                BackendKind::Capture => {
                    let backend = capture_ports(&config);
                    capture = Some(backend.log());
                    Box::new(backend)
                }
                BackendKind::Midir => midir_backend()?,
            },
        };

        let shared = if self.keep_open {
            Some(
                ClientRegistry::connect(
                    backend.as_ref(),
                    &config.synths,
                    config.port_count,
                    &config.client_name,
                )?
                .into_shared(),
            )
        } else {
            None
        };

        Ok(Session {
            config,
            bend_range,
            backend,
            shared,
            capture,
            interrupt: Interrupt::default(),
        })
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}

/// One capture port per synth per port, named so the synth patterns match.
fn capture_ports(config: &PlaybackConfig) -> CaptureBackend {
    if config.synths.is_empty() {
        return CaptureBackend::with_port_count(config.port_count);
    }
    CaptureBackend::new(config.synths.iter().flat_map(|synth| {
        (0..config.port_count).map(move |port| format!("{} {}", synth, port))
    }))
}

#[cfg(feature = "midi-io")]
fn midir_backend() -> Result<Box<dyn OutputBackend>> {
    Ok(Box::new(cantus_midi_io::MidirBackend::new()))
}

#[cfg(not(feature = "midi-io"))]
fn midir_backend() -> Result<Box<dyn OutputBackend>> {
    Err(crate::Error::InvalidConfig(
        "built without the midi-io feature; use the capture backend".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_builder_overrides_config() {
        let session = Session::builder()
            .port_count(2)
            .bend_range(12.0)
            .synth("fluid")
            .client_name("demo")
            .panic_delay(Duration::ZERO)
            .capture()
            .build()
            .unwrap();

        let config = session.config();
        assert_eq!(config.port_count, 2);
        assert_eq!(config.bend_range, 12.0);
        assert_eq!(config.synths, vec!["fluid"]);
        assert_eq!(config.client_name, "demo");
        assert_eq!(config.panic_delay_ms, 0);
        assert!(session.capture_log().is_some());
    }

    #[test]
    fn test_capture_ports_match_synths() {
        let session = Session::builder()
            .port_count(2)
            .synth("a")
            .synth("b")
            .capture()
            .build()
            .unwrap();
        let names: Vec<String> = session
            .output_ports()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a 0", "a 1", "b 0", "b 1"]);
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        assert!(matches!(
            Session::builder().port_count(0).capture().build(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(Session::builder().bend_range(0.0).capture().build().is_err());
    }

    #[test]
    fn test_keep_open_needs_ports() {
        let backend = CaptureBackend::with_port_count(1);
        assert!(Session::builder()
            .port_count(2)
            .backend(backend)
            .keep_open()
            .build()
            .is_err());
    }
}
