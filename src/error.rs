//! Centralized error type for the cantus umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Midi(#[from] cantus_midi::Error),

    #[error("MIDI I/O: {0}")]
    MidiIo(#[from] cantus_midi_io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Composition parse error: {0}")]
    CompositionParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The run was cancelled by the user; cleanup has already happened.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::MidiIo(e) if e.is_interrupted())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
