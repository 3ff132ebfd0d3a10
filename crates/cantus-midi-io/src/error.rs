//! Error types for output, scheduling and MIDI files.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Midi(#[from] cantus_midi::Error),

    #[error("Send to {client} failed: {reason}")]
    TransportSend { client: String, reason: String },

    #[error("Every output client failed: {}", .0.join(", "))]
    AllClientsFailed(Vec<String>),

    #[error("Found {found} of {needed} MIDI output ports matching '{pattern}'")]
    PortNotFound {
        pattern: String,
        found: usize,
        needed: usize,
    },

    #[error("MIDI device error: {0}")]
    Device(String),

    #[error("Playback interrupted")]
    Interrupted,

    #[error("MIDI parse error: {0}")]
    MidiFileParse(String),

    #[error("Unsupported MIDI timing format")]
    MidiUnsupportedTiming,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Scheduler thread ended unexpectedly")]
    SchedulerGone,
}

impl Error {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFileParse(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Device(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Device(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::Device(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
