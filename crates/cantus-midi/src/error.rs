//! Error types for pitch conversion, channel allocation and composition resolution.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Cannot convert 0 Hz to a MIDI key number")]
    ZeroFrequency,

    #[error("Pitch {0} is outside the MIDI key range 0..128")]
    PitchOutOfRange(f64),

    #[error("Unknown note name: {0:?}")]
    UnknownNoteName(String),

    #[error("Velocity {0} is outside 0..=127")]
    InvalidVelocity(u16),

    #[error("Logical channel {channel} is outside 1..={max}")]
    ChannelOutOfRange { channel: u16, max: usize },

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    #[error("No MIDI channel available for {tuning} note (requested channel {requested})")]
    NoChannelAvailable {
        requested: usize,
        tuning: crate::allocator::Tuning,
    },

    #[error("Channel accounting mismatch on channel {channel}: {reason}")]
    ChannelAccounting { channel: usize, reason: String },

    #[error("Bend range must be a positive number of semitones, got {0}")]
    InvalidBendRange(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
