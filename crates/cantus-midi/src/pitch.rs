//! Pitch model: fractional key numbers, frequencies and the integer/fraction split.
//!
//! A pitch is a real-valued MIDI key number. The integer part selects the key
//! sent in note-on/note-off messages, the fractional part (always in `[0, 1)`)
//! is the detuning in semitones that has to be realised with a pitch bend.

use crate::error::{Error, Result};
use crate::note::name_to_key;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concert A, key 69.
pub const A4_HZ: f64 = 440.0;
pub const A4_KEY: f64 = 69.0;

/// Highest valid MIDI key number.
pub const MAX_KEY: u8 = 127;

#[inline]
pub fn key_to_hz(key: f64) -> f64 {
    A4_HZ * 2.0_f64.powf((key - A4_KEY) / 12.0)
}

/// Inverse of [`key_to_hz`]. Fails for 0 Hz, where the logarithm is undefined.
#[inline]
pub fn hz_to_key(hz: f64) -> Result<f64> {
    if hz == 0.0 {
        return Err(Error::ZeroFrequency);
    }
    Ok(A4_KEY + 12.0 * (hz / A4_HZ).log2())
}

/// Splits a key number into its floor and the remaining fraction in `[0, 1)`.
#[inline]
pub fn split(key: f64) -> (i64, f64) {
    let floor = key.floor();
    (floor as i64, key - floor)
}

/// A validated key number in `0.0..128.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Pitch(f64);

impl Pitch {
    pub fn new(key: f64) -> Result<Self> {
        if !key.is_finite() || key < 0.0 || key >= (MAX_KEY as f64 + 1.0) {
            return Err(Error::PitchOutOfRange(key));
        }
        Ok(Self(key))
    }

    pub fn from_hz(hz: f64) -> Result<Self> {
        Self::new(hz_to_key(hz)?)
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn hz(self) -> f64 {
        key_to_hz(self.0)
    }

    /// The MIDI key carried by note messages.
    #[inline]
    pub fn key(self) -> u8 {
        split(self.0).0 as u8
    }

    /// Detuning above [`Pitch::key`], in semitones.
    #[inline]
    pub fn fraction(self) -> f64 {
        split(self.0).1
    }

    #[inline]
    pub fn is_microtonal(self) -> bool {
        self.fraction() != 0.0
    }
}

impl TryFrom<f64> for Pitch {
    type Error = Error;

    fn try_from(key: f64) -> Result<Self> {
        Self::new(key)
    }
}

impl From<Pitch> for f64 {
    fn from(pitch: Pitch) -> Self {
        pitch.0
    }
}

impl From<u8> for Pitch {
    fn from(key: u8) -> Self {
        Self(key.min(MAX_KEY) as f64)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a note's pitch was written down.
///
/// Names and frequencies are only turned into key numbers when a composition
/// is resolved, so a bad name or a 0 Hz frequency aborts the run before any
/// message is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PitchSpec {
    Key(f64),
    Name(String),
    Hz { hz: f64 },
}

impl PitchSpec {
    pub fn resolve(&self) -> Result<Pitch> {
        match self {
            PitchSpec::Key(key) => Pitch::new(*key),
            PitchSpec::Name(name) => name_to_key(name).map(Pitch::from),
            PitchSpec::Hz { hz } => Pitch::from_hz(*hz),
        }
    }
}

impl From<f64> for PitchSpec {
    fn from(key: f64) -> Self {
        PitchSpec::Key(key)
    }
}

impl From<u8> for PitchSpec {
    fn from(key: u8) -> Self {
        PitchSpec::Key(key as f64)
    }
}

impl From<&str> for PitchSpec {
    fn from(name: &str) -> Self {
        PitchSpec::Name(name.to_string())
    }
}

impl From<Pitch> for PitchSpec {
    fn from(pitch: Pitch) -> Self {
        PitchSpec::Key(pitch.value())
    }
}
