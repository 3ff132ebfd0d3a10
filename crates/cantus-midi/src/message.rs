//! Three-byte channel messages and the per-note message set.

use crate::channel::PhysicalChannel;
use crate::error::{Error, Result};
use crate::pitch::{key_to_hz, Pitch};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PITCH_BEND: u8 = 0xE0;

pub const ALL_SOUND_OFF: u8 = 120;
pub const RESET_ALL_CONTROLLERS: u8 = 121;

/// Unbent pitch wheel position (`2^13`).
pub const BEND_CENTER: u16 = 8192;
pub const BEND_MAX: u16 = 16383;

/// A MIDI 1.0 channel voice message with two data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortMessage {
    pub bytes: [u8; 3],
}

impl ShortMessage {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_message(NOTE_ON, channel, note, velocity)
    }

    /// Release velocity is always 0.
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::channel_message(NOTE_OFF, channel, note, 0)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::channel_message(CONTROL_CHANGE, channel, controller, value)
    }

    /// `value`: unsigned 14-bit wheel position, 8192 = center.
    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        let value = value.min(BEND_MAX);
        let lsb = (value & 0x7F) as u8;
        let msb = ((value >> 7) & 0x7F) as u8;
        Self::channel_message(PITCH_BEND, channel, lsb, msb)
    }

    pub fn all_sound_off(channel: u8) -> Self {
        Self::control_change(channel, ALL_SOUND_OFF, 0)
    }

    pub fn reset_all_controllers(channel: u8) -> Self {
        Self::control_change(channel, RESET_ALL_CONTROLLERS, 0)
    }

    fn channel_message(status: u8, channel: u8, data1: u8, data2: u8) -> Self {
        Self {
            bytes: [status | channel.min(15), data1 & 0x7F, data2 & 0x7F],
        }
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes[0] & 0xF0
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.bytes[0] & 0x0F
    }

    pub fn is_note_on(&self) -> bool {
        self.status() == NOTE_ON && self.bytes[2] > 0
    }

    pub fn is_note_off(&self) -> bool {
        self.status() == NOTE_OFF || (self.status() == NOTE_ON && self.bytes[2] == 0)
    }

    pub fn is_pitch_bend(&self) -> bool {
        self.status() == PITCH_BEND
    }

    pub fn is_control_change(&self, controller: u8) -> bool {
        self.status() == CONTROL_CHANGE && self.bytes[1] == controller
    }

    /// Wheel position of a pitch bend message.
    pub fn bend_value(&self) -> Option<u16> {
        self.is_pitch_bend()
            .then(|| self.bytes[1] as u16 | ((self.bytes[2] as u16) << 7))
    }
}

impl fmt::Display for ShortMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:02X} {:02X} {:02X}]",
            self.bytes[0], self.bytes[1], self.bytes[2]
        )
    }
}

/// Semitones covered by a full wheel deflection in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct BendRange(f64);

impl BendRange {
    pub fn new(semitones: f64) -> Result<Self> {
        if !semitones.is_finite() || semitones <= 0.0 {
            return Err(Error::InvalidBendRange(semitones));
        }
        Ok(Self(semitones))
    }

    pub fn semitones(self) -> f64 {
        self.0
    }
}

impl Default for BendRange {
    fn default() -> Self {
        Self(2.0)
    }
}

impl TryFrom<f64> for BendRange {
    type Error = Error;

    fn try_from(semitones: f64) -> Result<Self> {
        Self::new(semitones)
    }
}

impl From<BendRange> for f64 {
    fn from(range: BendRange) -> Self {
        range.0
    }
}

/// Wheel position that raises `pitch.key()` to `pitch`.
///
/// Rounded to the nearest step and clamped to the 14-bit range, so very
/// small detunings may lose sub-cent precision.
pub fn bend_value(pitch: Pitch, range: BendRange) -> u16 {
    let center = BEND_CENTER as f64;
    let ratio = pitch.hz() / key_to_hz(pitch.key() as f64);
    let value = center + center * (12.0 / range.semitones()) * ratio.log2();
    value.round().clamp(0.0, BEND_MAX as f64) as u16
}

/// Bend and bend-reset for a microtonal note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BendPair {
    pub bend: ShortMessage,
    pub reset: ShortMessage,
}

/// Everything sent over the wire for one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteMessages {
    pub note_on: ShortMessage,
    pub note_off: ShortMessage,
    pub bend: Option<BendPair>,
}

impl NoteMessages {
    /// Compiles the messages for `pitch` on an already reserved channel.
    pub fn compile(pitch: Pitch, channel: PhysicalChannel, velocity: u8, range: BendRange) -> Self {
        let ch = channel.channel;
        let key = pitch.key();
        let bend = pitch.is_microtonal().then(|| BendPair {
            bend: ShortMessage::pitch_bend(ch, bend_value(pitch, range)),
            reset: ShortMessage::pitch_bend(ch, BEND_CENTER),
        });
        Self {
            note_on: ShortMessage::note_on(ch, key, velocity),
            note_off: ShortMessage::note_off(ch, key),
            bend,
        }
    }
}
