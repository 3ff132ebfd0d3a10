//! Declarative composition model: notes, chords and voices.
//!
//! These are plain data. Nothing here touches the channel allocator; pitches,
//! channels and timings are only checked when a composition is resolved.
//!
//! The JSON form is a top-level array of elements:
//!
//! ```json
//! [
//!   {"note": {"pitch": 60, "onset": 0.0, "duration": 1.0}},
//!   {"chord": {"pitches": ["c4", 64.5, {"hz": 392.0}], "onset": 1.0}},
//!   {"voice": [{"note": {"pitch": 72, "onset": 2.0}}, {"note": {"pitch": 74, "onset": 2.5}}]}
//! ]
//! ```

use crate::channel::LogicalChannel;
use crate::pitch::PitchSpec;
use crate::timing::onsets_from_durations;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VELOCITY: u8 = 127;

fn default_duration() -> f64 {
    1.0
}

fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}

fn default_chord() -> Vec<PitchSpec> {
    vec![60u8.into(), 64u8.into(), 67u8.into()]
}

/// A single note. `onset` and `duration` are seconds from the start of playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: PitchSpec,
    #[serde(default)]
    pub onset: f64,
    #[serde(default = "default_duration", alias = "dur")]
    pub duration: f64,
    #[serde(default, alias = "chnl")]
    pub channel: LogicalChannel,
    #[serde(default = "default_velocity", alias = "vel")]
    pub velocity: u8,
}

impl Note {
    pub fn new(pitch: impl Into<PitchSpec>) -> Self {
        Self {
            pitch: pitch.into(),
            onset: 0.0,
            duration: default_duration(),
            channel: LogicalChannel::default(),
            velocity: DEFAULT_VELOCITY,
        }
    }

    pub fn onset(mut self, onset: f64) -> Self {
        self.onset = onset;
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn channel(mut self, channel: u16) -> Self {
        self.channel = LogicalChannel(channel);
        self
    }

    pub fn velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

/// Pitches sounding together with shared timing, channel and velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    #[serde(default = "default_chord")]
    pub pitches: Vec<PitchSpec>,
    #[serde(default)]
    pub onset: f64,
    #[serde(default = "default_duration", alias = "dur")]
    pub duration: f64,
    #[serde(default, alias = "chnl")]
    pub channel: LogicalChannel,
    #[serde(default = "default_velocity", alias = "vel")]
    pub velocity: u8,
}

impl Chord {
    /// One note per pitch, each resolved on its own.
    pub fn notes(&self) -> impl Iterator<Item = Note> + '_ {
        self.pitches.iter().map(move |pitch| Note {
            pitch: pitch.clone(),
            onset: self.onset,
            duration: self.duration,
            channel: self.channel,
            velocity: self.velocity,
        })
    }
}

/// Something that can appear inside a voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEvent {
    Note(Note),
    Chord(Chord),
}

impl VoiceEvent {
    pub fn notes(&self) -> Box<dyn Iterator<Item = Note> + '_> {
        match self {
            VoiceEvent::Note(note) => Box::new(std::iter::once(note.clone())),
            VoiceEvent::Chord(chord) => Box::new(chord.notes()),
        }
    }
}

/// An ordered line of notes and chords. Exported as its own MIDI track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Voice {
    pub events: Vec<VoiceEvent>,
}

impl Voice {
    pub fn new(events: Vec<VoiceEvent>) -> Self {
        Self { events }
    }

    /// A monophonic line: pitches played one after another with the given
    /// durations, starting at `start`.
    pub fn sequence<P: Into<PitchSpec>>(
        pitches: impl IntoIterator<Item = P>,
        durations: &[f64],
        start: f64,
        channel: u16,
        velocity: u8,
    ) -> Self {
        let events = pitches
            .into_iter()
            .zip(onsets_from_durations(durations, start))
            .map(|(pitch, (onset, duration))| {
                VoiceEvent::Note(
                    Note::new(pitch)
                        .onset(onset)
                        .duration(duration)
                        .channel(channel)
                        .velocity(velocity),
                )
            })
            .collect();
        Self { events }
    }

    pub fn push(&mut self, event: VoiceEvent) {
        self.events.push(event);
    }

    pub fn notes(&self) -> impl Iterator<Item = Note> + '_ {
        self.events.iter().flat_map(VoiceEvent::notes)
    }
}

/// Top-level building block of a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Note(Note),
    Chord(Chord),
    Voice(Voice),
}

impl Element {
    pub fn notes(&self) -> Box<dyn Iterator<Item = Note> + '_> {
        match self {
            Element::Note(note) => Box::new(std::iter::once(note.clone())),
            Element::Chord(chord) => Box::new(chord.notes()),
            Element::Voice(voice) => Box::new(voice.notes()),
        }
    }
}

impl From<Note> for Element {
    fn from(note: Note) -> Self {
        Element::Note(note)
    }
}

impl From<Chord> for Element {
    fn from(chord: Chord) -> Self {
        Element::Chord(chord)
    }
}

impl From<Voice> for Element {
    fn from(voice: Voice) -> Self {
        Element::Voice(voice)
    }
}

impl From<Note> for VoiceEvent {
    fn from(note: Note) -> Self {
        VoiceEvent::Note(note)
    }
}

impl From<Chord> for VoiceEvent {
    fn from(chord: Chord) -> Self {
        VoiceEvent::Chord(chord)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Composition {
    pub elements: Vec<Element>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: impl Into<Element>) -> &mut Self {
        self.elements.push(element.into());
        self
    }

    /// Every note with the track it is exported to: loose notes and chords
    /// share track 0, each voice gets the next track in order.
    pub fn notes_by_track(&self) -> Vec<(usize, Note)> {
        let loose_track = usize::from(self.has_loose_notes());
        let mut next_voice_track = loose_track;
        let mut notes = Vec::new();

        for element in &self.elements {
            match element {
                Element::Voice(voice) => {
                    notes.extend(voice.notes().map(|note| (next_voice_track, note)));
                    next_voice_track += 1;
                }
                other => notes.extend(other.notes().map(|note| (0, note))),
            }
        }
        notes
    }

    pub fn track_count(&self) -> usize {
        let voices = self
            .elements
            .iter()
            .filter(|e| matches!(e, Element::Voice(_)))
            .count();
        voices + usize::from(self.has_loose_notes())
    }

    pub fn note_count(&self) -> usize {
        self.elements.iter().map(|e| e.notes().count()).sum()
    }

    /// Time at which the last note ends, in seconds.
    pub fn end(&self) -> f64 {
        self.elements
            .iter()
            .flat_map(|e| e.notes())
            .map(|note| note.end())
            .fold(0.0, f64::max)
    }

    fn has_loose_notes(&self) -> bool {
        self.elements
            .iter()
            .any(|e| !matches!(e, Element::Voice(_)))
    }
}

impl FromIterator<Element> for Composition {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

/// A note with the given timing, channel and velocity.
pub fn note(
    pitch: impl Into<PitchSpec>,
    onset: f64,
    duration: f64,
    channel: u16,
    velocity: u8,
) -> Note {
    Note {
        pitch: pitch.into(),
        onset,
        duration,
        channel: LogicalChannel(channel),
        velocity,
    }
}

/// A chord of `pitches` with shared timing, channel and velocity.
pub fn chord<P: Into<PitchSpec>>(
    pitches: impl IntoIterator<Item = P>,
    onset: f64,
    duration: f64,
    channel: u16,
    velocity: u8,
) -> Chord {
    Chord {
        pitches: pitches.into_iter().map(Into::into).collect(),
        onset,
        duration,
        channel: LogicalChannel(channel),
        velocity,
    }
}
