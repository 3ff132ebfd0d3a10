//! # Cantus - Microtonal MIDI Playback
//!
//! Plays compositions with arbitrary fractional pitches on ordinary MIDI
//! synths. Pitch bend is channel-wide, so every microtonal note gets a
//! channel of its own while equal-tempered notes share; channels are moved
//! around on the fly and released when notes end.
//!
//! ## Architecture
//!
//! Cantus is an umbrella crate that coordinates:
//! - **cantus-midi** - Pitch model, channel allocator, message compiler, composition model
//! - **cantus-midi-io** - Output clients, timed dispatch, panic cleanup, MIDI files
//!
//! ## Quick Start
//!
//! ```ignore
//! use cantus::prelude::*;
//!
//! let mut piece = Composition::new();
//! piece
//!     .push(chord([60.0, 63.5, 67.0], 0.0, 2.0, 1, 100))
//!     .push(Voice::sequence([72.25, 71.75, 72.0], &[0.5, 0.5, 1.0], 0.0, 2, 90));
//!
//! let session = Session::builder().synth("fluid").build()?;
//! session.process(&piece, Destination::Play)?;
//! session.process(&piece, Destination::File("piece.mid".into()))?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Hardware output
//! - `midi-io` - Output through midir

pub use cantus_midi as midi;
pub use cantus_midi_io as midi_io;

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{BackendKind, PlaybackConfig};

mod builder;
pub use builder::SessionBuilder;

mod session;
pub use session::{
    load_composition, parse_composition, Destination, Interrupt, Outcome, Session,
};

pub use cantus_midi::{
    chord, note, resolve, BendRange, Chord, Composition, Element, Note, Pitch, PitchSpec,
    ResolvedEvent, Voice, VoiceEvent,
};
pub use cantus_midi_io::{
    CaptureBackend, CaptureLog, ImportOptions, OutputBackend, OutputPort, ParsedMidiFile,
    RunReport,
};

pub mod prelude {
    pub use crate::{
        chord, note, BackendKind, Composition, Destination, Element, Error, Note, Outcome,
        PlaybackConfig, Result, Session, SessionBuilder, Voice,
    };
}
