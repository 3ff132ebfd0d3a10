//! MIDI core for Cantus.
//!
//! Pitch model, channel allocation, message compilation and the composition
//! model. Nothing in this crate performs I/O or sleeps.
//!
//! # Example
//!
//! ```ignore
//! use cantus_midi::{note, resolve, BendRange, Composition};
//!
//! let mut comp = Composition::new();
//! comp.push(note(60u8, 0.0, 1.0, 1, 100))
//!     .push(note(60.5, 0.0, 1.0, 1, 100));
//!
//! // The quarter-tone cannot bend channel 1 under the C, so it moves to channel 2.
//! let events = resolve(&comp, 1, BendRange::default())?;
//! assert_eq!(events[1].channel.channel, 1);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod pitch;
pub use pitch::{hz_to_key, key_to_hz, split, Pitch, PitchSpec};

pub mod note;
pub use note::{key_to_name, name_to_key};

pub mod timing;

pub mod channel;
pub use channel::{LogicalChannel, PhysicalChannel, CHANNELS_PER_PORT};

pub mod allocator;
pub use allocator::{ChannelAllocator, ChannelUsage, Reservation, Tuning};

pub mod message;
pub use message::{bend_value, BendPair, BendRange, NoteMessages, ShortMessage};

pub mod composition;
pub use composition::{chord, note, Chord, Composition, Element, Note, Voice, VoiceEvent};

pub mod resolve;
pub use resolve::{resolve, total_duration, ResolvedEvent};
