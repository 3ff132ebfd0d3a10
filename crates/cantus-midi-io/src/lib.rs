//! MIDI I/O subsystem for Cantus.
//!
//! Output clients, timed dispatch of resolved events, panic cleanup and
//! Standard MIDI File export/import.
//!
//! Feature gates: `midi-io` (hardware output through midir).
//!
//! # Example
//!
//! ```ignore
//! use cantus_midi::{note, resolve, BendRange, Composition};
//! use cantus_midi_io::{CaptureBackend, ClientRegistry, Scheduler};
//!
//! let mut comp = Composition::new();
//! comp.push(note(60.5, 0.0, 1.0, 1, 100));
//! let events = resolve(&comp, 1, BendRange::default())?;
//!
//! let backend = CaptureBackend::with_port_count(1);
//! let clients = ClientRegistry::connect(&backend, &[], 1, "cantus")?;
//! let report = Scheduler::new().play(events, clients)?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod transport;
pub use transport::{OutputBackend, OutputClient, OutputPort};

mod io;
pub use io::{CaptureBackend, CaptureLog, CapturedMessage};
#[cfg(feature = "midi-io")]
pub use io::{MidirBackend, MidirClient};

pub mod registry;
pub use registry::{ClientId, ClientRegistry, SharedRegistry};

pub mod cleanup;
pub use cleanup::{panic, PanicReport, DEFAULT_PANIC_DELAY};

pub mod scheduler;
pub use scheduler::{CancelToken, Outputs, RunHandle, RunReport, Scheduler};

pub mod file;
pub use file::{save_smf, write_smf, ImportOptions, ParsedMidiFile};
