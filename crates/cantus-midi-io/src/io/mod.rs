//! Output backends.
//!
//! `MidirBackend` talks to hardware and virtual ports through midir and
//! requires the `midi-io` feature. `CaptureBackend` records messages in
//! memory for dry runs and tests.

mod capture;
#[cfg(feature = "midi-io")]
mod output;

pub use capture::{CaptureBackend, CaptureLog, CapturedMessage};
#[cfg(feature = "midi-io")]
pub use output::{MidirBackend, MidirClient};
