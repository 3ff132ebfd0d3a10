//! Output transport seam.
//!
//! A backend enumerates output ports and opens clients on them; a client
//! sends three-byte messages until it is closed. The scheduler and the panic
//! sequence only ever see these traits.

use crate::error::Result;
use cantus_midi::ShortMessage;

/// An output port as listed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPort {
    pub index: usize,
    pub name: String,
}

impl OutputPort {
    /// Case-insensitive substring match, as used for synth names.
    pub fn matches(&self, pattern: &str) -> bool {
        self.name.to_lowercase().contains(&pattern.to_lowercase())
    }
}

/// An open connection to one output port.
pub trait OutputClient: Send {
    /// Port name, used in logs and run reports.
    fn name(&self) -> &str;

    fn send(&mut self, message: &ShortMessage) -> Result<()>;

    fn close(self: Box<Self>) {}
}

pub trait OutputBackend {
    fn output_ports(&self) -> Result<Vec<OutputPort>>;

    fn connect(&self, port: &OutputPort, client_name: &str) -> Result<Box<dyn OutputClient>>;
}
