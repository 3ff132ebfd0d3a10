//! Hardware MIDI output via midir.

use crate::error::{Error, Result};
use crate::transport::{OutputBackend, OutputClient, OutputPort};
use cantus_midi::ShortMessage;
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct MidirBackend;

impl MidirBackend {
    pub fn new() -> Self {
        Self
    }

    fn open(client_name: &str) -> Result<MidiOutput> {
        Ok(MidiOutput::new(client_name)?)
    }
}

impl OutputBackend for MidirBackend {
    fn output_ports(&self) -> Result<Vec<OutputPort>> {
        let midi_output = Self::open("cantus-port-list")?;
        let ports = midi_output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| OutputPort {
                index,
                name: midi_output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index)),
            })
            .collect();
        Ok(ports)
    }

    fn connect(&self, port: &OutputPort, client_name: &str) -> Result<Box<dyn OutputClient>> {
        let midi_output = Self::open(client_name)?;
        let ports = midi_output.ports();
        let handle = ports.get(port.index).ok_or_else(|| {
            Error::Device(format!("MIDI output device {} not found", port.index))
        })?;

        // Ports can come and go between listing and connecting.
        let name = midi_output.port_name(handle)?;
        if name != port.name {
            return Err(Error::Device(format!(
                "MIDI output device {} is now '{}', expected '{}'",
                port.index, name, port.name
            )));
        }

        let connection = midi_output.connect(handle, &format!("{client_name}-out"))?;
        info!("Connected MIDI output '{}'", name);

        Ok(Box::new(MidirClient { name, connection }))
    }
}

pub struct MidirClient {
    name: String,
    connection: MidiOutputConnection,
}

impl OutputClient for MidirClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &ShortMessage) -> Result<()> {
        self.connection
            .send(&message.bytes)
            .map_err(|e| Error::TransportSend {
                client: self.name.clone(),
                reason: e.to_string(),
            })
    }

    fn close(self: Box<Self>) {
        debug!("Closing MIDI output '{}'", self.name);
        self.connection.close();
    }
}
