//! Open output clients, one per synth per port.

use crate::error::{Error, Result};
use crate::transport::{OutputBackend, OutputClient, OutputPort};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Identifies a client by the port it serves and the synth it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId {
    pub port: usize,
    pub synth: usize,
}

/// Output clients indexed by port, then synth.
///
/// Every port of the run fans out to one client per configured synth.
pub struct ClientRegistry {
    synths: Vec<String>,
    clients: Vec<Vec<Box<dyn OutputClient>>>,
}

/// A registry kept open across runs.
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

impl ClientRegistry {
    /// Opens `port_count` ports for each synth pattern.
    ///
    /// Each pattern takes the first `port_count` output ports whose names
    /// contain it (case-insensitive), in listing order. No patterns means a
    /// single synth matching any port.
    pub fn connect(
        backend: &dyn OutputBackend,
        synths: &[String],
        port_count: usize,
        client_name: &str,
    ) -> Result<Self> {
        if port_count == 0 {
            return Err(Error::InvalidConfig("port count must be at least 1".into()));
        }
        let synths: Vec<String> = if synths.is_empty() {
            vec![String::new()]
        } else {
            synths.to_vec()
        };

        let available = backend.output_ports()?;
        debug!("{} MIDI output ports available", available.len());

        let mut clients: Vec<Vec<Box<dyn OutputClient>>> =
            (0..port_count).map(|_| Vec::with_capacity(synths.len())).collect();

        for pattern in &synths {
            let matching: Vec<&OutputPort> =
                available.iter().filter(|p| p.matches(pattern)).collect();
            if matching.len() < port_count {
                return Err(Error::PortNotFound {
                    pattern: pattern.clone(),
                    found: matching.len(),
                    needed: port_count,
                });
            }
            for (port, output) in matching.into_iter().take(port_count).enumerate() {
                clients[port].push(backend.connect(output, client_name)?);
            }
        }

        info!(
            "Opened {} output clients ({} synths x {} ports)",
            synths.len() * port_count,
            synths.len(),
            port_count
        );
        Ok(Self { synths, clients })
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn port_count(&self) -> usize {
        self.clients.len()
    }

    pub fn synth_count(&self) -> usize {
        self.synths.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.iter().map(Vec::len).sum()
    }

    pub fn ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.iter().enumerate().flat_map(|(port, synths)| {
            (0..synths.len()).map(move |synth| ClientId { port, synth })
        })
    }

    /// Clients serving `port`, one per synth.
    pub fn clients_mut(&mut self, port: usize) -> &mut [Box<dyn OutputClient>] {
        self.clients
            .get_mut(port)
            .map(Vec::as_mut_slice)
            .unwrap_or_default()
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Box<dyn OutputClient>> {
        self.clients.get_mut(id.port)?.get_mut(id.synth)
    }

    pub fn name(&self, id: ClientId) -> Option<&str> {
        self.clients
            .get(id.port)?
            .get(id.synth)
            .map(|client| client.name())
    }

    pub fn close(self) {
        for client in self.clients.into_iter().flatten() {
            client.close();
        }
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<Vec<&str>> = self
            .clients
            .iter()
            .map(|port| port.iter().map(|c| c.name()).collect())
            .collect();
        f.debug_struct("ClientRegistry")
            .field("synths", &self.synths)
            .field("clients", &names)
            .finish()
    }
}
