//! In-memory output backend.

use crate::error::{Error, Result};
use crate::transport::{OutputBackend, OutputClient, OutputPort};
use cantus_midi::ShortMessage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedMessage {
    /// Index of the capture port the message went to.
    pub port: usize,
    pub message: ShortMessage,
    pub at: Instant,
}

/// Shared record of everything sent through a [`CaptureBackend`].
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    messages: Arc<Mutex<Vec<CapturedMessage>>>,
}

impl CaptureLog {
    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.messages.lock().clone()
    }

    pub fn for_port(&self, port: usize) -> Vec<CapturedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.port == port)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    fn push(&self, message: CapturedMessage) {
        self.messages.lock().push(message);
    }
}

/// Backend with a fixed list of named ports that records every message.
///
/// Sends to a port can be made to fail after a number of successes, to
/// exercise client failure handling without hardware.
#[derive(Debug, Clone)]
pub struct CaptureBackend {
    ports: Vec<String>,
    log: CaptureLog,
    fail_after: Arc<Mutex<HashMap<usize, usize>>>,
}

impl CaptureBackend {
    pub fn new<S: Into<String>>(ports: impl IntoIterator<Item = S>) -> Self {
        Self {
            ports: ports.into_iter().map(Into::into).collect(),
            log: CaptureLog::default(),
            fail_after: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `count` ports named `Capture 0`, `Capture 1`, ...
    pub fn with_port_count(count: usize) -> Self {
        Self::new((0..count).map(|i| format!("Capture {}", i)))
    }

    pub fn log(&self) -> CaptureLog {
        self.log.clone()
    }

    /// Makes every send to `port` fail once `successes` sends went through.
    pub fn fail_after(&self, port: usize, successes: usize) {
        self.fail_after.lock().insert(port, successes);
    }
}

impl OutputBackend for CaptureBackend {
    fn output_ports(&self) -> Result<Vec<OutputPort>> {
        Ok(self
            .ports
            .iter()
            .enumerate()
            .map(|(index, name)| OutputPort {
                index,
                name: name.clone(),
            })
            .collect())
    }

    fn connect(&self, port: &OutputPort, _client_name: &str) -> Result<Box<dyn OutputClient>> {
        if self.ports.get(port.index) != Some(&port.name) {
            return Err(Error::Device(format!(
                "Capture port {} '{}' does not exist",
                port.index, port.name
            )));
        }
        Ok(Box::new(CaptureClient {
            port: port.index,
            name: port.name.clone(),
            log: self.log.clone(),
            fail_after: Arc::clone(&self.fail_after),
            sent: 0,
        }))
    }
}

struct CaptureClient {
    port: usize,
    name: String,
    log: CaptureLog,
    fail_after: Arc<Mutex<HashMap<usize, usize>>>,
    sent: usize,
}

impl OutputClient for CaptureClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &ShortMessage) -> Result<()> {
        if let Some(&limit) = self.fail_after.lock().get(&self.port) {
            if self.sent >= limit {
                return Err(Error::TransportSend {
                    client: self.name.clone(),
                    reason: "capture port configured to fail".to_string(),
                });
            }
        }
        self.sent += 1;
        self.log.push(CapturedMessage {
            port: self.port,
            message: *message,
            at: Instant::now(),
        });
        Ok(())
    }
}
