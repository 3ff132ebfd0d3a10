//! Emergency silence.

use crate::registry::{ClientId, ClientRegistry};
use cantus_midi::{ShortMessage, CHANNELS_PER_PORT};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Pause between channels during a panic on real hardware.
pub const DEFAULT_PANIC_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanicReport {
    pub messages_sent: usize,
    /// Clients that stopped accepting messages part way through.
    pub failed_clients: Vec<String>,
}

/// Sends all-sound-off then reset-all-controllers on every channel of every
/// client, sleeping `delay` after each channel.
///
/// A client that fails a send is skipped for the rest of the sequence; the
/// other clients are still silenced.
pub fn panic(registry: &mut ClientRegistry, delay: Duration) -> PanicReport {
    panic_skipping(registry, delay, &HashSet::new())
}

/// [`panic`] for every client except those in `skip`.
pub fn panic_skipping(
    registry: &mut ClientRegistry,
    delay: Duration,
    skip: &HashSet<ClientId>,
) -> PanicReport {
    let ids: Vec<ClientId> = registry.ids().filter(|id| !skip.contains(id)).collect();
    info!("Panic: silencing {} output clients", ids.len());
    let mut report = PanicReport::default();

    for id in ids {
        let Some(client) = registry.client_mut(id) else {
            continue;
        };
        'channels: for channel in 0..CHANNELS_PER_PORT as u8 {
            for message in [
                ShortMessage::all_sound_off(channel),
                ShortMessage::reset_all_controllers(channel),
            ] {
                if let Err(e) = client.send(&message) {
                    warn!("Panic send to '{}' failed: {}", client.name(), e);
                    report.failed_clients.push(client.name().to_string());
                    break 'channels;
                }
                report.messages_sent += 1;
            }
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CaptureBackend;
    use cantus_midi::message::{ALL_SOUND_OFF, RESET_ALL_CONTROLLERS};

    #[test]
    fn test_panic_covers_every_channel_of_every_client() {
        let backend = CaptureBackend::with_port_count(2);
        let synths = vec!["capture".to_string()];
        let mut registry = ClientRegistry::connect(&backend, &synths, 2, "test").unwrap();

        let report = panic(&mut registry, Duration::ZERO);
        assert_eq!(report.messages_sent, 2 * 16 * 2);
        assert!(report.failed_clients.is_empty());

        for port in 0..2 {
            let sent = backend.log().for_port(port);
            assert_eq!(sent.len(), 32);
            for channel in 0..16u8 {
                let on_channel: Vec<_> = sent
                    .iter()
                    .filter(|m| m.message.channel() == channel)
                    .collect();
                assert_eq!(on_channel.len(), 2);
                assert!(on_channel[0].message.is_control_change(ALL_SOUND_OFF));
                assert!(on_channel[1].message.is_control_change(RESET_ALL_CONTROLLERS));
            }
        }
    }

    #[test]
    fn test_panic_continues_past_failed_client() {
        let backend = CaptureBackend::with_port_count(2);
        backend.fail_after(0, 3);
        let mut registry = ClientRegistry::connect(&backend, &[], 2, "test").unwrap();

        let report = panic(&mut registry, Duration::ZERO);
        assert_eq!(report.failed_clients, vec!["Capture 0".to_string()]);
        assert_eq!(backend.log().for_port(0).len(), 3);
        assert_eq!(backend.log().for_port(1).len(), 32);
        assert_eq!(report.messages_sent, 35);
    }

    #[test]
    fn test_panic_skips_given_clients() {
        let backend = CaptureBackend::with_port_count(2);
        let mut registry = ClientRegistry::connect(&backend, &[], 2, "test").unwrap();
        let skip = HashSet::from([ClientId { port: 1, synth: 0 }]);

        let report = panic_skipping(&mut registry, Duration::ZERO, &skip);
        assert_eq!(report.messages_sent, 32);
        assert!(backend.log().for_port(1).is_empty());
    }
}
