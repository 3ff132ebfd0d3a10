//! Hardware tests against a real or virtual MIDI output port.
//!
//! Needs at least one output port (an IAC bus, `snd-virmidi`, a software synth).
//! All tests are `#[ignore]` so CI doesn't fail without hardware.
//!
//! Run with:
//!   cargo test -p cantus-midi-io --test hardware -- --ignored --test-threads=1

#![cfg(feature = "midi-io")]

use cantus_midi::{chord, resolve, BendRange, Composition};
use cantus_midi_io::{ClientRegistry, MidirBackend, OutputBackend, Scheduler};
use std::time::Duration;

#[test]
#[ignore]
fn test_list_output_ports() {
    let ports = MidirBackend::new().output_ports().unwrap();
    for port in &ports {
        println!("{}: {}", port.index, port.name);
    }
    assert!(!ports.is_empty(), "no MIDI output ports found");
}

#[test]
#[ignore]
fn test_play_microtonal_chord() {
    let backend = MidirBackend::new();
    let clients = ClientRegistry::connect(&backend, &[], 1, "cantus-test").unwrap();

    let mut comp = Composition::new();
    comp.push(chord([60.0, 63.5, 67.0, 70.25], 0.0, 0.5, 1, 90));
    let events = resolve(&comp, 1, BendRange::default()).unwrap();

    let report = Scheduler::new()
        .panic_delay(Duration::from_millis(5))
        .play(events, clients)
        .unwrap();
    assert_eq!(report.notes, 4);
    assert!(report.failed_clients.is_empty());
}
