//! Integration tests for cantus-midi-io.
//!
//! Whole pipeline from composition to captured messages, without hardware.

use cantus_midi::message::{ALL_SOUND_OFF, RESET_ALL_CONTROLLERS};
use cantus_midi::{chord, note, resolve, BendRange, Composition, ShortMessage, Voice};
use cantus_midi_io::{
    CaptureBackend, ClientRegistry, Error, ImportOptions, ParsedMidiFile, RunReport, Scheduler,
};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn scheduler() -> Scheduler {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    Scheduler::new().panic_delay(Duration::ZERO)
}

fn play(comp: &Composition, backend: &CaptureBackend, synths: &[String], ports: usize) -> RunReport {
    let events = resolve(comp, ports, BendRange::default()).unwrap();
    let clients = ClientRegistry::connect(backend, synths, ports, "test").unwrap();
    scheduler().play(events, clients).unwrap()
}

// ---------------------------------------------------------------------------
// 1. Timing
// ---------------------------------------------------------------------------

/// Overlapping notes on one channel: offs fire at onset + duration and the
/// first off never precedes the second on.
#[test]
fn test_two_note_timing() {
    let mut comp = Composition::new();
    comp.push(note(60u8, 0.0, 1.0, 1, 100))
        .push(note(64u8, 0.5, 1.0, 1, 100));
    let backend = CaptureBackend::with_port_count(1);

    let start = Instant::now();
    let report = play(&comp, &backend, &[], 1);
    assert_eq!(report.notes, 2);

    let sent = backend.log().messages();
    let at = |pred: &dyn Fn(&ShortMessage) -> bool| {
        sent.iter()
            .find(|m| pred(&m.message))
            .map(|m| m.at.duration_since(start))
            .unwrap()
    };

    let on_60 = at(&|m: &ShortMessage| m.is_note_on() && m.bytes[1] == 60);
    let on_64 = at(&|m: &ShortMessage| m.is_note_on() && m.bytes[1] == 64);
    let off_60 = at(&|m: &ShortMessage| m.is_note_off() && m.bytes[1] == 60);
    let off_64 = at(&|m: &ShortMessage| m.is_note_off() && m.bytes[1] == 64);

    let jitter = Duration::from_millis(100);
    assert!(on_60 < jitter);
    assert!(on_64 >= Duration::from_millis(500) && on_64 < Duration::from_millis(500) + jitter);
    assert!(off_60 >= Duration::from_secs(1) && off_60 < Duration::from_secs(1) + jitter);
    assert!(off_64 >= Duration::from_millis(1500));
    assert!(on_64 <= off_60);

    // Both equal-tempered notes share the requested channel.
    assert!(sent.iter().all(|m| m.message.channel() == 0));
    assert!(report.table_is_free());
}

// ---------------------------------------------------------------------------
// 2. Interruption
// ---------------------------------------------------------------------------

/// Cancelling mid-run silences every channel of every client exactly once.
#[test]
fn test_interrupt_panics_each_channel_once() {
    let backend = CaptureBackend::new(["Synth A 1", "Synth B 1", "Synth A 2", "Synth B 2"]);
    let synths = vec!["synth a".to_string(), "synth b".to_string()];
    let mut comp = Composition::new();
    comp.push(chord([60.0, 60.5, 61.25], 0.0, 10.0, 1, 100))
        .push(note(72u8, 5.0, 1.0, 17, 100));

    let events = resolve(&comp, 2, BendRange::default()).unwrap();
    let clients = ClientRegistry::connect(&backend, &synths, 2, "test").unwrap();
    let handle = scheduler().schedule(events, clients).unwrap();

    let token = handle.cancel_token();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        token.cancel();
    });
    let report = handle.wait().unwrap();
    canceller.join().unwrap();

    assert!(report.interrupted);
    assert!(report.panicked);
    assert_eq!(report.notes, 3);
    assert!(report.table_is_free());
    assert_eq!(report.usage_after.len(), 32);

    for port in 0..4 {
        let sent = backend.log().for_port(port);
        for channel in 0..16u8 {
            let count = |controller: u8| {
                sent.iter()
                    .filter(|m| {
                        m.message.channel() == channel && m.message.is_control_change(controller)
                    })
                    .count()
            };
            assert_eq!(count(ALL_SOUND_OFF), 1, "port {port} channel {channel}");
            assert_eq!(count(RESET_ALL_CONTROLLERS), 1, "port {port} channel {channel}");
        }
        // The note on the second logical port never started.
        assert!(!sent.iter().any(|m| m.message.is_note_on() && m.message.bytes[1] == 72));
    }
}

// ---------------------------------------------------------------------------
// 3. Client failure isolation
// ---------------------------------------------------------------------------

#[test]
fn test_failed_client_does_not_stop_others() {
    let backend = CaptureBackend::new(["Good Synth", "Bad Synth"]);
    backend.fail_after(1, 1);
    let synths = vec!["good".to_string(), "bad".to_string()];
    let comp: Composition = [Voice::sequence([60u8, 62, 64], &[0.02, 0.02, 0.02], 0.0, 1, 100)]
        .into_iter()
        .map(Into::into)
        .collect();

    let report = play(&comp, &backend, &synths, 1);

    assert_eq!(report.failed_clients, vec!["Bad Synth".to_string()]);
    assert!(!report.panicked);
    assert_eq!(backend.log().for_port(0).len(), 6);
    assert_eq!(backend.log().for_port(1).len(), 1);
}

#[test]
fn test_all_clients_failing_ends_run() {
    let backend = CaptureBackend::with_port_count(1);
    backend.fail_after(0, 0);
    let mut comp = Composition::new();
    comp.push(note(60u8, 0.0, 0.01, 1, 100))
        .push(note(62u8, 30.0, 1.0, 1, 100));

    let events = resolve(&comp, 1, BendRange::default()).unwrap();
    let clients = ClientRegistry::connect(&backend, &[], 1, "test").unwrap();

    let start = Instant::now();
    let result = scheduler().play(events, clients);
    assert!(start.elapsed() < Duration::from_secs(5));
    match result {
        Err(Error::AllClientsFailed(clients)) => assert_eq!(clients, vec!["Capture 0"]),
        other => panic!("expected AllClientsFailed, got {other:?}"),
    }
    assert!(backend.log().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Microtonal playback
// ---------------------------------------------------------------------------

/// A microtonal chord spreads over channels, each bent before it sounds and
/// reset after it stops.
#[test]
fn test_microtonal_chord_bends() {
    let backend = CaptureBackend::with_port_count(1);
    let mut comp = Composition::new();
    comp.push(chord([60.0, 60.25, 60.5], 0.0, 0.05, 1, 100));

    play(&comp, &backend, &[], 1);
    let sent: Vec<ShortMessage> = backend.log().messages().iter().map(|m| m.message).collect();

    let bend_on = |channel: u8| {
        sent.iter()
            .find(|m| m.is_pitch_bend() && m.channel() == channel)
            .and_then(|m| m.bend_value())
    };
    assert_eq!(bend_on(0), None);
    assert_eq!(bend_on(1), Some(8192 + 1024));
    assert_eq!(bend_on(2), Some(8192 + 2048));

    for channel in [1u8, 2] {
        let on = sent
            .iter()
            .position(|m| m.is_note_on() && m.channel() == channel)
            .unwrap();
        let bend = sent
            .iter()
            .position(|m| m.is_pitch_bend() && m.channel() == channel)
            .unwrap();
        let reset = sent
            .iter()
            .rposition(|m| m.is_pitch_bend() && m.channel() == channel)
            .unwrap();
        assert!(bend < on);
        assert!(reset > on);
        assert_eq!(sent[reset].bend_value(), Some(8192));
    }
}

/// Consecutive microtones reuse a single channel.
#[test]
fn test_sequential_microtones_reuse_channel() {
    let backend = CaptureBackend::with_port_count(1);
    let pitches: Vec<f64> = (0..20).map(|i| 60.5 + i as f64).collect();
    let comp: Composition = [Voice::sequence(pitches, &[0.0078125; 20], 0.0, 4, 100)]
        .into_iter()
        .map(Into::into)
        .collect();

    let report = play(&comp, &backend, &[], 1);
    assert_eq!(report.notes, 20);
    assert!(backend.log().messages().iter().all(|m| m.message.channel() == 3));
}

// ---------------------------------------------------------------------------
// 5. Files
// ---------------------------------------------------------------------------

#[test]
fn test_export_then_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piece.mid");

    let mut comp = Composition::new();
    comp.push(chord([60.0, 63.5], 0.0, 1.0, 1, 100))
        .push(Voice::sequence([70.25, 72.0], &[0.5, 0.5], 1.0, 5, 90))
        .push(Voice::sequence([40u8], &[2.0], 0.0, 9, 70));
    let events = resolve(&comp, 1, BendRange::default()).unwrap();
    cantus_midi_io::save_smf(&path, &events).unwrap();

    let parsed = ParsedMidiFile::load(&path, ImportOptions::default()).unwrap();
    assert_eq!(parsed.voices.len(), 3);
    let counts: Vec<usize> = parsed.voices.iter().map(|v| v.notes().count()).collect();
    assert_eq!(counts, vec![2, 2, 1]);
}
