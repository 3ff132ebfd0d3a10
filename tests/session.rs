//! Session tests: play, export, interrupt and shared outputs through the
//! capture backend.

use approx::assert_relative_eq;
use cantus::midi::message::{ALL_SOUND_OFF, RESET_ALL_CONTROLLERS};
use cantus::midi::Error as MidiError;
use cantus::midi_io::Error as MidiIoError;
use cantus::prelude::*;
use cantus::{parse_composition, CaptureBackend, ImportOptions, ParsedMidiFile, PitchSpec};
use std::thread;
use std::time::{Duration, Instant};

fn capture_session() -> Session {
    Session::builder()
        .capture()
        .panic_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn short_piece() -> Composition {
    let mut piece = Composition::new();
    piece
        .push(note(60u8, 0.0, 0.05, 1, 100))
        .push(note(64.5, 0.02, 0.05, 1, 100));
    piece
}

fn count_panic_messages(session: &Session) -> (usize, usize) {
    let sent = session.capture_log().unwrap().messages();
    let count = |controller: u8| {
        sent.iter()
            .filter(|m| m.message.is_control_change(controller))
            .count()
    };
    (count(ALL_SOUND_OFF), count(RESET_ALL_CONTROLLERS))
}

// ---------------------------------------------------------------------------
// Play and export
// ---------------------------------------------------------------------------

#[test]
fn test_play_sends_notes_and_frees_channels() {
    let session = capture_session();
    let outcome = session.process(&short_piece(), Destination::Play).unwrap();

    let Outcome::Played(report) = outcome else {
        panic!("expected a played outcome");
    };
    assert_eq!(report.notes, 2);
    assert!(!report.interrupted);
    assert!(!report.panicked);
    assert!(report.table_is_free());

    let sent = session.capture_log().unwrap().messages();
    assert_eq!(sent.iter().filter(|m| m.message.is_note_on()).count(), 2);
    assert_eq!(sent.iter().filter(|m| m.message.is_note_off()).count(), 2);
    assert_eq!(count_panic_messages(&session), (0, 0));
}

#[test]
fn test_export_then_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piece.mid");
    let session = capture_session();

    let mut piece = short_piece();
    piece.push(Voice::sequence([72.25, 71.75, 72.0], &[0.5, 0.5, 1.0], 0.0, 2, 90));

    let outcome = session
        .process(&piece, Destination::File(path.clone()))
        .unwrap();
    assert_eq!(outcome, Outcome::Exported { path: path.clone(), notes: 5 });
    assert!(session.capture_log().unwrap().is_empty());

    let parsed = ParsedMidiFile::load(&path, ImportOptions::default()).unwrap();
    assert_eq!(parsed.voices.len(), 2);
    assert_eq!(parsed.voices[0].notes().count(), 2);
    assert_eq!(parsed.voices[1].notes().count(), 3);

    let melody: Vec<Note> = parsed.voices[1].notes().collect();
    for (note, (pitch, onset)) in melody.iter().zip([(72.25, 0.0), (71.75, 0.5), (72.0, 1.0)]) {
        let PitchSpec::Key(key) = note.pitch else {
            panic!("imported pitches are key numbers");
        };
        assert_relative_eq!(key, pitch, epsilon = 1e-3);
        assert_relative_eq!(note.onset, onset, epsilon = 1e-3);
    }
}

#[test]
fn test_zero_frequency_sends_nothing() {
    let session = capture_session();
    let mut piece = short_piece();
    piece.push(Note::new(PitchSpec::Hz { hz: 0.0 }).onset(0.5));

    let err = session.process(&piece, Destination::Play).unwrap_err();
    assert!(matches!(err, Error::Midi(MidiError::ZeroFrequency)));
    assert!(session.capture_log().unwrap().is_empty());
}

#[test]
fn test_too_many_microtones_fail_before_playback() {
    let session = capture_session();
    let mut piece = Composition::new();
    let pitches: Vec<f64> = (0..17).map(|i| 60.5 + i as f64).collect();
    piece.push(chord(pitches, 0.0, 1.0, 1, 100));

    let err = session.process(&piece, Destination::Play).unwrap_err();
    assert!(matches!(
        err,
        Error::Midi(MidiError::NoChannelAvailable { .. })
    ));
    assert!(session.capture_log().unwrap().is_empty());
}

#[test]
fn test_all_outputs_failing_is_an_error() {
    let backend = CaptureBackend::with_port_count(1);
    backend.fail_after(0, 0);
    let session = Session::builder()
        .backend(backend.clone())
        .panic_delay(Duration::ZERO)
        .build()
        .unwrap();

    let err = session.process(&short_piece(), Destination::Play).unwrap_err();
    assert!(matches!(
        err,
        Error::MidiIo(MidiIoError::AllClientsFailed(ref clients)) if clients.len() == 1
    ));
    assert!(!err.is_interrupted());
    assert!(backend.log().is_empty());
}

// ---------------------------------------------------------------------------
// Interrupt
// ---------------------------------------------------------------------------

#[test]
fn test_interrupt_before_run_cancels_it() {
    let session = capture_session();
    let mut piece = Composition::new();
    piece.push(note(60u8, 1.0, 1.0, 1, 100));

    session.interrupt().trigger();
    let err = session.process(&piece, Destination::Play).unwrap_err();
    assert!(err.is_interrupted());

    assert_eq!(count_panic_messages(&session), (16, 16));
    assert_eq!(session.capture_log().unwrap().len(), 32);

    // The trigger applies to one run only.
    session.capture_log().unwrap().clear();
    assert!(!session.interrupt().is_triggered());
    let mut quick = Composition::new();
    quick.push(note(60u8, 0.0, 0.01, 1, 100));
    assert!(session.process(&quick, Destination::Play).is_ok());
}

#[test]
fn test_interrupt_during_run() {
    let session = capture_session();
    let mut piece = Composition::new();
    piece
        .push(chord([60.0, 60.5, 61.25], 0.0, 10.0, 1, 100))
        .push(note(72u8, 5.0, 1.0, 1, 100));

    let interrupt = session.interrupt();
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        interrupt.trigger();
    });

    let start = Instant::now();
    let err = session.process(&piece, Destination::Play).unwrap_err();
    trigger.join().unwrap();

    assert!(err.is_interrupted());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(count_panic_messages(&session), (16, 16));

    let sent = session.capture_log().unwrap().messages();
    assert!(!sent
        .iter()
        .any(|m| m.message.is_note_on() && m.message.bytes[1] == 72));
}

// ---------------------------------------------------------------------------
// Shared outputs
// ---------------------------------------------------------------------------

#[test]
fn test_keep_open_reuses_clients_across_runs() {
    let session = Session::builder()
        .synth("fluid")
        .capture()
        .panic_delay(Duration::ZERO)
        .keep_open()
        .build()
        .unwrap();

    session.process(&short_piece(), Destination::Play).unwrap();
    session.process(&short_piece(), Destination::Play).unwrap();

    let sent = session.capture_log().unwrap().messages();
    assert_eq!(sent.iter().filter(|m| m.message.is_note_on()).count(), 4);
    session.close();
}

#[test]
fn test_keep_open_silences_on_resolve_error() {
    let session = Session::builder()
        .capture()
        .panic_delay(Duration::ZERO)
        .keep_open()
        .build()
        .unwrap();

    let mut piece = Composition::new();
    piece.push(note(60u8, 0.0, 1.0, 17, 100));
    let err = session.process(&piece, Destination::Play).unwrap_err();

    assert!(matches!(
        err,
        Error::Midi(MidiError::ChannelOutOfRange { channel: 17, .. })
    ));
    assert_eq!(count_panic_messages(&session), (16, 16));
    session.close();
}

// ---------------------------------------------------------------------------
// Composition files
// ---------------------------------------------------------------------------

#[test]
fn test_json_composition_plays() {
    let piece = parse_composition(
        r#"[
            {"note": {"pitch": "c4", "onset": 0.0, "dur": 0.02}},
            {"chord": {"pitches": [64, 64.5, {"hz": 440.0}], "onset": 0.01, "duration": 0.02, "vel": 80}},
            {"voice": [{"note": {"pitch": 72.25, "onset": 0.0, "duration": 0.02, "chnl": 2}}]}
        ]"#,
    )
    .unwrap();
    assert_eq!(piece.note_count(), 5);
    assert_eq!(piece.track_count(), 2);

    let session = capture_session();
    let Outcome::Played(report) = session.process(&piece, Destination::Play).unwrap() else {
        panic!("expected a played outcome");
    };
    assert_eq!(report.notes, 5);
    assert!(report.table_is_free());
}
