//! Standard MIDI File export and import via `midly`.
//!
//! Exported files are format 1 at 60 BPM with 960 ticks per beat, so one
//! beat is one second and onsets in seconds map straight to ticks. Each
//! event lands on the track recorded at resolution and on the channel it was
//! resolved to; microtonal notes carry their bend and bend reset.

use crate::error::{Error, Result};
use cantus_midi::message::{BEND_CENTER, PITCH_BEND};
use cantus_midi::{BendRange, LogicalChannel, Note, PitchSpec, ResolvedEvent, Voice, VoiceEvent};
use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent,
    TrackEventKind,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tracing::{debug, info};

pub const TICKS_PER_BEAT: u16 = 960;
pub const EXPORT_BPM: f64 = 60.0;

const MICROS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Debug, Clone, Copy)]
struct Stamped {
    tick: u64,
    // Offs sort before ons at the same tick, bends before their note-on.
    rank: (u8, usize, u8),
    channel: u8,
    message: MidiMessage,
}

fn ticks(at: std::time::Duration) -> u64 {
    (at.as_secs_f64() * TICKS_PER_BEAT as f64 * EXPORT_BPM / 60.0).round() as u64
}

fn to_midly(message: &cantus_midi::ShortMessage) -> MidiMessage {
    let [_, data1, data2] = message.bytes;
    match message.status() {
        PITCH_BEND => MidiMessage::PitchBend {
            bend: PitchBend(u14::new(data1 as u16 | ((data2 as u16) << 7))),
        },
        _ if message.is_note_on() => MidiMessage::NoteOn {
            key: u7::new(data1),
            vel: u7::new(data2),
        },
        _ => MidiMessage::NoteOff {
            key: u7::new(data1),
            vel: u7::new(data2),
        },
    }
}

fn stamp(events: &[ResolvedEvent]) -> Vec<Vec<Stamped>> {
    let track_count = events.iter().map(|e| e.track + 1).max().unwrap_or(1);
    let mut tracks: Vec<Vec<Stamped>> = vec![Vec::new(); track_count];

    for event in events {
        let channel = event.channel.channel;
        let on = ticks(event.onset);
        let off = ticks(event.end());
        let mut push = |tick: u64, rank: (u8, usize, u8), message: &cantus_midi::ShortMessage| {
            tracks[event.track].push(Stamped {
                tick,
                rank,
                channel,
                message: to_midly(message),
            });
        };

        let msgs = &event.messages;
        if let Some(pair) = msgs.bend {
            push(on, (1, event.seq, 0), &pair.bend);
        }
        push(on, (1, event.seq, 1), &msgs.note_on);
        push(off, (0, event.seq, 0), &msgs.note_off);
        if let Some(pair) = msgs.bend {
            push(off, (0, event.seq, 1), &pair.reset);
        }
    }

    for track in &mut tracks {
        track.sort_by_key(|s| (s.tick, s.rank));
    }
    tracks
}

/// Encodes resolved events as a Standard MIDI File.
pub fn write_smf(events: &[ResolvedEvent]) -> Result<Vec<u8>> {
    let tempo = u24::new((MICROS_PER_MINUTE / EXPORT_BPM) as u32);
    let mut tracks: Vec<Track> = Vec::new();

    for (index, stamped) in stamp(events).into_iter().enumerate() {
        let mut track = Vec::with_capacity(stamped.len() + 2);
        if index == 0 {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo)),
            });
        }
        let mut last = 0u64;
        for s in stamped {
            let delta = u32::try_from(s.tick - last)
                .ok()
                .filter(|d| *d <= u28::max_value().as_int())
                .ok_or_else(|| Error::InvalidConfig("composition too long for a MIDI file".into()))?;
            track.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi {
                    channel: u4::new(s.channel),
                    message: s.message,
                },
            });
            last = s.tick;
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        tracks.push(track);
    }

    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(u15::new(TICKS_PER_BEAT))),
        tracks,
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

pub fn save_smf(path: impl AsRef<Path>, events: &[ResolvedEvent]) -> Result<()> {
    let path = path.as_ref();
    let bytes = write_smf(events)?;
    std::fs::write(path, &bytes)?;
    info!(
        "Wrote {} notes to {} ({} bytes)",
        events.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// How imported timings and bends are interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportOptions {
    /// Multiplies every onset and duration.
    pub time_scale: f64,
    /// Used to turn a channel's current bend back into a fractional pitch.
    pub bend_range: BendRange,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            bend_range: BendRange::default(),
        }
    }
}

/// A MIDI file read back as one voice per track that has notes.
#[derive(Debug, Clone)]
pub struct ParsedMidiFile {
    pub voices: Vec<Voice>,
    pub ticks_per_beat: u16,
    /// First tempo found, or 120 if the file has none.
    pub tempo_bpm: f64,
}

struct Sounding {
    onset: f64,
    pitch: f64,
    velocity: u8,
}

impl ParsedMidiFile {
    pub fn load(path: impl AsRef<Path>, options: ImportOptions) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data, options)
    }

    pub fn parse(data: &[u8], options: ImportOptions) -> Result<Self> {
        if !options.time_scale.is_finite() || options.time_scale <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "time scale must be positive, got {}",
                options.time_scale
            )));
        }

        let smf = Smf::parse(data)?;
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(_, _) => return Err(Error::MidiUnsupportedTiming),
        };
        let tempo_bpm = smf
            .tracks
            .iter()
            .find_map(|track| Self::extract_tempo(track))
            .unwrap_or(120.0);
        let secs_per_tick = 60.0 / tempo_bpm / ticks_per_beat as f64 * options.time_scale;

        debug!(
            "Parsing MIDI file: {} tracks, {} ticks per beat, {} BPM",
            smf.tracks.len(),
            ticks_per_beat,
            tempo_bpm
        );

        let voices: Vec<Voice> = smf
            .tracks
            .iter()
            .map(|track| Self::parse_track(track, secs_per_tick, options.bend_range))
            .filter(|voice| !voice.events.is_empty())
            .collect();

        Ok(Self {
            voices,
            ticks_per_beat,
            tempo_bpm,
        })
    }

    fn parse_track(track: &Track, secs_per_tick: f64, bend_range: BendRange) -> Voice {
        let mut tick = 0u64;
        let mut bends = [BEND_CENTER; 16];
        let mut sounding: HashMap<(u8, u8), VecDeque<Sounding>> = HashMap::new();
        let mut notes: Vec<(f64, usize, Note)> = Vec::new();

        for event in track.iter() {
            tick += event.delta.as_int() as u64;
            let now = tick as f64 * secs_per_tick;
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();

            match message {
                MidiMessage::PitchBend { bend } => bends[channel as usize] = bend.0.as_int(),
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    let offset = (bends[channel as usize] as f64 - BEND_CENTER as f64)
                        / BEND_CENTER as f64
                        * bend_range.semitones();
                    sounding
                        .entry((channel, key.as_int()))
                        .or_default()
                        .push_back(Sounding {
                            onset: now,
                            pitch: (key.as_int() as f64 + offset).clamp(0.0, 127.0),
                            velocity: vel.as_int(),
                        });
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let Some(started) = sounding
                        .get_mut(&(channel, key.as_int()))
                        .and_then(VecDeque::pop_front)
                    else {
                        continue;
                    };
                    let note = Note {
                        pitch: PitchSpec::Key(started.pitch),
                        onset: started.onset,
                        duration: now - started.onset,
                        channel: LogicalChannel(channel as u16 + 1),
                        velocity: started.velocity,
                    };
                    let order = notes.len();
                    notes.push((started.onset, order, note));
                }
                _ => {}
            }
        }

        notes.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Voice::new(
            notes
                .into_iter()
                .filter(|(_, _, note)| note.duration > 0.0)
                .map(|(_, _, note)| VoiceEvent::Note(note))
                .collect(),
        )
    }

    fn extract_tempo(track: &Track) -> Option<f64> {
        track.iter().find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                Some(MICROS_PER_MINUTE / tempo.as_int() as f64)
            }
            _ => None,
        })
    }
}
