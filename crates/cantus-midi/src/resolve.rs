//! Turns a composition into a flat, time-ordered list of resolved events.
//!
//! Resolution replays the run against a private [`ChannelAllocator`]: notes
//! are visited in onset order and every note that has ended by the next onset
//! is released first. The channel each note gets here is the channel the
//! scheduler will reserve for it at playback time, and every pitch, channel,
//! timing and allocation error surfaces before a single message is sent.

use crate::allocator::{ChannelAllocator, Tuning};
use crate::channel::PhysicalChannel;
use crate::composition::{Composition, Note};
use crate::error::{Error, Result};
use crate::message::{BendRange, NoteMessages};
use crate::pitch::Pitch;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

/// A note with its channel decided and its messages compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvent {
    pub pitch: Pitch,
    pub tuning: Tuning,
    pub velocity: u8,
    /// Channel the note asked for.
    pub requested: PhysicalChannel,
    /// Channel the note plays on.
    pub channel: PhysicalChannel,
    pub onset: Duration,
    pub duration: Duration,
    /// Export track: 0 for loose notes and chords, then one per voice.
    pub track: usize,
    /// Position of the note in the flattened composition.
    pub seq: usize,
    pub messages: NoteMessages,
}

impl ResolvedEvent {
    #[inline]
    pub fn end(&self) -> Duration {
        self.onset.saturating_add(self.duration)
    }

    #[inline]
    pub fn was_reassigned(&self) -> bool {
        self.requested != self.channel
    }
}

struct Pending {
    pitch: Pitch,
    requested: PhysicalChannel,
    velocity: u8,
    onset: Duration,
    duration: Duration,
    track: usize,
    seq: usize,
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::InvalidTiming(format!("{what} {value} is not a non-negative number of seconds")))
}

fn validate(note: &Note, track: usize, seq: usize, port_count: usize) -> Result<Pending> {
    if note.velocity > 127 {
        return Err(Error::InvalidVelocity(note.velocity as u16));
    }
    let pitch = note.pitch.resolve()?;
    let requested = note.channel.to_physical(port_count)?;
    let onset = seconds(note.onset, "onset")?;
    let duration = seconds(note.duration, "duration")?;
    if duration.is_zero() {
        return Err(Error::InvalidTiming(format!(
            "note {seq} has zero duration"
        )));
    }
    if onset.checked_add(duration).is_none() {
        return Err(Error::InvalidTiming(format!(
            "note {seq} ends too late to be represented"
        )));
    }

    Ok(Pending {
        pitch,
        requested,
        velocity: note.velocity,
        onset,
        duration,
        track,
        seq,
    })
}

/// Resolves every note of `composition` for `port_count` output ports.
///
/// Events come back sorted by onset, ties broken by composition order.
pub fn resolve(
    composition: &Composition,
    port_count: usize,
    bend_range: BendRange,
) -> Result<Vec<ResolvedEvent>> {
    let mut pending = composition
        .notes_by_track()
        .iter()
        .enumerate()
        .map(|(seq, (track, note))| validate(note, *track, seq, port_count))
        .collect::<Result<Vec<_>>>()?;
    pending.sort_by_key(|p| (p.onset, p.seq));

    let mut allocator = ChannelAllocator::new(port_count);
    let mut sounding: BinaryHeap<Reverse<(Duration, usize)>> = BinaryHeap::new();
    let mut events: Vec<ResolvedEvent> = Vec::with_capacity(pending.len());

    for p in pending {
        while let Some(Reverse((end, index))) = sounding.peek().copied() {
            if end > p.onset {
                break;
            }
            sounding.pop();
            let done = &events[index];
            allocator.release(done.channel, done.tuning)?;
        }

        let tuning = Tuning::of(p.pitch);
        let channel = allocator.reserve_at(p.requested, tuning)?;
        let messages = NoteMessages::compile(p.pitch, channel, p.velocity, bend_range);

        tracing::debug!(
            "Resolved note {} (key {}) at {:?} on {}",
            p.seq,
            p.pitch,
            p.onset,
            channel
        );

        sounding.push(Reverse((p.onset.saturating_add(p.duration), events.len())));
        events.push(ResolvedEvent {
            pitch: p.pitch,
            tuning,
            velocity: p.velocity,
            requested: p.requested,
            channel,
            onset: p.onset,
            duration: p.duration,
            track: p.track,
            seq: p.seq,
            messages,
        });
    }

    Ok(events)
}

/// Time at which the last event ends.
pub fn total_duration(events: &[ResolvedEvent]) -> Duration {
    events
        .iter()
        .map(ResolvedEvent::end)
        .max()
        .unwrap_or_default()
}
