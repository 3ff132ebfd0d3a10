//! Channel allocation for mixed equal-tempered and microtonal playback.
//!
//! Pitch bend is channel-wide, so a microtonal note needs a channel to
//! itself for as long as it sounds. Equal-tempered notes never bend and may
//! share a channel with each other. The allocator keeps one usage record per
//! physical channel (`port_count * 16` of them) and moves a request to
//! another channel when the requested one cannot take it.

use crate::channel::{LogicalChannel, PhysicalChannel, CHANNELS_PER_PORT};
use crate::error::{Error, Result};
use crate::pitch::Pitch;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a note needs a pitch bend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tuning {
    EqualTempered,
    Microtonal,
}

impl Tuning {
    pub fn of(pitch: Pitch) -> Self {
        if pitch.is_microtonal() {
            Tuning::Microtonal
        } else {
            Tuning::EqualTempered
        }
    }
}

impl fmt::Display for Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tuning::EqualTempered => f.write_str("equal-tempered"),
            Tuning::Microtonal => f.write_str("microtonal"),
        }
    }
}

/// What currently holds a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reservation {
    #[default]
    Free,
    EqualTempered,
    Microtonal,
}

impl From<Tuning> for Reservation {
    fn from(tuning: Tuning) -> Self {
        match tuning {
            Tuning::EqualTempered => Reservation::EqualTempered,
            Tuning::Microtonal => Reservation::Microtonal,
        }
    }
}

/// Usage record of one physical channel.
///
/// `references == 0` exactly when `reservation == Free`, and a microtonal
/// reservation never has more than one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelUsage {
    pub references: u32,
    pub reservation: Reservation,
}

impl ChannelUsage {
    #[inline]
    pub fn is_free(&self) -> bool {
        self.references == 0
    }

    #[inline]
    fn accepts(&self, tuning: Tuning) -> bool {
        match tuning {
            Tuning::EqualTempered => {
                self.references == 0 || self.reservation == Reservation::EqualTempered
            }
            Tuning::Microtonal => self.references == 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelAllocator {
    usage: Vec<ChannelUsage>,
}

impl ChannelAllocator {
    /// Creates an all-free table covering `port_count` ports.
    pub fn new(port_count: usize) -> Self {
        Self {
            usage: vec![ChannelUsage::default(); port_count * CHANNELS_PER_PORT],
        }
    }

    pub fn port_count(&self) -> usize {
        self.usage.len() / CHANNELS_PER_PORT
    }

    /// Reserves a channel for a note at `pitch`, preferring `logical`.
    ///
    /// The returned channel may differ from the requested one; all messages
    /// for the note must go to the returned channel.
    pub fn reserve(&mut self, logical: LogicalChannel, pitch: Pitch) -> Result<PhysicalChannel> {
        let requested = logical.to_physical(self.port_count())?;
        self.reserve_at(requested, Tuning::of(pitch))
    }

    pub fn reserve_at(
        &mut self,
        requested: PhysicalChannel,
        tuning: Tuning,
    ) -> Result<PhysicalChannel> {
        let index = requested.index();
        let usage = self
            .usage
            .get(index)
            .ok_or_else(|| Error::ChannelOutOfRange {
                channel: (index + 1).min(u16::MAX as usize) as u16,
                max: self.usage.len(),
            })?;

        let index = if usage.accepts(tuning) {
            index
        } else {
            let reassigned = self
                .usage
                .iter()
                .position(|usage| usage.accepts(tuning))
                .ok_or(Error::NoChannelAvailable {
                    requested: index,
                    tuning,
                })?;
            tracing::debug!(
                "Channel {} busy for {} note, reassigned to {}",
                requested,
                tuning,
                PhysicalChannel::from_index(reassigned)
            );
            reassigned
        };

        let usage = &mut self.usage[index];
        match tuning {
            Tuning::EqualTempered => usage.references += 1,
            Tuning::Microtonal => usage.references = 1,
        }
        usage.reservation = tuning.into();

        Ok(PhysicalChannel::from_index(index))
    }

    /// Drops one reference to `channel`, freeing it when none remain.
    ///
    /// Releasing a microtonal note must leave the channel free; anything
    /// else means reservations and releases got out of step.
    pub fn release(&mut self, channel: PhysicalChannel, tuning: Tuning) -> Result<()> {
        let index = channel.index();
        let accounting = |reason: &str| Error::ChannelAccounting {
            channel: index,
            reason: reason.to_string(),
        };

        let usage = self
            .usage
            .get_mut(index)
            .ok_or_else(|| accounting("channel outside the table"))?;

        if usage.references == 0 {
            return Err(accounting("released a free channel"));
        }
        if usage.reservation != Reservation::from(tuning) {
            return Err(accounting(&format!(
                "released as {} but reserved as {:?}",
                tuning, usage.reservation
            )));
        }

        usage.references -= 1;
        if tuning == Tuning::Microtonal && usage.references != 0 {
            return Err(accounting("microtonal channel was shared"));
        }
        if usage.references == 0 {
            usage.reservation = Reservation::Free;
        }
        Ok(())
    }

    pub fn usage(&self, channel: PhysicalChannel) -> Option<ChannelUsage> {
        self.usage.get(channel.index()).copied()
    }

    pub fn usages(&self) -> &[ChannelUsage] {
        &self.usage
    }

    /// True when every channel is free.
    pub fn is_idle(&self) -> bool {
        self.usage.iter().all(ChannelUsage::is_free)
    }

    /// Frees every channel.
    pub fn reset(&mut self) {
        self.usage.fill(ChannelUsage::default());
    }
}
