//! Logical (user-facing) and physical (port + wire channel) channel numbering.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CHANNELS_PER_PORT: usize = 16;

/// 1-based channel number spanning all output ports: channels 1-16 are the
/// first port, 17-32 the second, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalChannel(pub u16);

impl LogicalChannel {
    pub fn new(channel: u16) -> Self {
        Self(channel)
    }

    /// Maps to the physical channel, checking it exists among `port_count` ports.
    pub fn to_physical(self, port_count: usize) -> Result<PhysicalChannel> {
        let max = port_count * CHANNELS_PER_PORT;
        if self.0 == 0 || self.0 as usize > max {
            return Err(Error::ChannelOutOfRange {
                channel: self.0,
                max,
            });
        }
        Ok(PhysicalChannel::from_index(self.0 as usize - 1))
    }
}

impl Default for LogicalChannel {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u16> for LogicalChannel {
    fn from(channel: u16) -> Self {
        Self(channel)
    }
}

/// A wire channel (0-15) on a specific output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalChannel {
    pub port: usize,
    pub channel: u8,
}

impl PhysicalChannel {
    pub fn new(port: usize, channel: u8) -> Self {
        Self {
            port,
            channel: channel.min(15),
        }
    }

    /// Global index `port * 16 + channel`, the allocator's table position.
    #[inline]
    pub fn index(self) -> usize {
        self.port * CHANNELS_PER_PORT + self.channel as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self {
            port: index / CHANNELS_PER_PORT,
            channel: (index % CHANNELS_PER_PORT) as u8,
        }
    }
}

impl fmt::Display for PhysicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {} ch {}", self.port, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_to_physical() {
        assert_eq!(
            LogicalChannel(1).to_physical(1).unwrap(),
            PhysicalChannel::new(0, 0)
        );
        assert_eq!(
            LogicalChannel(16).to_physical(1).unwrap(),
            PhysicalChannel::new(0, 15)
        );
        assert_eq!(
            LogicalChannel(17).to_physical(2).unwrap(),
            PhysicalChannel::new(1, 0)
        );
    }

    #[test]
    fn test_logical_out_of_range() {
        assert!(LogicalChannel(0).to_physical(1).is_err());
        assert!(LogicalChannel(17).to_physical(1).is_err());
        assert!(LogicalChannel(32).to_physical(2).is_ok());
    }

    #[test]
    fn test_index_round_trip() {
        for index in 0..64 {
            assert_eq!(PhysicalChannel::from_index(index).index(), index);
        }
    }
}
