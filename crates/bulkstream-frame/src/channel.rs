//! Sample channel ids.
//!
//! A frame belongs to ADC1 when flag bit 1 is set, otherwise to ADC0.

use std::fmt;

use crate::header::FrameFlags;

/// One of the two sampled channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Adc0,
    Adc1,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Adc0, Channel::Adc1];

    /// Channel selected by a frame's flag byte.
    pub fn from_flags(flags: FrameFlags) -> Self {
        if flags.contains(FrameFlags::ADC1) {
            Channel::Adc1
        } else {
            Channel::Adc0
        }
    }

    /// Numeric id (0 or 1).
    pub fn index(self) -> usize {
        match self {
            Channel::Adc0 => 0,
            Channel::Adc1 => 1,
        }
    }

    /// Bit used when tracking which channels have reported a sequence.
    pub fn mask_bit(self) -> u8 {
        1 << self.index()
    }

    /// The flag bit a device sets for this channel.
    pub fn flag(self) -> FrameFlags {
        match self {
            Channel::Adc0 => FrameFlags::ADC0,
            Channel::Adc1 => FrameFlags::ADC1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Adc0 => "ADC0",
            Channel::Adc1 => "ADC1",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
