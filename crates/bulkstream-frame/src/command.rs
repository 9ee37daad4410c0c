//! Control commands sent on the command channel.

use std::fmt;

pub const OP_SET_FULL_MODE: u8 = 0x13;
pub const OP_SET_PROFILE: u8 = 0x14;
pub const OP_SET_ROI_MICROS: u8 = 0x15;
pub const OP_SET_FRAME_SAMPLES: u8 = 0x17;
pub const OP_START_STREAM: u8 = 0x20;
pub const OP_STOP_STREAM: u8 = 0x21;
pub const OP_GET_STATUS: u8 = 0x30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Select a sampling profile by id.
    SetProfile(u8),
    /// Stream every sample rather than the region of interest.
    SetFullMode(bool),
    /// Region-of-interest window in microseconds.
    SetRoiMicros(u16),
    /// Samples per frame.
    SetFrameSamples(u16),
    StartStream,
    StopStream,
    /// Ask for one status record on the bulk endpoint.
    GetStatus,
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::SetProfile(_) => OP_SET_PROFILE,
            Command::SetFullMode(_) => OP_SET_FULL_MODE,
            Command::SetRoiMicros(_) => OP_SET_ROI_MICROS,
            Command::SetFrameSamples(_) => OP_SET_FRAME_SAMPLES,
            Command::StartStream => OP_START_STREAM,
            Command::StopStream => OP_STOP_STREAM,
            Command::GetStatus => OP_GET_STATUS,
        }
    }

    /// Bytes following the opcode. Multi-byte values are little-endian.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Command::SetProfile(profile) => vec![profile],
            Command::SetFullMode(full) => vec![u8::from(full)],
            Command::SetRoiMicros(us) => us.to_le_bytes().to_vec(),
            Command::SetFrameSamples(samples) => samples.to_le_bytes().to_vec(),
            Command::StartStream | Command::StopStream | Command::GetStatus => Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::SetProfile(_) => "set_profile",
            Command::SetFullMode(_) => "set_full_mode",
            Command::SetRoiMicros(_) => "set_roi_us",
            Command::SetFrameSamples(_) => "set_frame_samples",
            Command::StartStream => "start",
            Command::StopStream => "stop",
            Command::GetStatus => "get_status",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.opcode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_and_payloads() {
        assert_eq!(Command::SetProfile(2).opcode(), 0x14);
        assert_eq!(Command::SetProfile(2).payload(), vec![2]);
        assert_eq!(Command::SetFullMode(true).payload(), vec![1]);
        assert_eq!(Command::SetFullMode(false).payload(), vec![0]);
        assert_eq!(Command::SetRoiMicros(0x0102).payload(), vec![0x02, 0x01]);
        assert_eq!(Command::SetFrameSamples(512).opcode(), 0x17);
        assert_eq!(Command::SetFrameSamples(512).payload(), vec![0x00, 0x02]);
        assert!(Command::StartStream.payload().is_empty());
        assert_eq!(Command::StopStream.opcode(), 0x21);
        assert_eq!(Command::GetStatus.opcode(), 0x30);
    }

    #[test]
    fn display_includes_opcode() {
        assert_eq!(Command::StartStream.to_string(), "start (0x20)");
    }
}
