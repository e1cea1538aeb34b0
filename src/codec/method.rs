// SPDX-License-Identifier: Apache-2.0

use core::fmt;

/// The 1-byte method selector that begins every frame.
///
/// Values are chosen from the printable ASCII range 0x20..=0x26 so a stream
/// scanner can resynchronize after corruption without a dedicated preamble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Method {
    Ack = 0x20,
    Data = 0x21,
    Command = 0x22,
    Heartbeat = 0x23,
    Debug = 0x24,
    Info = 0x25,
    Error = 0x26,
}

impl Method {
    /// Returns `true` if `byte` is one of the recognized method codes.
    ///
    /// Any other value means "not a frame start" and should be dropped by
    /// a reader scanning for the next frame.
    #[inline]
    pub fn verify_flag(byte: u8) -> bool {
        Self::from_byte(byte).is_some()
    }

    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Method::*;
        Some(match byte {
            0x20 => Ack,
            0x21 => Data,
            0x22 => Command,
            0x23 => Heartbeat,
            0x24 => Debug,
            0x25 => Info,
            0x26 => Error,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Methods that carry a meaningful, tracked sequence number.
    ///
    /// ACK and HEARTBEAT are excluded: they are never reordered, never
    /// acknowledged, and never retransmitted.
    #[inline]
    pub fn is_tracked(self) -> bool {
        !matches!(self, Method::Ack | Method::Heartbeat)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Ack => "ACK",
            Method::Data => "DATA",
            Method::Command => "COMMAND",
            Method::Heartbeat => "HEARTBEAT",
            Method::Debug => "DEBUG",
            Method::Info => "INFO",
            Method::Error => "ERROR",
        };
        f.write_str(name)
    }
}
