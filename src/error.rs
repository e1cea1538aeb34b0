// SPDX-License-Identifier: Apache-2.0

//! Error types for the node, grouped by origin rather than by Rust type.
//!
//! Framing and ordering failures never propagate to application code: the
//! integrity middleware converts them into retransmit requests or silent
//! drops (see [`crate::integrity`]). What remains here are the errors a
//! caller can actually observe.

use core::fmt;

#[cfg(feature = "alloc")]
use alloc::string::String;

/// A packet could not be accepted as a well-formed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramingError {
    /// The first byte was not one of the seven recognized method codes.
    UnrecognizedMethod(u8),
    /// Fewer bytes are buffered than the frame's header or declared payload
    /// requires; the caller should try again once more bytes arrive.
    Incomplete,
    /// The CRC8 computed over the payload did not match the header's
    /// checksum field.
    ChecksumMismatch,
    /// The declared payload size exceeds [`crate::codec::MAX_BUFFER_SIZE`].
    PayloadTooLarge { declared: u16 },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedMethod(byte) => {
                write!(f, "byte {byte:#04x} is not a valid method flag")
            }
            Self::Incomplete => f.write_str("not enough bytes buffered for a whole frame"),
            Self::ChecksumMismatch => f.write_str("CRC8 checksum did not match payload"),
            Self::PayloadTooLarge { declared } => {
                write!(f, "payload_size {declared} exceeds MAX_BUFFER_SIZE")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FramingError {}

/// A key/value store operation failed or named a key with no value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreError {
    NotFound,
    WriteFailed,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("key not present in store"),
            Self::WriteFailed => f.write_str("store rejected the write"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StoreError {}

/// `cmd_name` did not resolve to a built-in handler or a registered actuator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg(feature = "alloc")]
pub struct DispatchError {
    pub cmd_name: String,
}

#[cfg(feature = "alloc")]
impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command '{}' not found", self.cmd_name)
    }
}

#[cfg(all(feature = "std", feature = "alloc"))]
impl std::error::Error for DispatchError {}

/// A command's precondition failed (e.g. starting a record that is already
/// running). Surfaced to the peer as an INFO packet with `success: false`,
/// never as a Rust panic or propagated error.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg(feature = "alloc")]
pub struct DomainError {
    pub message: String,
}

#[cfg(feature = "alloc")]
impl DomainError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(feature = "alloc")]
impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(all(feature = "std", feature = "alloc"))]
impl std::error::Error for DomainError {}
