// SPDX-License-Identifier: Apache-2.0

//! The wire frame: a fixed 10-byte header plus an opaque payload.
//!
//! ```text
//! offset  size  field
//! 0       1     method
//! 1       4     node_identity
//! 5       2     sequence
//! 7       1     checksum
//! 8       2     payload_size
//! 10      ..    payload
//! ```
//!
//! All multi-byte header fields are big-endian. There is no trailing null
//! byte and no preamble beyond the method byte itself: a reader resyncs a
//! corrupted stream by scanning for the next recognized method code.

mod crc;
mod method;

pub use method::Method;

use byteorder::{BigEndian, ByteOrder};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::error::FramingError;

/// Size in bytes of the fixed packet header.
pub const HEADER_SIZE: usize = 10;

/// Upper bound on payload size accepted at the transport boundary. Nodes
/// are memory-constrained; frames declaring a larger payload are rejected
/// before any allocation happens.
pub const MAX_BUFFER_SIZE: usize = 512;

/// The raw header fields, decoded verbatim and without validation.
///
/// `deserialize_header` never fails on content: an unrecognized `method`
/// byte or a nonsensical `payload_size` is represented faithfully here and
/// only rejected later by [`Packet::verify_good_packet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub method: u8,
    pub node_identity: [u8; 4],
    pub sequence: u16,
    pub checksum: u8,
    pub payload_size: u16,
}

impl Header {
    /// Decodes a 10-byte header in place. Corresponds to `deserialize_header`.
    #[inline]
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            method: bytes[0],
            node_identity: [bytes[1], bytes[2], bytes[3], bytes[4]],
            sequence: BigEndian::read_u16(&bytes[5..7]),
            checksum: bytes[7],
            payload_size: BigEndian::read_u16(&bytes[8..10]),
        }
    }

    #[inline]
    pub fn encode(&self, out: &mut [u8; HEADER_SIZE]) {
        out[0] = self.method;
        out[1..5].copy_from_slice(&self.node_identity);
        BigEndian::write_u16(&mut out[5..7], self.sequence);
        out[7] = self.checksum;
        BigEndian::write_u16(&mut out[8..10], self.payload_size);
    }
}

/// A framed protocol message: header fields plus an owned payload.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg(feature = "alloc")]
pub struct Packet {
    method: u8,
    node_identity: [u8; 4],
    sequence: u16,
    checksum: u8,
    payload: Vec<u8>,
}

#[cfg(feature = "alloc")]
impl Packet {
    /// Builds a new packet, computing the checksum from `payload`.
    ///
    /// `sequence` is left at 0; the integrity middleware assigns it on the
    /// way out (see [`crate::integrity`]).
    pub fn new(method: Method, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        let checksum = crc::checksum(&payload);
        Self {
            method: method.as_u8(),
            node_identity: [0; 4],
            sequence: 0,
            checksum,
            payload,
        }
    }

    /// Reconstructs a packet from a decoded [`Header`] and the payload bytes
    /// that followed it on the wire. Corresponds to `deserialize_payload`
    /// composed with the already-decoded header.
    ///
    /// Copies exactly `payload` as given; the caller is responsible for
    /// reading exactly `header.payload_size` bytes off the transport before
    /// calling this (see [`crate::transport`]).
    pub fn from_wire(header: Header, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            method: header.method,
            node_identity: header.node_identity,
            sequence: header.sequence,
            checksum: header.checksum,
            payload: payload.into(),
        }
    }

    #[inline]
    pub fn method_raw(&self) -> u8 {
        self.method
    }

    #[inline]
    pub fn method(&self) -> Option<Method> {
        Method::from_byte(self.method)
    }

    #[inline]
    pub fn set_method(&mut self, method: Method) {
        self.method = method.as_u8();
    }

    #[inline]
    pub fn node_identity(&self) -> [u8; 4] {
        self.node_identity
    }

    #[inline]
    pub fn set_node_identity(&mut self, identity: [u8; 4]) {
        self.node_identity = identity;
    }

    #[inline]
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    #[inline]
    pub fn set_sequence(&mut self, sequence: u16) {
        self.sequence = sequence;
    }

    #[inline]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_size(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Replaces the payload and recomputes the checksum over it.
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
        self.checksum = crc::checksum(&self.payload);
    }

    /// `verify_flag`: true iff `byte` is one of the seven method codes.
    #[inline]
    pub fn verify_flag(byte: u8) -> bool {
        Method::verify_flag(byte)
    }

    /// `verify_good_packet`: the method is recognized and the checksum
    /// matches the payload actually carried.
    pub fn verify_good_packet(&self) -> bool {
        Method::verify_flag(self.method) && crc::checksum(&self.payload) == self.checksum
    }

    /// Serializes header and payload into one contiguous buffer, big-endian,
    /// with no trailing null byte. The caller owns framing for transmission.
    pub fn serialize(&self) -> Vec<u8> {
        let header = Header {
            method: self.method,
            node_identity: self.node_identity,
            sequence: self.sequence,
            checksum: self.checksum,
            payload_size: self.payload_size(),
        };

        let mut buffer = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        let mut header_bytes = [0u8; HEADER_SIZE];
        header.encode(&mut header_bytes);
        buffer.extend_from_slice(&header_bytes);
        buffer.extend_from_slice(&self.payload);
        buffer
    }
}

/// Validates a decoded [`Header`] against the payload boundary rules before
/// any payload bytes are read off the transport.
pub fn check_payload_size(header: &Header) -> Result<(), FramingError> {
    if usize::from(header.payload_size) > MAX_BUFFER_SIZE {
        return Err(FramingError::PayloadTooLarge {
            declared: header.payload_size,
        });
    }
    Ok(())
}
