// SPDX-License-Identifier: Apache-2.0

//! The transport contract every concrete link (point-to-point, wireless)
//! must satisfy, plus the frame-assembly logic they share.
//!
//! A transport never blocks: `read_packet` returns `None` rather than
//! waiting for more bytes, and the framing rules guarantee a frame is only
//! ever handed back whole. That property is implemented once in
//! [`FrameAssembler`] and reused by every concrete transport rather than
//! reimplemented per link.

pub mod point_to_point;
pub mod wireless;

pub use point_to_point::PointToPoint;
pub use wireless::{Delay, NoDelay, Wireless};

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::codec::{check_payload_size, Header, Method, Packet, HEADER_SIZE};

/// Upper bound on how long a single `read_packet` call may spend resyncing
/// and assembling a frame. Enforced by the caller feeding bytes into a
/// transport's internal buffer on its own cadence; the assembler itself
/// never blocks, so there is nothing here to time out against.
pub const TIMEOUT_DEFAULT_MS: u32 = 50;

/// Expected negotiated MTU for a fresh wireless connection, before any
/// MTU exchange has taken place.
pub const WIRELESS_MTU_DEFAULT: u16 = 256;

/// Bytes of ATT protocol overhead subtracted from the negotiated MTU to get
/// the usable payload size per write.
pub const ATT_OVERHEAD: u16 = 3;

/// Pause between successive chunk writes on a wireless transport, to yield
/// to the radio stack.
pub const WIRELESS_INTER_CHUNK_PAUSE_MS: u32 = 5;

/// The common contract every transport must obey.
pub trait Transport {
    fn init(&mut self);
    fn destroy(&mut self);
    fn write_packet(&mut self, pkt: &Packet);
    /// Returns at most one assembled frame, or `None` if none is available
    /// yet. Never blocks.
    fn read_packet(&mut self) -> Option<Packet>;
    fn connected(&self) -> bool;
    fn name(&self) -> &str;
}

/// Scans an inbound byte stream for frame starts and assembles whole
/// frames, one at a time.
///
/// Bytes that don't begin a recognized method are dropped as they're
/// scanned. A header or payload that hasn't fully arrived yet is left in
/// the buffer untouched: the next call picks up where this one left off,
/// matching "frames arrive whole or not at all".
pub struct FrameAssembler {
    inbound: VecDeque<u8>,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
        }
    }

    /// Appends bytes as if just received from the underlying link.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    pub fn buffered_len(&self) -> usize {
        self.inbound.len()
    }

    /// Attempts to assemble one frame from whatever is currently buffered.
    pub fn try_read_packet(&mut self) -> Option<Packet> {
        while let Some(&byte) = self.inbound.front() {
            if Method::from_byte(byte).is_some() {
                break;
            }
            self.inbound.pop_front();
        }

        if self.inbound.len() < HEADER_SIZE {
            return None;
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        for (slot, byte) in header_bytes.iter_mut().zip(self.inbound.iter()) {
            *slot = *byte;
        }
        let header = Header::decode(&header_bytes);

        if check_payload_size(&header).is_err() {
            // can't possibly be a real frame at this size; drop the method
            // byte that started it and let the next call resync further in
            self.inbound.pop_front();
            return None;
        }

        let total = HEADER_SIZE + usize::from(header.payload_size);
        if self.inbound.len() < total {
            return None;
        }

        for _ in 0..HEADER_SIZE {
            self.inbound.pop_front();
        }
        let mut payload = Vec::with_capacity(usize::from(header.payload_size));
        for _ in 0..header.payload_size {
            payload.push(self.inbound.pop_front().expect("length checked above"));
        }

        Some(Packet::from_wire(header, payload))
    }
}
