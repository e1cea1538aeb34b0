// SPDX-License-Identifier: Apache-2.0

//! The always-available wired transport. Writes go out in one call; no
//! chunking, no MTU negotiation.

use alloc::vec::Vec;

use crate::codec::Packet;

use super::{FrameAssembler, Transport};

pub struct PointToPoint {
    connected: bool,
    assembler: FrameAssembler,
    written: Vec<u8>,
}

impl Default for PointToPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl PointToPoint {
    pub fn new() -> Self {
        Self {
            connected: false,
            assembler: FrameAssembler::new(),
            written: Vec::new(),
        }
    }

    /// Feeds bytes as if just arrived on the wire; called by whatever glues
    /// this transport to real hardware.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.assembler.push_bytes(bytes);
    }

    /// Drains bytes queued by `write_packet` for the hardware layer to push
    /// onto the actual wire.
    pub fn drain_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.written)
    }
}

impl Transport for PointToPoint {
    fn init(&mut self) {
        self.connected = true;
    }

    fn destroy(&mut self) {
        self.connected = false;
    }

    fn write_packet(&mut self, pkt: &Packet) {
        if !self.connected {
            return;
        }
        self.written.extend_from_slice(&pkt.serialize());
    }

    fn read_packet(&mut self) -> Option<Packet> {
        if !self.connected {
            return None;
        }
        self.assembler.try_read_packet()
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn name(&self) -> &str {
        "point_to_point"
    }
}
