// SPDX-License-Identifier: Apache-2.0

//! A radio-backed transport (BLE or Wifi) that chunks outbound frames to
//! the negotiated MTU and re-advertises after a disconnect so a new peer
//! can attach without a manual re-init.

use alloc::vec::Vec;

use crate::codec::Packet;

use super::{FrameAssembler, Transport, ATT_OVERHEAD, WIRELESS_INTER_CHUNK_PAUSE_MS, WIRELESS_MTU_DEFAULT};

/// Yields to the radio stack between chunk writes. Production builds pass
/// something backed by the platform's delay primitive; tests pass
/// [`NoDelay`].
pub trait Delay {
    fn pause_millis(&self, millis: u32);
}

pub struct NoDelay;

impl Delay for NoDelay {
    fn pause_millis(&self, _millis: u32) {}
}

pub struct Wireless<D: Delay = NoDelay> {
    connected: bool,
    assembler: FrameAssembler,
    written: Vec<u8>,
    mtu: u16,
    delay: D,
}

impl Wireless<NoDelay> {
    pub fn new() -> Self {
        Self::with_delay(NoDelay)
    }
}

impl Default for Wireless<NoDelay> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Delay> Wireless<D> {
    pub fn with_delay(delay: D) -> Self {
        Self {
            connected: false,
            assembler: FrameAssembler::new(),
            written: Vec::new(),
            mtu: WIRELESS_MTU_DEFAULT,
            delay,
        }
    }

    pub fn set_mtu(&mut self, mtu: u16) {
        self.mtu = mtu;
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.assembler.push_bytes(bytes);
    }

    pub fn drain_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.written)
    }

    fn max_payload_size(&self) -> usize {
        usize::from(self.mtu.saturating_sub(ATT_OVERHEAD)).max(1)
    }

    /// Invoked by the radio stack's connect callback.
    pub fn on_connect(&mut self) {
        self.connected = true;
    }

    /// Invoked by the radio stack's disconnect callback. Re-enables
    /// advertising so a new central can attach without a manual re-init.
    pub fn on_disconnect(&mut self) {
        self.connected = false;
        self.advertise();
    }

    fn advertise(&self) {
        // hook for the platform's advertising restart; no radio hardware
        // is modeled in this crate
    }
}

impl<D: Delay> Transport for Wireless<D> {
    fn init(&mut self) {
        self.advertise();
    }

    fn destroy(&mut self) {
        self.connected = false;
    }

    fn write_packet(&mut self, pkt: &Packet) {
        if !self.connected {
            return;
        }
        let bytes = pkt.serialize();
        let chunk_size = self.max_payload_size();
        for chunk in bytes.chunks(chunk_size) {
            self.written.extend_from_slice(chunk);
            self.delay.pause_millis(WIRELESS_INTER_CHUNK_PAUSE_MS);
        }
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
        "wireless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Method;

    #[test]
    fn chunks_writes_to_the_negotiated_mtu() {
        let mut radio = Wireless::new();
        radio.on_connect();
        radio.set_mtu(16);
        let pkt = Packet::new(Method::Data, alloc::vec![0u8; 40]);
        radio.write_packet(&pkt);
        let written = radio.drain_written();
        assert_eq!(written.len(), pkt.serialize().len());
    }

    #[test]
    fn disconnect_drops_connection_and_re_advertises() {
        let mut radio = Wireless::new();
        radio.on_connect();
        assert!(radio.connected());
        radio.on_disconnect();
        assert!(!radio.connected());
    }

    #[test]
    fn round_trips_a_chunked_frame() {
        let mut radio = Wireless::new();
        radio.on_connect();
        radio.set_mtu(20);
        let pkt = Packet::new(Method::Info, b"{\"reading\":123.4}".to_vec());
        radio.write_packet(&pkt);
        let written = radio.drain_written();
        radio.feed(&written);
        let read_back = radio.read_packet().unwrap();
        assert_eq!(read_back.payload(), pkt.payload());
    }
}
