// SPDX-License-Identifier: Apache-2.0

//! Sliding-sequence ordered delivery: acknowledgement, reordering,
//! selective retransmission, and gap-overflow handling.
//!
//! This is the hardest part of the wire protocol. [`Integrity`] sits
//! between a transport and the command dispatcher: every inbound packet
//! passes through [`Integrity::process_incoming`] before it is allowed to
//! reach application code, and every outbound packet is stamped by
//! [`Integrity::process_outgoing`] just before it is handed to a transport.
//!
//! When `ack_enabled` is false the whole thing is a pass-through; nodes
//! that never toggle acknowledgement on pay no cost beyond the branch.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::codec::{Method, Packet};
use crate::relay::{OutboundQueue, PacketRelay};
use crate::sequence::Sequence;

/// Out-of-order packets buffered before the receiver gives up and jumps the
/// gap.
pub const OOO_MAX: usize = 5;

/// Outbound tracked packets kept around for possible retransmission. The
/// original firmware had no bound here at all, which lets a lossy peer grow
/// the map without limit; this caps it and evicts the lowest (oldest)
/// sequence first.
pub const PENDING_RETX_MAX: usize = 64;

#[derive(Serialize, Deserialize)]
struct AckPayload {
    seq_num: u16,
    retry: bool,
}

/// Per-transport-manager integrity state.
pub struct Integrity {
    expected_in_seq: Sequence,
    out_seq: Sequence,
    out_of_order: BTreeMap<u16, Packet>,
    pending_retx: BTreeMap<u16, Packet>,
    ack_enabled: bool,
    node_identity: [u8; 4],
    relay: Rc<PacketRelay>,
    outbound: OutboundQueue,
}

impl Integrity {
    pub fn new(node_identity: [u8; 4], relay: Rc<PacketRelay>, outbound: OutboundQueue) -> Self {
        Self {
            expected_in_seq: Sequence::ZERO,
            out_seq: Sequence::ZERO,
            out_of_order: BTreeMap::new(),
            pending_retx: BTreeMap::new(),
            ack_enabled: false,
            node_identity,
            relay,
            outbound,
        }
    }

    pub fn ack_enabled(&self) -> bool {
        self.ack_enabled
    }

    pub fn enable_ack(&mut self) {
        self.ack_enabled = true;
    }

    pub fn disable_ack(&mut self) {
        self.ack_enabled = false;
    }

    pub fn expected_in_seq(&self) -> u16 {
        self.expected_in_seq.get()
    }

    pub fn pending_retx_len(&self) -> usize {
        self.pending_retx.len()
    }

    pub fn out_of_order_len(&self) -> usize {
        self.out_of_order.len()
    }

    /// Admits, reorders, drops, or defers an inbound packet. Returns zero or
    /// more packets in delivery order.
    pub fn process_incoming(&mut self, pkt: Packet) -> Vec<Packet> {
        if !self.ack_enabled {
            return alloc::vec![pkt];
        }

        if !pkt.verify_good_packet() {
            crate::trace_event!(warn, seq = pkt.sequence(), "dropping packet with bad checksum");
            self.send_ack(pkt.sequence(), true);
            return Vec::new();
        }

        match pkt.method() {
            Some(Method::Ack) => {
                self.handle_ack(&pkt);
                Vec::new()
            }
            Some(Method::Heartbeat) => alloc::vec![pkt],
            _ => self.admit(pkt),
        }
    }

    /// Stamps node identity and, for tracked methods, the next outbound
    /// sequence number; records the packet for possible retransmission.
    pub fn process_outgoing(&mut self, mut pkt: Packet) -> Packet {
        pkt.set_node_identity(self.node_identity);

        if matches!(pkt.method(), Some(Method::Ack) | Some(Method::Heartbeat)) {
            return pkt;
        }

        let seq = self.out_seq;
        pkt.set_sequence(seq.get());

        if self.ack_enabled {
            self.pending_retx.remove(&seq.get());
            self.pending_retx.insert(seq.get(), pkt.clone());
            self.evict_pending_retx();
            self.out_seq = self.out_seq.next();
        }

        pkt
    }

    fn admit(&mut self, pkt: Packet) -> Vec<Packet> {
        // a checksum-good, non-ACK, non-HEARTBEAT packet is always
        // acknowledged, whether or not it turns out to be in order
        self.send_ack(pkt.sequence(), false);

        let mut out = Vec::new();
        let incoming = Sequence::new(pkt.sequence());
        let mut held = Some(pkt);

        loop {
            if incoming.is_behind(self.expected_in_seq) {
                // duplicate, or already jumped past: silently drop
                return out;
            }

            if incoming == self.expected_in_seq {
                out.push(held.take().expect("packet consumed exactly once"));
                self.expected_in_seq = self.expected_in_seq.next();
                self.drain_out_of_order(&mut out);
                return out;
            }

            if self.out_of_order.len() < OOO_MAX {
                self.request_missing(incoming);
                self.out_of_order
                    .insert(incoming.get(), held.take().expect("packet consumed exactly once"));
                return out;
            }

            // buffer is full: jump the gap using what's already buffered,
            // then re-evaluate this packet against the advanced expectation
            crate::trace_event!(warn, expected = self.expected_in_seq.get(), "out-of-order buffer full, jumping gap");
            self.jump_gap(&mut out);
            self.drain_out_of_order(&mut out);
        }
    }

    fn drain_out_of_order(&mut self, out: &mut Vec<Packet>) {
        for _ in 0..OOO_MAX {
            let next = self.expected_in_seq.next();
            match self.out_of_order.remove(&next.get()) {
                Some(pkt) => {
                    self.expected_in_seq = next;
                    out.push(pkt);
                }
                None => break,
            }
        }
    }

    fn jump_gap(&mut self, out: &mut Vec<Packet>) {
        let mut candidate = self.expected_in_seq.next();
        loop {
            if let Some(pkt) = self.out_of_order.remove(&candidate.get()) {
                self.expected_in_seq = candidate;
                out.push(pkt);
                return;
            }
            candidate = candidate.next();
        }
    }

    fn request_missing(&self, incoming: Sequence) {
        let mut seq = self.expected_in_seq;
        while seq != incoming {
            self.send_ack(seq.get(), true);
            seq = seq.next();
        }
    }

    fn handle_ack(&mut self, pkt: &Packet) {
        let Ok(ack) = serde_json::from_slice::<AckPayload>(pkt.payload()) else {
            return;
        };

        if ack.retry {
            // resend the packet the peer is actually missing, rather than
            // merely echoing another retry request back at them
            if let Some(stored) = self.pending_retx.get(&ack.seq_num) {
                self.outbound.borrow_mut().push_back(stored.clone());
            }
        } else {
            self.pending_retx.remove(&ack.seq_num);
        }
    }

    fn send_ack(&self, seq_num: u16, retry: bool) {
        let payload = AckPayload { seq_num, retry };
        if let Ok(bytes) = serde_json::to_vec(&payload) {
            self.relay.ack(bytes);
        }
    }

    fn evict_pending_retx(&mut self) {
        while self.pending_retx.len() > PENDING_RETX_MAX {
            if let Some(&oldest) = self.pending_retx.keys().next() {
                self.pending_retx.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use core::cell::RefCell;

    fn harness() -> (Integrity, OutboundQueue) {
        let outbound: OutboundQueue = Rc::new(RefCell::new(VecDeque::new()));
        let relay = Rc::new(PacketRelay::new());
        relay.bind(outbound.clone());
        let mut integrity = Integrity::new(*b"PH00", relay, outbound.clone());
        integrity.enable_ack();
        (integrity, outbound)
    }

    fn data(seq: u16) -> Packet {
        let mut pkt = Packet::new(Method::Data, b"{}".to_vec());
        pkt.set_sequence(seq);
        pkt
    }

    fn acks_sent(outbound: &OutboundQueue) -> Vec<(u16, bool)> {
        outbound
            .borrow()
            .iter()
            .filter(|p| p.method() == Some(Method::Ack))
            .map(|p| {
                let parsed: AckPayload = serde_json::from_slice(p.payload()).unwrap();
                (parsed.seq_num, parsed.retry)
            })
            .collect()
    }

    #[test]
    fn pass_through_when_ack_disabled() {
        let (mut integrity, _outbound) = harness();
        integrity.disable_ack();
        let pkt = data(100);
        let out = integrity.process_incoming(pkt.clone());
        assert_eq!(out, alloc::vec![pkt]);
    }

    #[test]
    fn in_order_three_data_packets() {
        let (mut integrity, outbound) = harness();

        let mut delivered = Vec::new();
        for seq in [100u16, 101, 102] {
            delivered.extend(integrity.process_incoming(data(seq)));
        }

        let sequences: Vec<u16> = delivered.iter().map(|p| p.sequence()).collect();
        assert_eq!(sequences, alloc::vec![100, 101, 102]);
        assert_eq!(integrity.expected_in_seq(), 103);

        let acks = acks_sent(&outbound);
        assert_eq!(acks, alloc::vec![(100, false), (101, false), (102, false)]);
    }

    #[test]
    fn one_swap_within_buffer() {
        let (mut integrity, outbound) = harness();

        let first = integrity.process_incoming(data(100));
        assert_eq!(first.iter().map(|p| p.sequence()).collect::<Vec<_>>(), alloc::vec![100]);

        let second = integrity.process_incoming(data(102));
        assert!(second.is_empty());
        assert_eq!(integrity.out_of_order_len(), 1);

        let third = integrity.process_incoming(data(101));
        assert_eq!(
            third.iter().map(|p| p.sequence()).collect::<Vec<_>>(),
            alloc::vec![101, 102]
        );
        assert_eq!(integrity.expected_in_seq(), 103);

        let acks = acks_sent(&outbound);
        assert!(acks.contains(&(101, true)));
        assert!(acks.contains(&(101, false)));
    }

    #[test]
    fn overflow_jumps_the_gap() {
        let (mut integrity, _outbound) = harness();

        assert_eq!(
            integrity
                .process_incoming(data(100))
                .iter()
                .map(|p| p.sequence())
                .collect::<Vec<_>>(),
            alloc::vec![100]
        );

        for seq in [102u16, 103, 104, 105, 106] {
            assert!(integrity.process_incoming(data(seq)).is_empty());
        }
        assert_eq!(integrity.out_of_order_len(), OOO_MAX);

        let delivered = integrity.process_incoming(data(107));
        let sequences: Vec<u16> = delivered.iter().map(|p| p.sequence()).collect();
        assert_eq!(sequences, alloc::vec![102, 103, 104, 105, 106, 107]);
        assert_eq!(integrity.expected_in_seq(), 108);
        assert_eq!(integrity.out_of_order_len(), 0);
    }

    #[test]
    fn duplicate_is_dropped() {
        let (mut integrity, _outbound) = harness();
        let first = integrity.process_incoming(data(100));
        assert_eq!(first.len(), 1);
        let second = integrity.process_incoming(data(100));
        assert!(second.is_empty());
    }

    #[test]
    fn corrupt_packet_requests_retry_and_is_dropped() {
        let (mut integrity, outbound) = harness();
        let pkt = data(100);
        let mut bytes = pkt.serialize();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut header_bytes = [0u8; crate::codec::HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..crate::codec::HEADER_SIZE]);
        let header = crate::codec::Header::decode(&header_bytes);
        let corrupted = Packet::from_wire(header, bytes[crate::codec::HEADER_SIZE..].to_vec());

        let out = integrity.process_incoming(corrupted);
        assert!(out.is_empty());
        assert_eq!(acks_sent(&outbound), alloc::vec![(100, true)]);
    }

    #[test]
    fn ack_retry_false_clears_pending_retx() {
        let (mut integrity, outbound) = harness();
        let outgoing = integrity.process_outgoing(Packet::new(Method::Data, b"{}".to_vec()));
        assert_eq!(integrity.pending_retx_len(), 1);

        let ack_payload = serde_json::to_vec(&AckPayload {
            seq_num: outgoing.sequence(),
            retry: false,
        })
        .unwrap();
        let mut ack_pkt = Packet::new(Method::Ack, ack_payload);
        ack_pkt.set_sequence(0);

        let out = integrity.process_incoming(ack_pkt);
        assert!(out.is_empty());
        assert_eq!(integrity.pending_retx_len(), 0);
        assert!(outbound.borrow().is_empty());
    }

    #[test]
    fn ack_retry_true_resends_the_stored_packet() {
        let (mut integrity, outbound) = harness();
        let outgoing = integrity.process_outgoing(Packet::new(Method::Data, b"{\"x\":1}".to_vec()));
        outbound.borrow_mut().clear();

        let ack_payload = serde_json::to_vec(&AckPayload {
            seq_num: outgoing.sequence(),
            retry: true,
        })
        .unwrap();
        let mut ack_pkt = Packet::new(Method::Ack, ack_payload);
        ack_pkt.set_sequence(0);

        integrity.process_incoming(ack_pkt);

        let resent = outbound.borrow();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].sequence(), outgoing.sequence());
        assert_eq!(resent[0].payload(), outgoing.payload());
    }

    #[test]
    fn heartbeat_is_never_acknowledged_or_tracked() {
        let (mut integrity, outbound) = harness();
        let hb = Packet::new(Method::Heartbeat, Vec::new());
        let out = integrity.process_incoming(hb.clone());
        assert_eq!(out, alloc::vec![hb]);
        assert!(outbound.borrow().is_empty());
        assert_eq!(integrity.expected_in_seq(), 0);
    }
}
