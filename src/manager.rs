// SPDX-License-Identifier: Apache-2.0

//! Owns the concrete transports, decides which one is active, and drains
//! the outbound queue through the integrity layer on every tick.
//!
//! The event loop calls [`TransportManager::upgrade_protocol`] and
//! [`TransportManager::send_heartbeat`] on their own cadence, then
//! [`TransportManager::read_incoming`] and [`TransportManager::write_outgoing`]
//! every tick. Cadence is driven by the caller passing the current
//! millisecond timestamp in; nothing here reads a clock directly, which
//! keeps the manager testable without a real one.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use serde_json::Value;

use crate::codec::Method;
use crate::integrity::Integrity;
use crate::relay::{OutboundQueue, PacketRelay};
use crate::transport::{Delay, NoDelay, PointToPoint, Transport, Wireless};

/// Minimum gap between `upgrade_protocol` evaluations.
pub const TIMEOUT_WIRELESS_UPGRADE_MS: u64 = 1_000;

/// Minimum gap between heartbeats.
pub const HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// What the command dispatcher needs from whatever owns the transports,
/// without depending on `TransportManager` directly.
pub trait NetworkContext {
    fn enable_ack(&mut self);
    fn disable_ack(&mut self);
    fn connection_info(&self) -> (String, bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Active {
    PointToPoint,
    Wireless,
}

/// Owns every transport and the reliability layer sitting in front of them.
pub struct TransportManager<D: Delay = NoDelay> {
    point_to_point: PointToPoint,
    wireless: Option<Wireless<D>>,
    active: Active,
    integrity: Integrity,
    relay: Rc<PacketRelay>,
    outbound: OutboundQueue,
    last_heartbeat_ms: Option<u64>,
    last_upgrade_check_ms: Option<u64>,
}

impl TransportManager<NoDelay> {
    /// Builds a manager with only the always-available point-to-point
    /// transport; call [`Self::with_wireless`] to add a radio link.
    pub fn new(node_identity: [u8; 4]) -> Self {
        Self::new_with_wireless(node_identity, None)
    }
}

impl<D: Delay> TransportManager<D> {
    pub fn new_with_wireless(node_identity: [u8; 4], wireless: Option<Wireless<D>>) -> Self {
        let outbound: OutboundQueue = Rc::new(RefCell::new(VecDeque::new()));
        let relay = Rc::new(PacketRelay::new());
        relay.bind(outbound.clone());

        let mut point_to_point = PointToPoint::new();
        point_to_point.init();

        let mut wireless = wireless;
        if let Some(w) = wireless.as_mut() {
            w.init();
        }

        Self {
            point_to_point,
            wireless,
            active: Active::PointToPoint,
            integrity: Integrity::new(node_identity, relay.clone(), outbound.clone()),
            relay,
            outbound,
            last_heartbeat_ms: None,
            last_upgrade_check_ms: None,
        }
    }

    pub fn relay(&self) -> Rc<PacketRelay> {
        self.relay.clone()
    }

    pub fn outbound_queue(&self) -> OutboundQueue {
        self.outbound.clone()
    }

    pub fn enable_ack(&mut self) {
        self.integrity.enable_ack();
    }

    pub fn disable_ack(&mut self) {
        self.integrity.disable_ack();
    }

    pub fn ack_enabled(&self) -> bool {
        self.integrity.ack_enabled()
    }

    pub fn active_name(&self) -> &str {
        match self.active {
            Active::PointToPoint => self.point_to_point.name(),
            Active::Wireless => self.wireless.as_ref().map_or("wireless", |w| w.name()),
        }
    }

    pub fn is_connected(&self) -> bool {
        match self.active {
            Active::PointToPoint => self.point_to_point.connected(),
            Active::Wireless => self.wireless.as_ref().is_some_and(|w| w.connected()),
        }
    }

    /// `{protocol, connection}` as surfaced by the CONNECTION_READ command.
    pub fn connection_info(&self) -> (String, bool) {
        (String::from(self.active_name()), self.is_connected())
    }

    /// Promotes to wireless once it reports a connection; falls back to
    /// point-to-point the moment it doesn't. Runs at most once per
    /// `TIMEOUT_WIRELESS_UPGRADE_MS`.
    pub fn upgrade_protocol(&mut self, now_ms: u64) {
        if !check_timeout(&mut self.last_upgrade_check_ms, now_ms, TIMEOUT_WIRELESS_UPGRADE_MS) {
            return;
        }

        let wireless_connected = self.wireless.as_ref().is_some_and(|w| w.connected());
        let next = match self.active {
            Active::Wireless if !wireless_connected => Active::PointToPoint,
            Active::PointToPoint if wireless_connected => Active::Wireless,
            other => other,
        };
        if next != self.active {
            crate::trace_event!(info, from = self.active_name(), "transport protocol changed");
        }
        self.active = next;
    }

    pub fn send_heartbeat(&mut self, now_ms: u64) {
        if check_timeout(&mut self.last_heartbeat_ms, now_ms, HEARTBEAT_INTERVAL_MS) {
            self.relay.heartbeat();
        }
    }

    /// Pulls one packet from the active transport, runs it through the
    /// integrity layer, and returns the JSON payloads of any COMMAND
    /// packets that came out the other end.
    pub fn read_incoming(&mut self) -> Vec<Value> {
        let pkt = match self.active {
            Active::PointToPoint => self.point_to_point.read_packet(),
            Active::Wireless => self.wireless.as_mut().and_then(|w| w.read_packet()),
        };

        let Some(pkt) = pkt else {
            return Vec::new();
        };

        let mut commands = Vec::new();
        for delivered in self.integrity.process_incoming(pkt) {
            match delivered.method() {
                Some(Method::Command) => {
                    if let Ok(value) = serde_json::from_slice::<Value>(delivered.payload()) {
                        commands.push(value);
                    }
                }
                Some(Method::Heartbeat) => {
                    // liveness observed; no teardown policy is defined for
                    // a missing heartbeat (see open questions)
                }
                _ => {}
            }
        }
        commands
    }

    /// Drains the outbound queue, non-blocking and unbounded per call.
    pub fn write_outgoing(&mut self) {
        loop {
            let next = self.outbound.borrow_mut().pop_front();
            let Some(pkt) = next else {
                break;
            };
            let stamped = self.integrity.process_outgoing(pkt);
            match self.active {
                Active::PointToPoint => self.point_to_point.write_packet(&stamped),
                Active::Wireless => {
                    if let Some(w) = self.wireless.as_mut() {
                        w.write_packet(&stamped);
                    }
                }
            }
        }
    }

    pub fn feed_point_to_point(&mut self, bytes: &[u8]) {
        self.point_to_point.feed(bytes);
    }

    pub fn drain_point_to_point_written(&mut self) -> Vec<u8> {
        self.point_to_point.drain_written()
    }

    pub fn feed_wireless(&mut self, bytes: &[u8]) {
        if let Some(w) = self.wireless.as_mut() {
            w.feed(bytes);
        }
    }

    pub fn drain_wireless_written(&mut self) -> Vec<u8> {
        self.wireless.as_mut().map_or_else(Vec::new, |w| w.drain_written())
    }

    pub fn wireless_on_connect(&mut self) {
        if let Some(w) = self.wireless.as_mut() {
            w.on_connect();
        }
    }

    pub fn wireless_on_disconnect(&mut self) {
        if let Some(w) = self.wireless.as_mut() {
            w.on_disconnect();
        }
    }
}

impl<D: Delay> NetworkContext for TransportManager<D> {
    fn enable_ack(&mut self) {
        TransportManager::enable_ack(self);
    }

    fn disable_ack(&mut self) {
        TransportManager::disable_ack(self);
    }

    fn connection_info(&self) -> (String, bool) {
        TransportManager::connection_info(self)
    }
}

/// Returns `true` (and records `now_ms`) the first time it's ever called, or
/// whenever at least `interval_ms` has elapsed since the last time it fired.
fn check_timeout(last: &mut Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    let due = match *last {
        None => true,
        Some(last_ms) => now_ms.wrapping_sub(last_ms) >= interval_ms,
    };
    if due {
        *last = Some(now_ms);
    }
    due
}
