// SPDX-License-Identifier: Apache-2.0

//! Top-level composition: wires the device, the transport manager, the
//! wireless profile store, and the command dispatcher into one event loop
//! tick. Nothing here reads a clock or touches hardware directly; the
//! caller supplies `now_ms` and owns whatever actually drives it (a
//! `millis()` call on a microcontroller, or `Instant` on a host).

use alloc::rc::Rc;

use crate::command::Dispatcher;
use crate::device::{Board, Device};
use crate::manager::TransportManager;
use crate::profile::{ProfileStore, WifiProfile};
use crate::relay::PacketRelay;
use crate::store::Store;
use crate::transport::{Delay, NoDelay, Wireless};

/// Owns every subsystem and drives one iteration of the firmware's main
/// loop per [`Node::tick`] call.
pub struct Node<B: Board, S: Store, D: Delay = NoDelay> {
    device: Device<B>,
    transport: TransportManager<D>,
    profiles: ProfileStore<S>,
    dispatcher: Dispatcher,
}

impl<B: Board, S: Store> Node<B, S, NoDelay> {
    pub fn new(node_identity: [u8; 4], board: B, store: S, seed_profile: WifiProfile) -> Self {
        Self::new_with_wireless(node_identity, board, store, seed_profile, None)
    }
}

impl<B: Board, S: Store, D: Delay> Node<B, S, D> {
    pub fn new_with_wireless(
        node_identity: [u8; 4],
        board: B,
        store: S,
        seed_profile: WifiProfile,
        wireless: Option<Wireless<D>>,
    ) -> Self {
        let transport = TransportManager::new_with_wireless(node_identity, wireless);
        let device = Device::new(node_identity, board, transport.relay());
        Self {
            device,
            transport,
            profiles: ProfileStore::new(store, seed_profile),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn device(&mut self) -> &mut Device<B> {
        &mut self.device
    }

    pub fn transport(&mut self) -> &mut TransportManager<D> {
        &mut self.transport
    }

    pub fn profiles(&mut self) -> &mut ProfileStore<S> {
        &mut self.profiles
    }

    pub fn relay(&self) -> Rc<PacketRelay> {
        self.transport.relay()
    }

    pub fn register_actuator(&mut self, name: impl Into<alloc::string::String>, actuator: alloc::boxed::Box<dyn crate::command::Actuator>) {
        self.dispatcher.register_actuator(name, actuator);
    }

    /// One iteration of the main loop: upgrade/heartbeat on their own
    /// cadence, dispatch every inbound command synchronously, sample any
    /// sensors due for a reading, then flush everything outbound.
    pub fn tick(&mut self, now_ms: u64) {
        self.transport.upgrade_protocol(now_ms);
        self.transport.send_heartbeat(now_ms);

        let commands = self.transport.read_incoming();
        crate::trace_event!(debug, count = commands.len(), now_ms, "dispatching inbound commands");
        for payload in commands {
            let relay = self.transport.relay();
            self.dispatcher.dispatch(
                payload,
                &mut self.device,
                &mut self.transport,
                &mut self.profiles,
                &relay,
                now_ms,
            );
        }

        if self.device.is_in_progress(now_ms) {
            let readings = self.device.read_sensors(now_ms);
            let outbound = self.transport.outbound_queue();
            for pkt in readings {
                outbound.borrow_mut().push_back(pkt);
            }
            self.device.autostop_if_complete(now_ms);
        }

        self.transport.write_outgoing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Method, Packet};
    use alloc::boxed::Box;
    use serde_json::json;

    struct StubBoard;
    impl Board for StubBoard {
        fn init(&mut self) {}
        fn update(&mut self) {}
        fn get_battery(&self) -> u8 {
            90
        }
        fn get_battery_charging(&self) -> bool {
            false
        }
        fn restart(&mut self) {}
        fn identify(&mut self) {}
        fn allocated_heap_percent(&self) -> usize {
            20
        }
    }

    fn seed() -> WifiProfile {
        WifiProfile {
            wifi_key: alloc::string::String::from("wifi_primary"),
            ssid: alloc::string::String::from("s"),
            password: alloc::string::String::from("p"),
            client_ip: alloc::string::String::from("0.0.0.0"),
            client_port: 0,
        }
    }

    #[test]
    fn tick_dispatches_an_inbound_battery_read_and_answers_on_the_wire() {
        let mut node = Node::new(*b"PH00", StubBoard, crate::store::MemoryStore::new(), seed());

        let cmd = Packet::new(Method::Command, json!({ "cmd_name": "BATTERY_READ" }).to_string().into_bytes());
        node.transport().feed_point_to_point(&cmd.serialize());

        node.tick(0);

        let written = node.transport().drain_point_to_point_written();
        assert!(!written.is_empty());
    }

    #[test]
    fn tick_with_no_input_does_not_panic() {
        let mut node = Node::new(*b"PH00", StubBoard, crate::store::MemoryStore::new(), seed());
        node.tick(0);
        node.tick(1_000);
    }
}
