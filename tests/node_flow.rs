// SPDX-License-Identifier: Apache-2.0

//! End-to-end coverage driving the public API the way firmware actually
//! would: feed wire bytes in, tick, drain wire bytes out.

use sensor_link::codec::{Method, Packet};
use sensor_link::device::{Board, Sensor};
use sensor_link::node::Node;
use sensor_link::profile::WifiProfile;
use sensor_link::store::MemoryStore;
use serde_json::{json, Value};

use std::cell::Cell;
use std::rc::Rc;

struct TestBoard {
    battery: u8,
    restarted: Rc<Cell<bool>>,
}

impl Board for TestBoard {
    fn init(&mut self) {}
    fn update(&mut self) {}
    fn get_battery(&self) -> u8 {
        self.battery
    }
    fn get_battery_charging(&self) -> bool {
        true
    }
    fn restart(&mut self) {
        self.restarted.set(true);
    }
    fn identify(&mut self) {}
    fn allocated_heap_percent(&self) -> usize {
        30
    }
}

struct CountingSensor {
    value: u32,
}

impl Sensor for CountingSensor {
    fn read_data(&mut self) -> Value {
        self.value += 1;
        json!({ "value": self.value })
    }
    fn model_definition(&self) -> Value {
        json!({ "type": "counter" })
    }
    fn identification_action(&mut self) {}
}

fn seed() -> WifiProfile {
    WifiProfile {
        wifi_key: String::from("wifi_primary"),
        ssid: String::from("build-ssid"),
        password: String::from("build-password"),
        client_ip: String::from("192.168.1.50"),
        client_port: 9000,
    }
}

fn responses(bytes: &[u8]) -> Vec<Value> {
    let mut out = Vec::new();
    let mut rest = bytes;
    while rest.len() >= sensor_link::codec::HEADER_SIZE {
        let mut header_bytes = [0u8; sensor_link::codec::HEADER_SIZE];
        header_bytes.copy_from_slice(&rest[..sensor_link::codec::HEADER_SIZE]);
        let header = sensor_link::codec::Header::decode(&header_bytes);
        let total = sensor_link::codec::HEADER_SIZE + usize::from(header.payload_size);
        if rest.len() < total {
            break;
        }
        let payload = &rest[sensor_link::codec::HEADER_SIZE..total];
        if let Ok(v) = serde_json::from_slice::<Value>(payload) {
            out.push(v);
        }
        rest = &rest[total..];
    }
    out
}

#[test]
fn record_autostop_end_to_end_through_the_node_tick() {
    let mut node = Node::new(*b"PH00", TestBoard { battery: 77, restarted: Rc::new(Cell::new(false)) }, MemoryStore::new(), seed());
    node.device().add_sensor("imu", Box::new(CountingSensor { value: 0 }));

    let create = Packet::new(
        Method::Command,
        json!({
            "cmd_name": "RECORD_CREATE",
            "max_samples": 3,
            "sensors": [{ "name": "imu", "enabled": true, "sample_rate_hz": 1000 }]
        })
        .to_string()
        .into_bytes(),
    );
    node.transport().feed_point_to_point(&create.serialize());
    node.tick(0);
    let _ = node.transport().drain_point_to_point_written();

    let start = Packet::new(Method::Command, json!({ "cmd_name": "RECORD_START" }).to_string().into_bytes());
    node.transport().feed_point_to_point(&start.serialize());
    node.tick(1);
    let _ = node.transport().drain_point_to_point_written();

    let mut saw_autostop = false;
    for tick in 2..10u64 {
        node.tick(tick);
        let written = node.transport().drain_point_to_point_written();
        if responses(&written).iter().any(|v| v["name"] == "RECORD_STOP" && v["success"] == true) {
            saw_autostop = true;
            break;
        }
    }

    assert!(saw_autostop, "expected an autostop RECORD_STOP within the tick budget");
    assert!(!node.device().is_recording());
}

#[test]
fn battery_read_command_round_trips_over_the_wire() {
    let mut node = Node::new(*b"PH00", TestBoard { battery: 64, restarted: Rc::new(Cell::new(false)) }, MemoryStore::new(), seed());

    let cmd = Packet::new(Method::Command, json!({ "cmd_name": "BATTERY_READ" }).to_string().into_bytes());
    node.transport().feed_point_to_point(&cmd.serialize());
    node.tick(0);

    let written = node.transport().drain_point_to_point_written();
    let replies = responses(&written);
    let battery_reply = replies.iter().find(|v| v["name"] == "BATTERY_READ").expect("a BATTERY_READ reply");
    assert_eq!(battery_reply["percentage"], 64);
    assert_eq!(battery_reply["charging"], true);
}

#[test]
fn wifi_profile_create_then_read_all_round_trips_through_commands() {
    let mut node = Node::new(*b"PH00", TestBoard { battery: 50, restarted: Rc::new(Cell::new(false)) }, MemoryStore::new(), seed());

    let create = Packet::new(
        Method::Command,
        json!({
            "cmd_name": "WIFI_PROFILE_CREATE",
            "wifi_key": "guest",
            "ssid": "guest-net",
            "password": "hunter2",
            "client_ip": "10.0.0.5",
            "client_port": 9001
        })
        .to_string()
        .into_bytes(),
    );
    node.transport().feed_point_to_point(&create.serialize());
    node.tick(0);
    let _ = node.transport().drain_point_to_point_written();

    let read_all = Packet::new(Method::Command, json!({ "cmd_name": "WIFI_PROFILE_ALL_READ" }).to_string().into_bytes());
    node.transport().feed_point_to_point(&read_all.serialize());
    node.tick(1);
    let written = node.transport().drain_point_to_point_written();

    let replies = responses(&written);
    let all_read = replies.iter().find(|v| v["name"] == "WIFI_PROFILE_ALL_READ").unwrap();
    let profiles = all_read["profiles"].as_array().unwrap();
    assert_eq!(profiles.len(), 2, "the seeded profile plus the newly created guest profile");
    assert!(profiles.iter().any(|p| p["wifi_key"] == "guest"));
}

#[test]
fn restart_command_reaches_the_board() {
    let restarted = Rc::new(Cell::new(false));
    let mut node = Node::new(*b"PH00", TestBoard { battery: 10, restarted: restarted.clone() }, MemoryStore::new(), seed());

    let cmd = Packet::new(Method::Command, json!({ "cmd_name": "RESTART" }).to_string().into_bytes());
    node.transport().feed_point_to_point(&cmd.serialize());
    node.tick(0);

    assert!(restarted.get());
}
