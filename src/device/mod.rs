// SPDX-License-Identifier: Apache-2.0

//! Record/device lifecycle: sensors, the board, and the timed sampling run
//! that drains readings to the outbound queue.

pub mod board;
pub mod sensor;

pub use board::Board;
pub use sensor::{Sensor, SensorCapabilities};

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::{json, Value};

use crate::codec::{Method, Packet};
use crate::error::DomainError;
use crate::relay::PacketRelay;

/// Device-wide settings for one recording run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// 0 means "run forever" until stopped or `max_samples` is hit.
    pub duration_ms: u64,
    /// 0 means "no sample cap".
    pub max_samples: u64,
    /// Grace period after `RECORD_START` before sampling actually begins.
    pub delay_ms: u64,
}

struct SensorSlot {
    sensor: Box<dyn Sensor>,
    capabilities: SensorCapabilities,
    sequence: u16,
    last_state: Option<Value>,
    last_sample_ms: u64,
}

/// Owns the board, the registered sensors, and the state of the current
/// (or most recent) recording run.
pub struct Device<B: Board> {
    identity: [u8; 4],
    board: B,
    capabilities: DeviceCapabilities,
    recording: bool,
    start_time_ms: u64,
    sample_count: u64,
    sensors: BTreeMap<String, SensorSlot>,
    relay: Rc<PacketRelay>,
}

impl<B: Board> Device<B> {
    pub fn new(identity: [u8; 4], board: B, relay: Rc<PacketRelay>) -> Self {
        Self {
            identity,
            board,
            capabilities: DeviceCapabilities::default(),
            recording: false,
            start_time_ms: 0,
            sample_count: 0,
            sensors: BTreeMap::new(),
            relay,
        }
    }

    pub fn add_sensor(&mut self, name: impl Into<String>, sensor: Box<dyn Sensor>) {
        self.sensors.insert(
            name.into(),
            SensorSlot {
                sensor,
                capabilities: SensorCapabilities::default(),
                sequence: 0,
                last_state: None,
                last_sample_ms: 0,
            },
        );
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// `recording && now >= start_time + delay_ms`.
    pub fn is_in_progress(&self, now_ms: u64) -> bool {
        self.recording && now_ms >= self.start_time_ms.saturating_add(self.capabilities.delay_ms)
    }

    fn is_complete(&self, now_ms: u64) -> bool {
        if !self.recording {
            return false;
        }
        let duration_elapsed = self.capabilities.duration_ms > 0
            && now_ms > self.start_time_ms.saturating_add(self.capabilities.duration_ms);
        let samples_reached =
            self.capabilities.max_samples > 0 && self.sample_count >= self.capabilities.max_samples;
        duration_elapsed || samples_reached
    }

    /// Stops the run and reports `RECORD_STOP` success if the autostop
    /// condition has been met. Call once per tick while recording.
    pub fn autostop_if_complete(&mut self, now_ms: u64) -> bool {
        if !self.is_complete(now_ms) {
            return false;
        }
        self.stop_record();
        self.relay
            .info(json_response("RECORD_STOP", true, None).to_string().into_bytes());
        true
    }

    /// Idempotent: always resets the run regardless of whether one was
    /// already in progress.
    pub fn start_record(&mut self, now_ms: u64) {
        self.sample_count = 0;
        self.start_time_ms = now_ms;
        self.recording = true;
        self.relay
            .info(json_response("RECORD_START", true, None).to_string().into_bytes());
    }

    /// Idempotent: always leaves the device in the stopped state.
    pub fn stop_record(&mut self) {
        self.recording = false;
        for slot in self.sensors.values_mut() {
            slot.sequence = 0;
        }
    }

    pub fn report_stop(&self) {
        self.relay
            .info(json_response("RECORD_STOP", true, None).to_string().into_bytes());
    }

    /// Body for `RECORD_READ`, sans the `actuators` field the dispatcher
    /// merges in from its own registry before emitting the response.
    pub fn capabilities_response(&self) -> Value {
        let mut body = json_response("RECORD_READ", true, None);
        body["duration"] = self.capabilities.duration_ms.into();
        body["max_samples"] = self.capabilities.max_samples.into();
        body["delay"] = self.capabilities.delay_ms.into();
        let models: Value = self
            .sensors
            .iter()
            .map(|(name, slot)| (name.clone(), slot.sensor.model_definition()))
            .collect::<serde_json::Map<_, _>>()
            .into();
        body["sensors"] = models;
        body
    }

    /// Rejects changes while recording, matching the original firmware's
    /// guard against reconfiguring a live run.
    pub fn create_capabilities(&mut self, payload: &Value) -> Result<(), DomainError> {
        if self.recording {
            return Err(DomainError::new("cannot change capabilities while recording"));
        }

        if let Some(v) = payload.get("duration").and_then(Value::as_u64) {
            self.capabilities.duration_ms = v;
        }
        if let Some(v) = payload.get("max_samples").and_then(Value::as_u64) {
            self.capabilities.max_samples = v;
        }
        if let Some(v) = payload.get("delay").and_then(Value::as_u64) {
            self.capabilities.delay_ms = v;
        }

        let include_timestamp = payload.get("include_timestamp").and_then(Value::as_bool);
        let include_sequence = payload.get("include_sequence").and_then(Value::as_bool);

        if let Some(sensors) = payload.get("sensors").and_then(Value::as_array) {
            for entry in sensors {
                let Some(name) = entry.get("name").and_then(Value::as_str) else {
                    continue;
                };
                if let Some(slot) = self.sensors.get_mut(name) {
                    if let Some(v) = entry.get("enabled").and_then(Value::as_bool) {
                        slot.capabilities.enabled = v;
                    }
                    if let Some(v) = entry.get("sample_rate_hz").and_then(Value::as_u64) {
                        slot.capabilities.sample_rate_hz = v as u32;
                    }
                    if let Some(v) = entry.get("data_on_state_change").and_then(Value::as_bool) {
                        slot.capabilities.data_on_state_change = v;
                    }
                    if let Some(v) = include_timestamp {
                        slot.capabilities.include_timestamp = v;
                    }
                    if let Some(v) = include_sequence {
                        slot.capabilities.include_sequence = v;
                    }
                }
            }
        }

        self.relay
            .info(json_response("RECORD_CREATE", true, None).to_string().into_bytes());
        Ok(())
    }

    /// Emits one DATA packet per enabled sensor whose sampling period has
    /// elapsed, subject to state-change gating. Returns the packets for the
    /// caller to push onto the outbound queue.
    pub fn read_sensors(&mut self, now_ms: u64) -> Vec<Packet> {
        if !self.recording {
            return Vec::new();
        }

        let mut emitted = Vec::new();
        for slot in self.sensors.values_mut() {
            if !slot.capabilities.enabled {
                continue;
            }
            let period_ms = sample_period_ms(slot.capabilities.sample_rate_hz);
            if now_ms.saturating_sub(slot.last_sample_ms) < period_ms {
                continue;
            }

            let reading = slot.sensor.read_data();
            if slot.capabilities.data_on_state_change && slot.last_state.as_ref() == Some(&reading) {
                slot.last_sample_ms = now_ms;
                continue;
            }

            let mut body = reading.clone();
            if slot.capabilities.include_timestamp {
                body["timestamp"] = now_ms.into();
            }
            if slot.capabilities.include_sequence {
                body["sequence"] = slot.sequence.into();
                slot.sequence = slot.sequence.wrapping_add(1);
            }

            let mut pkt = Packet::new(Method::Data, body.to_string().into_bytes());
            pkt.set_node_identity(self.identity);
            emitted.push(pkt);

            slot.last_sample_ms = now_ms;
            slot.last_state = Some(reading);
            self.sample_count += 1;
        }
        emitted
    }

    pub fn restart(&mut self) {
        self.board.restart();
    }

    pub fn report_battery(&mut self) {
        let mut body = json_response("BATTERY_READ", true, None);
        body["percentage"] = self.board.get_battery().into();
        body["charging"] = self.board.get_battery_charging().into();
        self.relay.info(body.to_string().into_bytes());
    }

    /// Checks `requested` against node identity first, then the sensor
    /// registry, firing the matching identification action. `None` (no
    /// specific identity named) always matches the node itself. Returns
    /// whether anything matched; the dispatcher falls through to its own
    /// actuator registry when this returns `false`.
    pub fn identify(&mut self, requested: Option<&str>) -> bool {
        match requested {
            None => {
                self.board.identify();
                true
            }
            Some(id) if id.as_bytes() == self.identity => {
                self.board.identify();
                true
            }
            Some(name) => match self.sensors.get_mut(name) {
                Some(slot) => {
                    slot.sensor.identification_action();
                    true
                }
                None => false,
            },
        }
    }
}

fn sample_period_ms(sample_rate_hz: u32) -> u64 {
    if sample_rate_hz == 0 {
        0
    } else {
        1000 / u64::from(sample_rate_hz)
    }
}

fn json_response(name: &str, success: bool, error: Option<&str>) -> Value {
    let mut body = json!({ "name": name, "success": success });
    if let Some(error) = error {
        body["error"] = error.into();
    }
    body
}
