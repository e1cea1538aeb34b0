// SPDX-License-Identifier: Apache-2.0

//! The sensor contract and its per-sensor capability record.

use serde_json::Value;

/// Per-sensor toggles merged in by `RECORD_CREATE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorCapabilities {
    pub enabled: bool,
    pub include_timestamp: bool,
    pub include_sequence: bool,
    pub sample_rate_hz: u32,
    pub data_on_state_change: bool,
}

impl Default for SensorCapabilities {
    fn default() -> Self {
        Self {
            enabled: false,
            include_timestamp: false,
            include_sequence: false,
            sample_rate_hz: 1,
            data_on_state_change: false,
        }
    }
}

/// What a concrete sensor implementation must provide. An external
/// collaborator; this crate never reads real hardware.
pub trait Sensor {
    /// One reading, already shaped as the JSON body a DATA packet carries.
    fn read_data(&mut self) -> Value;
    fn model_definition(&self) -> Value;
    /// Runs whatever physical identification action the sensor supports.
    fn identification_action(&mut self);
}
