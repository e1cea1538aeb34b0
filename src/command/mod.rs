// SPDX-License-Identifier: Apache-2.0

//! Command dispatch: routes an inbound `cmd_name` to either a built-in
//! handler or a dynamically registered actuator, and always answers with
//! an INFO (success or domain failure) or ERROR (unknown command) packet.

pub mod actuator;

pub use actuator::Actuator;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

use serde_json::{json, Value};

use crate::device::{Board, Device};
use crate::error::{DispatchError, DomainError};
use crate::manager::NetworkContext;
use crate::profile::{ProfileStore, WifiProfile};
use crate::relay::PacketRelay;
use crate::store::Store;

const BUILTIN_COMMANDS: &[&str] = &[
    "RECORD_CREATE",
    "RECORD_START",
    "RECORD_STOP",
    "RECORD_READ",
    "BATTERY_READ",
    "IDENTIFY",
    "RESTART",
    "CONNECTION_READ",
    "ACKNOWLEDGEMENT_ENABLE",
    "ACKNOWLEDGEMENT_DISABLE",
    "WIFI_PROFILE_CREATE",
    "WIFI_PROFILE_READ",
    "WIFI_PROFILE_ACTIVE_READ",
    "WIFI_PROFILE_ALL_READ",
    "WIFI_PROFILE_ACTIVE_SELECT",
    "WIFI_PROFILE_DELETE",
];

/// Routes `cmd_name` to a built-in handler first, a registered actuator
/// second, and an ERROR packet if neither claims it.
#[derive(Default)]
pub struct Dispatcher {
    actuators: BTreeMap<String, Box<dyn Actuator>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            actuators: BTreeMap::new(),
        }
    }

    pub fn register_actuator(&mut self, name: impl Into<String>, actuator: Box<dyn Actuator>) {
        self.actuators.insert(name.into(), actuator);
    }

    /// Dispatches one inbound COMMAND payload. `cmd_name` is stripped
    /// before a built-in handler sees the payload; actuators receive it
    /// untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch<B: Board, N: NetworkContext, S: Store>(
        &mut self,
        mut payload: Value,
        device: &mut Device<B>,
        network: &mut N,
        profiles: &mut ProfileStore<S>,
        relay: &PacketRelay,
        now_ms: u64,
    ) {
        let Some(cmd_name) = payload.get("cmd_name").and_then(Value::as_str).map(str::to_string) else {
            relay.error(json!({ "error": "payload is missing cmd_name" }).to_string().into_bytes());
            return;
        };

        if BUILTIN_COMMANDS.contains(&cmd_name.as_str()) {
            if let Value::Object(map) = &mut payload {
                map.remove("cmd_name");
            }
            match cmd_name.as_str() {
                "IDENTIFY" => self.dispatch_identify(&payload, device, relay),
                "RECORD_READ" => self.dispatch_record_read(device, relay),
                _ => dispatch_builtin(&cmd_name, &payload, device, network, profiles, relay, now_ms),
            }
            return;
        }

        if let Some(actuator) = self.actuators.get_mut(&cmd_name) {
            match actuator.execute(&cmd_name, &payload) {
                Ok(body) => relay.info(body.to_string().into_bytes()),
                Err(err) => relay.info(domain_failure(&cmd_name, &err).to_string().into_bytes()),
            }
            return;
        }

        let err = DispatchError { cmd_name: cmd_name.clone() };
        relay.error(json!({ "cmd_name": cmd_name, "error": err.to_string() }).to_string().into_bytes());
    }

    /// Node identity and sensor names are checked inside `Device::identify`;
    /// only once neither matches does this fall through to the actuator
    /// registry, which `Device` has no visibility into.
    fn dispatch_identify<B: Board>(&mut self, payload: &Value, device: &mut Device<B>, relay: &PacketRelay) {
        let requested = payload.get("identity").and_then(Value::as_str);
        let mut matched = device.identify(requested);
        if !matched {
            if let Some(name) = requested {
                if let Some(actuator) = self.actuators.get_mut(name) {
                    actuator.identification_action();
                    matched = true;
                }
            }
        }
        relay.info(json!({ "name": "IDENTIFY", "success": matched }).to_string().into_bytes());
    }

    /// Merges actuator command definitions into `Device`'s own capability
    /// body, since the dispatcher (not `Device`) owns the actuator registry.
    fn dispatch_record_read<B: Board>(&self, device: &Device<B>, relay: &PacketRelay) {
        let mut body = device.capabilities_response();
        let actuators: Value = self
            .actuators
            .iter()
            .map(|(name, actuator)| (name.clone(), actuator.commands_definition()))
            .collect::<serde_json::Map<_, _>>()
            .into();
        body["actuators"] = actuators;
        relay.info(body.to_string().into_bytes());
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_builtin<B: Board, N: NetworkContext, S: Store>(
    cmd_name: &str,
    payload: &Value,
    device: &mut Device<B>,
    network: &mut N,
    profiles: &mut ProfileStore<S>,
    relay: &PacketRelay,
    now_ms: u64,
) {
    match cmd_name {
        "RECORD_CREATE" => {
            if let Err(err) = device.create_capabilities(payload) {
                relay.info(domain_failure("RECORD_CREATE", &err).to_string().into_bytes());
            }
        }
        "RECORD_START" => device.start_record(now_ms),
        "RECORD_STOP" => {
            device.stop_record();
            device.report_stop();
        }
        "BATTERY_READ" => device.report_battery(),
        "RESTART" => device.restart(),
        "CONNECTION_READ" => {
            let (protocol, connection) = network.connection_info();
            relay.info(
                json!({
                    "name": "CONNECTION_READ",
                    "success": true,
                    "protocol": protocol,
                    "connection": connection,
                })
                .to_string()
                .into_bytes(),
            );
        }
        "ACKNOWLEDGEMENT_ENABLE" => {
            network.enable_ack();
            relay.info(
                json!({ "name": "ACKNOWLEDGEMENT_ENABLE", "success": true, "status": true })
                    .to_string()
                    .into_bytes(),
            );
        }
        "ACKNOWLEDGEMENT_DISABLE" => {
            network.disable_ack();
            relay.info(
                json!({ "name": "ACKNOWLEDGEMENT_DISABLE", "success": true, "status": false })
                    .to_string()
                    .into_bytes(),
            );
        }
        "WIFI_PROFILE_CREATE" => wifi_profile_create(payload, profiles, relay),
        "WIFI_PROFILE_READ" => wifi_profile_read(payload, profiles, relay),
        "WIFI_PROFILE_ACTIVE_READ" => wifi_profile_active_read(profiles, relay),
        "WIFI_PROFILE_ALL_READ" => wifi_profile_all_read(profiles, relay),
        "WIFI_PROFILE_ACTIVE_SELECT" => wifi_profile_active_select(payload, profiles, relay),
        "WIFI_PROFILE_DELETE" => wifi_profile_delete(payload, profiles, relay),
        _ => unreachable!("BUILTIN_COMMANDS and this match must stay in sync"),
    }
}

fn wifi_key_of(payload: &Value) -> String {
    payload
        .get("wifi_key")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn wifi_profile_create<S: Store>(payload: &Value, profiles: &mut ProfileStore<S>, relay: &PacketRelay) {
    let wifi_key = wifi_key_of(payload);
    if wifi_key.is_empty() {
        relay.info(
            json!({
                "name": "WIFI_PROFILE_CREATE",
                "success": false,
                "error": "could not read wifi_key from request body",
            })
            .to_string()
            .into_bytes(),
        );
        return;
    }

    let profile = WifiProfile {
        wifi_key: wifi_key.clone(),
        ssid: field_str(payload, "ssid"),
        password: field_str(payload, "password"),
        client_ip: field_str(payload, "client_ip"),
        client_port: payload.get("client_port").and_then(Value::as_u64).unwrap_or(0) as u16,
    };

    let mut body = json!({ "name": "WIFI_PROFILE_CREATE", "wifi_key": wifi_key });
    match profiles.create(profile) {
        Ok(()) => body["success"] = true.into(),
        Err(err) => {
            body["success"] = false.into();
            body["error"] = err.message.into();
        }
    }
    relay.info(body.to_string().into_bytes());
}

fn wifi_profile_read<S: Store>(payload: &Value, profiles: &ProfileStore<S>, relay: &PacketRelay) {
    let wifi_key = wifi_key_of(payload);
    let mut body = json!({ "name": "WIFI_PROFILE_READ" });
    if wifi_key.is_empty() {
        body["success"] = false.into();
        body["error"] = "could not read wifi_key from request body".into();
    } else {
        match profiles.read(&wifi_key) {
            Ok(profile) => {
                body["success"] = true.into();
                body["ssid"] = profile.ssid.into();
                body["password"] = profile.password.into();
                body["client_ip"] = profile.client_ip.into();
                body["client_port"] = profile.client_port.into();
            }
            Err(err) => {
                body["success"] = false.into();
                body["error"] = err.message.into();
            }
        }
    }
    relay.info(body.to_string().into_bytes());
}

fn wifi_profile_active_read<S: Store>(profiles: &ProfileStore<S>, relay: &PacketRelay) {
    let mut body = json!({ "name": "WIFI_PROFILE_ACTIVE_READ" });
    match profiles.read_active() {
        Ok(profile) => {
            body["success"] = true.into();
            body["wifi_key"] = profile.wifi_key.into();
            body["ssid"] = profile.ssid.into();
            body["password"] = profile.password.into();
            body["client_ip"] = profile.client_ip.into();
            body["client_port"] = profile.client_port.into();
        }
        Err(err) => {
            body["success"] = false.into();
            body["error"] = err.message.into();
        }
    }
    relay.info(body.to_string().into_bytes());
}

fn wifi_profile_all_read<S: Store>(profiles: &ProfileStore<S>, relay: &PacketRelay) {
    let entries: alloc::vec::Vec<Value> = profiles
        .read_all()
        .into_iter()
        .map(|profile| {
            json!({
                "wifi_key": profile.wifi_key,
                "ssid": profile.ssid,
                "password": profile.password,
                "client_ip": profile.client_ip,
                "client_port": profile.client_port,
            })
        })
        .collect();
    relay.info(
        json!({ "name": "WIFI_PROFILE_ALL_READ", "success": true, "profiles": entries })
            .to_string()
            .into_bytes(),
    );
}

fn wifi_profile_active_select<S: Store>(payload: &Value, profiles: &mut ProfileStore<S>, relay: &PacketRelay) {
    let wifi_key = wifi_key_of(payload);
    let mut body = json!({ "name": "WIFI_PROFILE_ACTIVE_SELECT", "wifi_key": wifi_key });
    if wifi_key.is_empty() {
        body["success"] = false.into();
        body["error"] = "could not read wifi_key from request body".into();
    } else {
        match profiles.select_active(&wifi_key) {
            Ok(()) => body["success"] = true.into(),
            Err(err) => {
                body["success"] = false.into();
                body["error"] = err.message.into();
            }
        }
    }
    relay.info(body.to_string().into_bytes());
}

fn wifi_profile_delete<S: Store>(payload: &Value, profiles: &mut ProfileStore<S>, relay: &PacketRelay) {
    let wifi_key = wifi_key_of(payload);
    let mut body = json!({ "name": "WIFI_PROFILE_DELETE", "wifi_key": wifi_key });
    if wifi_key.is_empty() {
        body["success"] = false.into();
        body["error"] = "could not read wifi_key from request body".into();
    } else {
        match profiles.destroy(&wifi_key) {
            Ok(()) => body["success"] = true.into(),
            Err(err) => {
                body["success"] = false.into();
                body["error"] = err.message.into();
            }
        }
    }
    relay.info(body.to_string().into_bytes());
}

fn field_str(payload: &Value, key: &str) -> String {
    payload.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn domain_failure(cmd_name: &str, err: &DomainError) -> Value {
    json!({ "name": cmd_name, "success": false, "error": err.message })
}
