// SPDX-License-Identifier: Apache-2.0

//! The actuator contract: a dynamically named set of commands an external
//! collaborator registers at boot, grounded in the original firmware's
//! `std::map<String, std::function<...>>` callback registry.

use crate::error::DomainError;
use serde_json::Value;

/// What a concrete actuator implementation must provide. Unlike built-in
/// commands, an actuator owns its own command names and payload shape; the
/// dispatcher only routes `cmd_name` to whichever actuator registered it.
pub trait Actuator {
    /// Runs whatever physical identification action this actuator supports.
    fn identification_action(&mut self);
    /// The capability/model description surfaced alongside `RECORD_READ`'s
    /// sensor models, describing the commands this actuator answers to.
    fn commands_definition(&self) -> Value;
    /// Executes one command by name. `name` is the same `cmd_name` the
    /// actuator was registered under; an actuator that answers to more than
    /// one name can switch on it.
    fn execute(&mut self, name: &str, payload: &Value) -> Result<Value, DomainError>;
}
