// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod codec;
pub mod command;
pub mod device;
pub mod error;
pub mod integrity;
pub mod manager;
pub mod node;
pub mod profile;
pub mod relay;
pub mod sequence;
pub mod store;
pub mod transport;

pub use codec::{Method, Packet};
pub use error::{DispatchError, FramingError, StoreError};
pub use node::Node;
pub use sequence::Sequence;

/// Emits a tracing event when the `tracing` feature is enabled and compiles
/// to nothing otherwise, so call sites never need their own `cfg`.
#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($lvl:ident, $($arg:tt)*) => {
        tracing::$lvl!($($arg)*);
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($lvl:ident, $($arg:tt)*) => {{}};
}

pub(crate) use trace_event;
