// SPDX-License-Identifier: Apache-2.0

//! Process-wide sink for outbound control packets.
//!
//! [`PacketRelay`] replaces the original firmware's `PacketRelay` singleton
//! with an explicit, constructible handle: any subsystem that needs to push
//! an INFO/DEBUG/ERROR/ACK/HEARTBEAT packet is handed one rather than
//! reaching through a global. Queue assignment is first-writer-wins so that
//! re-wiring a relay that has already started logging can never silently
//! drop its target.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::codec::{Method, Packet};

/// The transport manager's outbound queue, shared with every producer.
///
/// A single-threaded cooperative scheduler never observes two writers
/// touching this at once, so `Rc<RefCell<_>>` is sufficient; there is no
/// need for an atomic or a mutex (see the concurrency model).
pub type OutboundQueue = Rc<RefCell<VecDeque<Packet>>>;

/// Pushes control packets into an outbound queue it does not own.
///
/// Constructed without a queue; [`PacketRelay::bind`] attaches one exactly
/// once. Calls made before binding are silently dropped rather than
/// panicking, matching a logger that must never be the reason a caller
/// fails.
#[derive(Default)]
pub struct PacketRelay {
    queue: RefCell<Option<OutboundQueue>>,
}

impl PacketRelay {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(None),
        }
    }

    /// Attaches the outbound queue. Only the first call has any effect;
    /// later calls are no-ops so an already-wired relay can't be hijacked.
    pub fn bind(&self, queue: OutboundQueue) {
        let mut slot = self.queue.borrow_mut();
        if slot.is_none() {
            *slot = Some(queue);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.queue.borrow().is_some()
    }

    fn push(&self, method: Method, payload: alloc::vec::Vec<u8>) {
        if let Some(queue) = self.queue.borrow().as_ref() {
            queue.borrow_mut().push_back(Packet::new(method, payload));
        }
    }

    pub fn info(&self, payload: impl Into<alloc::vec::Vec<u8>>) {
        self.push(Method::Info, payload.into());
    }

    pub fn debug(&self, payload: impl Into<alloc::vec::Vec<u8>>) {
        self.push(Method::Debug, payload.into());
    }

    pub fn error(&self, payload: impl Into<alloc::vec::Vec<u8>>) {
        self.push(Method::Error, payload.into());
    }

    pub fn ack(&self, payload: impl Into<alloc::vec::Vec<u8>>) {
        self.push(Method::Ack, payload.into());
    }

    pub fn heartbeat(&self) {
        self.push(Method::Heartbeat, alloc::vec::Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> OutboundQueue {
        Rc::new(RefCell::new(VecDeque::new()))
    }

    #[test]
    fn calls_before_binding_are_dropped_not_panicking() {
        let relay = PacketRelay::new();
        relay.info(b"{}".to_vec());
        assert!(!relay.is_bound());
    }

    #[test]
    fn bound_relay_pushes_into_the_shared_queue() {
        let relay = PacketRelay::new();
        let q = queue();
        relay.bind(q.clone());
        relay.info(b"{\"ok\":true}".to_vec());
        relay.heartbeat();
        assert_eq!(q.borrow().len(), 2);
        assert_eq!(q.borrow()[0].method(), Some(Method::Info));
        assert_eq!(q.borrow()[1].method(), Some(Method::Heartbeat));
    }

    #[test]
    fn binding_twice_keeps_the_first_queue() {
        let relay = PacketRelay::new();
        let first = queue();
        let second = queue();
        relay.bind(first.clone());
        relay.bind(second.clone());
        relay.error(b"{}".to_vec());
        assert_eq!(first.borrow().len(), 1);
        assert_eq!(second.borrow().len(), 0);
    }
}
