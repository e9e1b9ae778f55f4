//! Take policies for named remote operations.
//!
//! Results are never aborted in flight. A ticket that is no longer current
//! when its result arrives is reported stale and the result is dropped.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakePolicy {
    /// Ignore new requests while one is in flight.
    Leading,
    /// Each request supersedes the ones before it.
    Latest,
    /// Every result applies.
    Every,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    name: String,
    serial: u64,
    generation: u64,
}

impl FetchTicket {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    in_flight: HashSet<u64>,
}

#[derive(Debug, Default)]
pub struct FetchRegistry {
    slots: HashMap<String, Slot>,
    next_serial: u64,
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, or return `None` when the policy drops it.
    pub fn begin(&mut self, name: &str, policy: TakePolicy) -> Option<FetchTicket> {
        let slot = self.slots.entry(name.to_string()).or_default();
        match policy {
            TakePolicy::Leading if !slot.in_flight.is_empty() => {
                tracing::debug!("{name} already in flight, dropping request");
                return None;
            }
            TakePolicy::Latest => {
                if !slot.in_flight.is_empty() {
                    tracing::debug!("{name} superseded by a newer request");
                }
                slot.generation += 1;
            }
            TakePolicy::Leading | TakePolicy::Every => {}
        }
        self.next_serial += 1;
        slot.in_flight.insert(self.next_serial);
        Some(FetchTicket {
            name: name.to_string(),
            serial: self.next_serial,
            generation: slot.generation,
        })
    }

    /// Finish a request. Returns whether its result should be applied.
    pub fn complete(&mut self, ticket: &FetchTicket) -> bool {
        let Some(slot) = self.slots.get_mut(&ticket.name) else {
            return false;
        };
        let was_in_flight = slot.in_flight.remove(&ticket.serial);
        let current = was_in_flight && slot.generation == ticket.generation;
        if !current {
            tracing::warn!("discarding stale result for {}", ticket.name);
        }
        current
    }

    /// Make every outstanding request for `name` stale.
    pub fn cancel(&mut self, name: &str) {
        if let Some(slot) = self.slots.get_mut(name) {
            slot.generation += 1;
            slot.in_flight.clear();
        }
    }

    pub fn is_in_flight(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .is_some_and(|slot| !slot.in_flight.is_empty())
    }
}
