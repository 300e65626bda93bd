//! Response ordering for the stdio transport.

use std::collections::BTreeMap;

use serde_json::Value;

/// How completed responses are written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseOrder {
    /// As soon as each completes; clients correlate by id.
    #[default]
    Unordered,
    /// In the order the requests arrived.
    Arrival,
}

/// Releases responses in reservation order.
///
/// Each inbound request reserves a slot when it is read. A slot completes
/// with `Some(response)` or `None` (nothing to write); completed slots are
/// released only once every earlier slot has completed.
#[derive(Debug, Default)]
pub struct Sequencer {
    next_slot: u64,
    next_release: u64,
    done: BTreeMap<u64, Option<Value>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self) -> u64 {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Complete `slot` and return everything now releasable, in order.
    pub fn complete(&mut self, slot: u64, response: Option<Value>) -> Vec<Value> {
        self.done.insert(slot, response);

        let mut ready = Vec::new();
        while let Some(response) = self.done.remove(&self.next_release) {
            self.next_release += 1;
            ready.extend(response);
        }
        ready
    }

    /// Reserved slots that have not been released yet.
    pub fn pending(&self) -> usize {
        (self.next_slot - self.next_release) as usize
    }
}
