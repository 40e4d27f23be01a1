//! Single-flight admission gate
//!
//! A FIFO ticket gate: at most one holder at a time, waiters admitted in
//! arrival order. This is what serializes fragment execution without
//! relying on any particular mutex fairness.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    next_ticket: u64,
    now_serving: u64,
}

#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a ticket and block until it is served. The returned pass
    /// releases the gate on drop.
    pub fn enter(&self) -> GatePass<'_> {
        let mut state = self.state.lock().unwrap();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        while state.now_serving != ticket {
            state = self.cond.wait(state).unwrap();
        }
        GatePass { gate: self }
    }
}

pub struct GatePass<'a> {
    gate: &'a Gate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock().unwrap();
        state.now_serving += 1;
        self.gate.cond.notify_all();
    }
}
