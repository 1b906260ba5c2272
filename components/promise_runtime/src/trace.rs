//! Diagnostic events emitted by the promise layer and the event loop.
//!
//! Every observable scheduling decision produces one [`TraceEvent`]. A
//! host collects them in a [`TraceLog`]; two runs of the same program
//! produce identical logs, which is what the deterministic-replay tests
//! assert on.

use core_types::{Fault, Value};
use serde::{Deserialize, Serialize};

/// One observable scheduling or settlement step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// A promise was allocated
    PromiseCreated {
        /// Creation-order id of the promise
        id: u64,
    },
    /// A promise fulfilled
    PromiseFulfilled {
        /// Id of the fulfilled promise
        id: u64,
        /// The fulfillment value
        value: Value,
    },
    /// A promise rejected
    PromiseRejected {
        /// Id of the rejected promise
        id: u64,
        /// The rejection reason
        reason: Fault,
    },
    /// A promise rejected with no reaction registered
    RejectionUnhandled {
        /// Id of the rejected promise
        id: u64,
        /// The rejection reason
        reason: Fault,
    },
    /// A previously unhandled rejection gained a reaction
    RejectionHandled {
        /// Id of the now-handled promise
        id: u64,
    },
    /// A microtask entered the queue
    MicrotaskEnqueued {
        /// Enqueue sequence number
        seq: u64,
        /// Diagnostic label of the microtask
        label: String,
    },
    /// A microtask started running
    MicrotaskStarted {
        /// Enqueue sequence number
        seq: u64,
    },
    /// A macrotask was scheduled
    MacrotaskScheduled {
        /// Schedule sequence number
        seq: u64,
        /// Diagnostic label of the task
        label: String,
        /// Virtual time at which the task becomes runnable
        due_ms: u64,
    },
    /// A macrotask started running
    MacrotaskStarted {
        /// Schedule sequence number
        seq: u64,
    },
    /// The virtual clock jumped forward to the next due task
    ClockAdvanced {
        /// Time before the jump
        from_ms: u64,
        /// Time after the jump
        to_ms: u64,
    },
}

/// An append-only record of trace events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceLog {
    events: Vec<TraceEvent>,
}

impl TraceLog {
    /// Creates an empty log.
    pub fn new() -> TraceLog {
        TraceLog::default()
    }

    /// Appends one event.
    pub fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Returns the events in record order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
