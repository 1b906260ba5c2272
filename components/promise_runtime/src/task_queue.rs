//! Task holders and the host scheduling interface.
//!
//! Promises do not own an event loop. They hand completed work to a host
//! through the [`TaskQueue`] trait, and the host decides when to run it.
//! [`Scheduler`] is the cheap-clone handle promise code carries around.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use core_types::Fault;

use crate::trace::TraceEvent;

/// A unit of deferred work queued on the macrotask queue.
///
/// Carries a label for diagnostics and a one-shot callback. Timer
/// callbacks and host-posted jobs arrive here.
pub struct Task {
    label: String,
    callback: Box<dyn FnOnce() -> Result<(), Fault>>,
}

impl Task {
    /// Creates a task from a label and callback.
    ///
    /// # Arguments
    ///
    /// * `label` - Short diagnostic name, surfaced in trace events
    /// * `callback` - Work to run when the task is dispatched
    pub fn new(label: impl Into<String>, callback: impl FnOnce() -> Result<(), Fault> + 'static) -> Task {
        Task {
            label: label.into(),
            callback: Box::new(callback),
        }
    }

    /// Returns the diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Consumes the task and runs its callback.
    pub fn run(self) -> Result<(), Fault> {
        (self.callback)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task {{ label: {:?} }}", self.label)
    }
}

/// A unit of deferred work queued on the microtask queue.
///
/// Reaction handlers run as microtasks: after the current job finishes,
/// before any macrotask, in enqueue order.
pub struct MicroTask {
    label: String,
    callback: Box<dyn FnOnce() -> Result<(), Fault>>,
}

impl MicroTask {
    /// Creates a microtask from a label and callback.
    pub fn new(
        label: impl Into<String>,
        callback: impl FnOnce() -> Result<(), Fault> + 'static,
    ) -> MicroTask {
        MicroTask {
            label: label.into(),
            callback: Box::new(callback),
        }
    }

    /// Returns the diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Consumes the microtask and runs its callback.
    pub fn run(self) -> Result<(), Fault> {
        (self.callback)()
    }
}

impl fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MicroTask {{ label: {:?} }}", self.label)
    }
}

/// Host interface for queueing work and receiving diagnostics.
///
/// The promise layer calls `enqueue_microtask` for every reaction it
/// schedules and never runs callbacks itself. Hosts that do not care
/// about diagnostics keep the default no-op `report`.
pub trait TaskQueue {
    /// Queues work to run after the current job, before any macrotask.
    fn enqueue_microtask(&self, task: MicroTask);

    /// Queues work to run as its own job, no earlier than `delay_ms` from now.
    fn enqueue_macrotask(&self, task: Task, delay_ms: u64);

    /// Receives a diagnostic event. Default implementation discards it.
    fn report(&self, event: TraceEvent) {
        let _ = event;
    }
}

/// Cheap-clone handle to a host's task queue plus promise-id allocation.
///
/// All promises created through clones of one scheduler share a single id
/// counter, so ids observed in trace events are unique per host.
#[derive(Clone)]
pub struct Scheduler {
    host: Rc<dyn TaskQueue>,
    next_id: Rc<Cell<u64>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scheduler {{ next_id: {} }}", self.next_id.get())
    }
}

impl Scheduler {
    /// Creates a scheduler over a host with a fresh promise-id counter.
    pub fn new(host: Rc<dyn TaskQueue>) -> Scheduler {
        Scheduler {
            host,
            next_id: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn with_id_source(host: Rc<dyn TaskQueue>, next_id: Rc<Cell<u64>>) -> Scheduler {
        Scheduler { host, next_id }
    }

    /// Queues a microtask on the host.
    pub fn enqueue_microtask(&self, task: MicroTask) {
        self.host.enqueue_microtask(task);
    }

    /// Queues a macrotask on the host with a delay.
    pub fn enqueue_macrotask(&self, task: Task, delay_ms: u64) {
        self.host.enqueue_macrotask(task, delay_ms);
    }

    pub(crate) fn next_promise_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn report(&self, event: TraceEvent) {
        self.host.report(event);
    }
}
