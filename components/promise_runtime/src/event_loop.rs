//! Deterministic single-threaded event loop with a virtual clock.
//!
//! The loop owns a microtask queue, a due-time-ordered macrotask queue,
//! and a virtual clock that only moves when the loop jumps it to the next
//! due task. One cycle drains microtasks, then runs at most one macrotask.
//! Every run of the same program produces the same interleaving and the
//! same trace.
//!
//! # Examples
//!
//! ```
//! use promise_runtime::{EventLoop, Promise, Resolution};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let promise = Promise::fulfilled(&scheduler, Value::Int(2));
//! let doubled = promise.then(
//!     Some(Box::new(|value| match value {
//!         Value::Int(n) => Ok(Resolution::Value(Value::Int(n * 2))),
//!         other => Ok(Resolution::Value(other)),
//!     })),
//!     None,
//! );
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(doubled.state(), promise_runtime::PromiseState::Fulfilled(Value::Int(4)));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use core_types::Fault;

use crate::task_queue::{MicroTask, Scheduler, Task, TaskQueue};
use crate::trace::{TraceEvent, TraceLog};

/// A monotonic virtual clock measured in milliseconds.
///
/// Time never passes on its own; the event loop advances the clock to the
/// due time of the next macrotask when nothing is runnable sooner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualClock {
    now_ms: u64,
}

impl VirtualClock {
    /// Creates a clock at time zero.
    pub fn new() -> VirtualClock {
        VirtualClock::default()
    }

    /// Returns the current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Moves the clock forward to `to_ms`.
    ///
    /// Returns true if the clock moved. A target at or before the current
    /// time leaves the clock unchanged.
    pub fn advance_to(&mut self, to_ms: u64) -> bool {
        if to_ms > self.now_ms {
            self.now_ms = to_ms;
            true
        } else {
            false
        }
    }
}

/// FIFO queue of microtasks with a global enqueue sequence.
///
/// The sequence number doubles as the registration-order witness carried
/// into trace events.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    tasks: VecDeque<(u64, MicroTask)>,
    total_enqueued: u64,
}

impl MicrotaskQueue {
    /// Creates an empty queue.
    pub fn new() -> MicrotaskQueue {
        MicrotaskQueue::default()
    }

    /// Appends a microtask and returns its sequence number.
    pub fn enqueue(&mut self, task: MicroTask) -> u64 {
        let seq = self.total_enqueued;
        self.total_enqueued += 1;
        self.tasks.push_back((seq, task));
        seq
    }

    /// Removes and returns the oldest microtask.
    pub fn dequeue(&mut self) -> Option<(u64, MicroTask)> {
        self.tasks.pop_front()
    }

    /// Returns the number of queued microtasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no microtasks are queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Macrotasks keyed by `(due_ms, seq)`.
///
/// The composite key makes dispatch order total: earlier due times first,
/// schedule order breaking ties.
#[derive(Debug, Default)]
pub struct MacrotaskQueue {
    tasks: BTreeMap<(u64, u64), Task>,
    next_seq: u64,
}

impl MacrotaskQueue {
    /// Creates an empty queue.
    pub fn new() -> MacrotaskQueue {
        MacrotaskQueue::default()
    }

    /// Inserts a task due at `due_ms` and returns its sequence number.
    pub fn schedule(&mut self, task: Task, due_ms: u64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert((due_ms, seq), task);
        seq
    }

    /// Returns the due time of the earliest task, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.tasks.first_key_value().map(|((due_ms, _), _)| *due_ms)
    }

    /// Removes and returns the earliest task if it is due by `now_ms`.
    pub fn pop_ready(&mut self, now_ms: u64) -> Option<(u64, Task)> {
        match self.tasks.first_key_value() {
            Some(((due_ms, _), _)) if *due_ms <= now_ms => {}
            _ => return None,
        }
        self.tasks.pop_first().map(|((_, seq), task)| (seq, task))
    }

    /// Returns the number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no tasks are queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// What one call to [`EventLoop::process_one_cycle`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    /// Microtasks run during the drain phase
    pub microtasks_run: usize,
    /// Whether a macrotask was dispatched
    pub ran_macrotask: bool,
    /// New clock value, if the cycle jumped the clock
    pub clock_advanced_to: Option<u64>,
}

struct EventLoopInner {
    microtasks: RefCell<MicrotaskQueue>,
    macrotasks: RefCell<MacrotaskQueue>,
    clock: RefCell<VirtualClock>,
    trace: RefCell<TraceLog>,
    unhandled: RefCell<BTreeMap<u64, Fault>>,
    microtask_limit: Cell<Option<usize>>,
    promise_ids: Rc<Cell<u64>>,
}

/// The deterministic host loop promises run on.
///
/// Cheap-clone handle; clones share the queues, the clock, and the trace.
/// The loop implements [`TaskQueue`], so a [`Scheduler`] built from it
/// feeds reaction microtasks straight into the drain phase.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<EventLoopInner>,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now_ms", &self.now_ms())
            .field("pending_microtasks", &self.pending_microtasks())
            .field("pending_macrotasks", &self.pending_macrotasks())
            .finish()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        EventLoop::new()
    }
}

impl EventLoop {
    /// Creates an empty loop with the clock at zero.
    pub fn new() -> EventLoop {
        EventLoop {
            inner: Rc::new(EventLoopInner {
                microtasks: RefCell::new(MicrotaskQueue::new()),
                macrotasks: RefCell::new(MacrotaskQueue::new()),
                clock: RefCell::new(VirtualClock::new()),
                trace: RefCell::new(TraceLog::new()),
                unhandled: RefCell::new(BTreeMap::new()),
                microtask_limit: Cell::new(None),
                promise_ids: Rc::new(Cell::new(0)),
            }),
        }
    }

    /// Returns a scheduler that queues onto this loop.
    ///
    /// Every scheduler from the same loop shares one promise-id counter,
    /// so trace ids stay unique across call sites.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::with_id_source(
            Rc::new(self.clone()) as Rc<dyn TaskQueue>,
            Rc::clone(&self.inner.promise_ids),
        )
    }

    /// Queues a task to run in the next available cycle.
    pub fn enqueue_task(&self, task: Task) {
        self.schedule_macrotask(task, 0);
    }

    /// Schedules `callback` to run no earlier than `delay_ms` from now.
    ///
    /// Returns the task's sequence number, usable to correlate trace
    /// events.
    ///
    /// # Arguments
    ///
    /// * `label` - Diagnostic name surfaced in trace events
    /// * `delay_ms` - Minimum virtual delay before dispatch
    /// * `callback` - Work to run when the timer fires
    pub fn set_timeout(
        &self,
        label: impl Into<String>,
        delay_ms: u64,
        callback: impl FnOnce() -> Result<(), Fault> + 'static,
    ) -> u64 {
        self.schedule_macrotask(Task::new(label, callback), delay_ms)
    }

    fn schedule_macrotask(&self, task: Task, delay_ms: u64) -> u64 {
        let due_ms = self.now_ms() + delay_ms;
        let label = task.label().to_string();
        let seq = self.inner.macrotasks.borrow_mut().schedule(task, due_ms);
        self.record(TraceEvent::MacrotaskScheduled { seq, label, due_ms });
        seq
    }

    /// Runs queued microtasks until the queue is empty.
    ///
    /// Ignores the per-cycle limit. Returns how many microtasks ran.
    pub fn run_all_microtasks(&self) -> Result<usize, Fault> {
        self.drain_microtasks(None)
    }

    fn drain_microtasks(&self, limit: Option<usize>) -> Result<usize, Fault> {
        let mut count = 0;
        loop {
            if let Some(max) = limit {
                if count >= max {
                    break;
                }
            }
            // The borrow must end before the task runs; the task may
            // enqueue more microtasks.
            let next = self.inner.microtasks.borrow_mut().dequeue();
            match next {
                Some((seq, task)) => {
                    self.record(TraceEvent::MicrotaskStarted { seq });
                    task.run()?;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Runs one cycle: drain microtasks, then dispatch one macrotask.
    ///
    /// If no macrotask is due yet, the clock jumps to the earliest due
    /// time first. With a microtask limit set, the drain may stop early
    /// and the remainder carries into the next cycle.
    pub fn process_one_cycle(&self) -> Result<CycleSummary, Fault> {
        let microtasks_run = self.drain_microtasks(self.inner.microtask_limit.get())?;

        let mut clock_advanced_to = None;
        let now = self.now_ms();
        let mut ready = self.inner.macrotasks.borrow_mut().pop_ready(now);
        if ready.is_none() {
            // Bind before the `if let` so the queue borrow ends before
            // the `borrow_mut` below; the scrutinee's temporary would
            // otherwise live for the whole block.
            let next_due = self.inner.macrotasks.borrow().next_due();
            if let Some(due_ms) = next_due {
                self.inner.clock.borrow_mut().advance_to(due_ms);
                self.record(TraceEvent::ClockAdvanced {
                    from_ms: now,
                    to_ms: due_ms,
                });
                clock_advanced_to = Some(due_ms);
                ready = self.inner.macrotasks.borrow_mut().pop_ready(due_ms);
            }
        }

        let ran_macrotask = match ready {
            Some((seq, task)) => {
                self.record(TraceEvent::MacrotaskStarted { seq });
                task.run()?;
                true
            }
            None => false,
        };

        Ok(CycleSummary {
            microtasks_run,
            ran_macrotask,
            clock_advanced_to,
        })
    }

    /// Cycles until both queues are empty.
    pub fn run_until_done(&self) -> Result<(), Fault> {
        while self.has_pending_work() {
            self.process_one_cycle()?;
        }
        Ok(())
    }

    /// Returns true while either queue holds work.
    pub fn has_pending_work(&self) -> bool {
        !self.inner.microtasks.borrow().is_empty() || !self.inner.macrotasks.borrow().is_empty()
    }

    /// Returns the number of queued microtasks.
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    /// Returns the number of queued macrotasks.
    pub fn pending_macrotasks(&self) -> usize {
        self.inner.macrotasks.borrow().len()
    }

    /// Caps how many microtasks one cycle may run.
    ///
    /// `None` restores the default: drain to empty before any macrotask.
    pub fn set_microtask_limit(&self, limit: Option<usize>) {
        self.inner.microtask_limit.set(limit.map(|n| n.max(1)));
    }

    /// Returns the current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.inner.clock.borrow().now_ms()
    }

    /// Returns a snapshot of the trace so far.
    pub fn trace_events(&self) -> Vec<TraceEvent> {
        self.inner.trace.borrow().events().to_vec()
    }

    /// Returns rejected-and-never-handled promises, ordered by id.
    ///
    /// A promise leaves this list when a reaction is registered after the
    /// fact; the retraction also appears in the trace.
    pub fn unhandled_rejections(&self) -> Vec<(u64, Fault)> {
        self.inner
            .unhandled
            .borrow()
            .iter()
            .map(|(id, fault)| (*id, fault.clone()))
            .collect()
    }

    fn record(&self, event: TraceEvent) {
        self.inner.trace.borrow_mut().record(event);
    }
}

impl TaskQueue for EventLoop {
    fn enqueue_microtask(&self, task: MicroTask) {
        let label = task.label().to_string();
        let seq = self.inner.microtasks.borrow_mut().enqueue(task);
        self.record(TraceEvent::MicrotaskEnqueued { seq, label });
    }

    fn enqueue_macrotask(&self, task: Task, delay_ms: u64) {
        self.schedule_macrotask(task, delay_ms);
    }

    fn report(&self, event: TraceEvent) {
        match &event {
            TraceEvent::RejectionUnhandled { id, reason } => {
                self.inner
                    .unhandled
                    .borrow_mut()
                    .insert(*id, reason.clone());
            }
            TraceEvent::RejectionHandled { id } => {
                self.inner.unhandled.borrow_mut().remove(id);
            }
            _ => {}
        }
        self.record(event);
    }
}
