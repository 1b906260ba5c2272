//! Promise state machine and reaction scheduling.
//!
//! This module provides the core deferred-value primitive: a `Promise` is a
//! shared handle to a value that will exist later, settled exactly once by
//! its `Producer`, with reactions delivered as microtasks in registration
//! order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use core_types::{Fault, SettledOutcome, Value};
use serde::{Deserialize, Serialize};

use crate::task_queue::{MicroTask, Scheduler};
use crate::trace::TraceEvent;

/// The state of a promise.
///
/// A promise transitions `Pending → Fulfilled` or `Pending → Rejected`
/// exactly once and never changes afterwards. The settled payload lives in
/// the state itself, so a fulfillment value or rejection reason exists
/// exactly when the state says it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PromiseState {
    /// The initial state; neither fulfilled nor rejected
    Pending,
    /// Settled with a value
    Fulfilled(Value),
    /// Settled with a failure reason
    Rejected(Fault),
}

/// Callback invoked with the fulfillment value of the upstream promise.
///
/// Returning `Err` rejects the downstream promise with that fault;
/// returning `Ok(Resolution::Promise(_))` makes the downstream promise
/// adopt that promise's eventual outcome.
pub type FulfillHandler = Box<dyn FnOnce(Value) -> Result<Resolution, Fault>>;

/// Callback invoked with the rejection reason of the upstream promise.
///
/// Returning `Ok` recovers: the downstream promise settles from the
/// returned resolution instead of staying on the failure path.
pub type RejectHandler = Box<dyn FnOnce(Fault) -> Result<Resolution, Fault>>;

/// What a producer resolves a promise with.
///
/// Resolution is a tagged choice, so "is this a promise we should adopt?"
/// is answered by holding an actual `Promise` handle rather than by probing
/// an arbitrary object for a `then`-shaped member.
pub enum Resolution {
    /// A plain value; the promise fulfills with it
    Value(Value),
    /// Another promise; the resolved promise adopts its eventual outcome
    Promise(Promise),
}

impl Resolution {
    /// Converts into a promise, wrapping a plain value as already fulfilled.
    pub fn into_promise(self, scheduler: &Scheduler) -> Promise {
        match self {
            Resolution::Promise(promise) => promise,
            Resolution::Value(value) => Promise::fulfilled(scheduler, value),
        }
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => {
                write!(f, "Promise(id: {})", promise.id())
            }
        }
    }
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Resolution::Value(value)
    }
}

impl From<Promise> for Resolution {
    fn from(promise: Promise) -> Self {
        Resolution::Promise(promise)
    }
}

impl From<bool> for Resolution {
    fn from(b: bool) -> Self {
        Resolution::Value(Value::Bool(b))
    }
}

impl From<i32> for Resolution {
    fn from(n: i32) -> Self {
        Resolution::Value(Value::Int(n as i64))
    }
}

impl From<i64> for Resolution {
    fn from(n: i64) -> Self {
        Resolution::Value(Value::Int(n))
    }
}

impl From<f64> for Resolution {
    fn from(n: f64) -> Self {
        Resolution::Value(Value::Float(n))
    }
}

impl From<&str> for Resolution {
    fn from(s: &str) -> Self {
        Resolution::Value(Value::Text(s.to_string()))
    }
}

impl From<String> for Resolution {
    fn from(s: String) -> Self {
        Resolution::Value(Value::Text(s))
    }
}

impl From<Vec<Value>> for Resolution {
    fn from(items: Vec<Value>) -> Self {
        Resolution::Value(Value::List(items))
    }
}

/// A reaction registered on a promise, fired once at settlement.
///
/// `Then` is the record behind `then()`: up to two handler slots plus the
/// downstream promise their outcome settles. `Adopt` is the internal
/// forwarding reaction created when a promise is resolved with another
/// promise.
pub(crate) enum Reaction {
    /// Handlers registered via `then`
    Then {
        /// Called on fulfillment; `None` passes the value through
        on_fulfilled: Option<FulfillHandler>,
        /// Called on rejection; `None` passes the fault through
        on_rejected: Option<RejectHandler>,
        /// The promise settled by the invoked handler's outcome
        downstream: Promise,
    },
    /// Forward the settled outcome to an adopting promise
    Adopt {
        /// The promise that adopts the outcome
        target: Promise,
    },
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reaction::Then { downstream, .. } => {
                write!(f, "Then {{ downstream: {}, .. }}", downstream.id())
            }
            Reaction::Adopt { target } => write!(f, "Adopt {{ target: {} }}", target.id()),
        }
    }
}

struct PromiseData {
    id: u64,
    state: PromiseState,
    reactions: Vec<Reaction>,
    // Producer latch: set by the first resolve/reject call, possibly while
    // the state is still Pending (adoption in flight).
    resolved: bool,
    // True once any reaction is registered; a rejection with no reaction
    // is reported to the host as unhandled.
    handled: bool,
}

/// A deferred value: settled exactly once, observed through reactions.
///
/// `Promise` is a cheap-clone shared handle. Cloning it does not copy the
/// underlying cell; every clone observes the same settlement.
///
/// # Examples
///
/// ```
/// use promise_runtime::{EventLoop, Promise};
/// use core_types::Value;
///
/// let event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let promise = Promise::new(&scheduler, |producer| {
///     producer.resolve(Value::Int(42));
///     Ok(())
/// });
/// assert!(promise.is_fulfilled());
/// ```
#[derive(Clone)]
pub struct Promise {
    data: Rc<RefCell<PromiseData>>,
    scheduler: Scheduler,
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.try_borrow() {
            Ok(data) => f
                .debug_struct("Promise")
                .field("id", &data.id)
                .field("state", &data.state)
                .finish(),
            Err(_) => write!(f, "Promise {{ .. }}"),
        }
    }
}

impl Promise {
    fn pending(scheduler: &Scheduler) -> Promise {
        let id = scheduler.next_promise_id();
        let promise = Promise {
            data: Rc::new(RefCell::new(PromiseData {
                id,
                state: PromiseState::Pending,
                reactions: Vec::new(),
                resolved: false,
                handled: false,
            })),
            scheduler: scheduler.clone(),
        };
        scheduler.report(TraceEvent::PromiseCreated { id });
        promise
    }

    /// Creates a promise and runs `executor` with its producer, synchronously.
    ///
    /// The executor runs exactly once, before `new` returns. If it returns
    /// `Err`, the promise is rejected with that fault. When the producer
    /// already settled it, the error is discarded instead, matching the
    /// first-call-wins settlement rule.
    pub fn new(
        scheduler: &Scheduler,
        executor: impl FnOnce(Producer) -> Result<(), Fault>,
    ) -> Promise {
        let promise = Promise::pending(scheduler);
        let producer = Producer {
            promise: promise.clone(),
        };
        if let Err(fault) = executor(producer) {
            promise.reject_internal(fault);
        }
        promise
    }

    /// Creates a pending promise and hands back its producer.
    ///
    /// For host code that settles later (timers, I/O adapters) and for
    /// plumbing that needs to carry the settlement capability around.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_runtime::{EventLoop, Promise};
    /// use core_types::Value;
    ///
    /// let event_loop = EventLoop::new();
    /// let scheduler = event_loop.scheduler();
    ///
    /// let (promise, producer) = Promise::with_producer(&scheduler);
    /// assert!(promise.is_pending());
    /// producer.resolve(Value::Bool(true));
    /// assert!(promise.is_fulfilled());
    /// ```
    pub fn with_producer(scheduler: &Scheduler) -> (Promise, Producer) {
        let promise = Promise::pending(scheduler);
        let producer = Producer {
            promise: promise.clone(),
        };
        (promise, producer)
    }

    /// Creates a promise already fulfilled with `value`.
    pub fn fulfilled(scheduler: &Scheduler, value: Value) -> Promise {
        let promise = Promise::pending(scheduler);
        promise.resolve_internal(Resolution::Value(value));
        promise
    }

    /// Creates a promise already rejected with `reason`.
    pub fn rejected(scheduler: &Scheduler, reason: Fault) -> Promise {
        let promise = Promise::pending(scheduler);
        promise.reject_internal(reason);
        promise
    }

    /// Registers handlers for this promise's settlement.
    ///
    /// Returns the downstream promise settled by the invoked handler. The
    /// matching handler runs as a microtask, never synchronously inside
    /// this call, even when this promise has already settled. An omitted
    /// handler passes the outcome through unchanged, which is how both
    /// values and faults travel along a chain without per-step handlers.
    pub fn then(
        &self,
        on_fulfilled: Option<FulfillHandler>,
        on_rejected: Option<RejectHandler>,
    ) -> Promise {
        let downstream = Promise::pending(&self.scheduler);
        self.register(Reaction::Then {
            on_fulfilled,
            on_rejected,
            downstream: downstream.clone(),
        });
        downstream
    }

    /// Registers a rejection handler; fulfillment passes through.
    pub fn catch(
        &self,
        handler: impl FnOnce(Fault) -> Result<Resolution, Fault> + 'static,
    ) -> Promise {
        self.then(None, Some(Box::new(handler)))
    }

    /// Runs `handler` once this promise settles, passing the outcome through.
    ///
    /// The handler observes neither value nor fault and cannot change the
    /// outcome; the downstream promise mirrors this one.
    pub fn finally(&self, handler: impl FnOnce() + 'static) -> Promise {
        let handler = Rc::new(RefCell::new(Some(handler)));
        let on_fulfilled = {
            let handler = Rc::clone(&handler);
            Box::new(move |value: Value| {
                if let Some(run) = handler.borrow_mut().take() {
                    run();
                }
                Ok(Resolution::Value(value))
            }) as FulfillHandler
        };
        let on_rejected = Box::new(move |fault: Fault| {
            if let Some(run) = handler.borrow_mut().take() {
                run();
            }
            Err(fault)
        }) as RejectHandler;
        self.then(Some(on_fulfilled), Some(on_rejected))
    }

    /// Returns a clone of the current state.
    pub fn state(&self) -> PromiseState {
        self.data.borrow().state.clone()
    }

    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        matches!(self.data.borrow().state, PromiseState::Pending)
    }

    /// Returns true once the promise has fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self.data.borrow().state, PromiseState::Fulfilled(_))
    }

    /// Returns true once the promise has rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self.data.borrow().state, PromiseState::Rejected(_))
    }

    /// Returns the settled outcome, or `None` while pending.
    pub fn outcome(&self) -> Option<SettledOutcome> {
        match &self.data.borrow().state {
            PromiseState::Pending => None,
            PromiseState::Fulfilled(value) => Some(SettledOutcome::Fulfilled {
                value: value.clone(),
            }),
            PromiseState::Rejected(fault) => Some(SettledOutcome::Rejected {
                reason: fault.clone(),
            }),
        }
    }

    /// Returns this promise's creation-order id within its scheduler.
    pub fn id(&self) -> u64 {
        self.data.borrow().id
    }

    /// Resolves with `resolution` unless the producer latch is already set.
    fn resolve_internal(&self, resolution: Resolution) {
        {
            let mut data = self.data.borrow_mut();
            if data.resolved {
                return;
            }
            data.resolved = true;
        }
        match resolution {
            Resolution::Value(value) => self.transition_fulfilled(value),
            Resolution::Promise(inner) => {
                if Rc::ptr_eq(&self.data, &inner.data) {
                    self.transition_rejected(Fault::type_error("chaining cycle detected"));
                } else {
                    // Adoption: forward the inner promise's outcome here,
                    // always through a microtask.
                    inner.register(Reaction::Adopt {
                        target: self.clone(),
                    });
                }
            }
        }
    }

    /// Rejects with `fault` unless the producer latch is already set.
    fn reject_internal(&self, fault: Fault) {
        {
            let mut data = self.data.borrow_mut();
            if data.resolved {
                return;
            }
            data.resolved = true;
        }
        self.transition_rejected(fault);
    }

    /// Settles the downstream promise from a handler's return.
    fn settle_from(&self, result: Result<Resolution, Fault>) {
        match result {
            Ok(resolution) => self.resolve_internal(resolution),
            Err(fault) => self.reject_internal(fault),
        }
    }

    fn transition_fulfilled(&self, value: Value) {
        let reactions = {
            let mut data = self.data.borrow_mut();
            if !matches!(data.state, PromiseState::Pending) {
                return;
            }
            data.state = PromiseState::Fulfilled(value.clone());
            std::mem::take(&mut data.reactions)
        };
        self.scheduler.report(TraceEvent::PromiseFulfilled {
            id: self.id(),
            value: value.clone(),
        });
        for reaction in reactions {
            Self::schedule_reaction(
                &self.scheduler,
                reaction,
                SettledOutcome::Fulfilled {
                    value: value.clone(),
                },
            );
        }
    }

    fn transition_rejected(&self, fault: Fault) {
        let (reactions, handled) = {
            let mut data = self.data.borrow_mut();
            if !matches!(data.state, PromiseState::Pending) {
                return;
            }
            data.state = PromiseState::Rejected(fault.clone());
            (std::mem::take(&mut data.reactions), data.handled)
        };
        self.scheduler.report(TraceEvent::PromiseRejected {
            id: self.id(),
            reason: fault.clone(),
        });
        if !handled {
            self.scheduler.report(TraceEvent::RejectionUnhandled {
                id: self.id(),
                reason: fault.clone(),
            });
        }
        for reaction in reactions {
            Self::schedule_reaction(
                &self.scheduler,
                reaction,
                SettledOutcome::Rejected {
                    reason: fault.clone(),
                },
            );
        }
    }

    /// Appends a reaction, or schedules it immediately if already settled.
    fn register(&self, reaction: Reaction) {
        let mut data = self.data.borrow_mut();
        let was_handled = data.handled;
        data.handled = true;
        let state = data.state.clone();
        let (retract, ready) = match state {
            PromiseState::Pending => {
                data.reactions.push(reaction);
                (false, None)
            }
            PromiseState::Fulfilled(value) => {
                (false, Some((reaction, SettledOutcome::Fulfilled { value })))
            }
            PromiseState::Rejected(reason) => (
                !was_handled,
                Some((reaction, SettledOutcome::Rejected { reason })),
            ),
        };
        drop(data);

        if retract {
            self.scheduler
                .report(TraceEvent::RejectionHandled { id: self.id() });
        }
        if let Some((reaction, outcome)) = ready {
            Self::schedule_reaction(&self.scheduler, reaction, outcome);
        }
    }

    /// Lowers one reaction into one microtask carrying the outcome.
    fn schedule_reaction(scheduler: &Scheduler, reaction: Reaction, outcome: SettledOutcome) {
        match reaction {
            Reaction::Then {
                on_fulfilled,
                on_rejected,
                downstream,
            } => {
                let label = format!("then:{}", downstream.id());
                match outcome {
                    SettledOutcome::Fulfilled { value } => {
                        scheduler.enqueue_microtask(MicroTask::new(label, move || {
                            match on_fulfilled {
                                Some(handler) => downstream.settle_from(handler(value)),
                                None => downstream.resolve_internal(Resolution::Value(value)),
                            }
                            Ok(())
                        }));
                    }
                    SettledOutcome::Rejected { reason } => {
                        scheduler.enqueue_microtask(MicroTask::new(label, move || {
                            match on_rejected {
                                Some(handler) => downstream.settle_from(handler(reason)),
                                None => downstream.reject_internal(reason),
                            }
                            Ok(())
                        }));
                    }
                }
            }
            Reaction::Adopt { target } => {
                let label = format!("adopt:{}", target.id());
                scheduler.enqueue_microtask(MicroTask::new(label, move || {
                    // The target's latch was set when adoption began, so the
                    // forwarded outcome applies directly.
                    match outcome {
                        SettledOutcome::Fulfilled { value } => target.transition_fulfilled(value),
                        SettledOutcome::Rejected { reason } => target.transition_rejected(reason),
                    }
                    Ok(())
                }));
            }
        }
    }
}

/// The settlement capability of one promise.
///
/// Exactly one producer exists per externally-settled promise; it is not
/// cloneable. Both calls are idempotent-safe: after the first
/// `resolve`/`reject`, later calls are silent no-ops and their payloads are
/// discarded.
pub struct Producer {
    promise: Promise,
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Producer {{ promise: {} }}", self.promise.id())
    }
}

impl Producer {
    /// Resolves the promise with a value or another promise to adopt.
    ///
    /// Resolving with a promise starts adoption: this promise stays
    /// pending until the inner one settles, then mirrors its outcome. The
    /// latch still engages immediately, so later producer calls are
    /// ignored even while adoption is in flight.
    pub fn resolve(&self, resolution: impl Into<Resolution>) {
        self.promise.resolve_internal(resolution.into());
    }

    /// Rejects the promise with a fault.
    pub fn reject(&self, fault: Fault) {
        self.promise.reject_internal(fault);
    }

    /// Returns a handle to the promise this producer settles.
    pub fn promise(&self) -> Promise {
        self.promise.clone()
    }
}
