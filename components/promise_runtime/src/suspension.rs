//! Step-function suspension: sequential async flows over promises.
//!
//! A suspended computation is a mutable step function plus one continuation
//! record. Each call to the step function runs the synchronous stretch up
//! to the next suspension point and returns either `Await` (park until a
//! promise settles) or `Done`. Resumptions arrive through ordinary
//! reactions, so every await costs at least one microtask hop and the step
//! function is never re-entered.
//!
//! # Examples
//!
//! ```
//! use promise_runtime::{spawn, EventLoop, Promise, PromiseState, Resolution, Resumption, Step};
//! use core_types::{Fault, Value};
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let ticket = Promise::fulfilled(&scheduler, Value::Int(10));
//! let mut stage = 0;
//! let task = spawn(&scheduler, move |resumption| {
//!     stage += 1;
//!     match stage {
//!         1 => Ok(Step::Await(Resolution::Promise(ticket.clone()))),
//!         _ => match resumption {
//!             Resumption::Value(Value::Int(n)) => {
//!                 Ok(Step::Done(Resolution::Value(Value::Int(n + 1))))
//!             }
//!             _ => Err(Fault::error("unexpected resumption")),
//!         },
//!     }
//! });
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(task.state(), PromiseState::Fulfilled(Value::Int(11)));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use core_types::{Fault, Value};

use crate::promise::{FulfillHandler, Producer, Promise, RejectHandler, Resolution};
use crate::task_queue::Scheduler;

/// What a step function is called with.
#[derive(Debug, Clone, PartialEq)]
pub enum Resumption {
    /// First invocation; no awaited outcome yet
    Start,
    /// The awaited promise fulfilled with this value
    Value(Value),
    /// The awaited promise rejected with this fault
    Fault(Fault),
}

/// What a step function returns to the driver.
#[derive(Debug)]
pub enum Step {
    /// Park until this settles, then resume with its outcome
    Await(Resolution),
    /// The computation finished with this resolution
    Done(Resolution),
}

/// The step function of a suspended computation.
///
/// Called once per resumption; runs synchronously to the next suspension
/// point. Returning `Err` completes the computation on the failure path.
pub type StepFn = Box<dyn FnMut(Resumption) -> Result<Step, Fault>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveStatus {
    SuspendedStart,
    Executing,
    SuspendedAwait,
    Completed,
}

struct Suspension {
    step: StepFn,
    status: DriveStatus,
    producer: Producer,
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("status", &self.status)
            .field("producer", &self.producer)
            .finish()
    }
}

/// Starts a suspended computation and returns its completion promise.
///
/// The first step runs synchronously, inside this call, with
/// [`Resumption::Start`]. Later steps run as reaction microtasks when the
/// awaited promise settles. The returned promise fulfills with the `Done`
/// resolution, or rejects if a step returns `Err`; a fault from an
/// awaited promise is handed to the step function as
/// [`Resumption::Fault`] rather than rejecting outright, so steps can
/// recover.
pub fn spawn(
    scheduler: &Scheduler,
    step: impl FnMut(Resumption) -> Result<Step, Fault> + 'static,
) -> Promise {
    let (promise, producer) = Promise::with_producer(scheduler);
    let cell = Rc::new(RefCell::new(Suspension {
        step: Box::new(step),
        status: DriveStatus::SuspendedStart,
        producer,
    }));
    advance(scheduler, &cell, Resumption::Start);
    promise
}

fn advance(scheduler: &Scheduler, cell: &Rc<RefCell<Suspension>>, input: Resumption) {
    // Holding the borrow across the step call is sound: resumptions only
    // arrive through microtasks, never during the step itself.
    let result = {
        let mut suspension = cell.borrow_mut();
        if suspension.status == DriveStatus::Completed {
            return;
        }
        suspension.status = DriveStatus::Executing;
        (suspension.step)(input)
    };

    match result {
        Err(fault) => {
            let suspension = &mut *cell.borrow_mut();
            suspension.status = DriveStatus::Completed;
            suspension.producer.reject(fault);
        }
        Ok(Step::Done(resolution)) => {
            let suspension = &mut *cell.borrow_mut();
            suspension.status = DriveStatus::Completed;
            suspension.producer.resolve(resolution);
        }
        Ok(Step::Await(resolution)) => {
            cell.borrow_mut().status = DriveStatus::SuspendedAwait;
            let awaited = resolution.into_promise(scheduler);
            let on_fulfilled = {
                let cell = Rc::clone(cell);
                let scheduler = scheduler.clone();
                Box::new(move |value: Value| {
                    advance(&scheduler, &cell, Resumption::Value(value));
                    Ok(Resolution::Value(Value::Undefined))
                }) as FulfillHandler
            };
            let on_rejected = {
                let cell = Rc::clone(cell);
                let scheduler = scheduler.clone();
                Box::new(move |fault: Fault| {
                    advance(&scheduler, &cell, Resumption::Fault(fault));
                    Ok(Resolution::Value(Value::Undefined))
                }) as RejectHandler
            };
            awaited.then(Some(on_fulfilled), Some(on_rejected));
        }
    }
}
