//! Aggregate operations over collections of promises.
//!
//! Each combinator takes its inputs as [`Resolution`]s, so callers can mix
//! promises and plain values; a plain value behaves as an
//! already-fulfilled promise. Every combinator registers exactly one
//! reaction per input and settles its output through an ordinary producer,
//! which is where first-settlement-wins comes from.
//!
//! # Examples
//!
//! ```
//! use promise_runtime::{all, EventLoop, PromiseState, Resolution};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let combined = all(
//!     &scheduler,
//!     vec![
//!         Resolution::Value(Value::Int(1)),
//!         Resolution::Value(Value::Int(2)),
//!     ],
//! );
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(
//!     combined.state(),
//!     PromiseState::Fulfilled(Value::List(vec![Value::Int(1), Value::Int(2)])),
//! );
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use core_types::{Fault, SettledOutcome, Value};

use crate::promise::{FulfillHandler, Producer, Promise, RejectHandler, Resolution};
use crate::task_queue::Scheduler;

struct AllState {
    slots: Vec<Option<Value>>,
    remaining: usize,
    producer: Producer,
}

/// Fulfills with every input's value, in input order.
///
/// Rejects as soon as any input rejects, with that input's fault. An empty
/// input list fulfills immediately with an empty list.
pub fn all(scheduler: &Scheduler, inputs: Vec<Resolution>) -> Promise {
    let (promise, producer) = Promise::with_producer(scheduler);
    if inputs.is_empty() {
        producer.resolve(Value::List(Vec::new()));
        return promise;
    }

    let state = Rc::new(RefCell::new(AllState {
        slots: vec![None; inputs.len()],
        remaining: inputs.len(),
        producer,
    }));

    for (index, input) in inputs.into_iter().enumerate() {
        let input = input.into_promise(scheduler);
        let on_fulfilled = {
            let state = Rc::clone(&state);
            Box::new(move |value: Value| {
                let mut state = state.borrow_mut();
                state.slots[index] = Some(value);
                state.remaining -= 1;
                if state.remaining == 0 {
                    let values = state
                        .slots
                        .iter_mut()
                        .map(|slot| slot.take().unwrap_or_default())
                        .collect();
                    state.producer.resolve(Value::List(values));
                }
                Ok(Resolution::Value(Value::Undefined))
            }) as FulfillHandler
        };
        let on_rejected = {
            let state = Rc::clone(&state);
            Box::new(move |fault: Fault| {
                state.borrow().producer.reject(fault);
                Ok(Resolution::Value(Value::Undefined))
            }) as RejectHandler
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    promise
}

struct SettleState {
    slots: Vec<Option<SettledOutcome>>,
    remaining: usize,
    producer: Producer,
}

fn record_outcome(state: &Rc<RefCell<SettleState>>, index: usize, outcome: SettledOutcome) {
    let mut state = state.borrow_mut();
    state.slots[index] = Some(outcome);
    state.remaining -= 1;
    if state.remaining == 0 {
        let descriptors = state
            .slots
            .iter_mut()
            .map(|slot| {
                slot.take()
                    .map(SettledOutcome::into_value)
                    .unwrap_or_default()
            })
            .collect();
        state.producer.resolve(Value::List(descriptors));
    }
}

/// Fulfills with a descriptor for every input, never rejecting.
///
/// Each descriptor is a map with a `status` entry plus either `value` or
/// `reason`, in input order. Waits for every input to settle. An empty
/// input list fulfills immediately with an empty list.
pub fn all_settled(scheduler: &Scheduler, inputs: Vec<Resolution>) -> Promise {
    let (promise, producer) = Promise::with_producer(scheduler);
    if inputs.is_empty() {
        producer.resolve(Value::List(Vec::new()));
        return promise;
    }

    let state = Rc::new(RefCell::new(SettleState {
        slots: vec![None; inputs.len()],
        remaining: inputs.len(),
        producer,
    }));

    for (index, input) in inputs.into_iter().enumerate() {
        let input = input.into_promise(scheduler);
        let on_fulfilled = {
            let state = Rc::clone(&state);
            Box::new(move |value: Value| {
                record_outcome(&state, index, SettledOutcome::Fulfilled { value });
                Ok(Resolution::Value(Value::Undefined))
            }) as FulfillHandler
        };
        let on_rejected = {
            let state = Rc::clone(&state);
            Box::new(move |reason: Fault| {
                record_outcome(&state, index, SettledOutcome::Rejected { reason });
                Ok(Resolution::Value(Value::Undefined))
            }) as RejectHandler
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    promise
}

/// Settles with the first input to settle, either way.
///
/// An empty input list never settles.
pub fn race(scheduler: &Scheduler, inputs: Vec<Resolution>) -> Promise {
    let (promise, producer) = Promise::with_producer(scheduler);
    let producer = Rc::new(producer);

    for input in inputs {
        let input = input.into_promise(scheduler);
        let on_fulfilled = {
            let producer = Rc::clone(&producer);
            Box::new(move |value: Value| {
                producer.resolve(value);
                Ok(Resolution::Value(Value::Undefined))
            }) as FulfillHandler
        };
        let on_rejected = {
            let producer = Rc::clone(&producer);
            Box::new(move |fault: Fault| {
                producer.reject(fault);
                Ok(Resolution::Value(Value::Undefined))
            }) as RejectHandler
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    promise
}

struct AnyState {
    faults: Vec<Option<Fault>>,
    remaining: usize,
    producer: Producer,
}

/// Fulfills with the first input to fulfill.
///
/// Rejects only once every input has rejected, with an aggregate fault
/// whose causes are the individual faults in input order. An empty input
/// list rejects immediately with an empty aggregate.
pub fn any(scheduler: &Scheduler, inputs: Vec<Resolution>) -> Promise {
    let (promise, producer) = Promise::with_producer(scheduler);
    if inputs.is_empty() {
        producer.reject(Fault::aggregate("all inputs rejected", Vec::new()));
        return promise;
    }

    let state = Rc::new(RefCell::new(AnyState {
        faults: vec![None; inputs.len()],
        remaining: inputs.len(),
        producer,
    }));

    for (index, input) in inputs.into_iter().enumerate() {
        let input = input.into_promise(scheduler);
        let on_fulfilled = {
            let state = Rc::clone(&state);
            Box::new(move |value: Value| {
                state.borrow().producer.resolve(value);
                Ok(Resolution::Value(Value::Undefined))
            }) as FulfillHandler
        };
        let on_rejected = {
            let state = Rc::clone(&state);
            Box::new(move |fault: Fault| {
                let mut state = state.borrow_mut();
                state.faults[index] = Some(fault);
                state.remaining -= 1;
                if state.remaining == 0 {
                    let causes = state.faults.iter_mut().filter_map(Option::take).collect();
                    state
                        .producer
                        .reject(Fault::aggregate("all inputs rejected", causes));
                }
                Ok(Resolution::Value(Value::Undefined))
            }) as RejectHandler
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    promise
}
