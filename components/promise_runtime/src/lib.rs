//! Deferred-computation scheduling over a deterministic event loop.
//!
//! This crate provides the asynchronous building blocks of the runtime:
//! - Promises with exactly-once, race-free settlement
//! - A reaction scheduler delivering callbacks as ordered microtasks
//! - Aggregate combinators over collections of promises
//! - Step-function suspension for sequential async flows
//!
//! # Overview
//!
//! Work flows through a small set of cooperating types:
//! - [`EventLoop`] - Deterministic host loop with a virtual clock
//! - [`Promise`] - Deferred value settled exactly once by its [`Producer`]
//! - [`Scheduler`] - Handle the promise layer queues microtasks through
//! - [`spawn`] - Drives a step function across await points
//!
//! # Examples
//!
//! ## Chaining Reactions
//!
//! ```
//! use promise_runtime::{EventLoop, Promise, PromiseState, Resolution};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let greeting = Promise::fulfilled(&scheduler, Value::Text("hello".to_string())).then(
//!     Some(Box::new(|value| {
//!         Ok(Resolution::Value(Value::Text(format!("{}, world", value))))
//!     })),
//!     None,
//! );
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(
//!     greeting.state(),
//!     PromiseState::Fulfilled(Value::Text("hello, world".to_string())),
//! );
//! ```
//!
//! ## Timers and Settlement
//!
//! ```
//! use promise_runtime::{EventLoop, Promise};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let (promise, producer) = Promise::with_producer(&scheduler);
//! event_loop.set_timeout("settle", 30, move || {
//!     producer.resolve(Value::Int(1));
//!     Ok(())
//! });
//!
//! event_loop.run_until_done().unwrap();
//! assert!(promise.is_fulfilled());
//! assert_eq!(event_loop.now_ms(), 30);
//! ```
//!
//! ## Combining Promises
//!
//! ```
//! use promise_runtime::{any, EventLoop, PromiseState, Resolution};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let first = any(
//!     &scheduler,
//!     vec![
//!         Resolution::Value(Value::Int(1)),
//!         Resolution::Value(Value::Int(2)),
//!     ],
//! );
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(first.state(), PromiseState::Fulfilled(Value::Int(1)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod event_loop;
pub mod promise;
pub mod suspension;
pub mod task_queue;
pub mod trace;

// Re-export main types at crate root
pub use combinators::{all, all_settled, any, race};
pub use event_loop::{CycleSummary, EventLoop, MacrotaskQueue, MicrotaskQueue, VirtualClock};
pub use promise::{FulfillHandler, Producer, Promise, PromiseState, RejectHandler, Resolution};
pub use suspension::{spawn, Resumption, Step, StepFn};
pub use task_queue::{MicroTask, Scheduler, Task, TaskQueue};
pub use trace::{TraceEvent, TraceLog};
