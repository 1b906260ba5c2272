//! Core value and failure types for the deferred-computation scheduler.
//!
//! This crate provides the foundational data types shared by the promise
//! runtime: settlement payloads, structured failure reasons, and settled
//! outcome descriptors.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of settlement payloads
//! - [`Fault`] - Structured rejection reasons
//! - [`FaultKind`] - Failure categories
//! - [`SettledOutcome`] - Fulfilled-or-rejected descriptors
//!
//! # Examples
//!
//! ```
//! use core_types::{Fault, SettledOutcome, Value};
//!
//! // Payloads are concrete tagged values
//! let value = Value::Int(42);
//! assert_eq!(value.type_name(), "int");
//!
//! // Rejection reasons carry a kind and a message
//! let fault = Fault::error("it broke");
//! assert_eq!(fault.to_string(), "Error: it broke");
//!
//! // A settled promise is one of two outcomes
//! let outcome = SettledOutcome::Fulfilled { value };
//! assert_eq!(outcome.status(), "fulfilled");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod outcome;
mod value;

pub use error::{Fault, FaultKind};
pub use outcome::SettledOutcome;
pub use value::Value;
