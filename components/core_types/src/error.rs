//! Failure values carried on the rejection channel.
//!
//! This module provides the structured fault type that rejections, failed
//! callbacks, and combinator aggregates travel as.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Value;

/// The kind of fault.
///
/// These correspond to the failure categories the scheduler produces or
/// forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Ordinary failure raised by host code
    Error,
    /// Misuse of the scheduler itself (e.g. a chaining cycle)
    Type,
    /// Every input of an aggregate combination failed
    Aggregate,
}

impl FaultKind {
    /// Returns the display name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            FaultKind::Error => "Error",
            FaultKind::Type => "TypeError",
            FaultKind::Aggregate => "AggregateError",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A failure reason with kind, message, and optional structured detail.
///
/// Faults are values, not control flow: a callback "throws" by returning
/// `Err(Fault)`, and the fault then travels down the promise chain as a
/// rejection reason until something handles it.
///
/// # Examples
///
/// ```
/// use core_types::{Fault, FaultKind, Value};
///
/// let fault = Fault::error("disk offline").with_payload(Value::Int(5));
/// assert_eq!(fault.kind, FaultKind::Error);
/// assert_eq!(fault.to_string(), "Error: disk offline");
/// ```
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// The failure category
    pub kind: FaultKind,
    /// Human-readable description
    pub message: String,
    /// Host-attached data; `Undefined` when none was supplied
    pub payload: Value,
    /// Member faults of an aggregate, in input order; empty otherwise
    pub causes: Vec<Fault>,
}

impl Fault {
    /// Creates an ordinary fault with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Error,
            message: message.into(),
            payload: Value::Undefined,
            causes: Vec::new(),
        }
    }

    /// Creates a type fault (scheduler misuse).
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Type,
            message: message.into(),
            payload: Value::Undefined,
            causes: Vec::new(),
        }
    }

    /// Creates an aggregate fault carrying the member faults in order.
    pub fn aggregate(message: impl Into<String>, causes: Vec<Fault>) -> Self {
        Self {
            kind: FaultKind::Aggregate,
            message: message.into(),
            payload: Value::Undefined,
            causes,
        }
    }

    /// Attaches host data to this fault.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Renders this fault as a `Value` map for embedding in outcome lists.
    ///
    /// `payload` and `causes` are included only when present, so the common
    /// case stays a two-entry map.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("kind", Value::Text(self.kind.name().to_string())),
            ("message", Value::Text(self.message.clone())),
        ];
        if !self.payload.is_undefined() {
            entries.push(("payload", self.payload.clone()));
        }
        if !self.causes.is_empty() {
            entries.push((
                "causes",
                Value::List(self.causes.iter().map(Fault::to_value).collect()),
            ));
        }
        Value::map(entries)
    }
}
