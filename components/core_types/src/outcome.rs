//! Settlement outcome descriptors.
//!
//! One settled promise is either a fulfillment carrying a value or a
//! rejection carrying a fault. `SettledOutcome` is that pair as data, used
//! by state snapshots, `allSettled`-style aggregation, and diagnostics.

use serde::{Deserialize, Serialize};

use crate::{Fault, Value};

/// The settled half of a promise's lifecycle, as a plain descriptor.
///
/// Serializes tagged by `status` with lowercase names, so the JSON shape is
/// `{"status":"fulfilled","value":…}` or `{"status":"rejected","reason":…}`.
///
/// # Examples
///
/// ```
/// use core_types::{SettledOutcome, Value};
///
/// let outcome = SettledOutcome::Fulfilled { value: Value::Int(3) };
/// assert_eq!(outcome.status(), "fulfilled");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SettledOutcome {
    /// The promise fulfilled with a value
    Fulfilled {
        /// The fulfillment value
        value: Value,
    },
    /// The promise rejected with a fault
    Rejected {
        /// The rejection reason
        reason: Fault,
    },
}

impl SettledOutcome {
    /// Returns the status tag of this outcome.
    pub fn status(&self) -> &'static str {
        match self {
            SettledOutcome::Fulfilled { .. } => "fulfilled",
            SettledOutcome::Rejected { .. } => "rejected",
        }
    }

    /// Returns true if this outcome is a fulfillment.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SettledOutcome::Fulfilled { .. })
    }

    /// Returns true if this outcome is a rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, SettledOutcome::Rejected { .. })
    }

    /// Renders this outcome as a descriptor `Value` map.
    ///
    /// The map mirrors the serialized shape: a `status` entry plus either
    /// `value` or `reason`.
    pub fn into_value(self) -> Value {
        match self {
            SettledOutcome::Fulfilled { value } => Value::map([
                ("status", Value::Text("fulfilled".to_string())),
                ("value", value),
            ]),
            SettledOutcome::Rejected { reason } => Value::map([
                ("status", Value::Text("rejected".to_string())),
                ("reason", reason.to_value()),
            ]),
        }
    }
}
