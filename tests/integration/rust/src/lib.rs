//! Integration test suite for the promise runtime
//!
//! This crate provides integration tests that verify promises, the
//! combinators, the suspension driver, and the event loop work together
//! correctly across component boundaries.

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use promise_runtime;
}
