//! Field-service dispatch domain state layer.
//!
//! The [`domain`] module holds the canonical store, role rules and view
//! projections; [`outbound`] supplies gateway adapters; [`config`] loads the
//! settings that wire them together.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
