//! Outbound adapters implementing the dispatch gateway port.
//!
//! - **gateway**: reqwest-backed client for the hosted table API and the
//!   admin-action edge function.
//! - **memory**: in-process gateway for demo runs and tests.
//!
//! Adapters translate between domain types and wire representations. They
//! contain no business logic.

pub mod gateway;
pub mod memory;
