//! EventBus - broadcast of graph transitions
//!
//! The graph publishes one event per transition so the CLI (or any other
//! subscriber) can stream progress while a turn runs.

/// Broadcast channel wrapper.
pub mod bus;
/// Event definitions.
pub mod types;

pub use bus::EventBus;
pub use types::GraphEvent;
