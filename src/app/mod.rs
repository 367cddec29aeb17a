//! Application wiring
//!
//! Turns [`AppConfig`] into a compiled orchestration graph and its
//! collaborators.

pub mod config;
pub mod loader;
pub mod providers;
pub mod runtime;

pub use config::AppConfig;
pub use loader::load_config;
pub use runtime::{build_runtime, Runtime};
