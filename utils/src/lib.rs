//! Shared utilities for Tessera.

pub mod logging;
pub mod mutex;

pub use logging::init_tracing;
pub use mutex::{KeyedGuard, KeyedMutex};
