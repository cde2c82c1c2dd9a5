//! Structured logging for the service.
//!
//! Console output in pretty, compact or JSON form, filtered by `RUST_LOG`
//! or the `[observability.logging]` section.

mod tracing_init;

pub use tracing_init::*;
