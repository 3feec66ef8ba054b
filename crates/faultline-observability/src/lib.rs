//! # faultline-observability
//!
//! `tracing`-backed adapters for the hooks faultline-core calls out to.
//!
//! - [`TracingLogger`]: forwards [`Logger`](faultline_core::Logger) calls to `tracing` events
//! - [`MetricsObserver`]: in-memory error counter and last-known circuit states
//! - [`TracingObserver`]: one `tracing` event per error / circuit transition
//! - [`init_tracing`]: subscriber setup with per-component levels, text or JSON

pub mod logger;
pub mod observer;
pub mod tracing_setup;

pub use logger::TracingLogger;
pub use observer::{MetricsObserver, TracingObserver};
pub use tracing_setup::{init_tracing, LogConfig};
