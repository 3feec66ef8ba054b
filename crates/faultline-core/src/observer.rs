//! Notification hook for errors and circuit transitions.
//!
//! There is no process-wide observer: each [`CircuitBreaker`](crate::CircuitBreaker)
//! and [`DecoratedError`](crate::DecoratedError) is handed one, and falls back
//! to [`NoopObserver`].

use std::sync::{Arc, OnceLock};

use crate::circuit_breaker::CircuitState;

/// Receives significant events. Called synchronously, so implementations
/// should return quickly.
pub trait Observer: Send + Sync {
    /// An error was logged.
    fn record_error(&self, message: &str);

    /// A circuit breaker changed state.
    fn record_circuit_state_transition(&self, name: &str, from: CircuitState, to: CircuitState);
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record_error(&self, _message: &str) {}

    fn record_circuit_state_transition(&self, _name: &str, _from: CircuitState, _to: CircuitState) {}
}

/// Shared no-op observer instance.
pub fn noop_observer() -> Arc<dyn Observer> {
    static NOOP: OnceLock<Arc<dyn Observer>> = OnceLock::new();
    NOOP.get_or_init(|| Arc::new(NoopObserver)).clone()
}
