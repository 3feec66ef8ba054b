//! [`Observer`] implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use faultline_core::{CircuitState, Observer};
use parking_lot::RwLock;

// ─── MetricsObserver ──────────────────────────────────────────────────────────

/// Keeps simple in-memory counters. Cheap enough to install everywhere and
/// read from a health endpoint.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    errors: AtomicU64,
    transitions: AtomicU64,
    circuit_states: RwLock<HashMap<String, CircuitState>>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors recorded so far.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Circuit transitions recorded so far, across all circuits.
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Last state reported for the named circuit.
    pub fn circuit_state(&self, name: &str) -> Option<CircuitState> {
        self.circuit_states.read().get(name).copied()
    }

    /// Snapshot of every known circuit's last state.
    pub fn circuit_states(&self) -> HashMap<String, CircuitState> {
        self.circuit_states.read().clone()
    }
}

impl Observer for MetricsObserver {
    fn record_error(&self, _message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_circuit_state_transition(&self, name: &str, _from: CircuitState, to: CircuitState) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        self.circuit_states.write().insert(name.to_string(), to);
    }
}

// ─── TracingObserver ──────────────────────────────────────────────────────────

/// Emits a `tracing` event for every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record_error(&self, message: &str) {
        tracing::error!(error = %message, "error recorded");
    }

    fn record_circuit_state_transition(&self, name: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(circuit = %name, %from, %to, "circuit state transition"),
            _ => tracing::info!(circuit = %name, %from, %to, "circuit state transition"),
        }
    }
}
