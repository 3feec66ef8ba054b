//! Three-state circuit breaker: Closed → Open → Half-Open.
//!
//! State transitions:
//! - `Closed` → `Open`:      a recorded failure brings `failure_count` to `max_failures`
//! - `Open` → `Half-Open`:   `can_execute` observes that `timeout` has elapsed since the last failure
//! - `Half-Open` → `Closed`: a success is recorded; the failure count is reset
//!
//! Failures recorded while half-open are counted but do not reopen the
//! circuit, and successes recorded while closed do not reset the count.
//! There is no background timer: recovery is checked on each `can_execute`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::observer::{noop_observer, Observer};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Requests rejected until `timeout` has elapsed.
    Open,
    /// Probing whether the protected resource recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures (since the last close) that open the circuit.
    pub max_failures: u32,
    /// How long after the last failure an open circuit allows a probe.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Callback invoked with `(name, from, to)` after each transition.
pub type StateChangeCallback = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    on_state_change: Option<StateChangeCallback>,
    observer: Arc<dyn Observer>,
}

/// Thread-safe circuit breaker.
///
/// ```
/// use std::time::Duration;
/// use faultline_core::CircuitBreaker;
///
/// let breaker = CircuitBreaker::new("payments", 3, Duration::from_secs(10));
/// if breaker.can_execute() {
///     match std::fs::metadata("/") {
///         Ok(_) => breaker.record_success(),
///         Err(_) => breaker.record_failure(),
///     }
/// }
/// ```
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: RwLock<CircuitInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in `Closed` state.
    pub fn new(name: impl Into<String>, max_failures: u32, timeout: Duration) -> Self {
        Self::with_config(
            name,
            CircuitBreakerConfig {
                max_failures,
                timeout,
            },
        )
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config,
            inner: RwLock::new(CircuitInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                on_state_change: None,
                observer: noop_observer(),
            }),
        }
    }

    /// Builder form of [`set_observer`](Self::set_observer).
    pub fn with_observer(self, observer: Arc<dyn Observer>) -> Self {
        self.inner.write().observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Unlike [`can_execute`](Self::can_execute), never transitions.
    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.read().failure_count
    }

    /// Register the state-change callback, replacing any previous one.
    ///
    /// The callback runs on a separate thread (the tokio blocking pool when
    /// called inside a runtime) and is never awaited.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.inner.write().on_state_change = Some(Arc::new(callback));
    }

    /// Swap the observer. `None` installs the no-op observer.
    pub fn set_observer(&self, observer: Option<Arc<dyn Observer>>) {
        self.inner.write().observer = observer.unwrap_or_else(noop_observer);
    }

    /// Record a failed operation.
    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        if inner.state == CircuitState::Closed && inner.failure_count >= self.config.max_failures {
            self.transition_to(&mut inner, CircuitState::Open);
        }
    }

    /// Record a successful operation. Only closes a half-open circuit.
    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        if inner.state == CircuitState::HalfOpen {
            inner.failure_count = 0;
            self.transition_to(&mut inner, CircuitState::Closed);
        }
    }

    /// Returns `true` if the guarded operation may be attempted.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open and
    /// admits the caller. Every caller is admitted while half-open.
    pub fn can_execute(&self) -> bool {
        {
            let inner = self.inner.read();
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open if !self.recovery_due(&inner) => return false,
                CircuitState::Open => {}
            }
        }

        // Another caller may have transitioned (or a new failure landed)
        // between the two locks, so re-check under the write lock.
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Open if self.recovery_due(&inner) => {
                self.transition_to(&mut inner, CircuitState::HalfOpen);
                true
            }
            CircuitState::Open => false,
            CircuitState::Closed | CircuitState::HalfOpen => true,
        }
    }

    fn recovery_due(&self, inner: &CircuitInner) -> bool {
        inner
            .last_failure
            .map_or(true, |at| at.elapsed() > self.config.timeout)
    }

    /// Must be called with the write lock held. Same-state is a no-op.
    fn transition_to(&self, inner: &mut CircuitInner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                circuit = %self.name,
                %from,
                failures = inner.failure_count,
                "Circuit breaker → open"
            ),
            CircuitState::HalfOpen => tracing::info!(circuit = %self.name, %from, "Circuit breaker → half-open"),
            CircuitState::Closed => tracing::info!(circuit = %self.name, %from, "Circuit breaker → closed"),
        }

        inner
            .observer
            .record_circuit_state_transition(&self.name, from, to);

        if let Some(callback) = &inner.on_state_change {
            dispatch_state_change(callback.clone(), self.name.clone(), from, to);
        }
    }
}

/// Fire-and-forget: the caller holds the breaker's lock, so the callback
/// must not run on this thread.
fn dispatch_state_change(
    callback: StateChangeCallback,
    name: Arc<str>,
    from: CircuitState,
    to: CircuitState,
) {
    let run = move || callback(&name, from, to);

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        drop(handle.spawn_blocking(run));
        return;
    }

    if let Err(e) = std::thread::Builder::new()
        .name("circuit-state-change".into())
        .spawn(run)
    {
        tracing::warn!(error = %e, "failed to dispatch circuit state-change callback");
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::thread;

    type Transition = (String, CircuitState, CircuitState);

    #[derive(Default)]
    struct RecordingObserver {
        transitions: Mutex<Vec<Transition>>,
    }

    impl Observer for RecordingObserver {
        fn record_error(&self, _message: &str) {}

        fn record_circuit_state_transition(&self, name: &str, from: CircuitState, to: CircuitState) {
            self.transitions.lock().push((name.to_string(), from, to));
        }
    }

    fn cb(max_failures: u32) -> CircuitBreaker {
        CircuitBreaker::new("test", max_failures, Duration::from_secs(60))
    }

    /// Pretend the last failure happened long ago.
    fn expire(c: &CircuitBreaker) {
        let past = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .expect("monotonic clock younger than two minutes");
        c.inner.write().last_failure = Some(past);
    }

    #[test]
    fn starts_closed() {
        let c = CircuitBreaker::new("svc", 3, Duration::from_secs(5));
        assert_eq!(c.name(), "svc");
        assert_eq!(c.config().max_failures, 3);
        assert_eq!(c.config().timeout, Duration::from_secs(5));
        assert_eq!(c.state(), CircuitState::Closed);
        assert_eq!(c.failure_count(), 0);
        assert!(c.can_execute());
    }

    #[test]
    fn opens_at_threshold() {
        let c = cb(3);
        c.record_failure();
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Closed);
        assert!(c.can_execute(), "N-1 failures must still allow execution");
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);
        assert_eq!(c.failure_count(), 3);
        assert!(!c.can_execute());
    }

    #[test]
    fn success_while_closed_does_not_reset() {
        let c = cb(3);
        c.record_failure();
        c.record_failure();
        c.record_success();
        assert_eq!(c.failure_count(), 2);
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn success_while_open_is_ignored() {
        let c = cb(1);
        c.record_failure();
        c.record_success();
        assert_eq!(c.state(), CircuitState::Open);
        assert_eq!(c.failure_count(), 1);
    }

    #[test]
    fn open_moves_to_half_open_after_timeout() {
        let c = cb(1);
        c.record_failure();
        assert!(!c.can_execute());
        assert_eq!(c.state(), CircuitState::Open);

        expire(&c);
        assert!(c.can_execute());
        assert_eq!(c.state(), CircuitState::HalfOpen);
        assert!(c.can_execute(), "half-open admits every caller");
    }

    #[test]
    fn state_does_not_transition() {
        let c = cb(1);
        c.record_failure();
        expire(&c);
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_success_closes_and_resets() {
        let c = cb(2);
        c.record_failure();
        c.record_failure();
        expire(&c);
        assert!(c.can_execute());

        c.record_success();
        assert_eq!(c.state(), CircuitState::Closed);
        assert_eq!(c.failure_count(), 0);

        c.record_failure();
        assert_eq!(c.state(), CircuitState::Closed);
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_failure_is_counted_without_reopening() {
        let c = cb(2);
        c.record_failure();
        c.record_failure();
        expire(&c);
        assert!(c.can_execute());

        c.record_failure();
        assert_eq!(c.state(), CircuitState::HalfOpen);
        assert_eq!(c.failure_count(), 3);
        assert!(c.can_execute());
    }

    #[test]
    fn failure_refreshes_open_timeout() {
        let c = cb(1);
        c.record_failure();
        expire(&c);
        c.record_failure();
        assert!(!c.can_execute());
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn observer_sees_each_transition_once() {
        let observer = Arc::new(RecordingObserver::default());
        let c = cb(1).with_observer(observer.clone());

        c.record_failure();
        c.record_failure(); // already open
        expire(&c);
        assert!(c.can_execute());
        assert!(c.can_execute()); // already half-open
        c.record_success();
        c.record_success(); // already closed

        let got = observer.transitions.lock().clone();
        assert_eq!(
            got,
            vec![
                ("test".to_string(), CircuitState::Closed, CircuitState::Open),
                ("test".to_string(), CircuitState::Open, CircuitState::HalfOpen),
                ("test".to_string(), CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn same_state_transition_is_silent() {
        let observer = Arc::new(RecordingObserver::default());
        let c = cb(5).with_observer(observer.clone());
        let (tx, rx) = mpsc::channel::<Transition>();
        c.on_state_change(move |name, from, to| {
            let _ = tx.send((name.to_string(), from, to));
        });

        {
            let mut inner = c.inner.write();
            c.transition_to(&mut inner, CircuitState::Closed);
        }
        assert!(observer.transitions.lock().is_empty());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn set_observer_none_installs_noop() {
        let observer = Arc::new(RecordingObserver::default());
        let c = cb(1);
        c.set_observer(Some(observer.clone()));
        c.set_observer(None);
        c.record_failure();
        assert!(observer.transitions.lock().is_empty());
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn callback_runs_on_another_thread() {
        let c = cb(1);
        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();
        c.on_state_change(move |name, from, to| {
            let _ = tx.send((name.to_string(), from, to, thread::current().id()));
        });

        c.record_failure();
        let (name, from, to, thread_id) = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("callback not invoked");
        assert_eq!(name, "test");
        assert_eq!((from, to), (CircuitState::Closed, CircuitState::Open));
        assert_ne!(thread_id, caller);
    }

    #[test]
    fn slow_callback_does_not_block_breaker() {
        let c = cb(1);
        c.on_state_change(|_, _, _| thread::sleep(Duration::from_millis(500)));
        let start = Instant::now();
        c.record_failure();
        expire(&c);
        assert!(c.can_execute());
        c.record_success();
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(c.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn callback_dispatched_inside_runtime() {
        let c = cb(1);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        c.on_state_change(move |_, from, to| {
            let _ = tx.send((from, to));
        });

        c.record_failure();
        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("callback timed out");
        assert_eq!(got, Some((CircuitState::Closed, CircuitState::Open)));
    }

    #[test]
    fn concurrent_failures_are_all_counted() {
        let c = cb(50);
        thread::scope(|s| {
            for _ in 0..100 {
                s.spawn(|| c.record_failure());
            }
        });
        assert_eq!(c.failure_count(), 100);
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn concurrent_recovery_transitions_once() {
        let observer = Arc::new(RecordingObserver::default());
        let c = cb(1).with_observer(observer.clone());
        c.record_failure();
        expire(&c);

        thread::scope(|s| {
            for _ in 0..64 {
                s.spawn(|| assert!(c.can_execute()));
            }
        });

        let half_opens = observer
            .transitions
            .lock()
            .iter()
            .filter(|t| t.2 == CircuitState::HalfOpen)
            .count();
        assert_eq!(half_opens, 1);
    }

    #[test]
    fn config_deserializes_humantime() {
        let cfg: CircuitBreakerConfig =
            serde_json::from_str(r#"{"max_failures": 2, "timeout": "100ms"}"#).unwrap();
        assert_eq!(cfg.max_failures, 2);
        assert_eq!(cfg.timeout, Duration::from_millis(100));
        assert_eq!(CircuitBreakerConfig::default().max_failures, 5);
    }
}
