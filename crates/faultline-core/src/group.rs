//! Thread-safe error aggregation with pooled buffers.
//!
//! [`ErrorGroup`] collects independent failures in insertion order.
//! [`ErrorGroupPool`] recycles the groups' backing buffers: a pooled group
//! keeps a non-owning reference to its pool and hands the buffer back on
//! [`release`](ErrorGroup::release) (or on drop).

use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::chain;
use crate::SharedError;

// ─── Pool ─────────────────────────────────────────────────────────────────────

/// Configuration for [`ErrorGroupPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorGroupPoolConfig {
    /// Capacity of freshly allocated error buffers.
    pub initial_capacity: usize,
    /// Upper bound on idle buffers kept for reuse; extras are dropped.
    pub max_idle: usize,
}

impl Default for ErrorGroupPoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4,
            max_idle: 64,
        }
    }
}

struct PoolShared {
    free: Mutex<Vec<Vec<SharedError>>>,
    config: ErrorGroupPoolConfig,
}

impl PoolShared {
    fn put(&self, mut buf: Vec<SharedError>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.config.max_idle {
            free.push(buf);
        }
    }
}

/// Hands out cleared [`ErrorGroup`]s backed by recycled buffers.
///
/// Cloning is cheap; clones share the same free list.
#[derive(Clone)]
pub struct ErrorGroupPool {
    shared: Arc<PoolShared>,
}

impl ErrorGroupPool {
    /// Create a pool whose groups start with room for `initial_capacity`
    /// errors. A negative capacity falls back to 4.
    pub fn new(initial_capacity: isize) -> Self {
        let initial_capacity = usize::try_from(initial_capacity).unwrap_or(4);
        Self::with_config(ErrorGroupPoolConfig {
            initial_capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: ErrorGroupPoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                free: Mutex::new(Vec::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ErrorGroupPoolConfig {
        &self.shared.config
    }

    /// Get an empty group. Release it when done so its buffer can be reused.
    pub fn get(&self) -> ErrorGroup {
        let recycled = self.shared.free.lock().pop();
        let errors = match recycled {
            Some(buf) if !buf.is_empty() => {
                tracing::error!(
                    stale = buf.len(),
                    "error group pool returned a non-empty buffer; using a standalone group"
                );
                return ErrorGroup::new();
            }
            Some(buf) => buf,
            None => Vec::with_capacity(self.shared.config.initial_capacity),
        };

        ErrorGroup {
            state: RwLock::new(GroupState {
                errors,
                pool: Some(Arc::downgrade(&self.shared)),
            }),
        }
    }

    /// Number of buffers currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.shared.free.lock().len()
    }
}

impl Default for ErrorGroupPool {
    fn default() -> Self {
        Self::with_config(ErrorGroupPoolConfig::default())
    }
}

impl fmt::Debug for ErrorGroupPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorGroupPool")
            .field("config", &self.shared.config)
            .field("idle", &self.idle())
            .finish()
    }
}

// ─── Group ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GroupState {
    errors: Vec<SharedError>,
    pool: Option<Weak<PoolShared>>,
}

/// An ordered, thread-safe collection of errors.
///
/// ```
/// use faultline_core::ErrorGroupPool;
///
/// let pool = ErrorGroupPool::new(4);
/// let group = pool.get();
/// group.push(std::io::Error::other("disk full"));
/// group.add(None);
/// assert_eq!(group.to_string(), "disk full");
/// group.release();
/// ```
#[derive(Default)]
pub struct ErrorGroup {
    state: RwLock<GroupState>,
}

impl ErrorGroup {
    /// A standalone group, not associated with any pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error. `None` is ignored.
    pub fn add(&self, err: impl Into<Option<SharedError>>) {
        if let Some(err) = err.into() {
            self.state.write().errors.push(err);
        }
    }

    /// Append a concrete error value.
    pub fn push<E>(&self, err: E)
    where
        E: StdError + Send + Sync + 'static,
    {
        self.add(Some(Arc::new(err) as SharedError));
    }

    pub fn has_errors(&self) -> bool {
        !self.state.read().errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.read().errors.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_errors()
    }

    /// Snapshot of the collected errors, in insertion order.
    pub fn errors(&self) -> Vec<SharedError> {
        self.state.read().errors.clone()
    }

    /// Combine the collected errors into one. `None` when empty.
    pub fn join(&self) -> Option<JoinedError> {
        let errors = self.errors();
        if errors.is_empty() {
            return None;
        }
        Some(JoinedError { errors })
    }

    /// Remove all errors, keeping the buffer's capacity.
    pub fn clear(&self) {
        self.state.write().errors.clear();
    }

    /// `Some(self)` if any error was collected.
    pub fn error_or_none(&self) -> Option<&Self> {
        self.has_errors().then_some(self)
    }

    /// Whether this group still belongs to a pool.
    pub fn is_pooled(&self) -> bool {
        self.state.read().pool.is_some()
    }

    /// Return the buffer to the originating pool.
    ///
    /// The group is left empty and standalone; releasing again does nothing.
    /// Standalone groups keep their errors.
    pub fn release(&self) {
        let (pool, buf) = {
            let mut state = self.state.write();
            let Some(pool) = state.pool.take() else {
                return;
            };
            (pool, mem::take(&mut state.errors))
        };
        if let Some(pool) = pool.upgrade() {
            pool.put(buf);
        }
    }
}

impl Drop for ErrorGroup {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(pool) = state.pool.take().and_then(|weak| weak.upgrade()) {
            pool.put(mem::take(&mut state.errors));
        }
    }
}

impl fmt::Display for ErrorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        match state.errors.as_slice() {
            [] => Ok(()),
            [only] => write!(f, "{only}"),
            errors => {
                writeln!(f, "{} errors occurred:", errors.len())?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "{}: {err}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ErrorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ErrorGroup")
            .field("errors", &state.errors)
            .field("pooled", &state.pool.is_some())
            .finish()
    }
}

impl StdError for ErrorGroup {}

// ─── Join ─────────────────────────────────────────────────────────────────────

/// Several errors combined into one.
///
/// [`chain::is`] and [`chain::find`] search every constituent.
#[derive(Debug, Clone)]
pub struct JoinedError {
    errors: Vec<SharedError>,
}

impl JoinedError {
    pub fn new(errors: Vec<SharedError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[SharedError] {
        &self.errors
    }

    /// Returns `true` if `target` is one of the constituents or in one of their chains.
    pub fn is(&self, target: &(dyn StdError + 'static)) -> bool {
        chain::is(self, target)
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl StdError for JoinedError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecoratedError;
    use std::thread;

    fn shared(msg: &str) -> SharedError {
        Arc::new(DecoratedError::new(msg))
    }

    #[test]
    fn negative_capacity_defaults_to_four() {
        assert_eq!(ErrorGroupPool::new(-1).config().initial_capacity, 4);
        assert_eq!(ErrorGroupPool::new(0).config().initial_capacity, 0);
        assert_eq!(ErrorGroupPool::new(16).config().initial_capacity, 16);
    }

    #[test]
    fn get_is_empty_and_presized() {
        let pool = ErrorGroupPool::new(8);
        let group = pool.get();
        assert!(!group.has_errors());
        assert!(group.is_pooled());
        assert!(group.state.read().errors.capacity() >= 8);
    }

    #[test]
    fn released_buffer_is_reused_clean() {
        let pool = ErrorGroupPool::new(4);
        let group = pool.get();
        group.add(shared("a"));
        group.add(shared("b"));
        group.release();
        assert_eq!(pool.idle(), 1);

        let again = pool.get();
        assert_eq!(pool.idle(), 0);
        assert_eq!(again.len(), 0);
        assert_eq!(again.to_string(), "");
    }

    #[test]
    fn double_release_is_noop() {
        let pool = ErrorGroupPool::new(4);
        let group = pool.get();
        group.add(shared("a"));
        group.release();
        group.release();
        assert_eq!(pool.idle(), 1);
        assert!(!group.is_pooled());
    }

    #[test]
    fn use_after_release_acts_standalone() {
        let pool = ErrorGroupPool::new(4);
        let group = pool.get();
        group.release();
        group.add(shared("late"));
        assert_eq!(group.len(), 1);
        drop(group);
        assert_eq!(pool.idle(), 1, "a released group must not return twice");
    }

    #[test]
    fn drop_returns_buffer() {
        let pool = ErrorGroupPool::new(4);
        {
            let group = pool.get();
            group.add(shared("x"));
        }
        assert_eq!(pool.idle(), 1);
        assert!(pool.get().is_empty());
    }

    #[test]
    fn standalone_release_keeps_errors() {
        let group = ErrorGroup::new();
        group.add(shared("a"));
        group.release();
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn release_after_pool_dropped() {
        let pool = ErrorGroupPool::new(4);
        let group = pool.get();
        group.add(shared("a"));
        drop(pool);
        group.release();
        assert!(group.is_empty());
        assert!(!group.is_pooled());
    }

    #[test]
    fn max_idle_bounds_free_list() {
        let pool = ErrorGroupPool::with_config(ErrorGroupPoolConfig {
            initial_capacity: 2,
            max_idle: 2,
        });
        let groups: Vec<_> = (0..5).map(|_| pool.get()).collect();
        for g in &groups {
            g.release();
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn dirty_recycled_buffer_falls_back_to_standalone() {
        let pool = ErrorGroupPool::new(4);
        pool.shared.free.lock().push(vec![shared("stale")]);

        let group = pool.get();
        assert!(group.is_empty());
        assert!(!group.is_pooled());
    }

    #[test]
    fn add_none_is_ignored() {
        let group = ErrorGroup::new();
        group.add(None);
        assert!(!group.has_errors());
        group.add(shared("a"));
        group.add(None);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn display_numbering() {
        let group = ErrorGroup::new();
        assert_eq!(group.to_string(), "");
        group.add(shared("a"));
        assert_eq!(group.to_string(), "a");
        group.add(shared("b"));
        assert_eq!(group.to_string(), "2 errors occurred:\n1: a\n2: b\n");
    }

    #[test]
    fn errors_returns_a_copy() {
        let group = ErrorGroup::new();
        group.add(shared("a"));
        let mut copy = group.errors();
        copy.push(shared("b"));
        copy.clear();
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn clear_keeps_capacity() {
        let group = ErrorGroup::new();
        for i in 0..10 {
            group.add(shared(&i.to_string()));
        }
        let cap = group.state.read().errors.capacity();
        group.clear();
        assert!(group.is_empty());
        assert_eq!(group.state.read().errors.capacity(), cap);
    }

    #[test]
    fn error_or_none() {
        let group = ErrorGroup::new();
        assert!(group.error_or_none().is_none());
        group.add(shared("a"));
        assert!(group.error_or_none().is_some());
    }

    #[test]
    fn join_matches_every_constituent() {
        let e1 = shared("first");
        let e2 = shared("second");
        let outsider = DecoratedError::new("first");

        let group = ErrorGroup::new();
        assert!(group.join().is_none());
        group.add(e1.clone());
        group.add(e2.clone());

        let joined = group.join().unwrap();
        assert!(joined.is(&*e1));
        assert!(joined.is(&*e2));
        assert!(!joined.is(&outsider));
        assert_eq!(joined.to_string(), "first\nsecond");
    }

    #[test]
    fn join_is_searchable_when_wrapped() {
        let leaf = shared("leaf");
        let joined = JoinedError::new(vec![shared("other"), leaf.clone()]);
        let outer = DecoratedError::wrap(joined, "batch failed");
        assert!(outer.is(&*leaf));
    }

    #[test]
    fn concurrent_adds_lose_nothing() {
        let pool = ErrorGroupPool::new(4);
        let group = pool.get();
        thread::scope(|s| {
            for i in 0..100 {
                let group = &group;
                s.spawn(move || group.add(shared(&format!("err {i}"))));
            }
        });
        assert_eq!(group.len(), 100);
        group.release();
    }

    #[test]
    fn concurrent_get_release() {
        let pool = ErrorGroupPool::new(4);
        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for i in 0..100 {
                        let group = pool.get();
                        assert!(group.is_empty());
                        group.add(shared(&i.to_string()));
                        group.release();
                    }
                });
            }
        });
        assert!(pool.idle() <= 16);
    }
}
