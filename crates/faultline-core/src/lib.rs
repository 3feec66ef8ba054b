//! faultline-core: decorated errors, fault isolation and error aggregation.
//!
//! This crate defines:
//! - [`DecoratedError`]: an error with a cause chain, captured stack and metadata
//! - [`CircuitBreaker`]: a closed / open / half-open fault-isolation gate
//! - [`ErrorGroup`] / [`ErrorGroupPool`]: thread-safe, pooled multi-error collection
//! - [`Observer`] / [`Logger`]: the narrow hooks the core calls out to
//! - [`chain`]: identity and type lookups across `source()` chains

pub mod chain;
pub mod circuit_breaker;
pub mod context;
pub mod error;
pub mod format;
pub mod group;
pub mod logger;
pub mod metadata;
pub mod observer;
pub mod retry;
pub mod serialize;
pub mod stack;

use std::sync::Arc;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use context::{ErrorContext, ErrorType, RecoverySuggestion, Severity};
pub use error::DecoratedError;
pub use format::{ErrorOutput, FormatError, FormatOptions};
pub use group::{ErrorGroup, ErrorGroupPool, ErrorGroupPoolConfig, JoinedError};
pub use logger::{Field, Logger};
pub use metadata::MetadataValue;
pub use observer::{noop_observer, NoopObserver, Observer};
pub use retry::RetryInfo;
pub use serialize::{ErrorGroupSerialization, ErrorKindTag, SerializableError};
pub use stack::{StackFrame, StackIterator, StackTrace};

/// A reference-counted, thread-safe error. The unit stored in groups and
/// used as a cause.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;
