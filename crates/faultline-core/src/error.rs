//! An error with a cause chain, a captured call stack and structured
//! metadata: [`DecoratedError`].

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::chain;
use crate::context::{ErrorContext, RecoverySuggestion};
use crate::logger::{Field, Logger};
use crate::metadata::{
    MetadataValue, ERROR_CONTEXT_KEY, RECOVERY_SUGGESTION_KEY, RETRY_INFO_KEY,
};
use crate::observer::{noop_observer, Observer};
use crate::retry::RetryInfo;
use crate::stack::{StackFrame, StackIterator, StackTrace};
use crate::SharedError;

/// Mutable part of an error. Metadata may be added while other threads
/// read it, so it lives behind a lock.
struct ErrorState {
    metadata: BTreeMap<String, MetadataValue>,
    logger: Option<Arc<dyn Logger>>,
    observer: Arc<dyn Observer>,
}

impl Default for ErrorState {
    fn default() -> Self {
        Self {
            metadata: BTreeMap::new(),
            logger: None,
            observer: noop_observer(),
        }
    }
}

/// An error carrying a message, an optional cause, the stack at creation
/// and a metadata map.
///
/// ```
/// use faultline_core::{DecoratedError, ErrorContext, ErrorType, Severity};
///
/// let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
/// let err = DecoratedError::wrap(io, "fetch user")
///     .with_context(ErrorContext::new(ErrorType::Network, Severity::Error))
///     .with_metadata("user_id", 42);
///
/// assert_eq!(err.to_string(), "fetch user: connection reset");
/// assert_eq!(err.metadata("user_id").and_then(|v| v.as_i64()), Some(42));
/// ```
pub struct DecoratedError {
    message: String,
    cause: Option<SharedError>,
    stack: StackTrace,
    state: RwLock<ErrorState>,
}

impl DecoratedError {
    /// Create an error, capturing the current stack.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            stack: StackTrace::capture(),
            state: RwLock::new(ErrorState::default()),
        }
    }

    /// Wrap `cause` with additional context.
    ///
    /// If the cause chain already holds a `DecoratedError`, its stack is
    /// reused and its metadata and observer are carried over.
    pub fn wrap<E>(cause: E, message: impl Into<String>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::wrap_shared(Arc::new(cause), message)
    }

    /// [`wrap`](Self::wrap) for a cause that is already shared.
    pub fn wrap_shared(cause: SharedError, message: impl Into<String>) -> Self {
        let (stack, state) = match chain::find::<DecoratedError>(&*cause) {
            Some(inner) => {
                let inherited = inner.state.read();
                let state = ErrorState {
                    metadata: inherited.metadata.clone(),
                    logger: None,
                    observer: inherited.observer.clone(),
                };
                (inner.stack.clone(), state)
            }
            None => (StackTrace::capture(), ErrorState::default()),
        };

        Self {
            message: message.into(),
            cause: Some(cause),
            stack,
            state: RwLock::new(state),
        }
    }

    // ─── Builders ────────────────────────────────────────────────────────────

    /// Attach a logger. Logs the creation of the error at debug level.
    pub fn with_logger(self, logger: Arc<dyn Logger>) -> Self {
        self.state.write().logger = Some(logger.clone());
        logger.debug(
            "error created",
            &[
                ("message", Value::from(self.message.as_str())),
                ("stack", Value::from(self.stack())),
            ],
        );
        self
    }

    pub fn with_observer(self, observer: Arc<dyn Observer>) -> Self {
        self.state.write().observer = observer;
        self
    }

    pub fn with_metadata(self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert_metadata(key, value);
        self
    }

    pub fn with_context(self, ctx: ErrorContext) -> Self {
        self.set_context(ctx);
        self
    }

    pub fn with_recovery_suggestion(self, suggestion: RecoverySuggestion) -> Self {
        self.state
            .write()
            .metadata
            .insert(RECOVERY_SUGGESTION_KEY.to_string(), suggestion.into());
        self
    }

    // ─── Mutators ────────────────────────────────────────────────────────────

    /// Add or replace a metadata entry.
    pub fn insert_metadata(&self, key: impl Into<String>, value: impl Into<MetadataValue>) -> &Self {
        let key = key.into();
        let value = value.into();
        let rendered = value.to_json();
        let logger = {
            let mut state = self.state.write();
            state.metadata.insert(key.clone(), value);
            state.logger.clone()
        };
        if let Some(logger) = logger {
            logger.debug(
                "metadata added",
                &[
                    ("key", Value::from(key)),
                    ("value", rendered),
                    ("error", Value::from(self.message.as_str())),
                ],
            );
        }
        self
    }

    /// Attach (or replace) the error's [`ErrorContext`].
    pub fn set_context(&self, ctx: ErrorContext) -> &Self {
        let fields: [Field<'_>; 5] = [
            ("error_type", Value::from(ctx.error_type.to_string())),
            ("severity", Value::from(ctx.severity.to_string())),
            ("request_id", Value::from(ctx.request_id.as_str())),
            ("component", Value::from(ctx.component.as_str())),
            ("error", Value::from(self.message.as_str())),
        ];
        let logger = {
            let mut state = self.state.write();
            state
                .metadata
                .insert(ERROR_CONTEXT_KEY.to_string(), MetadataValue::Context(ctx));
            state.logger.clone()
        };
        if let Some(logger) = logger {
            logger.debug("error context added", &fields);
        }
        self
    }

    pub(crate) fn update_retry_info(&self, update: impl FnOnce(&mut RetryInfo)) {
        let mut state = self.state.write();
        if let Some(MetadataValue::Retry(info)) = state.metadata.get_mut(RETRY_INFO_KEY) {
            update(info);
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    /// The message of this layer only, without the cause.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&SharedError> {
        self.cause.as_ref()
    }

    pub fn metadata(&self, key: &str) -> Option<MetadataValue> {
        self.state.read().metadata.get(key).cloned()
    }

    /// Snapshot of every metadata entry.
    pub fn metadata_all(&self) -> BTreeMap<String, MetadataValue> {
        self.state.read().metadata.clone()
    }

    pub fn error_context(&self) -> Option<ErrorContext> {
        self.metadata(ERROR_CONTEXT_KEY)
            .and_then(|v| v.as_context().cloned())
    }

    pub fn retry_info(&self) -> Option<RetryInfo> {
        self.metadata(RETRY_INFO_KEY).and_then(|v| v.as_retry().cloned())
    }

    pub fn recovery_suggestion(&self) -> Option<RecoverySuggestion> {
        self.metadata(RECOVERY_SUGGESTION_KEY)
            .and_then(|v| v.as_recovery().cloned())
    }

    pub fn observer(&self) -> Arc<dyn Observer> {
        self.state.read().observer.clone()
    }

    pub fn stack_trace(&self) -> &StackTrace {
        &self.stack
    }

    /// The stack rendered one `file:line - function` line per frame.
    pub fn stack(&self) -> String {
        self.stack.render()
    }

    pub fn stack_frames(&self) -> Vec<StackFrame> {
        self.stack.frames()
    }

    pub fn stack_iter(&self) -> StackIterator {
        self.stack.iter()
    }

    /// Returns `true` if `target` is this error or appears in its cause chain.
    pub fn is(&self, target: &(dyn StdError + 'static)) -> bool {
        chain::is(self, target)
    }

    // ─── Reporting ───────────────────────────────────────────────────────────

    /// Report the error: notify the observer, then log it with its cause,
    /// stack and metadata if a logger is attached.
    pub fn log(&self) {
        let (logger, observer, metadata) = {
            let state = self.state.read();
            (
                state.logger.clone(),
                state.observer.clone(),
                state.metadata.clone(),
            )
        };

        observer.record_error(&self.to_string());

        let Some(logger) = logger else {
            return;
        };

        let mut fields: Vec<Field<'_>> = Vec::with_capacity(metadata.len() + 3);
        fields.push(("error", Value::from(self.message.as_str())));
        if let Some(cause) = &self.cause {
            fields.push(("cause", Value::from(cause.to_string())));
        }
        fields.push(("stack", Value::from(self.stack())));
        for (key, value) in &metadata {
            fields.push((key.as_str(), value.to_json()));
        }
        logger.error("error occurred", &fields);
    }
}

impl fmt::Display for DecoratedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

impl fmt::Debug for DecoratedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DecoratedError")
            .field("message", &self.message)
            .field("cause", &self.cause)
            .field("metadata", &state.metadata.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl StdError for DecoratedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
