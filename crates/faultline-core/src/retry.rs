//! Retry bookkeeping attached to an error. This never schedules anything;
//! callers read it to decide whether to try again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::context::ErrorType;
use crate::error::DecoratedError;

/// Decides whether an error is worth retrying.
pub type RetryPredicate = Arc<dyn Fn(&DecoratedError) -> bool + Send + Sync>;

/// Retry state of an error.
#[derive(Clone)]
pub struct RetryInfo {
    pub max_attempts: u32,
    pub current_attempt: u32,
    /// Suggested delay between attempts.
    pub delay: Duration,
    pub last_attempt: DateTime<Utc>,
    pub should_retry: RetryPredicate,
}

impl RetryInfo {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            current_attempt: 0,
            delay,
            last_attempt: Utc::now(),
            should_retry: Arc::new(default_should_retry),
        }
    }

    /// Replace the retry predicate.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DecoratedError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Returns `true` while attempts remain.
    pub fn has_attempts_left(&self) -> bool {
        self.current_attempt < self.max_attempts
    }
}

/// Validation failures are never retried; everything else is.
pub fn default_should_retry(err: &DecoratedError) -> bool {
    err.error_context()
        .map_or(true, |ctx| ctx.error_type != ErrorType::Validation)
}

impl fmt::Debug for RetryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryInfo")
            .field("max_attempts", &self.max_attempts)
            .field("current_attempt", &self.current_attempt)
            .field("delay", &self.delay)
            .field("last_attempt", &self.last_attempt)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct RetryInfoView<'a> {
    max_attempts: u32,
    current_attempt: u32,
    #[serde(with = "humantime_serde")]
    delay: Duration,
    last_attempt: &'a DateTime<Utc>,
}

impl Serialize for RetryInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RetryInfoView {
            max_attempts: self.max_attempts,
            current_attempt: self.current_attempt,
            delay: self.delay,
            last_attempt: &self.last_attempt,
        }
        .serialize(serializer)
    }
}

// ─── DecoratedError integration ───────────────────────────────────────────────

impl DecoratedError {
    /// Attach retry bookkeeping with the default predicate.
    pub fn with_retry(self, max_attempts: u32, delay: Duration) -> Self {
        self.with_retry_info(RetryInfo::new(max_attempts, delay))
    }

    pub fn with_retry_info(self, info: RetryInfo) -> Self {
        self.with_metadata(crate::metadata::RETRY_INFO_KEY, info)
    }

    /// Returns `true` if attempts remain and the predicate allows a retry.
    /// Errors without retry info are never retryable.
    pub fn can_retry(&self) -> bool {
        let Some(info) = self.retry_info() else {
            return false;
        };
        info.has_attempts_left() && (info.should_retry)(self)
    }

    /// Count one more attempt. No-op without retry info.
    pub fn increment_retry(&self) {
        self.update_retry_info(|info| {
            info.current_attempt = info.current_attempt.saturating_add(1);
            info.last_attempt = Utc::now();
        });
    }
}
