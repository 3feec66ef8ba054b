//! The value type stored in a [`DecoratedError`](crate::DecoratedError)'s
//! metadata map.
//!
//! Arbitrary caller data is kept as JSON. The well-known entries (context,
//! retry bookkeeping, recovery suggestion) have their own variants so they
//! can be read back typed.

use serde_json::Value;

use crate::context::{ErrorContext, RecoverySuggestion};
use crate::retry::RetryInfo;

/// Metadata key of the attached [`ErrorContext`].
pub const ERROR_CONTEXT_KEY: &str = "error_context";
/// Metadata key of the attached [`RetryInfo`].
pub const RETRY_INFO_KEY: &str = "retry_info";
/// Metadata key of the attached [`RecoverySuggestion`].
pub const RECOVERY_SUGGESTION_KEY: &str = "recovery_suggestion";

/// A single metadata value.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    Json(Value),
    Context(ErrorContext),
    Retry(RetryInfo),
    Recovery(RecoverySuggestion),
}

impl MetadataValue {
    /// Render as JSON for logging and export.
    pub fn to_json(&self) -> Value {
        let rendered = match self {
            Self::Json(v) => return v.clone(),
            Self::Context(ctx) => serde_json::to_value(ctx),
            Self::Retry(info) => serde_json::to_value(info),
            Self::Recovery(rs) => serde_json::to_value(rs),
        };
        rendered.unwrap_or(Value::Null)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Value::as_i64)
    }

    pub fn as_context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Context(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_retry(&self) -> Option<&RetryInfo> {
        match self {
            Self::Retry(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_recovery(&self) -> Option<&RecoverySuggestion> {
        match self {
            Self::Recovery(rs) => Some(rs),
            _ => None,
        }
    }
}

impl PartialEq<Value> for MetadataValue {
    fn eq(&self, other: &Value) -> bool {
        self.as_json() == Some(other)
    }
}

macro_rules! json_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for MetadataValue {
                fn from(v: $t) -> Self {
                    Self::Json(Value::from(v))
                }
            }
        )*
    };
}

json_from!(&str, String, bool, i32, i64, u32, u64, f64, Value);

impl From<ErrorContext> for MetadataValue {
    fn from(ctx: ErrorContext) -> Self {
        Self::Context(ctx)
    }
}

impl From<RetryInfo> for MetadataValue {
    fn from(info: RetryInfo) -> Self {
        Self::Retry(info)
    }
}

impl From<RecoverySuggestion> for MetadataValue {
    fn from(rs: RecoverySuggestion) -> Self {
        Self::Recovery(rs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ErrorType, Severity};
    use serde_json::json;

    #[test]
    fn scalar_conversions() {
        assert_eq!(MetadataValue::from("abc").as_str(), Some("abc"));
        assert_eq!(MetadataValue::from(42i64).as_i64(), Some(42));
        assert_eq!(MetadataValue::from(true), json!(true));
    }

    #[test]
    fn typed_variants_render_as_json() {
        let ctx = ErrorContext::new(ErrorType::Validation, Severity::Warning).with_user("bob");
        let v = MetadataValue::from(ctx).to_json();
        assert_eq!(v["type"], "validation");
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["user"], "bob");

        let rs = MetadataValue::from(RecoverySuggestion::new("retry later"));
        assert!(rs.as_recovery().is_some());
        assert_eq!(rs.to_json()["message"], "retry later");
    }
}
