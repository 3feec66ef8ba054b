//! Single-error export as JSON or YAML.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::context::RecoverySuggestion;
use crate::error::DecoratedError;
use crate::metadata::{ERROR_CONTEXT_KEY, RECOVERY_SUGGESTION_KEY};

const UNKNOWN_TYPE: &str = "unknown";
const DEFAULT_SEVERITY: &str = "error";

/// Failure to render or parse an export.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Exported form of a [`DecoratedError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOutput {
    pub message: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub severity: String,
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorOutput>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoverySuggestion>,
}

impl ErrorOutput {
    /// Output for a cause that is not a [`DecoratedError`].
    fn plain(message: String) -> Self {
        Self {
            message,
            timestamp: String::new(),
            error_type: UNKNOWN_TYPE.to_string(),
            severity: DEFAULT_SEVERITY.to_string(),
            stack: String::new(),
            cause: None,
            context: BTreeMap::new(),
            metadata: BTreeMap::new(),
            recovery: None,
        }
    }
}

/// Export options. Applied to the error and every decorated cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// `strftime` pattern for the timestamp; RFC 3339 when unset.
    pub timestamp_format: Option<String>,
    pub include_stack: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            timestamp_format: None,
            include_stack: true,
        }
    }
}

impl FormatOptions {
    /// An empty pattern leaves the timestamp as RFC 3339.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        let format = format.into();
        self.timestamp_format = (!format.is_empty()).then_some(format);
        self
    }

    pub fn without_stack(mut self) -> Self {
        self.include_stack = false;
        self
    }

    fn timestamp(&self, at: DateTime<Utc>) -> String {
        let rfc3339 = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let Some(pattern) = &self.timestamp_format else {
            return rfc3339;
        };
        // Invalid patterns make chrono's formatter return an error.
        let mut out = String::new();
        match write!(out, "{}", at.format(pattern)) {
            Ok(()) => out,
            Err(_) => rfc3339,
        }
    }
}

impl DecoratedError {
    /// Build the export structure, recursing into decorated causes.
    pub fn to_output(&self, options: &FormatOptions) -> ErrorOutput {
        let mut metadata = self.metadata_all();
        let ctx = metadata
            .remove(ERROR_CONTEXT_KEY)
            .and_then(|v| v.as_context().cloned());
        let recovery = metadata
            .remove(RECOVERY_SUGGESTION_KEY)
            .and_then(|v| v.as_recovery().cloned());

        let (error_type, severity, context) = match &ctx {
            Some(ctx) => (ctx.error_type.to_string(), ctx.severity.to_string(), ctx.to_map()),
            None => (UNKNOWN_TYPE.to_string(), DEFAULT_SEVERITY.to_string(), BTreeMap::new()),
        };

        let cause = self.cause().map(|c| {
            Box::new(match c.downcast_ref::<DecoratedError>() {
                Some(inner) => inner.to_output(options),
                None => ErrorOutput::plain(c.to_string()),
            })
        });

        ErrorOutput {
            message: self.message().to_string(),
            timestamp: options.timestamp(Utc::now()),
            error_type,
            severity,
            stack: if options.include_stack { self.stack() } else { String::new() },
            cause,
            context,
            metadata: metadata.into_iter().map(|(k, v)| (k, v.to_json())).collect(),
            recovery,
        }
    }

    /// Pretty-printed JSON export.
    pub fn to_json(&self, options: &FormatOptions) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(&self.to_output(options))?)
    }

    pub fn to_yaml(&self, options: &FormatOptions) -> Result<String, FormatError> {
        Ok(serde_yaml::to_string(&self.to_output(options))?)
    }
}
