//! Error classification and the contextual record attached to an error.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Environment variable consulted for [`ErrorContext::environment`].
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

const DEFAULT_ENVIRONMENT: &str = "development";

// ─── ErrorType ────────────────────────────────────────────────────────────────

/// What kind of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    #[default]
    Unknown,
    /// Input failed validation.
    Validation,
    NotFound,
    Permission,
    Database,
    Network,
    Configuration,
    /// Internal system fault.
    Internal,
    /// Failure reported by an external service.
    External,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Database => "database",
            Self::Network => "network",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
            Self::External => "external",
        };
        f.write_str(s)
    }
}

// ─── Severity ─────────────────────────────────────────────────────────────────

/// Impact level of an error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    #[default]
    Error,
    /// System-level failure.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ─── RecoverySuggestion ───────────────────────────────────────────────────────

/// Guidance on how to recover from an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySuggestion {
    /// Human-readable explanation.
    pub message: String,
    /// Concrete steps to take.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Link to relevant documentation.
    #[serde(default)]
    pub documentation: String,
}

impl RecoverySuggestion {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn with_documentation(mut self, url: impl Into<String>) -> Self {
        self.documentation = url.into();
        self
    }
}

// ─── ErrorContext ─────────────────────────────────────────────────────────────

/// Where, when and during what an error happened.
/// Only `timestamp`, `error_type`, `severity`, `file`, `line` and
/// `environment` are filled automatically; the rest is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub severity: Severity,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub version: String,
    /// Source location of the code that built the context.
    pub file: String,
    pub line: u32,
    /// Free-form extra data.
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl ErrorContext {
    /// Create a context stamped with the caller's location and the current time.
    #[track_caller]
    pub fn new(error_type: ErrorType, severity: Severity) -> Self {
        let caller = Location::caller();
        Self {
            timestamp: Utc::now(),
            error_type,
            severity,
            operation: String::new(),
            component: String::new(),
            request_id: String::new(),
            user: String::new(),
            environment: current_environment(),
            version: String::new(),
            file: caller.file().to_string(),
            line: caller.line(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// The well-known fields as a flat map, for structured export.
    pub fn to_map(&self) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert("request_id".into(), self.request_id.clone().into());
        map.insert("user".into(), self.user.clone().into());
        map.insert("component".into(), self.component.clone().into());
        map.insert("operation".into(), self.operation.clone().into());
        map.insert("file".into(), self.file.clone().into());
        map.insert("line".into(), self.line.into());
        map.insert("environment".into(), self.environment.clone().into());
        map
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} error in {}:{} ({}) - {} - RequestID: {}, User: {}",
            self.severity,
            self.error_type,
            self.file,
            self.line,
            self.component,
            self.operation,
            self.request_id,
            self.user,
        )
    }
}

fn current_environment() -> String {
    match std::env::var(ENVIRONMENT_VAR) {
        Ok(env) if !env.is_empty() => env,
        _ => DEFAULT_ENVIRONMENT.to_string(),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
