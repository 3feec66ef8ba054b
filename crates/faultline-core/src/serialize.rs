//! Structured export of an [`ErrorGroup`] as JSON or YAML.

use std::collections::BTreeMap;
use std::error::Error as StdError;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::chain;
use crate::error::DecoratedError;
use crate::format::FormatError;
use crate::group::ErrorGroup;
use crate::stack::StackFrame;

/// Which kind of error an entry was exported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKindTag {
    /// Any error without a [`DecoratedError`] in its chain.
    Standard,
    Decorated,
}

/// One exported error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKindTag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<StackFrame>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<SerializableError>>,
}

impl SerializableError {
    /// Export `err`. The message is always `err`'s own; stack, metadata and
    /// cause come from the first [`DecoratedError`] in its chain.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let message = err.to_string();

        let Some(decorated) = chain::find::<DecoratedError>(err) else {
            return Self {
                message,
                kind: ErrorKindTag::Standard,
                stack_trace: Vec::new(),
                metadata: BTreeMap::new(),
                cause: err.source().map(|c| Box::new(Self::from_error(c))),
            };
        };

        let metadata = decorated
            .metadata_all()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        Self {
            message,
            kind: ErrorKindTag::Decorated,
            stack_trace: decorated.stack_frames(),
            metadata,
            cause: decorated
                .cause()
                .map(|c| Box::new(Self::from_error(&**c))),
        }
    }
}

/// Exported form of an [`ErrorGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorGroupSerialization {
    pub error_count: usize,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub errors: Vec<SerializableError>,
}

impl ErrorGroupSerialization {
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, FormatError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml(s: &str) -> Result<Self, FormatError> {
        Ok(serde_yaml::from_str(s)?)
    }
}

impl ErrorGroup {
    /// Snapshot the group in exportable form.
    pub fn to_serialization(&self) -> ErrorGroupSerialization {
        let errors: Vec<_> = self
            .errors()
            .iter()
            .map(|e| SerializableError::from_error(&**e))
            .collect();

        ErrorGroupSerialization {
            error_count: errors.len(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            errors,
        }
    }

    /// Pretty-printed JSON export.
    pub fn to_json(&self) -> Result<String, FormatError> {
        self.to_serialization().to_json()
    }

    pub fn to_yaml(&self) -> Result<String, FormatError> {
        self.to_serialization().to_yaml()
    }
}

impl Serialize for ErrorGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_serialization().serialize(serializer)
    }
}
