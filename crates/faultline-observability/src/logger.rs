//! [`Logger`] implementation on top of `tracing`.

use faultline_core::logger::fields_to_json;
use faultline_core::{Field, Logger};

/// Emits each log call as a `tracing` event at the matching level.
/// Structured fields are attached as one JSON object under `fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn error(&self, msg: &str, fields: &[Field<'_>]) {
        tracing::error!(fields = %fields_to_json(fields), "{msg}");
    }

    fn debug(&self, msg: &str, fields: &[Field<'_>]) {
        tracing::debug!(fields = %fields_to_json(fields), "{msg}");
    }

    fn info(&self, msg: &str, fields: &[Field<'_>]) {
        tracing::info!(fields = %fields_to_json(fields), "{msg}");
    }
}
