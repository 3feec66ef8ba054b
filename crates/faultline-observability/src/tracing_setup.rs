//! Tracing / logging initialisation helpers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate or module path → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directives, e.g. `"info,faultline_core=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (component, level) in &self.components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(config.filter());
    if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}
