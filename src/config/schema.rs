//! Client settings schema.
//!
//! All types derive Serde traits for deserialization from a TOML file.

use serde::{Deserialize, Serialize};

/// Root settings for a configuration client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP client settings.
    pub http: HttpConfig,

    /// Document loading behaviour.
    pub loading: LoadingConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total request timeout in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: concat!("remote-config/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// How nested documents discovered during aggregation are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NestedLoadMode {
    /// Spawned in the background; `load` returns before they finish.
    #[default]
    Detached,
    /// Awaited; `load` returns once the whole tree is merged.
    Awaited,
}

/// Document loading settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadingConfig {
    /// Nested load scheduling.
    pub nested_mode: NestedLoadMode,

    /// Documents loaded at startup, in order.
    pub sources: Vec<String>,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
