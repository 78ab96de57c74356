//! Client settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0)
//! - Check that startup sources are absolute URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::classify::is_url;
use crate::config::schema::ClientConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted name of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the settings, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.timeout_secs == 0 {
        errors.push(ValidationError::new("http.timeout_secs", "must be greater than 0"));
    }
    if config.http.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "http.connect_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.http.user_agent.trim().is_empty() {
        errors.push(ValidationError::new("http.user_agent", "must not be empty"));
    }

    for (i, source) in config.loading.sources.iter().enumerate() {
        if !is_url(source) {
            errors.push(ValidationError::new(
                format!("loading.sources[{i}]"),
                format!("'{source}' is not an absolute URL"),
            ));
        }
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
