//! Client settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → HttpConfig builds the fetcher, LoadingConfig drives the store
//! ```
//!
//! # Design Decisions
//! - Every field has a default so an empty file is a valid configuration
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, SettingsError};
pub use schema::ClientConfig;
pub use schema::HttpConfig;
pub use schema::LoadingConfig;
pub use schema::NestedLoadMode;
pub use schema::ObservabilityConfig;
