//! Remote configuration aggregation library.
//!
//! Loads a JSON document from a URL, follows every `*Fetch` member that holds
//! an absolute URL, splices the fetched documents into place, and serves the
//! merged tree through key and path lookups.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use remote_config::{ClientConfig, ConfigurationStore};
//!
//! let store = ConfigurationStore::from_config(&ClientConfig::default())?;
//! store.load("https://example.com/settings.json").await?;
//! store.settle().await;
//!
//! let name = store.get_path_value("service.name");
//! let paths = store.get_object_paths(Some("service"));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
mod loader;
pub mod observability;
pub mod path;
pub mod store;
pub mod testing;

pub use config::{ClientConfig, NestedLoadMode};
pub use error::{ConfigError, ConfigResult, FetchError, PathError};
pub use http::{FetchResponse, Fetcher, ReqwestFetcher};
pub use path::JsonPath;
pub use store::ConfigurationStore;
