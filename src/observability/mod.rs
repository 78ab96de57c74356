//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! loader.rs / store.rs / http.rs
//!     → tracing events (url, path, status fields)
//!     → logging.rs subscriber (stderr, filtered)
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted messages
//! - Fetches at debug, loads at info, nested failures at warn

pub mod logging;

pub use logging::init_logging;
