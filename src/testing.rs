//! In-memory HTTP collaborator for tests and embedders.
//!
//! `StaticFetcher` answers from a table of canned responses keyed by URL and
//! counts how often each URL was requested. Unknown URLs answer `404`.
//!
//! ```
//! use remote_config::testing::StaticFetcher;
//! use serde_json::json;
//!
//! let fetcher = StaticFetcher::new()
//!     .with_json("settings.json", &json!({ "simpleString": "abc" }))
//!     .with_response("settings.txt", 200, "some text");
//! assert_eq!(fetcher.hits("settings.json"), 0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::FetchError;
use crate::http::{FetchResponse, Fetcher};

#[derive(Debug, Clone)]
enum Reply {
    Response(FetchResponse),
    Unavailable(String),
}

#[derive(Debug, Default)]
struct Table {
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    hits: HashMap<String, usize>,
}

/// Canned-response `Fetcher`.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    table: Arc<Mutex<Table>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `200` and the serialized document.
    pub fn with_json(self, url: &str, document: &Value) -> Self {
        self.set_response(url, 200, document.to_string());
        self
    }

    /// Answer `url` with an arbitrary status and body.
    pub fn with_response(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.set_response(url, status, body);
        self
    }

    /// Fail requests for `url` before any response is produced.
    pub fn with_unavailable(self, url: &str, reason: &str) -> Self {
        self.table
            .lock()
            .replies
            .insert(url.to_string(), Reply::Unavailable(reason.to_string()));
        self
    }

    /// Delay the answer for `url`.
    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.table.lock().delays.insert(url.to_string(), delay);
        self
    }

    /// Replace the answer for `url` after construction.
    pub fn set_response(&self, url: &str, status: u16, body: impl Into<String>) {
        self.table.lock().replies.insert(
            url.to_string(),
            Reply::Response(FetchResponse::new(status, body)),
        );
    }

    /// Number of requests seen for `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.table.lock().hits.get(url).copied().unwrap_or(0)
    }

    /// Number of requests seen across all URLs.
    pub fn total_hits(&self) -> usize {
        self.table.lock().hits.values().sum()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let (reply, delay) = {
            let mut table = self.table.lock();
            *table.hits.entry(url.to_string()).or_default() += 1;
            (
                table.replies.get(url).cloned(),
                table.delays.get(url).copied(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Unavailable(reason)) => Err(FetchError::Unavailable(reason)),
            None => Ok(FetchResponse::new(404, "")),
        }
    }
}
