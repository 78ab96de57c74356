//! Merged configuration tree and its lookup surface.
//!
//! # Data Flow
//! ```text
//! loader.rs (fetch + parse)
//!     → LoadContext::install_root / LoadContext::splice
//!     → aggregate.rs (refresh ObjectPaths, find nested references)
//!     → ConfigurationStore lookups (get_value, get_keys, get_object_paths)
//! ```
//!
//! # Design Decisions
//! - All mutable state lives in one `LoadContext` behind one mutex
//! - The mutex is never held across an await point
//! - Lookups are lenient: anything unresolvable reads as `None`
//! - A stored `null` reads as `None`

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::aggregate::{aggregate, ObjectPathIndex, PendingExpansion};
use crate::classify::fetch_reference;
use crate::config::{ClientConfig, NestedLoadMode};
use crate::error::{FetchError, PathError};
use crate::http::{Fetcher, ReqwestFetcher};
use crate::path::{self, JsonPath};

/// Everything a load mutates.
#[derive(Debug, Default)]
pub(crate) struct LoadContext {
    /// Merged tree; `None` until the first successful load.
    pub(crate) tree: Option<Value>,
    /// URLs loaded successfully, in completion order.
    pub(crate) loaded_urls: Vec<String>,
    /// Parsed document of every loaded URL, reused for repeated references.
    pub(crate) documents: HashMap<String, Value>,
    /// Where each document of the current root was placed.
    placements: Vec<(JsonPath, String)>,
    /// URLs with a request outstanding.
    pub(crate) in_flight: HashSet<String>,
    /// Top-level member names of root documents.
    pub(crate) keys: Vec<String>,
    pub(crate) object_paths: ObjectPathIndex,
}

impl LoadContext {
    /// Claim `url` for fetching. Returns false if it is loaded or being loaded.
    pub(crate) fn begin(&mut self, url: &str) -> bool {
        if self.is_known(url) {
            return false;
        }
        self.in_flight.insert(url.to_string());
        true
    }

    pub(crate) fn is_known(&self, url: &str) -> bool {
        self.in_flight.contains(url) || self.documents.contains_key(url)
    }

    /// Make `document` the root tree.
    pub(crate) fn install_root(&mut self, url: &str, document: Value) -> Vec<PendingExpansion> {
        self.record(url, &document);

        if let Value::Object(members) = &document {
            for key in members.keys() {
                if !self.keys.contains(key) {
                    self.keys.push(key.clone());
                }
            }
        }

        if self.tree.is_some() {
            // Drop leaves of the replaced root that are not leaves of the new one.
            self.object_paths.retain(|leaf| {
                JsonPath::parse(leaf).is_ok_and(|location| is_leaf(&document, &location))
            });
        }

        self.placements = vec![(JsonPath::root(), url.to_string())];
        self.tree = Some(document);
        self.refresh()
    }

    /// Replace the placeholder URL at `location` with `document`.
    ///
    /// Returns `None` when the location no longer holds the placeholder; the
    /// document is still kept for later references to `url`.
    pub(crate) fn splice(
        &mut self,
        url: &str,
        location: &JsonPath,
        document: Value,
    ) -> Result<Option<Vec<PendingExpansion>>, PathError> {
        self.record(url, &document);
        if self.place(url, location, document)? {
            Ok(Some(self.refresh()))
        } else {
            Ok(None)
        }
    }

    /// Splice already loaded documents into `pending` and return the
    /// expansions that still need a fetch, one per URL, claimed as in flight.
    ///
    /// References to a URL that is in flight are skipped; the pass that runs
    /// once that document arrives reports them again.
    pub(crate) fn reuse_loaded(
        &mut self,
        pending: Vec<PendingExpansion>,
    ) -> Vec<PendingExpansion> {
        let mut queue: VecDeque<PendingExpansion> = pending.into();
        let mut to_fetch: Vec<PendingExpansion> = Vec::new();

        while let Some(expansion) = queue.pop_front() {
            if self.encloses(&expansion.url, &expansion.location) {
                continue;
            }

            if let Some(document) = self.documents.get(&expansion.url).cloned() {
                match self.place(&expansion.url, &expansion.location, document) {
                    Ok(true) => {
                        tracing::debug!(
                            url = %expansion.url,
                            path = %expansion.location,
                            "Reused loaded document"
                        );
                        queue.extend(self.refresh());
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!(
                        url = %expansion.url,
                        error = %e,
                        "Could not reuse loaded document"
                    ),
                }
                continue;
            }

            if self.in_flight.contains(&expansion.url) {
                continue;
            }
            self.in_flight.insert(expansion.url.clone());
            to_fetch.push(expansion);
        }

        to_fetch
    }

    pub(crate) fn refresh(&mut self) -> Vec<PendingExpansion> {
        match &self.tree {
            Some(tree) => aggregate(tree, &mut self.object_paths),
            None => Vec::new(),
        }
    }

    fn record(&mut self, url: &str, document: &Value) {
        if self.documents.contains_key(url) {
            return;
        }
        self.documents.insert(url.to_string(), document.clone());
        self.loaded_urls.push(url.to_string());
    }

    /// Write `document` over the placeholder for `url` at `location`.
    fn place(
        &mut self,
        url: &str,
        location: &JsonPath,
        document: Value,
    ) -> Result<bool, PathError> {
        let tree = self.tree.as_mut().ok_or_else(|| PathError::NotFound {
            path: location.to_string(),
        })?;

        let holds_placeholder =
            matches!(location.resolve(tree), Some(Value::String(current)) if current == url);
        if !holds_placeholder {
            return Ok(false);
        }

        path::write_at(tree, location, document)?;
        self.placements.push((location.clone(), url.to_string()));
        Ok(true)
    }

    /// True if a copy of `url` already encloses `location`.
    fn encloses(&self, url: &str, location: &JsonPath) -> bool {
        self.placements
            .iter()
            .any(|(placed_at, placed)| placed == url && location.starts_with(placed_at))
    }
}

/// True if `location` in `tree` is a terminal leaf that is not a reference.
fn is_leaf(tree: &Value, location: &JsonPath) -> bool {
    match location.resolve(tree) {
        Some(Value::Object(_)) | Some(Value::Array(_)) | None => false,
        Some(value) => fetch_reference(location, value).is_none(),
    }
}

pub(crate) struct StoreInner {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) nested_mode: NestedLoadMode,
    pub(crate) context: Mutex<LoadContext>,
    /// Background nested loads not yet awaited by `settle`.
    pub(crate) detached: Mutex<Vec<JoinHandle<()>>>,
}

/// Configuration tree aggregated from one or more remote JSON documents.
///
/// Cloning is cheap; clones share the same tree.
#[derive(Clone)]
pub struct ConfigurationStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl ConfigurationStore {
    /// Create an empty store that loads nested documents in the background.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_mode(fetcher, NestedLoadMode::default())
    }

    /// Create an empty store with an explicit nested load mode.
    pub fn with_mode(fetcher: Arc<dyn Fetcher>, nested_mode: NestedLoadMode) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                fetcher,
                nested_mode,
                context: Mutex::new(LoadContext::default()),
                detached: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create an empty store backed by reqwest, configured from settings.
    pub fn from_config(config: &ClientConfig) -> Result<Self, FetchError> {
        let fetcher = ReqwestFetcher::new(&config.http)?;
        Ok(Self::with_mode(Arc::new(fetcher), config.loading.nested_mode))
    }

    /// How nested documents are scheduled.
    pub fn nested_mode(&self) -> NestedLoadMode {
        self.inner.nested_mode
    }

    /// True once a root document has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.context.lock().tree.is_some()
    }

    /// Top-level member named `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let context = self.inner.context.lock();
        let tree = context.tree.as_ref()?;
        let value = match tree {
            Value::Object(members) => members.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        };
        value.filter(|value| !value.is_null()).cloned()
    }

    /// Value at `path`; `$.` is prepended when missing.
    pub fn get_path_value(&self, path: &str) -> Option<Value> {
        let context = self.inner.context.lock();
        let tree = context.tree.as_ref()?;
        let normalized = normalize_path(path);
        match path::read(tree, &normalized) {
            Ok(value) if value.is_null() => None,
            Ok(value) => Some(value.clone()),
            Err(e) => {
                tracing::trace!(path = %normalized, error = %e, "Path lookup unresolved");
                None
            }
        }
    }

    /// Top-level member `key` deserialized as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Value at `path` deserialized as `T`.
    pub fn get_path_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get_path_value(path)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Top-level member names, in insertion order.
    pub fn get_keys(&self) -> Vec<String> {
        self.inner.context.lock().keys.clone()
    }

    /// Leaf paths, optionally restricted to those starting with `filter`.
    pub fn get_object_paths(&self, filter: Option<&str>) -> Vec<String> {
        let context = self.inner.context.lock();
        match filter {
            None => context.object_paths.as_slice().to_vec(),
            Some(filter) => context.object_paths.with_prefix(&normalize_path(filter)),
        }
    }

    /// Documents loaded so far, in completion order.
    pub fn get_configuration_urls(&self) -> Vec<String> {
        self.inner.context.lock().loaded_urls.clone()
    }

    /// Copy of the merged tree.
    pub fn snapshot(&self) -> Option<Value> {
        self.inner.context.lock().tree.clone()
    }
}

impl std::fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let context = self.inner.context.lock();
        f.debug_struct("ConfigurationStore")
            .field("nested_mode", &self.inner.nested_mode)
            .field("loaded_urls", &context.loaded_urls)
            .field("object_paths", &context.object_paths.len())
            .finish()
    }
}

/// Prefix `path` with `$.` unless it already starts at the root.
pub(crate) fn normalize_path(path: &str) -> String {
    if path == path::ROOT || path.starts_with("$.") || path.starts_with("$[") {
        path.to_string()
    } else {
        format!("$.{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFetcher;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct ComplexObject {
        prop1: u32,
        prop2: String,
    }

    fn settings() -> Value {
        json!({
            "complexObject": { "prop1": 1, "prop2": "x" },
            "simpleNumber": 42,
            "simpleString": "abc",
            "nothing": null
        })
    }

    async fn loaded_store() -> ConfigurationStore {
        let fetcher = StaticFetcher::new().with_json("settings.json", &settings());
        let store = ConfigurationStore::new(Arc::new(fetcher));
        store.load("settings.json").await.unwrap();
        store
    }

    #[test]
    fn test_empty_store() {
        let store = ConfigurationStore::new(Arc::new(StaticFetcher::new()));
        assert_eq!(store.nested_mode(), NestedLoadMode::Detached);
        assert!(!store.is_loaded());
        assert_eq!(store.get_value("xxx"), None);
        assert_eq!(store.get_path_value("xxx"), None);
        assert!(store.get_keys().is_empty());
        assert!(store.get_object_paths(None).is_empty());
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_get_value_by_key() {
        let store = loaded_store().await;
        assert_eq!(store.get_value("simpleString"), Some(json!("abc")));
        assert_eq!(store.get_value("simpleNumber"), Some(json!(42)));
        assert_eq!(store.get_value("unknown"), None);
        assert_eq!(store.get_value("nothing"), None);
        assert_eq!(
            store.get_as::<ComplexObject>("complexObject"),
            Some(ComplexObject {
                prop1: 1,
                prop2: "x".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_get_value_by_path() {
        let store = loaded_store().await;
        assert_eq!(store.get_path_value("simpleString"), Some(json!("abc")));
        assert_eq!(store.get_path_value("$.simpleNumber"), Some(json!(42)));
        assert_eq!(store.get_path_value("complexObject.prop2"), Some(json!("x")));
        assert_eq!(store.get_path_as::<u32>("complexObject.prop1"), Some(1));
        assert_eq!(store.get_path_value("unknown"), None);
        assert_eq!(store.get_path_value("simpleString.deeper"), None);
        assert_eq!(store.get_path_value("$.nothing"), None);
        assert_eq!(store.get_path_value("bad[path"), None);
        assert_eq!(store.get_path_value("$"), store.snapshot());
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let store = loaded_store().await;
        assert_eq!(
            store.get_keys(),
            vec!["complexObject", "simpleNumber", "simpleString", "nothing"]
        );
    }

    #[tokio::test]
    async fn test_object_paths_filter() {
        let store = loaded_store().await;
        let expected = vec!["$.complexObject.prop1", "$.complexObject.prop2"];
        assert_eq!(store.get_object_paths(Some("complexObject")), expected);
        assert_eq!(store.get_object_paths(Some("$.complexObject")), expected);
        assert!(store.get_object_paths(Some("missing")).is_empty());

        // Prefix match, not a segment match.
        assert_eq!(
            store.get_object_paths(Some("simple")),
            vec!["$.simpleNumber", "$.simpleString"]
        );
    }

    #[tokio::test]
    async fn test_every_path_resolves() {
        let store = loaded_store().await;
        let tree = store.snapshot().unwrap();
        for leaf in store.get_object_paths(None) {
            let expected = path::read(&tree, &leaf).unwrap();
            let expected = if expected.is_null() { None } else { Some(expected.clone()) };
            assert_eq!(store.get_path_value(&leaf), expected, "{leaf}");
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a.b"), "$.a.b");
        assert_eq!(normalize_path("$.a"), "$.a");
        assert_eq!(normalize_path("$[0]"), "$[0]");
        assert_eq!(normalize_path("$"), "$");
        assert_eq!(normalize_path("$a"), "$.$a");
    }

    #[test]
    fn test_context_claims_url_once() {
        let mut context = LoadContext::default();
        assert!(context.begin("a.json"));
        assert!(!context.begin("a.json"));
        context.in_flight.remove("a.json");
        assert!(context.begin("a.json"));
    }

    #[test]
    fn test_splice_requires_placeholder() {
        let mut context = LoadContext::default();
        let pending = context.install_root(
            "root.json",
            json!({ "aFetch": "http://example.com/a.json", "b": 1 }),
        );
        assert_eq!(pending.len(), 1);
        let location = pending[0].location.clone();

        let stale = context
            .splice("http://example.com/other.json", &location, json!({ "x": 1 }))
            .unwrap();
        assert!(stale.is_none());

        let fresh = context
            .splice("http://example.com/a.json", &location, json!({ "x": 1 }))
            .unwrap();
        assert_eq!(fresh, Some(Vec::new()));
        assert_eq!(context.object_paths.as_slice(), ["$.b", "$.aFetch.x"]);
    }

    #[test]
    fn test_reuse_loaded_splices_known_documents() {
        let mut context = LoadContext::default();
        let pending = context.install_root(
            "root.json",
            json!({
                "oneFetch": "http://example.com/a.json",
                "twoFetch": "http://example.com/a.json",
                "otherFetch": "http://example.com/b.json"
            }),
        );

        let to_fetch = context.reuse_loaded(pending);
        let urls: Vec<&str> = to_fetch.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["http://example.com/a.json", "http://example.com/b.json"]);
        assert!(context.in_flight.contains("http://example.com/a.json"));

        context.in_flight.remove("http://example.com/a.json");
        let pending = context
            .splice("http://example.com/a.json", &to_fetch[0].location, json!({ "x": 1 }))
            .unwrap()
            .unwrap();
        assert!(context.reuse_loaded(pending).is_empty());
        assert_eq!(
            context.object_paths.as_slice(),
            ["$.oneFetch.x", "$.twoFetch.x"]
        );
    }

    #[test]
    fn test_is_leaf() {
        let tree = json!({ "a": 1, "o": { "k": true }, "uFetch": "http://example.com/u.json" });
        assert!(is_leaf(&tree, &JsonPath::parse("$.a").unwrap()));
        assert!(!is_leaf(&tree, &JsonPath::parse("$.o").unwrap()));
        assert!(!is_leaf(&tree, &JsonPath::parse("$.uFetch").unwrap()));
        assert!(!is_leaf(&tree, &JsonPath::parse("$.missing").unwrap()));
    }
}
