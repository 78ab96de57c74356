//! Aggregation pass over a configuration tree.
//!
//! # Responsibilities
//! - Walk the tree depth-first in member order
//! - Record the canonical path of every terminal leaf
//! - Collect document references (`*Fetch` members holding a URL) for loading
//!
//! # Design Decisions
//! - The pass never performs I/O; it returns the references it found and the
//!   loader decides whether to await them or run them in the background
//! - Any node with at least one child is a container and is descended into
//! - Empty objects and sequences are neither leaves nor references
//! - The path index is append-only, so re-running the pass after a splice
//!   keeps existing paths in place and appends the new ones

use std::collections::HashSet;

use serde_json::Value;

use crate::classify::fetch_reference;
use crate::path::{child_locations, stringify, JsonPath};

/// Ordered, duplicate-free list of leaf paths.
#[derive(Debug, Clone, Default)]
pub struct ObjectPathIndex {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl ObjectPathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless already present. Returns true if it was added.
    pub fn insert(&mut self, path: String) -> bool {
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.seen.contains(path)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths starting with `prefix`, in index order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.paths
            .iter()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Keep only the paths for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let seen = &mut self.seen;
        self.paths.retain(|path| {
            let kept = keep(path.as_str());
            if !kept {
                seen.remove(path);
            }
            kept
        });
    }
}

/// A document reference found during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExpansion {
    /// Document to fetch.
    pub url: String,
    /// Location currently holding the URL; the fetched document replaces it.
    pub location: JsonPath,
}

/// Run one pass over `tree`, extending `index` with newly discovered leaves.
///
/// Returns the document references to load, in discovery order.
pub fn aggregate(tree: &Value, index: &mut ObjectPathIndex) -> Vec<PendingExpansion> {
    let mut pending = Vec::new();
    let frontier = child_locations(tree, &JsonPath::root());
    walk(tree, &frontier, index, &mut pending);
    pending
}

fn walk(
    tree: &Value,
    frontier: &[JsonPath],
    index: &mut ObjectPathIndex,
    pending: &mut Vec<PendingExpansion>,
) {
    for location in frontier {
        let children = child_locations(tree, location);
        if !children.is_empty() {
            walk(tree, &children, index, pending);
            continue;
        }

        let Some(value) = location.resolve(tree) else {
            continue;
        };
        if value.is_object() || value.is_array() {
            continue;
        }

        if let Some(url) = fetch_reference(location, value) {
            pending.push(PendingExpansion {
                url: url.to_string(),
                location: location.clone(),
            });
        } else {
            index.insert(stringify(location));
        }
    }
}
