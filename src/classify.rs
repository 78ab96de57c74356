//! Classification of terminal values.
//!
//! # Responsibilities
//! - Decide whether a scalar is an absolute URL
//! - Decide whether a terminal node is a reference to another document
//!
//! # Design Decisions
//! - Only absolute URLs with an authority count (scheme + host)
//! - Strings containing whitespace are never URLs, even if `url` would trim them
//! - The naming convention is checked on the member name, never on the value

use serde_json::Value;
use url::Url;

use crate::path::JsonPath;

/// Member-name suffix marking a value as a document to fetch.
pub const FETCH_SUFFIX: &str = "Fetch";

/// Returns true if `candidate` is an absolute URL with a host.
pub fn is_url(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(candidate) {
        Ok(url) => !url.cannot_be_a_base() && url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

/// Returns the URL to fetch if the node at `location` is a document reference.
pub fn fetch_reference<'a>(location: &JsonPath, value: &'a Value) -> Option<&'a str> {
    let name = location.last_key()?;
    if !name.ends_with(FETCH_SUFFIX) {
        return None;
    }
    match value {
        Value::String(candidate) if is_url(candidate) => Some(candidate),
        _ => None,
    }
}
