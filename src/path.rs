//! Path addressing over configuration trees.
//!
//! # Format
//! ```text
//! $                   root
//! $.name              object member
//! $["odd key"]        object member whose name is not an identifier
//! $.list[2]           sequence element
//! ```
//!
//! `JsonPath` is the traversal location token used by the aggregation pass;
//! its `Display` output is the canonical path string stored in the index.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::PathError;

/// Root token of every path string.
pub const ROOT: &str = "$";

/// One step from a node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member name.
    Key(String),
    /// Sequence position.
    Index(usize),
}

/// A location inside a configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// The `$` location.
    pub fn root() -> Self {
        Self::default()
    }

    /// Location of the member `key` below this one.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    /// Location of element `index` below this one.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// True if `ancestor` is this location or encloses it.
    pub fn starts_with(&self, ancestor: &JsonPath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }

    /// Member name of the final segment, if the final segment is a member.
    pub fn last_key(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Key(key)) => Some(key.as_str()),
            _ => None,
        }
    }

    /// Parse a path string such as `$.a["b c"][2]`.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let syntax = |reason: String| PathError::Syntax {
            path: input.to_string(),
            reason,
        };

        let rest = input
            .strip_prefix(ROOT)
            .ok_or_else(|| syntax("path must start with '$'".to_string()))?;
        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    let start = pos + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                        end += 1;
                    }
                    if end == start {
                        return Err(syntax("empty member name".to_string()));
                    }
                    segments.push(Segment::Key(chars[start..end].iter().collect()));
                    pos = end;
                }
                '[' => {
                    let (segment, next) = parse_bracket(&chars, pos + 1).map_err(syntax)?;
                    segments.push(segment);
                    pos = next;
                }
                other => return Err(syntax(format!("unexpected character '{other}'"))),
            }
        }

        Ok(Self { segments })
    }

    /// Resolve this location against `tree`.
    pub fn resolve<'a>(&self, tree: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(tree, |node, segment| match (node, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get(key),
                (Value::Array(items), Segment::Index(index)) => items.get(*index),
                (Value::Array(items), Segment::Key(key)) => {
                    key.parse::<usize>().ok().and_then(|index| items.get(index))
                }
                _ => None,
            })
    }

    /// Resolve this location against `tree` for in-place replacement.
    pub fn resolve_mut<'a>(&self, tree: &'a mut Value) -> Option<&'a mut Value> {
        let mut node = tree;
        for segment in &self.segments {
            node = match segment {
                Segment::Key(key) => match node {
                    Value::Object(map) => map.get_mut(key)?,
                    Value::Array(items) => items.get_mut(key.parse::<usize>().ok()?)?,
                    _ => return None,
                },
                Segment::Index(index) => match node {
                    Value::Array(items) => items.get_mut(*index)?,
                    _ => return None,
                },
            };
        }
        Some(node)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT)?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) if is_identifier(key) => write!(f, ".{key}")?,
                Segment::Key(key) => {
                    let quoted = serde_json::to_string(key).map_err(|_| fmt::Error)?;
                    write!(f, "[{quoted}]")?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Parse the body of a `[...]` segment starting just after the bracket.
/// Returns the segment and the position following the closing bracket.
fn parse_bracket(chars: &[char], start: usize) -> Result<(Segment, usize), String> {
    match chars.get(start) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            let mut raw = String::new();
            let mut pos = start + 1;
            loop {
                match chars.get(pos) {
                    None => return Err("unterminated quoted member name".to_string()),
                    Some('\\') => {
                        let escaped = chars
                            .get(pos + 1)
                            .ok_or_else(|| "dangling escape".to_string())?;
                        raw.push('\\');
                        raw.push(*escaped);
                        pos += 2;
                    }
                    Some(&c) if c == quote => {
                        pos += 1;
                        break;
                    }
                    Some(&c) => {
                        raw.push(c);
                        pos += 1;
                    }
                }
            }
            if chars.get(pos) != Some(&']') {
                return Err("expected ']' after quoted member name".to_string());
            }
            Ok((Segment::Key(unescape(&raw, quote)?), pos + 1))
        }
        _ => {
            let end = chars[start..]
                .iter()
                .position(|c| *c == ']')
                .map(|offset| start + offset)
                .ok_or_else(|| "unterminated index".to_string())?;
            let digits: String = chars[start..end].iter().collect();
            let index = digits
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid index '{digits}'"))?;
            Ok((Segment::Index(index), end + 1))
        }
    }
}

fn unescape(raw: &str, quote: char) -> Result<String, String> {
    if quote == '"' {
        return serde_json::from_str::<String>(&format!("\"{raw}\"")).map_err(|e| e.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Canonical path string of a location.
pub fn stringify(location: &JsonPath) -> String {
    location.to_string()
}

/// Immediate children of the node at `location`, in member order.
///
/// Empty when the node is a scalar, an empty container, or missing.
pub fn child_locations(tree: &Value, location: &JsonPath) -> Vec<JsonPath> {
    match location.resolve(tree) {
        Some(Value::Object(map)) => map.keys().map(|key| location.key(key.clone())).collect(),
        Some(Value::Array(items)) => (0..items.len()).map(|index| location.index(index)).collect(),
        _ => Vec::new(),
    }
}

/// Value at `path` inside `tree`.
pub fn read<'a>(tree: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    let location = JsonPath::parse(path)?;
    location.resolve(tree).ok_or_else(|| PathError::NotFound {
        path: path.to_string(),
    })
}

/// Replace the value at `path` inside `tree`.
pub fn write(tree: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let location = JsonPath::parse(path)?;
    write_at(tree, &location, value)
}

/// Replace the value at an already parsed location.
pub fn write_at(tree: &mut Value, location: &JsonPath, value: Value) -> Result<(), PathError> {
    let slot = location
        .resolve_mut(tree)
        .ok_or_else(|| PathError::NotFound {
            path: location.to_string(),
        })?;
    *slot = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "a": { "b": [ { "c": 1 }, "two", null ] },
            "odd key": true,
            "list": []
        })
    }

    #[test]
    fn test_stringify_forms() {
        let location = JsonPath::root().key("a").key("b").index(2).key("c");
        assert_eq!(stringify(&location), "$.a.b[2].c");

        let odd = JsonPath::root().key("odd key").key("with\"quote");
        assert_eq!(odd.to_string(), r#"$["odd key"]["with\"quote"]"#);

        assert_eq!(JsonPath::root().to_string(), "$");
    }

    #[test]
    fn test_parse_matches_stringify() {
        let location = JsonPath::root().key("odd key").index(3).key("x_1");
        let parsed: JsonPath = location.to_string().parse().unwrap();
        assert_eq!(parsed, location);

        let single = JsonPath::parse("$['it\\'s']").unwrap();
        assert_eq!(single.last_key(), Some("it's"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(JsonPath::parse("a.b"), Err(PathError::Syntax { .. })));
        assert!(matches!(JsonPath::parse("$."), Err(PathError::Syntax { .. })));
        assert!(matches!(JsonPath::parse("$[x]"), Err(PathError::Syntax { .. })));
        assert!(matches!(JsonPath::parse("$[\"open"), Err(PathError::Syntax { .. })));
        assert!(matches!(JsonPath::parse("$a"), Err(PathError::Syntax { .. })));
    }

    #[test]
    fn test_starts_with() {
        let parent = JsonPath::root().key("a");
        let child = parent.key("b").index(0);
        assert!(child.starts_with(&parent));
        assert!(child.starts_with(&child));
        assert!(child.starts_with(&JsonPath::root()));
        assert!(!parent.starts_with(&child));
        assert!(!JsonPath::root().key("ab").starts_with(&parent));
    }

    #[test]
    fn test_child_locations() {
        let tree = sample();

        let top: Vec<String> = child_locations(&tree, &JsonPath::root())
            .iter()
            .map(stringify)
            .collect();
        assert_eq!(top, vec!["$.a", "$[\"odd key\"]", "$.list"]);

        let items: Vec<String> = child_locations(&tree, &JsonPath::parse("$.a.b").unwrap())
            .iter()
            .map(stringify)
            .collect();
        assert_eq!(items, vec!["$.a.b[0]", "$.a.b[1]", "$.a.b[2]"]);

        // Scalars, empty containers and missing nodes have no children.
        assert!(child_locations(&tree, &JsonPath::parse("$.a.b[1]").unwrap()).is_empty());
        assert!(child_locations(&tree, &JsonPath::parse("$.list").unwrap()).is_empty());
        assert!(child_locations(&tree, &JsonPath::parse("$.missing").unwrap()).is_empty());
    }

    #[test]
    fn test_read() {
        let tree = sample();
        assert_eq!(read(&tree, "$.a.b[0].c").unwrap(), &json!(1));
        assert_eq!(read(&tree, "$.a.b.1").unwrap(), &json!("two"));
        assert_eq!(read(&tree, "$[\"odd key\"]").unwrap(), &json!(true));
        assert_eq!(read(&tree, "$").unwrap(), &tree);

        let err = read(&tree, "$.a.x").unwrap_err();
        assert_eq!(err, PathError::NotFound { path: "$.a.x".to_string() });
        assert!(matches!(read(&tree, "$.a.b[0].c.d"), Err(PathError::NotFound { .. })));
    }

    #[test]
    fn test_write_replaces_in_place() {
        let mut tree = sample();
        write(&mut tree, "$.a.b[1]", json!({ "nested": "yes" })).unwrap();
        assert_eq!(read(&tree, "$.a.b[1].nested").unwrap(), &json!("yes"));

        write(&mut tree, "$", json!([1])).unwrap();
        assert_eq!(tree, json!([1]));
    }

    #[test]
    fn test_write_missing_path_fails() {
        let mut tree = sample();
        let before = tree.clone();
        let err = write(&mut tree, "$.a.nope", json!(1)).unwrap_err();
        assert!(matches!(err, PathError::NotFound { .. }));
        assert_eq!(tree, before);
    }
}
