//! JSON Pointer paths
//!
//! A [`JsonPath`] addresses a node inside a JSON document as a sequence of
//! unescaped segments. Paths are parent-linked, so deriving a child is a
//! single allocation regardless of depth, and the two textual forms
//! (RFC 6901 pointer and URI fragment) are rendered lazily and cached per
//! node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Serialize, Serializer};

use crate::error::{Result, SchemaError};

/// Characters that must be percent-encoded inside a URI fragment
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Immutable path from a document root to a node
#[derive(Clone, Default)]
pub struct JsonPath {
    node: Option<Arc<PathNode>>,
}

struct PathNode {
    parent: JsonPath,
    segment: String,
    depth: usize,
    pointer: OnceCell<String>,
    fragment: OnceCell<String>,
}

impl JsonPath {
    /// The empty path addressing the document root
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an RFC 6901 JSON Pointer (`""`, `/a/b~1c`)
    pub fn parse_json_pointer(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Err(SchemaError::malformed_pointer(input, "must start with '/'"));
        };

        let mut path = Self::root();
        for raw in rest.split('/') {
            if raw.is_empty() {
                return Err(SchemaError::malformed_pointer(input, "blank segment"));
            }
            path = path.child(unescape_segment(input, raw)?);
        }
        Ok(path)
    }

    /// Parse a URI fragment (`#/a/b%20c`); the leading `#` is optional
    pub fn parse_uri_fragment(input: &str) -> Result<Self> {
        let fragment = input.strip_prefix('#').unwrap_or(input);
        let decoded = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|e| SchemaError::malformed_pointer(input, e.to_string()))?;
        Self::parse_json_pointer(&decoded)
    }

    /// Derive a path with one more segment.
    ///
    /// Segments are stored unescaped. Callers must not pass an empty segment;
    /// the loader reports empty property names instead of addressing them.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        debug_assert!(!segment.is_empty(), "JsonPath segments cannot be empty");
        Self {
            node: Some(Arc::new(PathNode {
                parent: self.clone(),
                segment,
                depth: self.len() + 1,
                pointer: OnceCell::new(),
                fragment: OnceCell::new(),
            })),
        }
    }

    /// Derive a path addressing an array element
    pub fn child_index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    /// Extend this path with every segment of `other`
    pub fn join(&self, other: &JsonPath) -> Self {
        other
            .segments()
            .into_iter()
            .fold(self.clone(), |path, segment| path.child(segment))
    }

    pub fn is_root(&self) -> bool {
        self.node.is_none()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.node.as_ref().map_or(0, |n| n.depth)
    }

    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Last segment, `None` at the root
    pub fn last(&self) -> Option<&str> {
        self.node.as_ref().map(|n| n.segment.as_str())
    }

    /// Path without its last segment, `None` at the root
    pub fn parent(&self) -> Option<&JsonPath> {
        self.node.as_ref().map(|n| &n.parent)
    }

    /// Unescaped segments from the root down
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = Vec::with_capacity(self.len());
        let mut current = self;
        while let Some(node) = &current.node {
            segments.push(node.segment.as_str());
            current = &node.parent;
        }
        segments.reverse();
        segments
    }

    /// RFC 6901 form: `""` for the root, otherwise `/seg/seg`
    pub fn to_json_pointer(&self) -> &str {
        match &self.node {
            None => "",
            Some(node) => node.pointer.get_or_init(|| {
                format!(
                    "{}/{}",
                    node.parent.to_json_pointer(),
                    escape_segment(&node.segment)
                )
            }),
        }
    }

    /// URI fragment form: `#` for the root, otherwise `#/seg/seg` with
    /// fragment-unsafe characters percent-encoded
    pub fn to_uri_fragment(&self) -> &str {
        match &self.node {
            None => "#",
            Some(node) => node.fragment.get_or_init(|| {
                let escaped = escape_segment(&node.segment);
                format!(
                    "{}/{}",
                    node.parent.to_uri_fragment(),
                    utf8_percent_encode(&escaped, FRAGMENT)
                )
            }),
        }
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(input: &str, raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(SchemaError::malformed_pointer(
                    input,
                    "'~' must be followed by '0' or '1'",
                ))
            }
        }
    }
    Ok(out)
}

impl PartialEq for JsonPath {
    fn eq(&self, other: &Self) -> bool {
        let (mut a, mut b) = (self, other);
        if a.len() != b.len() {
            return false;
        }
        loop {
            match (&a.node, &b.node) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.segment != y.segment {
                        return false;
                    }
                    a = &x.parent;
                    b = &y.parent;
                }
                _ => return false,
            }
        }
    }
}

impl Eq for JsonPath {}

impl Hash for JsonPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_json_pointer().hash(state);
    }
}

impl FromStr for JsonPath {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_json_pointer(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.to_json_pointer())
        }
    }
}

impl fmt::Debug for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonPath({:?})", self.to_json_pointer())
    }
}

impl Serialize for JsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_json_pointer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_root_forms() {
        let root = JsonPath::root();
        assert!(root.is_root());
        assert_eq!(root.to_json_pointer(), "");
        assert_eq!(root.to_uri_fragment(), "#");
        assert_eq!(JsonPath::parse_json_pointer("").unwrap(), root);
        assert_eq!(JsonPath::parse_uri_fragment("#").unwrap(), root);
    }

    #[test]
    fn test_child_escaping() {
        let path = JsonPath::root()
            .child("properties")
            .child("a/b")
            .child("c~d")
            .child_index(2);
        assert_eq!(path.to_json_pointer(), "/properties/a~1b/c~0d/2");
        assert_eq!(path.segments(), vec!["properties", "a/b", "c~d", "2"]);
        assert_eq!(path.len(), 4);
        assert_eq!(path.last(), Some("2"));
    }

    #[test]
    fn test_fragment_percent_encoding() {
        let path = JsonPath::root().child("definitions").child("my type%");
        assert_eq!(path.to_uri_fragment(), "#/definitions/my%20type%25");
        assert_eq!(JsonPath::parse_uri_fragment(path.to_uri_fragment()).unwrap(), path);
    }

    #[test]
    fn test_malformed_pointers() {
        assert!(matches!(
            JsonPath::parse_json_pointer("properties/a"),
            Err(SchemaError::MalformedPointer { .. })
        ));
        assert!(JsonPath::parse_json_pointer("/a//b").is_err());
        assert!(JsonPath::parse_json_pointer("/a/").is_err());
        assert!(JsonPath::parse_json_pointer("/a~2").is_err());
    }

    #[test]
    fn test_equality_ignores_sharing() {
        let shared = JsonPath::root().child("items");
        let a = shared.child("0");
        let b = JsonPath::parse_json_pointer("/items/0").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, shared.child("1"));
        assert_ne!(shared, a);
    }

    #[test]
    fn test_join_and_parent() {
        let base = JsonPath::root().child("definitions");
        let rel = JsonPath::parse_json_pointer("/node/properties").unwrap();
        let joined = base.join(&rel);
        assert_eq!(joined.to_json_pointer(), "/definitions/node/properties");
        assert_eq!(joined.parent().map(|p| p.to_json_pointer()), Some("/definitions/node"));
    }

    fn path_strategy() -> impl Strategy<Value = JsonPath> {
        prop::collection::vec("[a-z~/% #é]{1,6}", 0..6).prop_map(|segments| {
            segments
                .into_iter()
                .fold(JsonPath::root(), |path, s| path.child(s))
        })
    }

    proptest! {
        /// Pointer rendering and parsing are inverse operations.
        #[test]
        fn pointer_round_trip(path in path_strategy()) {
            let parsed = JsonPath::parse_json_pointer(path.to_json_pointer()).unwrap();
            prop_assert_eq!(parsed, path);
        }

        /// Fragment rendering and parsing are inverse operations.
        #[test]
        fn fragment_round_trip(path in path_strategy()) {
            let parsed = JsonPath::parse_uri_fragment(path.to_uri_fragment()).unwrap();
            prop_assert_eq!(parsed, path);
        }
    }
}
