//! Schema node identity
//!
//! A [`SchemaLocation`] pins a schema node to the document that contains it,
//! the resolution scope in effect at that node, and its [`JsonPath`] from the
//! document root. Declaring an identifier (`$id`/`id`) starts a new scope
//! that every descendant inherits.

use std::fmt;

use url::Url;

use crate::error::Result;
use crate::pointer::JsonPath;

/// Identity of one schema node
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SchemaLocation {
    document_uri: Url,
    resolution_scope: Url,
    /// Path from the document root
    json_path: JsonPath,
    /// Path from the node that established `resolution_scope`
    scope_path: JsonPath,
}

impl SchemaLocation {
    /// Location of the root node of a document
    pub fn document_root(document_uri: Url) -> Self {
        let document_uri = normalize_uri(document_uri);
        Self {
            resolution_scope: document_uri.clone(),
            document_uri,
            json_path: JsonPath::root(),
            scope_path: JsonPath::root(),
        }
    }

    /// Parse an absolute document URI and return its root location
    pub fn parse(document_uri: &str) -> Result<Self> {
        Ok(Self::document_root(Url::parse(document_uri)?))
    }

    pub fn document_uri(&self) -> &Url {
        &self.document_uri
    }

    pub fn resolution_scope(&self) -> &Url {
        &self.resolution_scope
    }

    pub fn json_path(&self) -> &JsonPath {
        &self.json_path
    }

    /// Pointer from the document root in URI fragment form (`#/a/b`)
    pub fn json_pointer_fragment(&self) -> &str {
        self.json_path.to_uri_fragment()
    }

    /// Document URI with the JSON pointer of this node as fragment
    pub fn absolute_pointer_uri(&self) -> Url {
        with_path_fragment(&self.document_uri, &self.json_path)
    }

    /// Canonical URI of this node.
    ///
    /// A node that declared a plain-name identifier (`#anchor`) is known by
    /// that identifier; descendants of such a node fall back to the document
    /// pointer form. Everything else is the resolution scope extended with
    /// the path walked since the scope was established.
    pub fn unique_uri(&self) -> Url {
        match self.resolution_scope.fragment() {
            Some(fragment) if !fragment.is_empty() && !fragment.starts_with('/') => {
                if self.scope_path.is_root() {
                    self.resolution_scope.clone()
                } else {
                    self.absolute_pointer_uri()
                }
            }
            Some(fragment) if fragment.starts_with('/') => {
                match JsonPath::parse_uri_fragment(fragment) {
                    Ok(base) => with_path_fragment(&self.resolution_scope, &base.join(&self.scope_path)),
                    Err(_) => self.absolute_pointer_uri(),
                }
            }
            _ => with_path_fragment(&self.resolution_scope, &self.scope_path),
        }
    }

    /// Descend by one segment; the resolution scope is unchanged
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        Self {
            document_uri: self.document_uri.clone(),
            resolution_scope: self.resolution_scope.clone(),
            json_path: self.json_path.child(segment.clone()),
            scope_path: self.scope_path.child(segment),
        }
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    /// Descend through a keyword and any number of sub-segments
    pub fn child_path(&self, keyword: &str, segments: &[&str]) -> Self {
        segments
            .iter()
            .fold(self.child(keyword), |location, segment| location.child(*segment))
    }

    /// Resolve a reference against the current resolution scope
    pub fn resolve(&self, reference: &str) -> Result<Url> {
        Ok(normalize_uri(self.resolution_scope.join(reference)?))
    }

    /// Start a new resolution scope at this node
    pub fn with_id(&self, id: &str) -> Result<Self> {
        Ok(Self {
            document_uri: self.document_uri.clone(),
            resolution_scope: self.resolve(id)?,
            json_path: self.json_path.clone(),
            scope_path: JsonPath::root(),
        })
    }

    /// Re-home this node as the root of another document
    pub fn with_document_uri(&self, uri: &str) -> Result<Self> {
        Ok(Self::document_root(self.resolve(uri)?))
    }
}

/// Drop an empty fragment so `a.json#` and `a.json` key identically
pub fn normalize_uri(mut uri: Url) -> Url {
    if uri.fragment() == Some("") {
        uri.set_fragment(None);
    }
    uri
}

/// `uri` without any fragment
pub fn strip_fragment(uri: &Url) -> Url {
    let mut base = uri.clone();
    base.set_fragment(None);
    base
}

fn with_path_fragment(base: &Url, path: &JsonPath) -> Url {
    let mut uri = base.clone();
    if path.is_root() {
        uri.set_fragment(None);
    } else {
        let fragment = path.to_uri_fragment();
        uri.set_fragment(Some(&fragment[1..]));
    }
    uri
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unique_uri())
    }
}

impl fmt::Debug for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLocation")
            .field("document", &self.document_uri.as_str())
            .field("scope", &self.resolution_scope.as_str())
            .field("path", &self.json_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> SchemaLocation {
        SchemaLocation::parse("http://example.com/root.json").unwrap()
    }

    #[test]
    fn test_child_unique_uri() {
        let loc = root().child_path("properties", &["a b"]);
        assert_eq!(loc.unique_uri().as_str(), "http://example.com/root.json#/properties/a%20b");
        assert_eq!(loc.json_pointer_fragment(), "#/properties/a%20b");
        assert_eq!(root().unique_uri().as_str(), "http://example.com/root.json");
    }

    #[test]
    fn test_absolute_id_rebases_descendants() {
        let loc = root()
            .child_path("definitions", &["other"])
            .with_id("other.json")
            .unwrap()
            .child_path("properties", &["x"]);
        assert_eq!(loc.unique_uri().as_str(), "http://example.com/other.json#/properties/x");
        assert_eq!(loc.document_uri().as_str(), "http://example.com/root.json");
        assert_eq!(
            loc.absolute_pointer_uri().as_str(),
            "http://example.com/root.json#/definitions/other/properties/x"
        );
    }

    #[test]
    fn test_anchor_id() {
        let anchored = root().child_path("definitions", &["a"]).with_id("#item").unwrap();
        assert_eq!(anchored.unique_uri().as_str(), "http://example.com/root.json#item");

        let below = anchored.child("items");
        assert_eq!(
            below.unique_uri().as_str(),
            "http://example.com/root.json#/definitions/a/items"
        );
        assert_eq!(
            below.resolve("#/definitions").unwrap().as_str(),
            "http://example.com/root.json#/definitions"
        );
    }

    #[test]
    fn test_resolve_relative_reference() {
        let loc = root().with_id("http://example.com/schemas/base.json").unwrap();
        assert_eq!(
            loc.resolve("types.json#/definitions/id").unwrap().as_str(),
            "http://example.com/schemas/types.json#/definitions/id"
        );
        assert_eq!(loc.resolve("#").unwrap().as_str(), "http://example.com/schemas/base.json");
    }

    #[test]
    fn test_with_document_uri() {
        let loc = root().child("items").with_document_uri("nested/doc.json").unwrap();
        assert!(loc.json_path().is_root());
        assert_eq!(loc.document_uri().as_str(), "http://example.com/nested/doc.json");
    }
}
