//! Reference target lookup
//!
//! Pure functions over raw JSON documents: given an absolute reference URI,
//! find the node it names and the [`SchemaLocation`] that node would have if
//! reached by ordinary traversal. Building the node is the loader's job.

use std::fmt;

use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::draft::{JsonSchemaVersion, VersionSet};
use crate::location::{normalize_uri, strip_fragment, SchemaLocation};
use crate::pointer::JsonPath;

/// Lifecycle of one `$ref`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefState {
    Unresolved,
    ResolvingInDocument,
    ResolvingRemote,
    Resolved,
    Failed,
}

impl RefState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }

    /// Move to `next`, logging the transition
    pub fn advance(&mut self, next: RefState, uri: &Url) {
        trace!(uri = %uri, from = %self, to = %next, "reference state");
        *self = next;
    }
}

impl fmt::Display for RefState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unresolved => "unresolved",
            Self::ResolvingInDocument => "resolving-in-document",
            Self::ResolvingRemote => "resolving-remote",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Identifier keys in use under `active`, newest spelling first
pub fn id_keys(active: VersionSet) -> Vec<&'static str> {
    let mut keys = Vec::with_capacity(2);
    for version in active.iter_newest_first() {
        let key = version.id_key();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    if keys.is_empty() {
        keys.push(JsonSchemaVersion::latest().id_key());
    }
    keys
}

/// Identifier declared by `value`, if any
pub fn declared_id<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v str> {
    let object = value.as_object()?;
    // `$ref` pre-empts every sibling, identifiers included
    if object.contains_key("$ref") {
        return None;
    }
    keys.iter().find_map(|key| object.get(*key).and_then(Value::as_str))
}

/// Location after applying the identifier `value` declares
fn scoped(location: &SchemaLocation, value: &Value, keys: &[&str]) -> SchemaLocation {
    match declared_id(value, keys) {
        Some(id) => location.with_id(id).unwrap_or_else(|_| location.clone()),
        None => location.clone(),
    }
}

/// Walk `path` down from `value`. Identifiers of the nodes passed through
/// rescope the location; the identifier of the final node is left for the
/// loader to apply.
pub fn navigate<'v>(
    start: &SchemaLocation,
    value: &'v Value,
    path: &JsonPath,
    keys: &[&str],
) -> Option<(SchemaLocation, &'v Value)> {
    let mut location = start.clone();
    let mut current = value;

    for segment in path.segments() {
        let next = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        location = scoped(&location, current, keys).child(segment);
        current = next;
    }

    Some((location, current))
}

/// Keys whose values are instance data, never schemas
const DATA_KEYS: [&str; 4] = ["enum", "const", "default", "examples"];

/// Depth-first search for the node whose identifier resolves to `target`.
/// Returns the location before that identifier is applied.
pub fn find_identified<'v>(
    location: &SchemaLocation,
    value: &'v Value,
    target: &Url,
    keys: &[&str],
) -> Option<(SchemaLocation, &'v Value)> {
    match value {
        Value::Object(map) => {
            let inner = scoped(location, value, keys);
            if declared_id(value, keys).is_some() && inner.resolution_scope() == target {
                return Some((location.clone(), value));
            }
            map.iter()
                .filter(|(key, _)| !DATA_KEYS.contains(&key.as_str()))
                .filter(|(_, child)| child.is_object() || child.is_array())
                .find_map(|(key, child)| find_identified(&inner.child(key.as_str()), child, target, keys))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(index, child)| find_identified(&location.child_index(index), child, target, keys)),
        _ => None,
    }
}

/// Find the node `target` names inside `document`, whose root sits at
/// `root` (document URI, nothing applied yet)
pub fn locate<'v>(
    root: &SchemaLocation,
    document: &'v Value,
    target: &Url,
    keys: &[&str],
) -> Option<(SchemaLocation, &'v Value)> {
    let target = normalize_uri(target.clone());
    let base = strip_fragment(&target);
    let pointer = target
        .fragment()
        .filter(|f| f.starts_with('/'))
        .and_then(|f| JsonPath::parse_uri_fragment(f).ok());

    if &base == root.document_uri() {
        return match (target.fragment(), pointer) {
            (None, _) => Some((root.clone(), document)),
            (Some(_), Some(path)) => navigate(root, document, &path, keys),
            (Some(_), None) => find_identified(root, document, &target, keys),
        };
    }

    // Embedded resource declaring an absolute identifier
    if let Some(found) = find_identified(root, document, &target, keys) {
        return Some(found);
    }
    let path = pointer?;
    let (location, value) = find_identified(root, document, &base, keys)?;
    navigate(&location, value, &path, keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> SchemaLocation {
        SchemaLocation::parse("http://example.com/root.json").unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    const KEYS: [&str; 2] = ["$id", "id"];

    #[test]
    fn test_id_keys_follow_active_drafts() {
        assert_eq!(id_keys(VersionSet::all()), vec!["$id", "id"]);
        assert_eq!(id_keys(VersionSet::only(JsonSchemaVersion::Draft4)), vec!["id"]);
        assert_eq!(id_keys(VersionSet::empty()), vec!["$id"]);
    }

    #[test]
    fn test_locate_pointer() {
        let doc = json!({"definitions": {"a": {"type": "string"}}});
        let (location, value) = locate(&root(), &doc, &url("http://example.com/root.json#/definitions/a"), &KEYS).unwrap();
        assert_eq!(value, &json!({"type": "string"}));
        assert_eq!(location.json_pointer_fragment(), "#/definitions/a");
    }

    #[test]
    fn test_locate_whole_document() {
        let doc = json!({"type": "object"});
        let (location, value) = locate(&root(), &doc, &url("http://example.com/root.json#"), &KEYS).unwrap();
        assert!(location.json_path().is_root());
        assert_eq!(value, &doc);
    }

    #[test]
    fn test_locate_anchor() {
        let doc = json!({"definitions": {"a": {"$id": "#item", "type": "integer"}}});
        let (location, value) = locate(&root(), &doc, &url("http://example.com/root.json#item"), &KEYS).unwrap();
        assert_eq!(value["type"], json!("integer"));
        assert_eq!(location.json_pointer_fragment(), "#/definitions/a");
    }

    #[test]
    fn test_locate_embedded_document() {
        let doc = json!({
            "definitions": {
                "other": {
                    "$id": "http://example.com/other.json",
                    "definitions": {"x": {"type": "null"}}
                }
            }
        });
        let (location, value) =
            locate(&root(), &doc, &url("http://example.com/other.json#/definitions/x"), &KEYS).unwrap();
        assert_eq!(value, &json!({"type": "null"}));
        assert_eq!(location.unique_uri().as_str(), "http://example.com/other.json#/definitions/x");
        assert_eq!(location.document_uri().as_str(), "http://example.com/root.json");
    }

    #[test]
    fn test_navigate_rescopes_through_ids() {
        let doc = json!({"properties": {"a": {"$id": "nested/", "items": {"$id": "leaf.json"}}}});
        let path = JsonPath::parse_json_pointer("/properties/a/items").unwrap();
        let (location, _) = navigate(&root(), &doc, &path, &KEYS).unwrap();
        assert_eq!(location.resolution_scope().as_str(), "http://example.com/nested/");
        assert_eq!(
            location.with_id("leaf.json").unwrap().unique_uri().as_str(),
            "http://example.com/nested/leaf.json"
        );
    }

    #[test]
    fn test_data_keys_are_not_searched() {
        let doc = json!({"enum": [{"$id": "#hidden"}]});
        assert!(locate(&root(), &doc, &url("http://example.com/root.json#hidden"), &KEYS).is_none());
    }

    #[test]
    fn test_missing_target() {
        let doc = json!({"definitions": {}});
        assert!(locate(&root(), &doc, &url("http://example.com/root.json#/definitions/b"), &KEYS).is_none());
        assert!(locate(&root(), &doc, &url("http://example.com/elsewhere.json"), &KEYS).is_none());
    }

    #[test]
    fn test_state_transitions() {
        let uri = url("http://example.com/root.json");
        let mut state = RefState::Unresolved;
        state.advance(RefState::ResolvingInDocument, &uri);
        assert!(!state.is_terminal());
        state.advance(RefState::Resolved, &uri);
        assert!(state.is_terminal());
    }
}
