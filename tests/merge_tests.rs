//! Merge Engine Tests
//!
//! Merges loaded fixtures and checks both the resulting schema and the
//! itemized report.

use serde_json::{json, Value};
use url::Url;

use schema_graph::{merge, merge_schemas, JsonPath, JsonSchemaVersion, MergeActionType, Schema, SchemaLoader};

fn load(uri: &str, text: &str) -> Schema {
    let document: Value = serde_json::from_str(text).unwrap();
    SchemaLoader::default()
        .read_schema_at(&Url::parse(uri).unwrap(), &document)
        .unwrap()
}

fn load_value(document: Value) -> Schema {
    SchemaLoader::default().read_schema(&document).unwrap()
}

fn pointer(s: &str) -> JsonPath {
    JsonPath::parse_json_pointer(s).unwrap()
}

fn actions_at(report: &schema_graph::MergeReport, path: &str) -> Vec<MergeActionType> {
    let path = pointer(path);
    report.at(&path).map(|a| a.action).collect()
}

#[test]
fn test_merge_fixtures() {
    let base = load("http://example.com/base.json", include_str!("fixtures/merge_base.json"));
    let over = load("http://example.com/override.json", include_str!("fixtures/merge_override.json"));

    let (merged, report) = merge_schemas(&base, &over);

    assert_eq!(actions_at(&report, "/properties/b"), vec![MergeActionType::Add]);
    assert_eq!(actions_at(&report, "/properties/a/minLength"), vec![MergeActionType::Conflict]);
    assert_eq!(actions_at(&report, "/properties"), vec![MergeActionType::Merge]);
    assert_eq!(actions_at(&report, "/required"), vec![MergeActionType::Conflict]);
    assert!(report.is_conflict());
    assert!(report.is_merge());
    assert!(!report.has_errors());

    let a = merged.property("a").unwrap();
    assert_eq!(a.min_length(), Some(3));
    assert_eq!(a.to_json(JsonSchemaVersion::Draft7), json!({"type": "string", "minLength": 3}));
    assert!(merged.property("b").is_some());
    assert_eq!(merged.required().unwrap().len(), 2);

    // Identifiers never take part; the result gets an identity of its own
    assert!(merged.id().is_none());
    assert_eq!(merged.unique_uri().scheme(), "urn");
    assert!(merged.to_json(JsonSchemaVersion::Draft7).get("$id").is_none());
}

#[test]
fn test_merge_conflict_on_min_length() {
    let base = load_value(json!({"type": "string", "minLength": 1}));
    let over = load_value(json!({"minLength": 3}));

    let (merged, report) = merge_schemas(&base, &over);

    assert_eq!(merged.min_length(), Some(3));
    assert_eq!(report.len(), 1);
    let action = &report.actions()[0];
    assert_eq!(action.action, MergeActionType::Conflict);
    assert_eq!(action.path.to_json_pointer(), "/minLength");
    assert_eq!(report.to_string(), "CONFLICT /minLength: 1 replaced by 3\n");
}

#[test]
fn test_merge_adds_property() {
    let base = load_value(json!({"properties": {"a": {"type": "string"}}}));
    let over = load_value(json!({"properties": {"b": {"type": "integer"}}}));

    let (merged, report) = merge_schemas(&base, &over);

    assert_eq!(actions_at(&report, "/properties/b"), vec![MergeActionType::Add]);
    assert!(!report.is_conflict());
    assert_eq!(
        merged.to_json(JsonSchemaVersion::Draft7),
        json!({"properties": {"a": {"type": "string"}, "b": {"type": "integer"}}})
    );
}

#[test]
fn test_equal_values_merge_cleanly() {
    let base = load_value(json!({"type": "string", "maxLength": 10}));
    let over = load_value(json!({"type": "string", "maxLength": 10, "title": "Name"}));

    let (merged, report) = merge_schemas(&base, &over);

    assert!(!report.is_conflict());
    assert_eq!(actions_at(&report, "/title"), vec![MergeActionType::Add]);
    assert_eq!(actions_at(&report, "/maxLength"), vec![MergeActionType::Merge]);
    assert_eq!(merged.title(), Some("Name"));
}

#[test]
fn test_reference_base_yields_override() {
    let base = load_value(json!({
        "definitions": {"name": {"type": "string"}},
        "properties": {"a": {"$ref": "#/definitions/name"}}
    }));
    let over = load_value(json!({"properties": {"a": {"type": "integer"}}}));

    let (merged, report) = merge_schemas(&base, &over);

    let a = merged.property("a").unwrap();
    assert!(!a.is_ref());
    assert_eq!(a.to_json(JsonSchemaVersion::Draft7), json!({"type": "integer"}));
    assert!(!report.has_errors());
}

#[test]
fn test_missing_override_returns_base() {
    let base = load_value(json!({"type": "boolean"}));
    let mut report = schema_graph::MergeReport::new();

    let merged = merge(&JsonPath::root(), &base, None, &mut report);

    assert!(merged.ptr_eq(&base));
    assert!(report.is_empty());
}

#[test]
fn test_incompatible_items_record_error() {
    let base = load_value(json!({"items": {"type": "string"}}));
    let over = load_value(json!({"items": [{"type": "string"}, {"type": "integer"}]}));

    let (merged, report) = merge_schemas(&base, &over);

    assert!(report.has_errors());
    assert_eq!(actions_at(&report, "/items"), vec![MergeActionType::Error]);
    assert_eq!(merged.to_json(JsonSchemaVersion::Draft7), json!({"items": {"type": "string"}}));
}

#[test]
fn test_merge_nested_at_offset_path() {
    let base = load_value(json!({"minItems": 1}));
    let over = load_value(json!({"minItems": 2}));
    let mut report = schema_graph::MergeReport::new();

    merge(&pointer("/properties/list"), &base, Some(&over), &mut report);

    assert_eq!(actions_at(&report, "/properties/list/minItems"), vec![MergeActionType::Conflict]);
}
