//! Loading, Resolution and Projection Tests
//!
//! End-to-end checks over the fixtures in `tests/fixtures`.

use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;

use schema_graph::{
    InMemoryDocumentClient, IssueKind, JsonSchemaVersion, LoaderConfig, ReferenceGraph, SchemaCache,
    SchemaError, SchemaLoader, SerializeOptions,
};

fn fixture(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

// =============================================================================
// Reference Cycles
// =============================================================================

#[test]
fn test_anchor_reference_resolves_to_root() {
    let document = fixture(include_str!("fixtures/anchor_cycle.json"));
    let schema = SchemaLoader::default()
        .read_schema_at(&url("http://example.com/anchor.json"), &document)
        .unwrap();

    let self_ref = schema.property("self").unwrap();
    assert!(self_ref.is_ref());
    assert_eq!(self_ref.as_ref_schema().unwrap().reference(), "#a");

    let target = self_ref.resolved().unwrap();
    assert!(target.ptr_eq(&schema));
    assert!(target.property("self").unwrap().resolved().unwrap().ptr_eq(&schema));
}

#[test]
fn test_anchor_cycle_in_anonymous_document() {
    let document = fixture(include_str!("fixtures/anchor_cycle.json"));
    let schema = SchemaLoader::default().read_schema(&document).unwrap();

    assert_eq!(schema.unique_uri().scheme(), "urn");
    let target = schema.property("self").unwrap().resolved().unwrap();
    assert!(target.ptr_eq(&schema));
}

#[test]
fn test_recursive_tree_through_root_reference() {
    let document = fixture(include_str!("fixtures/tree.json"));
    let schema = SchemaLoader::default()
        .read_schema_at(&url("http://example.com/tree.json"), &document)
        .unwrap();

    // `$ref` pre-empts the sibling `definitions`
    assert!(schema.is_ref());
    assert_eq!(schema.to_json(JsonSchemaVersion::Draft7), json!({"$ref": "#/definitions/node"}));

    let node = schema.resolved().unwrap();
    let children = node.property("children").unwrap();
    let items = match children.items().unwrap() {
        schema_graph::keyword::Items::Single(items) => items.clone(),
        other => panic!("Expected single items schema, got {:?}", other),
    };
    assert!(items.resolved().unwrap().ptr_eq(&node));

    let graph = ReferenceGraph::from_schema(&schema);
    assert_eq!(graph.cycles().len(), 1);
    assert!(graph.cycles()[0].contains(&"http://example.com/tree.json#/definitions/node".to_string()));
}

// =============================================================================
// Draft Projection
// =============================================================================

#[test]
fn test_exclusive_minimum_projection() {
    let document = fixture(include_str!("fixtures/exclusive_minimum_draft7.json"));
    let schema = SchemaLoader::default().read_schema(&document).unwrap();
    assert_eq!(schema.version(), JsonSchemaVersion::Draft7);

    let draft4 = schema.to_json(JsonSchemaVersion::Draft4);
    assert_eq!(draft4["minimum"], json!(5));
    assert_eq!(draft4["exclusiveMinimum"], json!(true));
    assert_eq!(draft4["$schema"], json!("http://json-schema.org/draft-04/schema#"));

    let draft7 = schema.to_json(JsonSchemaVersion::Draft7);
    assert_eq!(draft7["exclusiveMinimum"], json!(5));
    assert!(draft7.get("minimum").is_none());
}

#[test]
fn test_boolean_exclusive_flag_reads_as_exclusive_bound() {
    let document = fixture(include_str!("fixtures/exclusive_minimum_draft4.json"));
    let schema = SchemaLoader::default().read_schema(&document).unwrap();
    assert_eq!(schema.version(), JsonSchemaVersion::Draft4);

    let minimum = schema.minimum().unwrap();
    assert!(minimum.inclusive.is_none());
    assert_eq!(minimum.exclusive.as_ref().and_then(|n| n.as_u64()), Some(5));

    assert_eq!(
        schema.to_json(JsonSchemaVersion::Draft7),
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "number",
            "exclusiveMinimum": 5
        })
    );
    assert_eq!(schema.to_json(JsonSchemaVersion::Draft4), document);
}

#[test]
fn test_draft_view_hides_foreign_keywords() {
    let schema = SchemaLoader::default()
        .read_schema(&json!({"const": "x", "contains": {"type": "string"}}))
        .unwrap();

    let draft4 = schema.to_json(JsonSchemaVersion::Draft4);
    assert_eq!(draft4, json!({"enum": ["x"]}));

    let view = schema.draft_view(JsonSchemaVersion::Draft6);
    assert!(view.contains("contains"));
    assert!(view.contains("const"));
}

#[test]
fn test_boolean_additional_keywords_in_draft4() {
    let document = fixture(include_str!("fixtures/closed_object_draft4.json"));

    for loader in [SchemaLoader::default(), SchemaLoader::new(LoaderConfig::strict())] {
        let (schema, report) = loader
            .read_schema_with_report(&url("http://example.com/closed.json"), &document)
            .unwrap();

        assert!(report.is_empty(), "{}", report.summary());
        assert_eq!(schema.version(), JsonSchemaVersion::Draft4);
        assert_eq!(schema.additional_properties().and_then(|s| s.as_boolean()), Some(false));
        assert_eq!(schema.to_json(JsonSchemaVersion::Draft4), document);
    }
}

#[test]
fn test_draft3_union_type_round_trip() {
    let document = fixture(include_str!("fixtures/union_type_draft3.json"));
    let (schema, report) = SchemaLoader::default()
        .read_schema_with_report(&url("http://example.com/union.json"), &document)
        .unwrap();

    assert!(report.is_empty(), "{}", report.summary());
    assert_eq!(schema.version(), JsonSchemaVersion::Draft3);
    assert_eq!(schema.type_schemas().len(), 1);
    assert_eq!(
        schema.type_schemas()[0].location().json_path().to_json_pointer(),
        "/type/1"
    );
    assert_eq!(schema.to_json(JsonSchemaVersion::Draft3), document);
    assert_eq!(schema.to_json(JsonSchemaVersion::Draft4)["type"], json!("string"));
}

// =============================================================================
// Unknown Keywords
// =============================================================================

#[test]
fn test_lenient_mode_preserves_unknown_keyword() {
    let document = fixture(include_str!("fixtures/vendor_extension.json"));
    let (schema, report) = SchemaLoader::default()
        .read_schema_with_report(&url("http://example.com/vendor.json"), &document)
        .unwrap();

    assert!(!report.has_errors());
    assert_eq!(schema.extra_property("x-vendor"), Some(&document["x-vendor"]));
    assert_eq!(schema.to_json(JsonSchemaVersion::Draft7), document);

    let stripped = schema.to_json_with(
        JsonSchemaVersion::Draft7,
        &SerializeOptions {
            include_extra_properties: false,
        },
    );
    assert_eq!(stripped, json!({"type": "string"}));
}

#[test]
fn test_strict_mode_rejects_unknown_keyword() {
    let document = fixture(include_str!("fixtures/vendor_extension.json"));
    let err = SchemaLoader::new(LoaderConfig::strict())
        .read_schema(&document)
        .unwrap_err();

    let report = err.report().expect("loading error carries its report");
    let issue = report.of_kind(IssueKind::KeywordNotFound).next().unwrap();
    assert_eq!(issue.path.to_json_pointer(), "/x-vendor");
    assert!(issue.message.contains("x-vendor"));
}

#[test]
fn test_strict_mode_rejects_keyword_from_other_draft() {
    let err = SchemaLoader::new(LoaderConfig {
        strict: true,
        ..LoaderConfig::for_version(JsonSchemaVersion::Draft4)
    })
    .read_schema(&json!({"type": "string", "const": "x"}))
    .unwrap_err();

    assert!(matches!(err, SchemaError::Loading(_)));
}

#[test]
fn test_type_mismatch_is_warning_when_lenient() {
    let (schema, report) = SchemaLoader::default()
        .read_schema_with_report(&url("http://example.com/bad.json"), &json!({"minLength": "two"}))
        .unwrap();

    assert_eq!(schema.min_length(), None);
    assert_eq!(report.of_kind(IssueKind::TypeMismatch).count(), 1);
    assert!(!report.has_errors());
}

// =============================================================================
// Remote Documents
// =============================================================================

fn person_loader() -> SchemaLoader {
    let client = InMemoryDocumentClient::new().with_document(
        url("http://example.com/address.json"),
        fixture(include_str!("fixtures/address.json")),
    );
    SchemaLoader::default().with_document_client(Arc::new(client))
}

#[test]
fn test_remote_reference_through_document_client() {
    let loader = person_loader();
    let document = fixture(include_str!("fixtures/person.json"));
    let schema = loader.read_schema(&document).unwrap();
    assert_eq!(schema.unique_uri().as_str(), "http://example.com/person.json");

    let address = schema.property("address").unwrap().resolved().unwrap();
    assert_eq!(address.unique_uri().as_str(), "http://example.com/address.json");
    assert!(address.property("street").is_some());

    let city = schema.property("city").unwrap().resolved().unwrap();
    assert_eq!(city.max_length(), Some(64));
    assert!(city.ptr_eq(address.property("city").unwrap()));

    assert!(loader.documents().find_loaded_document(&url("http://example.com/address.json")).is_some());
    assert!(loader.cache().contains(&url("http://example.com/address.json")));
}

#[test]
fn test_missing_remote_document_fails_load() {
    let err = SchemaLoader::default()
        .read_schema(&json!({"properties": {"a": {"$ref": "http://example.com/missing.json"}}}))
        .unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(report.of_kind(IssueKind::DocumentNotFound).count(), 1);
}

#[test]
fn test_load_uri_with_fragment() {
    let loader = person_loader();
    let street = loader
        .load_uri(&url("http://example.com/address.json#/properties/street"))
        .unwrap();
    assert_eq!(street.to_json(JsonSchemaVersion::Draft7), json!({"type": "string"}));
}

#[test]
fn test_directory_document_client() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("types")).unwrap();
    std::fs::write(dir.path().join("types/id.json"), r#"{"type": "integer", "minimum": 1}"#).unwrap();
    std::fs::write(
        dir.path().join("order.json"),
        r#"{"type": "object", "properties": {"id": {"$ref": "types/id.json"}}}"#,
    )
    .unwrap();

    let base = url("http://example.com/schemas/");
    let client = InMemoryDocumentClient::from_directory(dir.path(), &base).unwrap();
    let loader = SchemaLoader::default().with_document_client(Arc::new(client));

    let order = loader.load_uri(&base.join("order.json").unwrap()).unwrap();
    let id = order.property("id").unwrap().resolved().unwrap();
    assert_eq!(id.unique_uri().as_str(), "http://example.com/schemas/types/id.json");
    assert_eq!(id.minimum().unwrap().inclusive.as_ref().and_then(|n| n.as_u64()), Some(1));
}

// =============================================================================
// Hop Limit
// =============================================================================

fn reference_chain(length: usize) -> Value {
    let mut definitions = serde_json::Map::new();
    for i in 0..length {
        definitions.insert(format!("d{}", i), json!({"$ref": format!("#/definitions/d{}", i + 1)}));
    }
    definitions.insert(format!("d{}", length), json!({"type": "string"}));
    json!({"definitions": definitions, "properties": {"start": {"$ref": "#/definitions/d0"}}})
}

#[test]
fn test_hop_limit_is_configurable() {
    let chain = reference_chain(6);

    let err = SchemaLoader::new(LoaderConfig {
        max_ref_hops: 3,
        ..LoaderConfig::default()
    })
    .read_schema(&chain)
    .unwrap_err();
    assert_eq!(err.report().unwrap().of_kind(IssueKind::ReferenceHopLimit).count(), 1);

    let schema = SchemaLoader::default().read_schema(&chain).unwrap();
    let start = schema.property("start").unwrap().resolved().unwrap();
    assert_eq!(start.to_json(JsonSchemaVersion::Draft7), json!({"type": "string"}));
}

// =============================================================================
// Caching
// =============================================================================

#[test]
fn test_cache_idempotence() {
    let document = fixture(include_str!("fixtures/person.json"));
    let first = person_loader().read_schema(&document).unwrap();
    let second = person_loader().read_schema(&document).unwrap();

    assert!(!first.ptr_eq(&second));
    assert_eq!(first, second);
    assert_eq!(first.to_json(JsonSchemaVersion::Draft7), second.to_json(JsonSchemaVersion::Draft7));
}

#[test]
fn test_shared_cache_returns_same_schema() {
    let cache = Arc::new(SchemaCache::new());
    let document = fixture(include_str!("fixtures/anchor_cycle.json"));
    let uri = url("http://example.com/anchor.json");

    let first = SchemaLoader::default()
        .with_cache(cache.clone())
        .read_schema_at(&uri, &document)
        .unwrap();
    let second = SchemaLoader::default()
        .with_cache(cache.clone())
        .read_schema_at(&uri, &document)
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert!(cache.contains(&uri));
}
