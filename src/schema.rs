//! Schema model
//!
//! [`Schema`] is an immutable, cheaply clonable handle to one node of a
//! schema graph. Nodes are produced by a [`SchemaBuilder`] (during loading
//! or merging) and never change afterwards; re-identifying or re-basing a
//! node yields a new handle.
//!
//! `$ref` nodes hold their target through [`RefSchema`]. A reference back to
//! a node that was still being built when the reference was read holds a
//! weak handle, filled in once that node is finished, so cyclic schemas do
//! not leak and do not recurse forever.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use url::Url;

use crate::draft::{JsonSchemaVersion, JsonType};
use crate::error::Result;
use crate::keyword::project::{self, DraftView, SerializeOptions};
use crate::keyword::{Dependency, Items, Keyword, KeywordKind, Limit};
use crate::location::SchemaLocation;

/// Longest ref-to-ref chain followed when flattening a target
const MAX_FLATTEN_DEPTH: usize = 64;

// =============================================================================
// Schema
// =============================================================================

/// Immutable schema node
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    location: SchemaLocation,
    version: JsonSchemaVersion,
    body: SchemaBody,
}

/// Content of a schema node
pub enum SchemaBody {
    Object {
        keywords: BTreeMap<KeywordKind, Keyword>,
        /// Non-keyword properties, kept verbatim
        extra: Map<String, Value>,
    },
    /// Draft 6+ `true` / `false` schema
    Boolean(bool),
    Ref(RefSchema),
}

/// Non-owning handle to a schema node
#[derive(Clone, Default)]
pub struct WeakSchema(Weak<SchemaInner>);

impl WeakSchema {
    pub fn upgrade(&self) -> Option<Schema> {
        self.0.upgrade().map(|inner| Schema { inner })
    }
}

impl fmt::Debug for WeakSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(schema) => write!(f, "WeakSchema({})", schema.unique_uri()),
            None => write!(f, "WeakSchema(<dropped>)"),
        }
    }
}

impl Schema {
    fn from_parts(location: SchemaLocation, version: JsonSchemaVersion, body: SchemaBody) -> Self {
        Self {
            inner: Arc::new(SchemaInner {
                location,
                version,
                body,
            }),
        }
    }

    /// `true` / `false` schema
    pub fn boolean(location: SchemaLocation, version: JsonSchemaVersion, value: bool) -> Self {
        Self::from_parts(location, version, SchemaBody::Boolean(value))
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.inner.location
    }

    /// Draft this node was loaded as
    pub fn version(&self) -> JsonSchemaVersion {
        self.inner.version
    }

    pub fn unique_uri(&self) -> Url {
        self.inner.location.unique_uri()
    }

    pub fn body(&self) -> &SchemaBody {
        &self.inner.body
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.inner.body, SchemaBody::Ref(_))
    }

    pub fn as_ref_schema(&self) -> Option<&RefSchema> {
        match &self.inner.body {
            SchemaBody::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.inner.body {
            SchemaBody::Boolean(value) => Some(value),
            _ => None,
        }
    }

    fn keyword_map(&self) -> Option<&BTreeMap<KeywordKind, Keyword>> {
        match &self.inner.body {
            SchemaBody::Object { keywords, .. } => Some(keywords),
            _ => None,
        }
    }

    /// Keywords in canonical order; empty for boolean and `$ref` nodes
    pub fn keywords(&self) -> impl Iterator<Item = (KeywordKind, &Keyword)> {
        self.keyword_map()
            .into_iter()
            .flat_map(|map| map.iter().map(|(kind, keyword)| (*kind, keyword)))
    }

    pub fn keyword(&self, kind: KeywordKind) -> Option<&Keyword> {
        self.keyword_map().and_then(|map| map.get(&kind))
    }

    pub fn has_keyword(&self, kind: KeywordKind) -> bool {
        self.keyword(kind).is_some()
    }

    pub fn extra_properties(&self) -> Option<&Map<String, Value>> {
        match &self.inner.body {
            SchemaBody::Object { extra, .. } => Some(extra),
            _ => None,
        }
    }

    pub fn extra_property(&self, key: &str) -> Option<&Value> {
        self.extra_properties().and_then(|extra| extra.get(key))
    }

    /// Follow a `$ref` node to its target; other nodes resolve to themselves.
    /// `None` when the target is gone (its graph root was dropped).
    pub fn resolved(&self) -> Option<Schema> {
        match &self.inner.body {
            SchemaBody::Ref(reference) => reference.target(),
            _ => Some(self.clone()),
        }
    }

    /// Same node, not merely equal content
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakSchema {
        WeakSchema(Arc::downgrade(&self.inner))
    }

    /// Copy of this node declaring `id` and scoped under it
    pub fn with_id(&self, id: &str) -> Result<Schema> {
        let location = self.inner.location.with_id(id)?;
        let mut builder = SchemaBuilder::from_schema(self);
        builder.set_location(location);
        if !self.is_ref() {
            builder.put(KeywordKind::Id, Keyword::Uri(id.to_string()));
        }
        Ok(builder.build())
    }

    /// Copy of this node as the root of document `uri`. Children keep their
    /// own locations.
    pub fn with_document_uri(&self, uri: &str) -> Result<Schema> {
        let location = self.inner.location.with_document_uri(uri)?;
        let mut builder = SchemaBuilder::from_schema(self);
        builder.set_location(location);
        Ok(builder.build())
    }

    /// Render for `version`, extra properties included
    pub fn to_json(&self, version: JsonSchemaVersion) -> Value {
        project::to_json(self, version, &SerializeOptions::default())
    }

    pub fn to_json_with(&self, version: JsonSchemaVersion, options: &SerializeOptions) -> Value {
        project::to_json(self, version, options)
    }

    /// Keyword lookup by the JSON keys of one draft
    pub fn draft_view(&self, version: JsonSchemaVersion) -> DraftView<'_> {
        DraftView::new(self, version)
    }

    // === Typed getters ===

    pub fn id(&self) -> Option<&str> {
        self.keyword(KeywordKind::Id).and_then(Keyword::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.keyword(KeywordKind::Title).and_then(Keyword::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.keyword(KeywordKind::Description).and_then(Keyword::as_str)
    }

    pub fn format(&self) -> Option<&str> {
        self.keyword(KeywordKind::Format).and_then(Keyword::as_str)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.keyword(KeywordKind::Pattern).and_then(Keyword::as_str)
    }

    pub fn types(&self) -> Option<&BTreeSet<JsonType>> {
        match self.keyword(KeywordKind::Type) {
            Some(Keyword::Types(types)) | Some(Keyword::Union { types, .. }) => Some(types),
            _ => None,
        }
    }

    /// Schemas listed alongside type names in a draft 3 `type`
    pub fn type_schemas(&self) -> &[Schema] {
        match self.keyword(KeywordKind::Type) {
            Some(Keyword::Union { schemas, .. }) => schemas,
            _ => &[],
        }
    }

    pub fn properties(&self) -> Option<&BTreeMap<String, Schema>> {
        self.keyword(KeywordKind::Properties).and_then(Keyword::as_schema_map)
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties().and_then(|props| props.get(name))
    }

    pub fn pattern_properties(&self) -> Option<&BTreeMap<String, Schema>> {
        self.keyword(KeywordKind::PatternProperties)
            .and_then(Keyword::as_schema_map)
    }

    pub fn additional_properties(&self) -> Option<&Schema> {
        self.keyword(KeywordKind::AdditionalProperties)
            .and_then(Keyword::as_schema)
    }

    pub fn definitions(&self) -> Option<&BTreeMap<String, Schema>> {
        self.keyword(KeywordKind::Definitions).and_then(Keyword::as_schema_map)
    }

    pub fn definition(&self, name: &str) -> Option<&Schema> {
        self.definitions().and_then(|defs| defs.get(name))
    }

    pub fn required(&self) -> Option<&BTreeSet<String>> {
        match self.keyword(KeywordKind::Required) {
            Some(Keyword::StringSet(names)) => Some(names),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&Items> {
        match self.keyword(KeywordKind::Items) {
            Some(Keyword::Items(items)) => Some(items),
            _ => None,
        }
    }

    pub fn dependencies(&self) -> Option<&BTreeMap<String, Dependency>> {
        match self.keyword(KeywordKind::Dependencies) {
            Some(Keyword::Dependencies(deps)) => Some(deps),
            _ => None,
        }
    }

    pub fn all_of(&self) -> Option<&[Schema]> {
        self.keyword(KeywordKind::AllOf).and_then(Keyword::as_schema_list)
    }

    pub fn any_of(&self) -> Option<&[Schema]> {
        self.keyword(KeywordKind::AnyOf).and_then(Keyword::as_schema_list)
    }

    pub fn one_of(&self) -> Option<&[Schema]> {
        self.keyword(KeywordKind::OneOf).and_then(Keyword::as_schema_list)
    }

    pub fn not(&self) -> Option<&Schema> {
        self.keyword(KeywordKind::Not).and_then(Keyword::as_schema)
    }

    pub fn min_length(&self) -> Option<u64> {
        self.keyword(KeywordKind::MinLength).and_then(Keyword::as_u64)
    }

    pub fn max_length(&self) -> Option<u64> {
        self.keyword(KeywordKind::MaxLength).and_then(Keyword::as_u64)
    }

    pub fn min_items(&self) -> Option<u64> {
        self.keyword(KeywordKind::MinItems).and_then(Keyword::as_u64)
    }

    pub fn max_items(&self) -> Option<u64> {
        self.keyword(KeywordKind::MaxItems).and_then(Keyword::as_u64)
    }

    pub fn minimum(&self) -> Option<&Limit> {
        self.keyword(KeywordKind::Minimum).and_then(Keyword::as_limit)
    }

    pub fn maximum(&self) -> Option<&Limit> {
        self.keyword(KeywordKind::Maximum).and_then(Keyword::as_limit)
    }

    pub fn enum_values(&self) -> Option<&[Value]> {
        match self.keyword(KeywordKind::Enum) {
            Some(Keyword::JsonList(values)) => Some(values),
            _ => None,
        }
    }

    pub fn const_value(&self) -> Option<&Value> {
        match self.keyword(KeywordKind::Const) {
            Some(Keyword::Json(value)) => Some(value),
            _ => None,
        }
    }
}

/// Content equality: keywords, extra properties, boolean value or reference
/// URI. Locations and draft are not compared.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&self.inner.body, &other.inner.body) {
            (
                SchemaBody::Object { keywords, extra },
                SchemaBody::Object {
                    keywords: other_keywords,
                    extra: other_extra,
                },
            ) => keywords == other_keywords && extra == other_extra,
            (SchemaBody::Boolean(a), SchemaBody::Boolean(b)) => a == b,
            (SchemaBody::Ref(a), SchemaBody::Ref(b)) => a.ref_uri == b.ref_uri,
            _ => false,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.body {
            SchemaBody::Object { keywords, extra } => {
                let mut s = f.debug_struct("Schema");
                s.field("uri", &self.unique_uri().as_str());
                s.field("version", &self.inner.version);
                s.field("keywords", keywords);
                if !extra.is_empty() {
                    s.field("extra", extra);
                }
                s.finish()
            }
            SchemaBody::Boolean(value) => write!(f, "Schema({})", value),
            SchemaBody::Ref(reference) => write!(f, "Schema($ref {})", reference.ref_uri),
        }
    }
}

// =============================================================================
// References
// =============================================================================

/// `$ref` node payload
#[derive(Clone)]
pub struct RefSchema {
    /// `$ref` value as written
    reference: String,
    /// `reference` resolved against the node's scope
    ref_uri: Url,
    target: RefTarget,
}

#[derive(Clone)]
enum RefTarget {
    Resolved(Schema),
    /// Node that was still being built when the reference was read
    Pending(Arc<OnceCell<WeakSchema>>),
    Deferred(Arc<DeferredTarget>),
}

type Resolver = Box<dyn Fn() -> Option<Schema> + Send + Sync>;

struct DeferredTarget {
    resolver: Resolver,
    memo: OnceCell<Option<Schema>>,
}

impl RefSchema {
    pub fn resolved(reference: impl Into<String>, ref_uri: Url, target: Schema) -> Self {
        Self {
            reference: reference.into(),
            ref_uri,
            target: RefTarget::Resolved(target),
        }
    }

    /// Target filled in later through `slot`
    pub(crate) fn pending(
        reference: impl Into<String>,
        ref_uri: Url,
        slot: Arc<OnceCell<WeakSchema>>,
    ) -> Self {
        Self {
            reference: reference.into(),
            ref_uri,
            target: RefTarget::Pending(slot),
        }
    }

    /// Target produced on first access by `resolver`, then memoized
    pub fn deferred<F>(reference: impl Into<String>, ref_uri: Url, resolver: F) -> Self
    where
        F: Fn() -> Option<Schema> + Send + Sync + 'static,
    {
        Self {
            reference: reference.into(),
            ref_uri,
            target: RefTarget::Deferred(Arc::new(DeferredTarget {
                resolver: Box::new(resolver),
                memo: OnceCell::new(),
            })),
        }
    }

    /// Same target, reached through another written reference
    pub(crate) fn retarget(&self, reference: impl Into<String>, ref_uri: Url) -> Self {
        Self {
            reference: reference.into(),
            ref_uri,
            target: self.target.clone(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn ref_uri(&self) -> &Url {
        &self.ref_uri
    }

    fn direct_target(&self) -> Option<Schema> {
        match &self.target {
            RefTarget::Resolved(schema) => Some(schema.clone()),
            RefTarget::Pending(slot) => slot.get().and_then(WeakSchema::upgrade),
            RefTarget::Deferred(deferred) => deferred
                .memo
                .get_or_init(|| (deferred.resolver)())
                .clone(),
        }
    }

    /// Target schema, following ref-to-ref chains so the result is never
    /// itself a `$ref` node
    pub fn target(&self) -> Option<Schema> {
        let mut current = self.direct_target()?;
        for _ in 0..MAX_FLATTEN_DEPTH {
            match current.as_ref_schema() {
                Some(next) => current = next.direct_target()?,
                None => return Some(current),
            }
        }
        None
    }
}

impl fmt::Debug for RefSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSchema")
            .field("reference", &self.reference)
            .field("ref_uri", &self.ref_uri.as_str())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Mutable construction counterpart of [`Schema`]
#[derive(Debug)]
pub struct SchemaBuilder {
    location: SchemaLocation,
    version: JsonSchemaVersion,
    keywords: BTreeMap<KeywordKind, Keyword>,
    extra: Map<String, Value>,
    reference: Option<RefSchema>,
    boolean: Option<bool>,
}

impl SchemaBuilder {
    pub fn new(location: SchemaLocation, version: JsonSchemaVersion) -> Self {
        Self {
            location,
            version,
            keywords: BTreeMap::new(),
            extra: Map::new(),
            reference: None,
            boolean: None,
        }
    }

    /// Builder pre-filled with the content of `schema`
    pub fn from_schema(schema: &Schema) -> Self {
        let mut builder = Self::new(schema.location().clone(), schema.version());
        match schema.body() {
            SchemaBody::Object { keywords, extra } => {
                builder.keywords = keywords.clone();
                builder.extra = extra.clone();
            }
            SchemaBody::Boolean(value) => builder.boolean = Some(*value),
            SchemaBody::Ref(reference) => builder.reference = Some(reference.clone()),
        }
        builder
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.location
    }

    pub fn set_location(&mut self, location: SchemaLocation) {
        self.location = location;
    }

    pub fn version(&self) -> JsonSchemaVersion {
        self.version
    }

    pub fn keyword(&self, kind: KeywordKind) -> Option<&Keyword> {
        self.keywords.get(&kind)
    }

    pub fn put(&mut self, kind: KeywordKind, keyword: Keyword) -> Option<Keyword> {
        // Adding a keyword turns a `true` schema into an object schema
        if self.boolean == Some(true) {
            self.boolean = None;
        }
        self.keywords.insert(kind, keyword)
    }

    pub fn remove(&mut self, kind: KeywordKind) -> Option<Keyword> {
        self.keywords.remove(&kind)
    }

    pub fn put_extra(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Make this node a reference; other content is discarded at build
    pub fn set_ref(&mut self, reference: RefSchema) {
        self.reference = Some(reference);
    }

    pub fn is_ref(&self) -> bool {
        self.reference.is_some()
    }

    pub fn build(self) -> Schema {
        let body = match (self.reference, self.boolean) {
            (Some(reference), _) => SchemaBody::Ref(reference),
            (None, Some(value)) if self.keywords.is_empty() && self.extra.is_empty() => {
                SchemaBody::Boolean(value)
            }
            _ => SchemaBody::Object {
                keywords: self.keywords,
                extra: self.extra,
            },
        };
        Schema::from_parts(self.location, self.version, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Number};

    fn location() -> SchemaLocation {
        SchemaLocation::parse("http://example.com/root.json").unwrap()
    }

    fn string_schema(min_length: u64) -> Schema {
        let mut builder = SchemaBuilder::new(location(), JsonSchemaVersion::Draft7);
        builder.put(KeywordKind::MinLength, Keyword::Integer(min_length));
        builder.put_extra("x-note", json!("kept"));
        builder.build()
    }

    #[test]
    fn test_builder_and_getters() {
        let schema = string_schema(2);
        assert_eq!(schema.min_length(), Some(2));
        assert_eq!(schema.extra_property("x-note"), Some(&json!("kept")));
        assert!(!schema.is_ref());
        assert!(schema.resolved().unwrap().ptr_eq(&schema));
    }

    #[test]
    fn test_equality_ignores_location() {
        let a = string_schema(2);
        let b = a.with_document_uri("http://example.com/other.json").unwrap();
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, string_schema(3));
    }

    #[test]
    fn test_with_id_adds_identifier() {
        let schema = string_schema(1).with_id("item.json").unwrap();
        assert_eq!(schema.id(), Some("item.json"));
        assert_eq!(schema.unique_uri().as_str(), "http://example.com/item.json");
    }

    #[test]
    fn test_ref_to_ref_is_flattened() {
        let target = string_schema(4);
        let uri = Url::parse("http://example.com/root.json#/definitions/a").unwrap();
        let mut builder = SchemaBuilder::new(location(), JsonSchemaVersion::Draft7);
        builder.set_ref(RefSchema::resolved("#/definitions/a", uri.clone(), target.clone()));
        let inner = builder.build();

        let outer = RefSchema::resolved("#/definitions/b", uri, inner);
        assert!(outer.target().unwrap().ptr_eq(&target));
    }

    #[test]
    fn test_pending_target_fills_later() {
        let slot = Arc::new(OnceCell::new());
        let uri = Url::parse("http://example.com/root.json").unwrap();
        let reference = RefSchema::pending("#", uri, slot.clone());
        assert!(reference.target().is_none());

        let schema = string_schema(1);
        slot.set(schema.downgrade()).unwrap();
        assert!(reference.target().unwrap().ptr_eq(&schema));

        drop(schema);
        assert!(reference.target().is_none());
    }

    #[test]
    fn test_deferred_target_is_memoized() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let target = string_schema(5);
        let captured = target.clone();
        let reference = RefSchema::deferred(
            "other.json",
            Url::parse("http://example.com/other.json").unwrap(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(captured.clone())
            },
        );

        assert!(reference.target().unwrap().ptr_eq(&target));
        assert!(reference.target().unwrap().ptr_eq(&target));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_boolean_builder() {
        let truthy = Schema::boolean(location(), JsonSchemaVersion::Draft7, true);
        assert_eq!(SchemaBuilder::from_schema(&truthy).build().as_boolean(), Some(true));

        let mut builder = SchemaBuilder::from_schema(&truthy);
        builder.put(KeywordKind::Minimum, Keyword::Limit(Limit::inclusive(Number::from(1))));
        assert_eq!(builder.build().as_boolean(), None);
    }
}
