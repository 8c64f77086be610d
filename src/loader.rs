//! Schema loader
//!
//! Digests a whole JSON document into a [`Schema`] graph. Every `$ref` is
//! resolved while loading, so a returned schema never needs further
//! resolution.
//!
//! Each load runs in its own session. A node is registered as in progress
//! (under every URI it answers to) before its keywords are digested; a `$ref`
//! reaching a node that is still in progress gets a slot that is filled with
//! a weak handle once the node is built. Finished nodes go to the shared
//! [`SchemaCache`] only when the whole load succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::SchemaCache;
use crate::checksum::document_urn;
use crate::document::{DocumentClient, InMemoryDocumentClient};
use crate::draft::{JsonSchemaVersion, VersionSet};
use crate::error::{Result, SchemaError};
use crate::keyword::digest::{digest_object, Aborted, DigestContext, DigestResult};
use crate::location::{normalize_uri, strip_fragment, SchemaLocation};
use crate::pointer::JsonPath;
use crate::report::{IssueKind, LoadingReport, Severity};
use crate::resolver::{self, RefState};
use crate::schema::{RefSchema, Schema, SchemaBuilder, WeakSchema};

/// Default cap on chained `$ref` hops
pub const DEFAULT_MAX_REF_HOPS: usize = 10;

// =============================================================================
// Configuration
// =============================================================================

/// Loading policy
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Unknown keywords and malformed values are errors rather than warnings
    pub strict: bool,
    /// Draft assumed for documents without a recognized `$schema`
    pub default_version: JsonSchemaVersion,
    /// Drafts whose keywords are understood when `$schema` is absent
    pub versions: VersionSet,
    pub max_ref_hops: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            default_version: JsonSchemaVersion::latest(),
            versions: VersionSet::all(),
            max_ref_hops: DEFAULT_MAX_REF_HOPS,
        }
    }
}

impl LoaderConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Only `version`'s keywords, whatever `$schema` says
    pub fn for_version(version: JsonSchemaVersion) -> Self {
        Self {
            default_version: version,
            versions: VersionSet::only(version),
            ..Self::default()
        }
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Entry point for turning JSON documents into schemas
#[derive(Clone)]
pub struct SchemaLoader {
    config: LoaderConfig,
    documents: Arc<dyn DocumentClient>,
    cache: Arc<SchemaCache>,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl SchemaLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            documents: Arc::new(InMemoryDocumentClient::new()),
            cache: Arc::new(SchemaCache::new()),
        }
    }

    pub fn with_document_client(mut self, documents: Arc<dyn DocumentClient>) -> Self {
        self.documents = documents;
        self
    }

    /// Share `cache` with other loaders. Loaders sharing a cache should
    /// share their policy as well.
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn documents(&self) -> &Arc<dyn DocumentClient> {
        &self.documents
    }

    /// Load a document that has no URI of its own; it is addressed by the
    /// `urn:sha256:` checksum of its content
    pub fn read_schema(&self, document: &Value) -> Result<Schema> {
        let uri = document_urn(document)?;
        self.read_schema_at(&uri, document)
    }

    pub fn read_schema_str(&self, text: &str) -> Result<Schema> {
        let document: Value = serde_json::from_str(text)?;
        self.read_schema(&document)
    }

    /// Load `document` as the document at `uri`
    pub fn read_schema_at(&self, uri: &Url, document: &Value) -> Result<Schema> {
        self.read_schema_with_report(uri, document)
            .map(|(schema, _)| schema)
    }

    /// Like [`SchemaLoader::read_schema_at`], also returning the warnings
    pub fn read_schema_with_report(&self, uri: &Url, document: &Value) -> Result<(Schema, LoadingReport)> {
        let uri = normalize_uri(strip_fragment(uri));
        if let Some(schema) = self.cache.get(&uri) {
            debug!(uri = %uri, "schema cache hit");
            return Ok((schema, LoadingReport::new()));
        }

        let document = Arc::new(document.clone());
        self.documents.register_loaded_document(&uri, document.clone());

        let mut session = LoadSession::new(self);
        let context = session.open_document(&uri, document.clone());
        if let Some(alias) = session.root_alias(&context) {
            self.documents.register_loaded_document(&alias, document.clone());
        }

        session.documents.push(context);
        let outcome = session.load_node(SchemaLocation::document_root(uri.clone()), &document, 0);
        session.finish(&uri, outcome)
    }

    /// Load the schema at `uri` (fragment allowed) through the document client
    pub fn load_uri(&self, uri: &Url) -> Result<Schema> {
        let uri = normalize_uri(uri.clone());
        if let Some(schema) = self.cache.get(&uri) {
            return Ok(schema);
        }

        let document_uri = strip_fragment(&uri);
        let document = match self.documents.find_loaded_document(&document_uri) {
            Some(document) => document,
            None => self.documents.fetch_document(&document_uri)?,
        };

        let mut session = LoadSession::new(self);
        let context = session.open_document(&document_uri, document.clone());
        let root = SchemaLocation::document_root(document_uri);
        let keys = resolver::id_keys(context.active);
        let Some((location, value)) = resolver::locate(&root, &document, &uri, &keys) else {
            return Err(SchemaError::UnresolvedReference { uri: uri.to_string() });
        };

        session.documents.push(context);
        let outcome = session.load_node(location, value, 0);
        session.finish(&uri, outcome).map(|(schema, _)| schema)
    }
}

impl std::fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Per-document settings derived from `$schema`
struct DocumentContext {
    uri: Url,
    document: Arc<Value>,
    version: JsonSchemaVersion,
    active: VersionSet,
}

type Slot = Arc<OnceCell<WeakSchema>>;

struct LoadSession<'a> {
    loader: &'a SchemaLoader,
    report: LoadingReport,
    /// Documents being digested, innermost last
    documents: Vec<Arc<DocumentContext>>,
    /// Documents opened during this load
    opened: HashMap<Url, Arc<DocumentContext>>,
    /// Nodes whose keywords are being digested, by every URI they answer to
    in_progress: HashMap<Url, Slot>,
    /// References currently being chased
    resolving: HashSet<Url>,
    /// Nodes finished during this load
    built: HashMap<Url, Schema>,
}

impl<'a> LoadSession<'a> {
    fn new(loader: &'a SchemaLoader) -> Self {
        Self {
            loader,
            report: LoadingReport::new(),
            documents: Vec::new(),
            opened: HashMap::new(),
            in_progress: HashMap::new(),
            resolving: HashSet::new(),
            built: HashMap::new(),
        }
    }

    fn config(&self) -> &LoaderConfig {
        &self.loader.config
    }

    fn current(&self) -> Option<&Arc<DocumentContext>> {
        self.documents.last()
    }

    /// Read `$schema` and pick the draft for a newly seen document
    fn open_document(&mut self, uri: &Url, document: Arc<Value>) -> Arc<DocumentContext> {
        if let Some(context) = self.opened.get(uri) {
            return context.clone();
        }

        let config = self.loader.config.clone();
        let (version, active) = match document.get("$schema").and_then(Value::as_str) {
            Some(meta) => match JsonSchemaVersion::from_meta_schema_uri(meta) {
                Some(version) => (version, VersionSet::only(version)),
                None => {
                    self.report.record(
                        Severity::Warning,
                        IssueKind::UnknownMetaSchema,
                        uri.as_str(),
                        &JsonPath::root().child("$schema"),
                        format!("unknown meta-schema '{}', assuming {}", meta, config.default_version),
                    );
                    (config.default_version, config.versions)
                }
            },
            None => (config.default_version, config.versions),
        };

        debug!(uri = %uri, version = %version, "opened document");
        let context = Arc::new(DocumentContext {
            uri: uri.clone(),
            document,
            version,
            active,
        });
        self.opened.insert(uri.clone(), context.clone());
        context
    }

    /// Absolute identifier declared by the document root, if any
    fn root_alias(&self, context: &DocumentContext) -> Option<Url> {
        let keys = resolver::id_keys(context.active);
        let id = resolver::declared_id(&context.document, &keys)?;
        let alias = normalize_uri(strip_fragment(&Url::parse(id).ok()?));
        (alias != context.uri).then_some(alias)
    }

    fn issue(&mut self, severity: Severity, kind: IssueKind, location: &SchemaLocation, message: String) {
        if severity == Severity::Warning {
            warn!(kind = %kind, at = %location, "{}", message);
        }
        self.report.record(
            severity,
            kind,
            location.document_uri().as_str(),
            location.json_path(),
            message,
        );
    }

    /// Record a fatal issue and stop the load
    fn fatal<T>(&mut self, kind: IssueKind, location: &SchemaLocation, message: String) -> DigestResult<T> {
        self.issue(Severity::Error, kind, location, message);
        Err(Aborted)
    }

    fn finish(mut self, uri: &Url, outcome: DigestResult<Option<Schema>>) -> Result<(Schema, LoadingReport)> {
        let schema = match outcome {
            Ok(Some(schema)) if !self.report.has_errors() => schema,
            Ok(None) => {
                let root = SchemaLocation::document_root(uri.clone());
                self.issue(
                    Severity::Error,
                    IssueKind::TypeMismatch,
                    &root,
                    "document is not a schema".to_string(),
                );
                return Err(SchemaError::Loading(self.report));
            }
            _ => return Err(SchemaError::Loading(self.report)),
        };

        for (built_uri, node) in self.built.drain() {
            self.loader.cache.insert(built_uri, node);
        }
        self.loader.cache.insert(uri.clone(), schema.clone());
        debug!(uri = %uri, warnings = self.report.warning_count(), "schema loaded");
        Ok((schema, self.report))
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Build the node for `value` at `location`. `hops` counts the `$ref`
    /// hops taken to get here.
    fn load_node(&mut self, location: SchemaLocation, value: &Value, hops: usize) -> DigestResult<Option<Schema>> {
        let Some(context) = self.current().cloned() else {
            return Ok(None);
        };

        let object = match value {
            Value::Object(object) => object,
            Value::Bool(b) => {
                if context.active.iter_newest_first().any(JsonSchemaVersion::allows_boolean_schemas) {
                    return Ok(Some(Schema::boolean(location, context.version, *b)));
                }
                self.malformed(
                    IssueKind::TypeMismatch,
                    &location,
                    "boolean schemas require draft 6 or later".to_string(),
                );
                return Ok(None);
            }
            other => {
                self.malformed(
                    IssueKind::TypeMismatch,
                    &location,
                    format!("expected a schema, found {}", crate::draft::JsonType::of(other)),
                );
                return Ok(None);
            }
        };

        let pointer_uri = location.absolute_pointer_uri();
        if let Some(existing) = self.built.get(&pointer_uri) {
            return Ok(Some(existing.clone()));
        }

        if let Some(reference) = object.get("$ref") {
            let Some(raw) = reference.as_str() else {
                return self.fatal(
                    IssueKind::MalformedReference,
                    &location.child("$ref"),
                    format!("$ref must be a string, found {}", reference),
                );
            };
            return self.load_reference(location, raw, hops).map(Some);
        }

        let keys = resolver::id_keys(context.active);
        let mut aliases = vec![pointer_uri, location.unique_uri()];
        let location = match resolver::declared_id(value, &keys) {
            Some(id) => match location.with_id(id) {
                Ok(scoped) => {
                    let identified = scoped.unique_uri();
                    if self.in_progress.contains_key(&identified) || self.built.contains_key(&identified) {
                        self.issue(
                            Severity::Warning,
                            IssueKind::InvalidIdentifier,
                            &location,
                            format!("identifier '{}' is already declared", id),
                        );
                    } else {
                        aliases.push(identified);
                    }
                    scoped
                }
                Err(e) => {
                    self.malformed(
                        IssueKind::InvalidIdentifier,
                        &location,
                        format!("identifier '{}' cannot be resolved: {}", id, e),
                    );
                    location
                }
            },
            None => location,
        };

        let slot: Slot = Arc::new(OnceCell::new());
        for alias in &aliases {
            self.in_progress.entry(alias.clone()).or_insert_with(|| slot.clone());
        }

        let mut builder = SchemaBuilder::new(location, context.version);
        let digested = digest_object(self, &mut builder, object);

        for alias in &aliases {
            if self.in_progress.get(alias).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                self.in_progress.remove(alias);
            }
        }
        digested?;

        let schema = builder.build();
        let _ = slot.set(schema.downgrade());
        for alias in aliases {
            self.built.entry(alias).or_insert_with(|| schema.clone());
        }
        Ok(Some(schema))
    }

    /// Build the `$ref` node at `location`
    fn load_reference(&mut self, location: SchemaLocation, raw: &str, hops: usize) -> DigestResult<Schema> {
        let ref_uri = match location.resolve(raw) {
            Ok(uri) => uri,
            Err(e) => {
                return self.fatal(
                    IssueKind::MalformedReference,
                    &location.child("$ref"),
                    format!("'{}' is not a valid URI reference: {}", raw, e),
                );
            }
        };

        let version = self.current().map(|c| c.version).unwrap_or(self.config().default_version);
        let reference = self.resolve_reference(&location, raw, &ref_uri, hops)?;

        let mut builder = SchemaBuilder::new(location, version);
        builder.set_ref(reference);
        Ok(builder.build())
    }

    /// Find or build the target of `ref_uri`
    fn resolve_reference(
        &mut self,
        location: &SchemaLocation,
        raw: &str,
        ref_uri: &Url,
        hops: usize,
    ) -> DigestResult<RefSchema> {
        let mut state = RefState::Unresolved;

        let known = self
            .built
            .get(ref_uri)
            .cloned()
            .or_else(|| self.loader.cache.get(ref_uri));
        if let Some(target) = known {
            state.advance(RefState::Resolved, ref_uri);
            return Ok(flatten(raw, ref_uri, target));
        }
        if let Some(slot) = self.in_progress.get(ref_uri) {
            state.advance(RefState::Resolved, ref_uri);
            return Ok(RefSchema::pending(raw, ref_uri.clone(), slot.clone()));
        }

        let limit = self.config().max_ref_hops;
        if hops >= limit {
            state.advance(RefState::Failed, ref_uri);
            return self.fatal(
                IssueKind::ReferenceHopLimit,
                location,
                format!("more than {} chained references reaching {}", limit, ref_uri),
            );
        }
        if !self.resolving.insert(ref_uri.clone()) {
            state.advance(RefState::Failed, ref_uri);
            return self.fatal(
                IssueKind::ReferenceCycle,
                location,
                format!("reference chain through {} never reaches a schema", ref_uri),
            );
        }

        let result = self.chase(location, ref_uri, hops, &mut state);
        self.resolving.remove(ref_uri);

        let target = result?;
        state.advance(RefState::Resolved, ref_uri);
        self.built.entry(ref_uri.clone()).or_insert_with(|| target.clone());
        Ok(flatten(raw, ref_uri, target))
    }

    /// Locate `ref_uri` in-document, then remotely, and build its node
    fn chase(
        &mut self,
        location: &SchemaLocation,
        ref_uri: &Url,
        hops: usize,
        state: &mut RefState,
    ) -> DigestResult<Schema> {
        state.advance(RefState::ResolvingInDocument, ref_uri);
        let mut candidates: Vec<Arc<DocumentContext>> = Vec::new();
        if let Some(current) = self.current() {
            candidates.push(current.clone());
        }
        if let Some(first) = self.documents.first() {
            if !candidates.iter().any(|c| Arc::ptr_eq(c, first)) {
                candidates.push(first.clone());
            }
        }

        for context in &candidates {
            if let Some(schema) = self.build_target(context.clone(), ref_uri, hops)? {
                return Ok(schema);
            }
        }

        let document_uri = strip_fragment(ref_uri);
        if candidates.iter().any(|c| c.uri == document_uri) {
            state.advance(RefState::Failed, ref_uri);
            return self.fatal(
                IssueKind::UnresolvedReference,
                location,
                format!("{} does not exist", ref_uri),
            );
        }

        state.advance(RefState::ResolvingRemote, ref_uri);
        let known = self.opened.get(&document_uri).map(|c| c.document.clone());
        let document = match known.or_else(|| self.loader.documents.find_loaded_document(&document_uri)) {
            Some(document) => document,
            None => match self.loader.documents.fetch_document(&document_uri) {
                Ok(document) => document,
                Err(e) => {
                    state.advance(RefState::Failed, ref_uri);
                    return self.fatal(IssueKind::DocumentNotFound, location, e.to_string());
                }
            },
        };

        let context = self.open_document(&document_uri, document);
        match self.build_target(context, ref_uri, hops)? {
            Some(schema) => Ok(schema),
            None => {
                state.advance(RefState::Failed, ref_uri);
                self.fatal(
                    IssueKind::UnresolvedReference,
                    location,
                    format!("{} does not exist", ref_uri),
                )
            }
        }
    }

    /// Build the node `ref_uri` names in `context`'s document, if it is there
    fn build_target(
        &mut self,
        context: Arc<DocumentContext>,
        ref_uri: &Url,
        hops: usize,
    ) -> DigestResult<Option<Schema>> {
        let root = SchemaLocation::document_root(context.uri.clone());
        let keys = resolver::id_keys(context.active);
        let document = context.document.clone();
        let Some((location, value)) = resolver::locate(&root, &document, ref_uri, &keys) else {
            return Ok(None);
        };

        self.documents.push(context);
        let node = self.load_node(location, value, hops + 1);
        self.documents.pop();
        node
    }
}

/// Reference to `target`, skipping through it if it is a reference itself
fn flatten(raw: &str, ref_uri: &Url, target: Schema) -> RefSchema {
    match target.as_ref_schema() {
        Some(inner) => inner.retarget(raw, ref_uri.clone()),
        None => RefSchema::resolved(raw, ref_uri.clone(), target),
    }
}

impl DigestContext for LoadSession<'_> {
    fn active_versions(&self) -> VersionSet {
        self.current()
            .map(|c| c.active)
            .unwrap_or(self.loader.config.versions)
    }

    fn is_strict(&self) -> bool {
        self.loader.config.strict
    }

    fn record(&mut self, severity: Severity, kind: IssueKind, location: &SchemaLocation, message: String) {
        self.issue(severity, kind, location, message);
    }

    fn subschema(&mut self, location: SchemaLocation, value: &Value) -> DigestResult<Option<Schema>> {
        self.load_node(location, value, 0)
    }
}
