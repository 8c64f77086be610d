//! Keyword catalog
//!
//! One [`KeywordInfo`] per (JSON key, accepted shape) pair. Entries sharing a
//! key are the variants of one logical keyword; loading picks among them by
//! active draft and by the shape of the value actually found. The catalog is
//! built once and read-only afterwards.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;

use crate::draft::{JsonSchemaVersion, JsonType, VersionSet};

use super::KeywordKind;

use JsonSchemaVersion::{Draft3, Draft4, Draft5, Draft6, Draft7};

/// Digestion strategy for a keyword variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Digester {
    /// One nested schema (object, or boolean where allowed)
    Schema,
    /// Array of schemas; a single object is wrapped
    SchemaList,
    /// Object of named schemas
    SchemaMap,
    /// `items`: one schema or a tuple
    Items,
    /// `dependencies`: schema or property list per key
    Dependencies,
    String,
    /// String compiled as a regular expression
    Pattern,
    /// String resolved as a URI reference
    Uri,
    /// Number strictly greater than zero
    PositiveNumber,
    NonNegativeInteger,
    Boolean,
    /// Array of unique strings
    StringSet,
    /// Type name or array of type names
    Types,
    /// Numeric bound feeding a [`super::Limit`]
    LimitValue,
    /// Draft 3-5 boolean exclusivity flag, absorbed by its numeric sibling
    LimitFlag,
    /// Any JSON value, kept verbatim
    Json,
    /// Array of JSON values
    JsonList,
}

/// Static description of one keyword variant
#[derive(Debug, Clone, Copy)]
pub struct KeywordInfo {
    key: &'static str,
    kind: KeywordKind,
    expects: JsonType,
    versions: VersionSet,
    digester: Digester,
}

impl KeywordInfo {
    fn new(
        key: &'static str,
        kind: KeywordKind,
        expects: JsonType,
        versions: VersionSet,
        digester: Digester,
    ) -> Self {
        Self {
            key,
            kind,
            expects,
            versions,
            digester,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn kind(&self) -> KeywordKind {
        self.kind
    }

    pub fn expects(&self) -> JsonType {
        self.expects
    }

    pub fn versions(&self) -> VersionSet {
        self.versions
    }

    pub fn digester(&self) -> Digester {
        self.digester
    }

    /// All variants registered under the same key
    pub fn variants(&self) -> &'static [KeywordInfo] {
        KeywordCatalog::global().candidates(self.key)
    }

    /// The variant of this keyword accepting values of `shape`
    pub fn variant_for(&self, shape: JsonType) -> Option<&'static KeywordInfo> {
        self.variants().iter().find(|v| v.expects.accepts(shape))
    }

    pub fn applies_to(&self, version: JsonSchemaVersion) -> bool {
        self.versions.contains(version)
    }
}

impl PartialEq for KeywordInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.expects == other.expects
    }
}

impl Eq for KeywordInfo {}

impl Hash for KeywordInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.expects.hash(state);
    }
}

/// Process-wide keyword registry
pub struct KeywordCatalog {
    by_key: HashMap<&'static str, Vec<KeywordInfo>>,
    kind_versions: HashMap<KeywordKind, VersionSet>,
}

static CATALOG: Lazy<KeywordCatalog> = Lazy::new(|| KeywordCatalog::from_entries(entries()));

impl KeywordCatalog {
    pub fn global() -> &'static KeywordCatalog {
        &CATALOG
    }

    fn from_entries(entries: Vec<KeywordInfo>) -> Self {
        let mut by_key: HashMap<&'static str, Vec<KeywordInfo>> = HashMap::new();
        let mut kind_versions: HashMap<KeywordKind, VersionSet> = HashMap::new();

        for info in entries {
            let versions = kind_versions.entry(info.kind).or_default();
            for version in info.versions.iter_newest_first() {
                versions.insert(version);
            }
            by_key.entry(info.key).or_default().push(info);
        }

        // Most recent compatible draft first
        for variants in by_key.values_mut() {
            variants.sort_by_key(|info| std::cmp::Reverse(info.versions.latest()));
        }

        Self { by_key, kind_versions }
    }

    /// Every variant registered under `key`, newest draft first
    pub fn candidates(&self, key: &str) -> &[KeywordInfo] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_keyword(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Drafts in which some spelling of `kind` exists
    pub fn versions_of(&self, kind: KeywordKind) -> VersionSet {
        self.kind_versions.get(&kind).copied().unwrap_or_default()
    }

    /// Variants of `key` usable under `active` drafts
    pub fn applicable(&self, key: &str, active: VersionSet) -> impl Iterator<Item = &KeywordInfo> {
        self.candidates(key)
            .iter()
            .filter(move |info| info.versions.intersects(active))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_key.keys().copied()
    }
}

fn entries() -> Vec<KeywordInfo> {
    use Digester as D;
    use JsonType::{Any, Array, Boolean, Integer, Number, Object, String};
    use KeywordKind as K;

    let all = VersionSet::all();
    let d3 = VersionSet::only(Draft3);
    let d3_5 = VersionSet::range(Draft3, Draft5);
    let d4_7 = VersionSet::since(Draft4);
    let d6_7 = VersionSet::since(Draft6);
    let d7 = VersionSet::only(Draft7);

    let k = KeywordInfo::new;
    let mut entries = vec![
        // Core
        k("$schema", K::Schema, String, all, D::Uri),
        k("id", K::Id, String, d3_5, D::Uri),
        k("$id", K::Id, String, d6_7, D::Uri),
        k("$comment", K::Comment, String, d7, D::String),
        k("definitions", K::Definitions, Object, all, D::SchemaMap),
        // Annotations
        k("title", K::Title, String, all, D::String),
        k("description", K::Description, String, all, D::String),
        k("default", K::Default, Any, all, D::Json),
        k("examples", K::Examples, Array, d6_7, D::JsonList),
        k("readOnly", K::ReadOnly, Boolean, d7, D::Boolean),
        k("writeOnly", K::WriteOnly, Boolean, d7, D::Boolean),
        // Strings
        k("format", K::Format, String, all, D::String),
        k("pattern", K::Pattern, String, all, D::Pattern),
        k("minLength", K::MinLength, Integer, all, D::NonNegativeInteger),
        k("maxLength", K::MaxLength, Integer, all, D::NonNegativeInteger),
        k("contentEncoding", K::ContentEncoding, String, d7, D::String),
        k("contentMediaType", K::ContentMediaType, String, d7, D::String),
        // Numbers
        k("multipleOf", K::MultipleOf, Number, d4_7, D::PositiveNumber),
        k("divisibleBy", K::MultipleOf, Number, d3, D::PositiveNumber),
        k("minimum", K::Minimum, Number, all, D::LimitValue),
        k("maximum", K::Maximum, Number, all, D::LimitValue),
        k("exclusiveMinimum", K::Minimum, Boolean, d3_5, D::LimitFlag),
        k("exclusiveMinimum", K::Minimum, Number, d6_7, D::LimitValue),
        k("exclusiveMaximum", K::Maximum, Boolean, d3_5, D::LimitFlag),
        k("exclusiveMaximum", K::Maximum, Number, d6_7, D::LimitValue),
        // Arrays
        k("items", K::Items, Object, all, D::Items),
        k("items", K::Items, Array, all, D::Items),
        k("items", K::Items, Boolean, d6_7, D::Items),
        k("additionalItems", K::AdditionalItems, Object, all, D::Schema),
        k("additionalItems", K::AdditionalItems, Boolean, all, D::Schema),
        k("minItems", K::MinItems, Integer, all, D::NonNegativeInteger),
        k("maxItems", K::MaxItems, Integer, all, D::NonNegativeInteger),
        k("uniqueItems", K::UniqueItems, Boolean, all, D::Boolean),
        // Objects
        k("properties", K::Properties, Object, all, D::SchemaMap),
        k("patternProperties", K::PatternProperties, Object, all, D::SchemaMap),
        k("additionalProperties", K::AdditionalProperties, Object, all, D::Schema),
        k("additionalProperties", K::AdditionalProperties, Boolean, all, D::Schema),
        k("required", K::Required, Array, d4_7, D::StringSet),
        k("required", K::RequiredFlag, Boolean, d3, D::Boolean),
        k("minProperties", K::MinProperties, Integer, d4_7, D::NonNegativeInteger),
        k("maxProperties", K::MaxProperties, Integer, d4_7, D::NonNegativeInteger),
        k("dependencies", K::Dependencies, Object, all, D::Dependencies),
        // Any instance
        k("type", K::Type, String, all, D::Types),
        k("type", K::Type, Array, all, D::Types),
        k("disallow", K::Disallow, String, d3, D::Types),
        k("disallow", K::Disallow, Array, d3, D::Types),
        k("enum", K::Enum, Array, all, D::JsonList),
        k("const", K::Const, Any, d6_7, D::Json),
        // Combinators
        k("allOf", K::AllOf, Array, d4_7, D::SchemaList),
        k("anyOf", K::AnyOf, Array, d4_7, D::SchemaList),
        k("oneOf", K::OneOf, Array, d4_7, D::SchemaList),
        k("not", K::Not, Object, d4_7, D::Schema),
        k("not", K::Not, Boolean, d6_7, D::Schema),
        k("extends", K::Extends, Object, d3, D::SchemaList),
        k("extends", K::Extends, Array, d3, D::SchemaList),
    ];

    // Schema-valued keywords introduced in draft 6+, object or boolean
    for (key, kind, versions) in [
        ("contains", K::Contains, d6_7),
        ("propertyNames", K::PropertyNames, d6_7),
        ("if", K::If, d7),
        ("then", K::Then, d7),
        ("else", K::Else, d7),
    ] {
        entries.push(k(key, kind, Object, versions, D::Schema));
        entries.push(k(key, kind, Boolean, versions, D::Schema));
    }

    entries
}
