//! Keyword Type System
//!
//! Raw `key: value` pairs of a schema object are digested into typed
//! [`Keyword`] values stored under a logical [`KeywordKind`]. The catalog
//! declares which JSON shapes each key accepts in which drafts, the digesters
//! turn a matching value into a keyword, and projection renders a keyword
//! back to JSON for one target draft.

pub mod catalog;
pub(crate) mod digest;
pub mod merge;
pub mod project;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Number, Value};

use crate::draft::JsonType;
use crate::schema::Schema;

pub use catalog::{Digester, KeywordCatalog, KeywordInfo};

/// Logical keyword identity.
///
/// Several JSON keys can share one kind: `id`/`$id`, `divisibleBy`/
/// `multipleOf`, and `minimum`/`exclusiveMinimum` (both feed one [`Limit`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum KeywordKind {
    // === Core ===
    Schema,
    Id,
    Comment,
    Definitions,

    // === Annotations ===
    Title,
    Description,
    Default,
    Examples,
    ReadOnly,
    WriteOnly,

    // === Strings ===
    Format,
    Pattern,
    MinLength,
    MaxLength,
    ContentEncoding,
    ContentMediaType,

    // === Numbers ===
    MultipleOf,
    Minimum,
    Maximum,

    // === Arrays ===
    Items,
    AdditionalItems,
    MinItems,
    MaxItems,
    UniqueItems,
    Contains,

    // === Objects ===
    Properties,
    PatternProperties,
    AdditionalProperties,
    Required,
    RequiredFlag,
    MinProperties,
    MaxProperties,
    PropertyNames,
    Dependencies,

    // === Any instance ===
    Type,
    Disallow,
    Enum,
    Const,

    // === Combinators ===
    AllOf,
    AnyOf,
    OneOf,
    Not,
    Extends,
    If,
    Then,
    Else,
}

impl KeywordKind {
    /// Key used for this kind in paths and reports (newest spelling)
    pub fn key(self) -> &'static str {
        match self {
            Self::Schema => "$schema",
            Self::Id => "$id",
            Self::Comment => "$comment",
            Self::Definitions => "definitions",
            Self::Title => "title",
            Self::Description => "description",
            Self::Default => "default",
            Self::Examples => "examples",
            Self::ReadOnly => "readOnly",
            Self::WriteOnly => "writeOnly",
            Self::Format => "format",
            Self::Pattern => "pattern",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::ContentEncoding => "contentEncoding",
            Self::ContentMediaType => "contentMediaType",
            Self::MultipleOf => "multipleOf",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Items => "items",
            Self::AdditionalItems => "additionalItems",
            Self::MinItems => "minItems",
            Self::MaxItems => "maxItems",
            Self::UniqueItems => "uniqueItems",
            Self::Contains => "contains",
            Self::Properties => "properties",
            Self::PatternProperties => "patternProperties",
            Self::AdditionalProperties => "additionalProperties",
            Self::Required => "required",
            Self::RequiredFlag => "required",
            Self::MinProperties => "minProperties",
            Self::MaxProperties => "maxProperties",
            Self::PropertyNames => "propertyNames",
            Self::Dependencies => "dependencies",
            Self::Type => "type",
            Self::Disallow => "disallow",
            Self::Enum => "enum",
            Self::Const => "const",
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
            Self::Not => "not",
            Self::Extends => "extends",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
        }
    }

    /// Identifier keywords never take part in a merge
    pub fn is_identity(self) -> bool {
        self == Self::Id
    }
}

/// Parsed value of one keyword on one schema node
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    /// Single nested schema (`not`, `additionalProperties`, `if`, ...)
    Schema(Schema),
    /// Ordered schemas (`allOf`, `anyOf`, `oneOf`, `extends`)
    SchemaList(Vec<Schema>),
    /// Named schemas (`properties`, `patternProperties`, `definitions`)
    SchemaMap(BTreeMap<String, Schema>),
    Items(Items),
    Dependencies(BTreeMap<String, Dependency>),
    String(String),
    /// URI-valued keyword kept as written (`$schema`, `$id`)
    Uri(String),
    Number(Number),
    Integer(u64),
    Boolean(bool),
    StringSet(BTreeSet<String>),
    Types(BTreeSet<JsonType>),
    /// Draft 3 union type: type names mixed with schemas
    Union {
        types: BTreeSet<JsonType>,
        schemas: Vec<Schema>,
    },
    Limit(Limit),
    /// Arbitrary JSON (`default`, `const`)
    Json(Value),
    /// JSON value list (`enum`, `examples`)
    JsonList(Vec<Value>),
}

/// `items` is either one schema for every element or a tuple
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Single(Schema),
    Tuple(Vec<Schema>),
}

/// One entry of `dependencies`
#[derive(Debug, Clone, PartialEq)]
pub enum Dependency {
    Schema(Schema),
    Properties(BTreeSet<String>),
}

/// Numeric bound with its inclusive and exclusive forms.
///
/// Drafts 3 to 5 write an exclusive bound as the number plus a boolean flag;
/// drafts 6 and 7 give the exclusive bound its own numeric keyword. Both
/// digest into this one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Limit {
    pub inclusive: Option<Number>,
    pub exclusive: Option<Number>,
}

impl Limit {
    pub fn inclusive(value: Number) -> Self {
        Self {
            inclusive: Some(value),
            exclusive: None,
        }
    }

    pub fn exclusive(value: Number) -> Self {
        Self {
            inclusive: None,
            exclusive: Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inclusive.is_none() && self.exclusive.is_none()
    }
}

impl Keyword {
    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            Self::Schema(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn as_schema_list(&self) -> Option<&[Schema]> {
        match self {
            Self::SchemaList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_schema_map(&self) -> Option<&BTreeMap<String, Schema>> {
        match self {
            Self::SchemaMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_limit(&self) -> Option<&Limit> {
        match self {
            Self::Limit(limit) => Some(limit),
            _ => None,
        }
    }

    /// Nested schemas, each with the path segment below the keyword key
    /// (`None` when the schema sits directly under the key)
    pub fn subschemas(&self) -> Vec<(Option<String>, &Schema)> {
        match self {
            Self::Schema(schema) => vec![(None, schema)],
            Self::SchemaList(list) => list
                .iter()
                .enumerate()
                .map(|(i, s)| (Some(i.to_string()), s))
                .collect(),
            Self::SchemaMap(map) => map.iter().map(|(k, s)| (Some(k.clone()), s)).collect(),
            Self::Items(Items::Single(schema)) => vec![(None, schema)],
            Self::Items(Items::Tuple(list)) => list
                .iter()
                .enumerate()
                .map(|(i, s)| (Some(i.to_string()), s))
                .collect(),
            Self::Union { schemas, .. } => schemas
                .iter()
                .enumerate()
                .map(|(i, s)| (Some(i.to_string()), s))
                .collect(),
            Self::Dependencies(deps) => deps
                .iter()
                .filter_map(|(k, d)| match d {
                    Dependency::Schema(s) => Some((Some(k.clone()), s)),
                    Dependency::Properties(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
