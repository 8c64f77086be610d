//! Per-draft projection
//!
//! A schema is stored once in canonical form. These functions render it for
//! one target draft: keywords that do not exist in the draft are left out,
//! renamed keywords get the draft's spelling, and keywords whose shape
//! changed between drafts (`exclusiveMinimum`, `required`, boolean schemas)
//! are rewritten into the draft's form.

use serde_json::{json, Map, Number, Value};

use crate::draft::{JsonSchemaVersion, JsonType};
use crate::schema::{Schema, SchemaBody};

use super::{Dependency, Items, Keyword, KeywordCatalog, KeywordKind, Limit};

use JsonSchemaVersion::{Draft3, Draft6};

/// Serialization switches
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Write non-keyword properties back verbatim
    pub include_extra_properties: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            include_extra_properties: true,
        }
    }
}

/// Render `schema` as a JSON Schema document for `version`
pub fn to_json(schema: &Schema, version: JsonSchemaVersion, options: &SerializeOptions) -> Value {
    match schema.body() {
        SchemaBody::Ref(reference) => json!({ "$ref": reference.reference() }),
        SchemaBody::Boolean(value) => boolean_schema(*value, version),
        SchemaBody::Object { keywords, extra } => {
            let catalog = KeywordCatalog::global();
            let mut out = Map::new();

            for (kind, keyword) in keywords {
                if *kind == KeywordKind::Const && version < Draft6 {
                    // No `const` before draft 6: a one-element enum says the same
                    if !keywords.contains_key(&KeywordKind::Enum) {
                        if let Keyword::Json(value) = keyword {
                            out.insert("enum".to_string(), Value::Array(vec![value.clone()]));
                        }
                    }
                    continue;
                }
                if !catalog.versions_of(*kind).contains(version) {
                    continue;
                }
                write_keyword(&mut out, *kind, keyword, version, options);
            }

            if options.include_extra_properties {
                for (key, value) in extra {
                    out.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            Value::Object(out)
        }
    }
}

fn boolean_schema(value: bool, version: JsonSchemaVersion) -> Value {
    match (value, version) {
        (value, v) if v >= Draft6 => Value::Bool(value),
        (true, _) => json!({}),
        (false, Draft3) => json!({ "disallow": ["any"] }),
        (false, _) => json!({ "not": {} }),
    }
}

fn nested(schema: &Schema, version: JsonSchemaVersion, options: &SerializeOptions) -> Value {
    to_json(schema, version, options)
}

/// `additionalProperties` / `additionalItems` take a raw boolean in every draft
fn nested_allowing_bool(schema: &Schema, version: JsonSchemaVersion, options: &SerializeOptions) -> Value {
    match schema.as_boolean() {
        Some(value) => Value::Bool(value),
        None => nested(schema, version, options),
    }
}

fn write_keyword(
    out: &mut Map<String, Value>,
    kind: KeywordKind,
    keyword: &Keyword,
    version: JsonSchemaVersion,
    options: &SerializeOptions,
) {
    let key = match kind {
        KeywordKind::Id => version.id_key(),
        KeywordKind::MultipleOf if version == Draft3 => "divisibleBy",
        KeywordKind::Schema => {
            out.insert("$schema".to_string(), Value::from(version.meta_schema_uri()));
            return;
        }
        KeywordKind::Minimum | KeywordKind::Maximum => {
            if let Keyword::Limit(limit) = keyword {
                write_limit(out, kind, limit, version);
            }
            return;
        }
        _ => kind.key(),
    };

    let value = match (kind, keyword) {
        (KeywordKind::AdditionalProperties | KeywordKind::AdditionalItems, Keyword::Schema(schema)) => {
            nested_allowing_bool(schema, version, options)
        }
        (KeywordKind::Required, Keyword::StringSet(names)) if names.is_empty() => return,
        (KeywordKind::Type, Keyword::Types(types)) => match type_names(types, version) {
            Some(value) => value,
            None => return,
        },
        // Only draft 3 can list schemas as types; later drafts keep the names
        (_, Keyword::Union { types, .. }) if version != Draft3 => match type_names(types, version) {
            Some(value) => value,
            None => return,
        },
        _ => keyword_value(keyword, version, options),
    };
    out.insert(key.to_string(), value);
}

fn keyword_value(keyword: &Keyword, version: JsonSchemaVersion, options: &SerializeOptions) -> Value {
    match keyword {
        Keyword::Schema(schema) => nested(schema, version, options),
        Keyword::SchemaList(list) => Value::Array(list.iter().map(|s| nested(s, version, options)).collect()),
        Keyword::SchemaMap(map) => Value::Object(
            map.iter()
                .map(|(name, s)| (name.clone(), nested(s, version, options)))
                .collect(),
        ),
        Keyword::Items(Items::Single(schema)) => nested(schema, version, options),
        Keyword::Items(Items::Tuple(list)) => {
            Value::Array(list.iter().map(|s| nested(s, version, options)).collect())
        }
        Keyword::Dependencies(deps) => Value::Object(
            deps.iter()
                .map(|(name, dependency)| {
                    let value = match dependency {
                        Dependency::Schema(schema) => nested(schema, version, options),
                        Dependency::Properties(names) => {
                            Value::Array(names.iter().cloned().map(Value::String).collect())
                        }
                    };
                    (name.clone(), value)
                })
                .collect(),
        ),
        Keyword::String(s) | Keyword::Uri(s) => Value::String(s.clone()),
        Keyword::Number(n) => Value::Number(n.clone()),
        Keyword::Integer(n) => Value::from(*n),
        Keyword::Boolean(b) => Value::Bool(*b),
        Keyword::StringSet(names) => Value::Array(names.iter().cloned().map(Value::String).collect()),
        Keyword::Types(types) => type_names(types, version).unwrap_or(Value::Null),
        Keyword::Union { types, schemas } => Value::Array(
            types
                .iter()
                .map(|t| Value::from(t.as_str()))
                .chain(schemas.iter().map(|s| nested(s, version, options)))
                .collect(),
        ),
        Keyword::Limit(limit) => limit
            .inclusive
            .clone()
            .or_else(|| limit.exclusive.clone())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Keyword::Json(value) => value.clone(),
        Keyword::JsonList(values) => Value::Array(values.clone()),
    }
}

/// One type as a string, several as an array; `any` only in draft 3
fn type_names(types: &std::collections::BTreeSet<JsonType>, version: JsonSchemaVersion) -> Option<Value> {
    let names: Vec<Value> = types
        .iter()
        .filter(|t| **t != JsonType::Any || version == Draft3)
        .map(|t| Value::from(t.as_str()))
        .collect();
    match names.len() {
        0 => None,
        1 => names.into_iter().next(),
        _ => Some(Value::Array(names)),
    }
}

fn write_limit(out: &mut Map<String, Value>, kind: KeywordKind, limit: &Limit, version: JsonSchemaVersion) {
    let (bound_key, exclusive_key, lower) = match kind {
        KeywordKind::Minimum => ("minimum", "exclusiveMinimum", true),
        _ => ("maximum", "exclusiveMaximum", false),
    };

    if !version.has_boolean_exclusive_limits() {
        if let Some(n) = &limit.inclusive {
            out.insert(bound_key.to_string(), Value::Number(n.clone()));
        }
        if let Some(n) = &limit.exclusive {
            out.insert(exclusive_key.to_string(), Value::Number(n.clone()));
        }
        return;
    }

    // Drafts 3-5 hold a single bound; keep the tighter one
    let exclusive_wins = match (&limit.inclusive, &limit.exclusive) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(inclusive), Some(exclusive)) => {
            let (i, e) = (as_f64(inclusive), as_f64(exclusive));
            if lower {
                e >= i
            } else {
                e <= i
            }
        }
    };

    if exclusive_wins {
        if let Some(n) = &limit.exclusive {
            out.insert(bound_key.to_string(), Value::Number(n.clone()));
            out.insert(exclusive_key.to_string(), Value::Bool(true));
        }
    } else if let Some(n) = &limit.inclusive {
        out.insert(bound_key.to_string(), Value::Number(n.clone()));
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

// =============================================================================
// Draft view
// =============================================================================

/// A schema seen through the keyword spellings of one draft
#[derive(Debug, Clone, Copy)]
pub struct DraftView<'a> {
    schema: &'a Schema,
    version: JsonSchemaVersion,
}

impl<'a> DraftView<'a> {
    pub fn new(schema: &'a Schema, version: JsonSchemaVersion) -> Self {
        Self { schema, version }
    }

    pub fn version(&self) -> JsonSchemaVersion {
        self.version
    }

    /// Keyword stored under the kind that `key` names in this draft
    pub fn get(&self, key: &str) -> Option<&'a Keyword> {
        KeywordCatalog::global()
            .candidates(key)
            .iter()
            .filter(|info| info.applies_to(self.version))
            .find_map(|info| self.schema.keyword(info.kind()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys this draft renders for the schema, sorted
    pub fn keys(&self) -> Vec<String> {
        match to_json(self.schema, self.version, &SerializeOptions { include_extra_properties: false }) {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}
