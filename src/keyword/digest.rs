//! Keyword digestion
//!
//! Turns the raw `key: value` pairs of one schema object into typed keywords
//! on a [`SchemaBuilder`]. Candidate selection follows the catalog: drop
//! variants outside the active drafts, drop variants whose shape does not
//! match, then run the survivors newest-draft-first until one produces a
//! keyword.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::draft::{JsonSchemaVersion, JsonType, VersionSet};
use crate::location::SchemaLocation;
use crate::report::{IssueKind, Severity};
use crate::schema::{Schema, SchemaBuilder};

use super::catalog::{Digester, KeywordCatalog, KeywordInfo};
use super::{Dependency, Items, Keyword, KeywordKind};

/// A fatal issue was recorded; the load must stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Aborted;

pub(crate) type DigestResult<T> = std::result::Result<T, Aborted>;

/// What digesters need from the running load
pub(crate) trait DigestContext {
    fn active_versions(&self) -> VersionSet;

    fn is_strict(&self) -> bool;

    fn record(&mut self, severity: Severity, kind: IssueKind, location: &SchemaLocation, message: String);

    /// Load the nested schema at `location`; `None` when `value` is not a
    /// schema (an issue has been recorded)
    fn subschema(&mut self, location: SchemaLocation, value: &Value) -> DigestResult<Option<Schema>>;

    /// Record a malformed-input issue, an error only in strict mode
    fn malformed(&mut self, kind: IssueKind, location: &SchemaLocation, message: String) {
        let severity = if self.is_strict() {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.record(severity, kind, location, message);
    }
}

/// The raw value being digested and where it sits
struct Input<'v> {
    info: &'static KeywordInfo,
    value: &'v Value,
    /// The whole schema object, for keywords that read a sibling
    object: &'v Map<String, Value>,
    /// Location of the keyword value itself
    location: SchemaLocation,
}

/// Digest every key of `object` into `builder`
pub(crate) fn digest_object<C: DigestContext>(
    ctx: &mut C,
    builder: &mut SchemaBuilder,
    object: &Map<String, Value>,
) -> DigestResult<()> {
    let catalog = KeywordCatalog::global();
    let active = ctx.active_versions();

    for (key, value) in object {
        let location = builder.location().child(key.as_str());
        let applicable: Vec<&'static KeywordInfo> = catalog
            .candidates(key)
            .iter()
            .filter(|info| info.versions().intersects(active))
            .collect();

        if applicable.is_empty() {
            if ctx.is_strict() {
                ctx.record(
                    Severity::Error,
                    IssueKind::KeywordNotFound,
                    &location,
                    format!("'{}' is not a keyword of {:?}", key, active),
                );
            } else {
                builder.put_extra(key.clone(), value.clone());
            }
            continue;
        }

        let shape = JsonType::of(value);
        let matching: Vec<&'static KeywordInfo> = applicable
            .iter()
            .copied()
            .filter(|info| info.expects().accepts(shape))
            .collect();

        if matching.is_empty() {
            for info in &applicable {
                ctx.malformed(
                    IssueKind::TypeMismatch,
                    &location,
                    format!("'{}' expects {}, found {}", key, info.expects(), shape),
                );
            }
            continue;
        }

        for info in matching {
            let input = Input {
                info,
                value,
                object,
                location: location.clone(),
            };
            if let Some(keyword) = digest(ctx, builder, input)? {
                builder.put(info.kind(), keyword);
                break;
            }
        }
    }

    Ok(())
}

fn digest<C: DigestContext>(
    ctx: &mut C,
    builder: &SchemaBuilder,
    input: Input<'_>,
) -> DigestResult<Option<Keyword>> {
    match input.info.digester() {
        Digester::Schema => match input.value {
            // `additionalProperties`/`additionalItems` take a boolean in every draft
            Value::Bool(b) if input.info.expects() == JsonType::Boolean => Ok(Some(Keyword::Schema(
                Schema::boolean(input.location.clone(), builder.version(), *b),
            ))),
            _ => Ok(ctx.subschema(input.location.clone(), input.value)?.map(Keyword::Schema)),
        },
        Digester::SchemaList => schema_list(ctx, &input),
        Digester::SchemaMap => schema_map(ctx, &input),
        Digester::Items => items(ctx, &input),
        Digester::Dependencies => dependencies(ctx, &input),
        Digester::String => Ok(input.value.as_str().map(|s| Keyword::String(s.to_string()))),
        Digester::Pattern => Ok(pattern(ctx, &input)),
        Digester::Uri => Ok(uri(ctx, &input)),
        Digester::PositiveNumber => Ok(positive_number(ctx, &input)),
        Digester::NonNegativeInteger => Ok(non_negative_integer(ctx, &input)),
        Digester::Boolean => Ok(input.value.as_bool().map(Keyword::Boolean)),
        Digester::StringSet => Ok(string_set(ctx, &input)),
        Digester::Types => types(ctx, &input),
        Digester::LimitValue => Ok(limit_value(ctx, builder, &input)),
        Digester::LimitFlag => {
            limit_flag(ctx, &input);
            Ok(None)
        }
        Digester::Json => Ok(Some(Keyword::Json(input.value.clone()))),
        Digester::JsonList => Ok(input.value.as_array().cloned().map(Keyword::JsonList)),
    }
}

// =============================================================================
// Schema-valued
// =============================================================================

fn schema_list<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> DigestResult<Option<Keyword>> {
    let elements = match input.value {
        Value::Array(elements) => elements,
        // `extends` takes a single schema too
        Value::Object(_) => {
            return Ok(ctx
                .subschema(input.location.clone(), input.value)?
                .map(|schema| Keyword::SchemaList(vec![schema])));
        }
        _ => return Ok(None),
    };
    Ok(indexed_schemas(ctx, &input.location, elements)?.map(Keyword::SchemaList))
}

/// Load every element; `None` if any element is not a schema
fn indexed_schemas<C: DigestContext>(
    ctx: &mut C,
    location: &SchemaLocation,
    elements: &[Value],
) -> DigestResult<Option<Vec<Schema>>> {
    let mut schemas = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match ctx.subschema(location.child_index(index), element)? {
            Some(schema) => schemas.push(schema),
            None => return Ok(None),
        }
    }
    Ok(Some(schemas))
}

fn schema_map<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> DigestResult<Option<Keyword>> {
    let Some(entries) = input.value.as_object() else {
        return Ok(None);
    };

    let mut schemas = BTreeMap::new();
    for (name, value) in entries {
        if name.is_empty() {
            ctx.malformed(
                IssueKind::InvalidValue,
                &input.location,
                format!("'{}' has an entry with an empty name", input.info.key()),
            );
            continue;
        }
        let location = input.location.child(name.as_str());
        if input.info.kind() == KeywordKind::PatternProperties {
            check_regex(ctx, &location, name);
        }
        if let Some(schema) = ctx.subschema(location, value)? {
            schemas.insert(name.clone(), schema);
        }
    }
    Ok(Some(Keyword::SchemaMap(schemas)))
}

fn items<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> DigestResult<Option<Keyword>> {
    match input.value {
        Value::Array(elements) => Ok(indexed_schemas(ctx, &input.location, elements)?
            .map(|schemas| Keyword::Items(Items::Tuple(schemas)))),
        _ => Ok(ctx
            .subschema(input.location.clone(), input.value)?
            .map(|schema| Keyword::Items(Items::Single(schema)))),
    }
}

fn dependencies<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> DigestResult<Option<Keyword>> {
    let Some(entries) = input.value.as_object() else {
        return Ok(None);
    };

    let mut deps = BTreeMap::new();
    for (name, value) in entries {
        let location = input.location.child(name.as_str());
        let dependency = match value {
            Value::Array(_) => {
                Dependency::Properties(strings(ctx, &location, value).unwrap_or_default())
            }
            // Draft 3 single property name
            Value::String(property) => Dependency::Properties(BTreeSet::from([property.clone()])),
            Value::Object(_) | Value::Bool(_) => match ctx.subschema(location, value)? {
                Some(schema) => Dependency::Schema(schema),
                None => continue,
            },
            other => {
                ctx.malformed(
                    IssueKind::TypeMismatch,
                    &location,
                    format!("dependency '{}' must be a schema or property list, found {}", name, JsonType::of(other)),
                );
                continue;
            }
        };
        deps.insert(name.clone(), dependency);
    }
    Ok(Some(Keyword::Dependencies(deps)))
}

// =============================================================================
// Scalars
// =============================================================================

fn check_regex<C: DigestContext>(ctx: &mut C, location: &SchemaLocation, pattern: &str) {
    if let Err(e) = Regex::new(pattern) {
        warn!(pattern, "pattern does not compile");
        ctx.record(
            Severity::Warning,
            IssueKind::InvalidPattern,
            location,
            format!("'{}' is not a supported regular expression: {}", pattern, e),
        );
    }
}

fn pattern<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> Option<Keyword> {
    let pattern = input.value.as_str()?;
    check_regex(ctx, &input.location, pattern);
    Some(Keyword::String(pattern.to_string()))
}

fn uri<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> Option<Keyword> {
    let raw = input.value.as_str()?;
    if let Err(e) = input.location.resolve(raw) {
        let kind = if input.info.kind() == KeywordKind::Id {
            IssueKind::InvalidIdentifier
        } else {
            IssueKind::InvalidValue
        };
        ctx.malformed(kind, &input.location, format!("'{}' is not a valid URI reference: {}", raw, e));
    }
    Some(Keyword::Uri(raw.to_string()))
}

fn positive_number<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> Option<Keyword> {
    let number = input.value.as_number()?;
    if number.as_f64().is_some_and(|n| n > 0.0) {
        Some(Keyword::Number(number.clone()))
    } else {
        ctx.malformed(
            IssueKind::InvalidValue,
            &input.location,
            format!("'{}' must be greater than 0, found {}", input.info.key(), number),
        );
        None
    }
}

fn non_negative_integer<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> Option<Keyword> {
    let number = input.value.as_number()?;
    let integer = number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .map(|n| n as u64)
    });
    if integer.is_none() {
        ctx.malformed(
            IssueKind::InvalidValue,
            &input.location,
            format!("'{}' must be a non-negative integer, found {}", input.info.key(), number),
        );
    }
    integer.map(Keyword::Integer)
}

/// Array of strings; non-string elements are reported and skipped
fn strings<C: DigestContext>(ctx: &mut C, location: &SchemaLocation, value: &Value) -> Option<BTreeSet<String>> {
    let elements = value.as_array()?;
    let mut names = BTreeSet::new();
    for (index, element) in elements.iter().enumerate() {
        match element.as_str() {
            Some(name) => {
                names.insert(name.to_string());
            }
            None => ctx.malformed(
                IssueKind::InvalidValue,
                &location.child_index(index),
                format!("expected a string, found {}", JsonType::of(element)),
            ),
        }
    }
    Some(names)
}

fn string_set<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> Option<Keyword> {
    strings(ctx, &input.location, input.value).map(Keyword::StringSet)
}

fn types<C: DigestContext>(ctx: &mut C, input: &Input<'_>) -> DigestResult<Option<Keyword>> {
    let names: Vec<(SchemaLocation, &Value)> = match input.value {
        Value::Array(elements) => elements
            .iter()
            .enumerate()
            .map(|(index, element)| (input.location.child_index(index), element))
            .collect(),
        single => vec![(input.location.clone(), single)],
    };

    // Draft 3 union types may list schemas next to type names
    let draft3 = ctx.active_versions().contains(JsonSchemaVersion::Draft3);
    let mut types = BTreeSet::new();
    let mut schemas = Vec::new();
    for (location, value) in names {
        if draft3 && value.is_object() {
            if let Some(schema) = ctx.subschema(location, value)? {
                schemas.push(schema);
            }
            continue;
        }
        let parsed = value
            .as_str()
            .and_then(JsonType::from_name)
            .filter(|t| *t != JsonType::Any || draft3);
        match parsed {
            Some(t) => {
                types.insert(t);
            }
            None => ctx.malformed(
                IssueKind::InvalidValue,
                &location,
                format!("{} is not a type name", value),
            ),
        }
    }

    if schemas.is_empty() {
        Ok(Some(Keyword::Types(types)))
    } else {
        Ok(Some(Keyword::Union { types, schemas }))
    }
}

// =============================================================================
// Numeric limits
// =============================================================================

/// Draft 3-5 flag sibling of a numeric bound
fn flag_key(kind: KeywordKind) -> Option<&'static str> {
    match kind {
        KeywordKind::Minimum => Some("exclusiveMinimum"),
        KeywordKind::Maximum => Some("exclusiveMaximum"),
        _ => None,
    }
}

/// `minimum`/`maximum` (exclusive when the draft 3-5 flag says so) and the
/// draft 6+ numeric `exclusiveMinimum`/`exclusiveMaximum`, all feeding one
/// [`super::Limit`]
fn limit_value<C: DigestContext>(ctx: &C, builder: &SchemaBuilder, input: &Input<'_>) -> Option<Keyword> {
    let number: Number = input.value.as_number()?.clone();
    let kind = input.info.kind();
    let mut limit = builder
        .keyword(kind)
        .and_then(Keyword::as_limit)
        .cloned()
        .unwrap_or_default();

    let flag = flag_key(kind)?;
    if input.info.key() == flag {
        limit.exclusive = Some(number);
    } else {
        let legacy_drafts = VersionSet::range(JsonSchemaVersion::Draft3, JsonSchemaVersion::Draft5);
        let flagged = ctx.active_versions().intersects(legacy_drafts)
            && input.object.get(flag).and_then(Value::as_bool) == Some(true);
        if flagged {
            limit.exclusive = Some(number);
        } else {
            limit.inclusive = Some(number);
        }
    }
    Some(Keyword::Limit(limit))
}

/// The boolean flag carries no value of its own; its numeric sibling reads
/// it. A flag with no sibling is reported.
fn limit_flag<C: DigestContext>(ctx: &mut C, input: &Input<'_>) {
    let bound = match input.info.kind() {
        KeywordKind::Minimum => "minimum",
        _ => "maximum",
    };
    if !input.object.get(bound).is_some_and(Value::is_number) {
        ctx.malformed(
            IssueKind::InvalidValue,
            &input.location,
            format!("'{}' has no numeric '{}' to apply to", input.info.key(), bound),
        );
    }
}
