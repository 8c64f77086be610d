//! Draft versions and JSON value shapes
//!
//! Every keyword is registered against a [`VersionSet`]; loading selects the
//! active set from `$schema` (or configuration) and serialization projects a
//! schema onto a single [`JsonSchemaVersion`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Published JSON-Schema drafts, ordered oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonSchemaVersion {
    Draft3,
    Draft4,
    Draft5,
    Draft6,
    Draft7,
}

impl JsonSchemaVersion {
    pub const ALL: [JsonSchemaVersion; 5] = [
        Self::Draft3,
        Self::Draft4,
        Self::Draft5,
        Self::Draft6,
        Self::Draft7,
    ];

    pub fn latest() -> Self {
        Self::Draft7
    }

    /// Draft number (3..=7)
    pub fn number(self) -> u8 {
        match self {
            Self::Draft3 => 3,
            Self::Draft4 => 4,
            Self::Draft5 => 5,
            Self::Draft6 => 6,
            Self::Draft7 => 7,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.number() == n)
    }

    /// Canonical `$schema` URI for this draft
    pub fn meta_schema_uri(self) -> &'static str {
        match self {
            Self::Draft3 => "http://json-schema.org/draft-03/schema#",
            Self::Draft4 => "http://json-schema.org/draft-04/schema#",
            Self::Draft5 => "http://json-schema.org/draft-05/schema#",
            Self::Draft6 => "http://json-schema.org/draft-06/schema#",
            Self::Draft7 => "http://json-schema.org/draft-07/schema#",
        }
    }

    /// Recognize a `$schema` value. Scheme, trailing `#` and the
    /// `/schema` suffix are tolerated.
    pub fn from_meta_schema_uri(uri: &str) -> Option<Self> {
        let trimmed = uri
            .trim()
            .trim_end_matches('#')
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let rest = trimmed.strip_prefix("json-schema.org/")?;
        let draft = rest.strip_suffix("/schema").unwrap_or(rest);
        match draft {
            "draft-03" => Some(Self::Draft3),
            "draft-04" => Some(Self::Draft4),
            "draft-05" => Some(Self::Draft5),
            "draft-06" => Some(Self::Draft6),
            "draft-07" => Some(Self::Draft7),
            "schema" => Some(Self::latest()),
            _ => None,
        }
    }

    /// Key used for the identifier keyword in this draft
    pub fn id_key(self) -> &'static str {
        if self <= Self::Draft5 {
            "id"
        } else {
            "$id"
        }
    }

    /// Drafts 3 to 5 pair numeric limits with boolean exclusivity flags
    pub fn has_boolean_exclusive_limits(self) -> bool {
        self <= Self::Draft5
    }

    /// Drafts 6 and later accept `true`/`false` wherever a schema is expected
    pub fn allows_boolean_schemas(self) -> bool {
        self >= Self::Draft6
    }
}

impl fmt::Display for JsonSchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "draft-{:02}", self.number())
    }
}

impl FromStr for JsonSchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .trim_start_matches("draft")
            .trim_start_matches(['-', '_'])
            .trim_start_matches('0');
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::from_number)
            .or_else(|| Self::from_meta_schema_uri(s))
            .ok_or_else(|| format!("unknown JSON-Schema draft '{}'", s))
    }
}

/// Compact set of drafts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionSet(u8);

impl VersionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    const fn bit(version: JsonSchemaVersion) -> u8 {
        1 << (version as u8)
    }

    pub const fn only(version: JsonSchemaVersion) -> Self {
        Self(Self::bit(version))
    }

    /// Inclusive range of drafts
    pub fn range(from: JsonSchemaVersion, to: JsonSchemaVersion) -> Self {
        JsonSchemaVersion::ALL
            .into_iter()
            .filter(|v| *v >= from && *v <= to)
            .collect()
    }

    /// `from` and every later draft
    pub fn since(from: JsonSchemaVersion) -> Self {
        Self::range(from, JsonSchemaVersion::latest())
    }

    pub fn contains(self, version: JsonSchemaVersion) -> bool {
        self.0 & Self::bit(version) != 0
    }

    pub fn intersects(self, other: VersionSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(self, other: VersionSet) -> VersionSet {
        Self(self.0 & other.0)
    }

    pub fn insert(&mut self, version: JsonSchemaVersion) {
        self.0 |= Self::bit(version);
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Newest draft in the set
    pub fn latest(self) -> Option<JsonSchemaVersion> {
        self.iter_newest_first().next()
    }

    /// Drafts in the set, most recent first
    pub fn iter_newest_first(self) -> impl Iterator<Item = JsonSchemaVersion> {
        JsonSchemaVersion::ALL
            .into_iter()
            .rev()
            .filter(move |v| self.contains(*v))
    }
}

impl FromIterator<JsonSchemaVersion> for VersionSet {
    fn from_iter<I: IntoIterator<Item = JsonSchemaVersion>>(iter: I) -> Self {
        let mut set = Self::empty();
        for version in iter {
            set.insert(version);
        }
        set
    }
}

impl fmt::Debug for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drafts: Vec<u8> = JsonSchemaVersion::ALL
            .into_iter()
            .filter(|v| self.contains(*v))
            .map(JsonSchemaVersion::number)
            .collect();
        write!(f, "VersionSet{:?}", drafts)
    }
}

/// Shape of a JSON value, also used as the `type` keyword vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
    /// Draft 3 `"any"`; as an expected shape it accepts every value
    Any,
}

impl JsonType {
    /// Shape of a concrete value. Whole numbers report `Integer`, `2.0`
    /// included.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(n) if n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0) => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Whether a value of shape `actual` satisfies this expected shape
    pub fn accepts(self, actual: JsonType) -> bool {
        self == Self::Any || self == actual || (self == Self::Number && actual == Self::Integer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Null => "null",
            Self::Number => "number",
            Self::Object => "object",
            Self::String => "string",
            Self::Any => "any",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "array" => Some(Self::Array),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "null" => Some(Self::Null),
            "number" => Some(Self::Number),
            "object" => Some(Self::Object),
            "string" => Some(Self::String),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_schema_recognition() {
        assert_eq!(
            JsonSchemaVersion::from_meta_schema_uri("http://json-schema.org/draft-04/schema#"),
            Some(JsonSchemaVersion::Draft4)
        );
        assert_eq!(
            JsonSchemaVersion::from_meta_schema_uri("https://json-schema.org/draft-07/schema"),
            Some(JsonSchemaVersion::Draft7)
        );
        assert_eq!(JsonSchemaVersion::from_meta_schema_uri("http://example.com/schema"), None);
        for version in JsonSchemaVersion::ALL {
            assert_eq!(
                JsonSchemaVersion::from_meta_schema_uri(version.meta_schema_uri()),
                Some(version)
            );
        }
    }

    #[test]
    fn test_parse_version_names() {
        assert_eq!("draft-04".parse::<JsonSchemaVersion>(), Ok(JsonSchemaVersion::Draft4));
        assert_eq!("draft7".parse::<JsonSchemaVersion>(), Ok(JsonSchemaVersion::Draft7));
        assert_eq!("6".parse::<JsonSchemaVersion>(), Ok(JsonSchemaVersion::Draft6));
        assert!("draft-2020-12".parse::<JsonSchemaVersion>().is_err());
    }

    #[test]
    fn test_version_set_ordering() {
        let set = VersionSet::range(JsonSchemaVersion::Draft4, JsonSchemaVersion::Draft6);
        assert!(set.contains(JsonSchemaVersion::Draft5));
        assert!(!set.contains(JsonSchemaVersion::Draft7));
        let order: Vec<_> = set.iter_newest_first().collect();
        assert_eq!(
            order,
            vec![JsonSchemaVersion::Draft6, JsonSchemaVersion::Draft5, JsonSchemaVersion::Draft4]
        );
        assert!(!set.intersects(VersionSet::only(JsonSchemaVersion::Draft3)));
        assert_eq!(VersionSet::all().latest(), Some(JsonSchemaVersion::Draft7));
    }

    #[test]
    fn test_json_type_shapes() {
        assert_eq!(JsonType::of(&json!(3)), JsonType::Integer);
        assert_eq!(JsonType::of(&json!(2.0)), JsonType::Integer);
        assert_eq!(JsonType::of(&json!(2.5)), JsonType::Number);
        assert_eq!(JsonType::of(&json!(3.5)), JsonType::Number);
        assert!(JsonType::Number.accepts(JsonType::Integer));
        assert!(!JsonType::Integer.accepts(JsonType::Number));
        assert!(JsonType::Any.accepts(JsonType::Null));
    }
}
