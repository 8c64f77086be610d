//! Keyword-level merge rules
//!
//! Scalars: equal values are kept, different values let the override win and
//! report a conflict. Sets: union, conflict only when they differed.
//! Schema-valued keywords recurse into the schema merge engine.

use std::collections::BTreeMap;

use crate::error::MergeError;
use crate::merge::merge;
use crate::pointer::JsonPath;
use crate::report::MergeReport;
use crate::schema::Schema;

use super::{Dependency, Items, Keyword, KeywordKind, Limit};

/// Result of merging one keyword
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub keyword: Keyword,
    /// Set when the override replaced an incompatible base value
    pub conflict: Option<String>,
}

impl Merged {
    fn clean(keyword: Keyword) -> Self {
        Self {
            keyword,
            conflict: None,
        }
    }

    fn conflicting(keyword: Keyword, message: String) -> Self {
        Self {
            keyword,
            conflict: Some(message),
        }
    }
}

/// Merge `over` into `base`, both stored under `kind`. `path` addresses the
/// keyword itself (`/properties` rather than the schema holding it).
pub fn merge_keyword(
    kind: KeywordKind,
    path: &JsonPath,
    base: &Keyword,
    over: &Keyword,
    report: &mut MergeReport,
) -> Result<Merged, MergeError> {
    use Keyword as K;

    match (base, over) {
        (K::String(_), K::String(_))
        | (K::Uri(_), K::Uri(_))
        | (K::Number(_), K::Number(_))
        | (K::Integer(_), K::Integer(_))
        | (K::Boolean(_), K::Boolean(_))
        | (K::Json(_), K::Json(_)) => Ok(scalar(base, over)),

        (K::StringSet(a), K::StringSet(b)) => {
            let union = a.union(b).cloned().collect();
            Ok(set_union(a != b, K::StringSet(union)))
        }
        (K::Types(a), K::Types(b)) => {
            let union = a.union(b).copied().collect();
            Ok(set_union(a != b, K::Types(union)))
        }
        (K::JsonList(a), K::JsonList(b)) => {
            let mut union = a.clone();
            for value in b {
                if !union.contains(value) {
                    union.push(value.clone());
                }
            }
            Ok(set_union(a != b, K::JsonList(union)))
        }

        (K::Limit(a), K::Limit(b)) => Ok(limit(a, b)),

        (K::Schema(a), K::Schema(b)) => Ok(Merged::clean(K::Schema(merge(path, a, Some(b), report)))),
        (K::SchemaMap(a), K::SchemaMap(b)) => Ok(Merged::clean(K::SchemaMap(schema_map(path, a, b, report)))),
        (K::SchemaList(a), K::SchemaList(b)) => Ok(Merged::clean(K::SchemaList(pairwise(kind, path, a, b, report)?))),
        (K::Items(Items::Single(a)), K::Items(Items::Single(b))) => {
            Ok(Merged::clean(K::Items(Items::Single(merge(path, a, Some(b), report)))))
        }
        (K::Items(Items::Tuple(a)), K::Items(Items::Tuple(b))) => {
            Ok(Merged::clean(K::Items(Items::Tuple(pairwise(kind, path, a, b, report)?))))
        }
        (K::Items(_), K::Items(_)) => Err(MergeError::Incompatible {
            keyword: kind.key().to_string(),
            reason: "single schema and tuple items cannot be combined".to_string(),
        }),
        (K::Dependencies(a), K::Dependencies(b)) => Ok(dependencies(path, a, b, report)),

        _ => Err(MergeError::Unsupported {
            keyword: kind.key().to_string(),
        }),
    }
}

fn scalar(base: &Keyword, over: &Keyword) -> Merged {
    if base == over {
        Merged::clean(base.clone())
    } else {
        Merged::conflicting(
            over.clone(),
            format!("{} replaced by {}", describe(base), describe(over)),
        )
    }
}

fn set_union(differed: bool, keyword: Keyword) -> Merged {
    if differed {
        let message = format!("combined into {}", describe(&keyword));
        Merged::conflicting(keyword, message)
    } else {
        Merged::clean(keyword)
    }
}

fn limit(base: &Limit, over: &Limit) -> Merged {
    let mut conflicts = Vec::new();
    let mut field = |name: &str, a: &Option<serde_json::Number>, b: &Option<serde_json::Number>| match (a, b) {
        (Some(x), Some(y)) if x != y => {
            conflicts.push(format!("{} {} replaced by {}", name, x, y));
            Some(y.clone())
        }
        _ => b.clone().or_else(|| a.clone()),
    };

    let merged = Limit {
        inclusive: field("inclusive", &base.inclusive, &over.inclusive),
        exclusive: field("exclusive", &base.exclusive, &over.exclusive),
    };

    if conflicts.is_empty() {
        Merged::clean(Keyword::Limit(merged))
    } else {
        Merged::conflicting(Keyword::Limit(merged), conflicts.join(", "))
    }
}

fn schema_map(
    path: &JsonPath,
    base: &BTreeMap<String, Schema>,
    over: &BTreeMap<String, Schema>,
    report: &mut MergeReport,
) -> BTreeMap<String, Schema> {
    let mut merged = base.clone();
    for (name, schema) in over {
        let child = path.child(name.as_str());
        match base.get(name) {
            Some(existing) => {
                merged.insert(name.clone(), merge(&child, existing, Some(schema), report));
            }
            None => {
                report.add(&child);
                merged.insert(name.clone(), schema.clone());
            }
        }
    }
    merged
}

fn pairwise(
    kind: KeywordKind,
    path: &JsonPath,
    base: &[Schema],
    over: &[Schema],
    report: &mut MergeReport,
) -> Result<Vec<Schema>, MergeError> {
    if base.len() != over.len() {
        return Err(MergeError::Incompatible {
            keyword: kind.key().to_string(),
            reason: format!("{} schemas cannot be paired with {}", base.len(), over.len()),
        });
    }
    Ok(base
        .iter()
        .zip(over)
        .enumerate()
        .map(|(index, (a, b))| merge(&path.child_index(index), a, Some(b), report))
        .collect())
}

fn dependencies(
    path: &JsonPath,
    base: &BTreeMap<String, Dependency>,
    over: &BTreeMap<String, Dependency>,
    report: &mut MergeReport,
) -> Merged {
    let mut merged = base.clone();
    let mut conflicts = Vec::new();

    for (name, dependency) in over {
        let child = path.child(name.as_str());
        let combined = match (base.get(name), dependency) {
            (None, _) => {
                report.add(&child);
                dependency.clone()
            }
            (Some(Dependency::Schema(a)), Dependency::Schema(b)) => {
                Dependency::Schema(merge(&child, a, Some(b), report))
            }
            (Some(Dependency::Properties(a)), Dependency::Properties(b)) => {
                if a != b {
                    conflicts.push(format!("'{}' properties combined", name));
                }
                Dependency::Properties(a.union(b).cloned().collect())
            }
            (Some(_), _) => {
                conflicts.push(format!("'{}' replaced", name));
                dependency.clone()
            }
        };
        merged.insert(name.clone(), combined);
    }

    let keyword = Keyword::Dependencies(merged);
    if conflicts.is_empty() {
        Merged::clean(keyword)
    } else {
        Merged::conflicting(keyword, conflicts.join(", "))
    }
}

fn describe(keyword: &Keyword) -> String {
    match keyword {
        Keyword::String(s) | Keyword::Uri(s) => format!("'{}'", s),
        Keyword::Number(n) => n.to_string(),
        Keyword::Integer(n) => n.to_string(),
        Keyword::Boolean(b) => b.to_string(),
        Keyword::Json(value) => value.to_string(),
        Keyword::JsonList(values) => serde_json::Value::Array(values.clone()).to_string(),
        Keyword::StringSet(names) => format!("{:?}", names),
        Keyword::Types(types) => {
            let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            format!("{:?}", names)
        }
        other => format!("{:?}", other),
    }
}
