//! Schema merge engine
//!
//! Combines two loaded schemas keyword by keyword into a new schema, and
//! records what happened at each path in a [`MergeReport`].

use tracing::debug;

use crate::checksum::merged_urn;
use crate::keyword::merge::merge_keyword;
use crate::location::SchemaLocation;
use crate::pointer::JsonPath;
use crate::report::MergeReport;
use crate::schema::{Schema, SchemaBody, SchemaBuilder};
use crate::keyword::KeywordKind;

/// Merge `override_` into `base`. `path` is where `base` sits relative to
/// the top of the merge and prefixes every recorded action.
///
/// - no override: `base` is returned unchanged;
/// - either side a `$ref`: references are not deep-merged, the override wins;
/// - a `false` schema on either side conflicts, the override wins;
/// - otherwise keywords of the override are added or merged into the base;
///   `$id`/`id` never take part.
pub fn merge(path: &JsonPath, base: &Schema, override_: Option<&Schema>, report: &mut MergeReport) -> Schema {
    let Some(over) = override_ else {
        return base.clone();
    };

    if base.is_ref() || over.is_ref() {
        debug!(path = %path, base = %base.unique_uri(), "reference schema replaced by override");
        return over.clone();
    }

    match (base.as_boolean(), over.as_boolean()) {
        (_, Some(true)) => return base.clone(),
        (Some(false), Some(false)) => return base.clone(),
        (Some(false), _) | (_, Some(false)) => {
            report.conflict(path, "false schema cannot be merged");
            return over.clone();
        }
        (Some(true), None) => {}
        (None, None) => {}
    }

    let location = merged_location(base, over);
    let mut builder = SchemaBuilder::from_schema(base);
    builder.set_location(location);
    builder.remove(KeywordKind::Id);

    for (kind, keyword) in over.keywords() {
        if kind.is_identity() {
            continue;
        }
        let keyword_path = path.child(kind.key());
        match base.keyword(kind) {
            None => {
                report.add(&keyword_path);
                builder.put(kind, keyword.clone());
            }
            Some(existing) => match merge_keyword(kind, &keyword_path, existing, keyword, report) {
                Ok(merged) => {
                    match merged.conflict {
                        Some(message) => report.conflict(&keyword_path, message),
                        None => report.merged(&keyword_path),
                    }
                    builder.put(kind, merged.keyword);
                }
                Err(e) => {
                    debug!(path = %keyword_path, error = %e, "keyword merge failed, keeping base value");
                    report.error(&keyword_path, e.to_string());
                }
            },
        }
    }

    if let SchemaBody::Object { extra, .. } = over.body() {
        for (key, value) in extra {
            builder.put_extra(key.clone(), value.clone());
        }
    }

    builder.build()
}

/// Merge two top-level schemas
pub fn merge_schemas(base: &Schema, override_: &Schema) -> (Schema, MergeReport) {
    let mut report = MergeReport::new();
    let merged = merge(&JsonPath::root(), base, Some(override_), &mut report);
    debug!(actions = report.len(), conflict = report.is_conflict(), "merged schemas");
    (merged, report)
}

/// Identity derived from both inputs' absolute URIs
fn merged_location(base: &Schema, over: &Schema) -> SchemaLocation {
    match merged_urn(&base.unique_uri(), &over.unique_uri()) {
        Ok(uri) => SchemaLocation::document_root(uri),
        Err(_) => base.location().clone(),
    }
}
