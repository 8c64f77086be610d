//! Schema Graph
//!
//! Draft-aware construction, reference resolution and merging of JSON
//! Schema documents (drafts 3 through 7).
//!
//! ## Features
//!
//! - **Addressing**: JSON pointers and canonical schema locations that follow `$id` rescoping
//! - **Keyword Catalog**: Every keyword of every draft, with per-draft shapes and digesters
//! - **Immutable Schemas**: Cheap to clone, safe to share, cyclic references included
//! - **Reference Resolution**: In-document, embedded and remote `$ref`s with a hop cap
//! - **Merging**: Override-wins merges with an ADD / MERGE / CONFLICT / ERROR report
//! - **Reference Graph**: Recursive groups and DOT export over loaded schemas
//!
//! ## Architecture
//!
//! ```text
//! JSON document
//!   └── SchemaLoader ── DocumentClient (remote documents)
//!         ├── resolver      (finds $ref targets)
//!         ├── keyword/digest (raw value -> Keyword, per draft)
//!         └── SchemaCache    (by unique URI)
//!               └── Schema ── to_json(draft) / merge / ReferenceGraph
//! ```

pub mod analysis;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod document;
pub mod draft;
pub mod error;
pub mod keyword;
pub mod loader;
pub mod location;
pub mod merge;
pub mod pointer;
pub mod report;
pub mod resolver;
pub mod schema;

pub use analysis::{EdgeKind, ReferenceGraph};
pub use cache::SchemaCache;
pub use checksum::Checksum;
pub use config::{GraphConfig, OutputFormat};
pub use document::{DocumentClient, InMemoryDocumentClient};
pub use draft::{JsonSchemaVersion, JsonType, VersionSet};
pub use error::{MergeError, Result, SchemaError};
pub use keyword::project::{DraftView, SerializeOptions};
pub use keyword::{Keyword, KeywordCatalog, KeywordInfo, KeywordKind};
pub use loader::{LoaderConfig, SchemaLoader, DEFAULT_MAX_REF_HOPS};
pub use location::SchemaLocation;
pub use merge::{merge, merge_schemas};
pub use pointer::JsonPath;
pub use report::{IssueKind, LoadingIssue, LoadingReport, MergeAction, MergeActionType, MergeReport, Severity};
pub use schema::{RefSchema, Schema, SchemaBody, SchemaBuilder};
