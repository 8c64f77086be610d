//! Schema cache keyed by absolute URI
//!
//! Shared between loads through an `Arc`. Entries are immutable schemas, so
//! two loads racing to populate the same URI are harmless: the last writer
//! wins with an equal value.

use dashmap::DashMap;
use url::Url;

use crate::location::normalize_uri;
use crate::schema::Schema;

#[derive(Default)]
pub struct SchemaCache {
    schemas: DashMap<Url, Schema>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Url) -> Option<Schema> {
        self.schemas
            .get(&normalize_uri(uri.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, uri: Url, schema: Schema) {
        self.schemas.insert(normalize_uri(uri), schema);
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.schemas.contains_key(&normalize_uri(uri.clone()))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn clear(&self) {
        self.schemas.clear();
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("entries", &self.schemas.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::JsonSchemaVersion;
    use crate::location::SchemaLocation;

    #[test]
    fn test_empty_fragment_keys_match() {
        let cache = SchemaCache::new();
        let location = SchemaLocation::parse("http://example.com/a.json").unwrap();
        let schema = Schema::boolean(location, JsonSchemaVersion::Draft7, true);

        cache.insert(Url::parse("http://example.com/a.json#").unwrap(), schema.clone());
        let hit = cache.get(&Url::parse("http://example.com/a.json").unwrap()).unwrap();
        assert!(hit.ptr_eq(&schema));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
