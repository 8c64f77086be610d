//! Raw document supply
//!
//! The loader never performs I/O. Documents that a `$ref` points outside the
//! current document come from a [`DocumentClient`], which also remembers
//! which documents have already been loaded.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};
use crate::location::strip_fragment;

/// Source of raw JSON documents, keyed by absolute URI without fragment
pub trait DocumentClient: Send + Sync {
    /// Fetch a document that is not loaded yet
    fn fetch_document(&self, uri: &Url) -> Result<Arc<Value>>;

    /// A document previously registered as loaded
    fn find_loaded_document(&self, uri: &Url) -> Option<Arc<Value>>;

    fn register_loaded_document(&self, uri: &Url, document: Arc<Value>);
}

/// Document client backed by documents handed to it up front
#[derive(Debug, Default)]
pub struct InMemoryDocumentClient {
    available: DashMap<Url, Arc<Value>>,
    loaded: DashMap<Url, Arc<Value>>,
}

impl InMemoryDocumentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`InMemoryDocumentClient::insert`]
    pub fn with_document(self, uri: Url, document: Value) -> Self {
        self.insert(uri, document);
        self
    }

    /// Make `document` fetchable at `uri`
    pub fn insert(&self, uri: Url, document: Value) {
        self.available.insert(strip_fragment(&uri), Arc::new(document));
    }

    /// Every `*.json` file under `dir`, addressed relative to `base`
    /// (`<dir>/types/id.json` becomes `<base>types/id.json`)
    pub fn from_directory(dir: &Path, base: &Url) -> Result<Self> {
        let client = Self::new();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        {
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let uri = base.join(&relative.join("/"))?;

            let content = std::fs::read_to_string(entry.path())?;
            match serde_json::from_str::<Value>(&content) {
                Ok(document) => {
                    debug!(uri = %uri, "registered document");
                    client.insert(uri, document);
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping unparsable document"),
            }
        }

        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// URIs of every fetchable document
    pub fn uris(&self) -> Vec<Url> {
        let mut uris: Vec<Url> = self.available.iter().map(|e| e.key().clone()).collect();
        uris.sort();
        uris
    }
}

impl DocumentClient for InMemoryDocumentClient {
    fn fetch_document(&self, uri: &Url) -> Result<Arc<Value>> {
        let key = strip_fragment(uri);
        match self.available.get(&key) {
            Some(document) => {
                let document = document.value().clone();
                self.loaded.insert(key, document.clone());
                Ok(document)
            }
            None => Err(SchemaError::DocumentNotFound {
                uri: key.to_string(),
            }),
        }
    }

    fn find_loaded_document(&self, uri: &Url) -> Option<Arc<Value>> {
        self.loaded
            .get(&strip_fragment(uri))
            .map(|entry| entry.value().clone())
    }

    fn register_loaded_document(&self, uri: &Url, document: Arc<Value>) {
        self.loaded.insert(strip_fragment(uri), document);
    }
}
