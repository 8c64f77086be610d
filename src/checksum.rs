//! Content-derived identities
//!
//! Documents loaded without a URI and schemas produced by a merge have no
//! natural address, so they are named after a SHA-256 digest instead.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// SHA-256 checksum in lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    pub fn from_str(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Checksum of a JSON value. Object keys serialize sorted, so equal
    /// values produce equal checksums regardless of source key order.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_str(&canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `urn:sha256:<hex>`
    pub fn to_urn(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("urn:sha256:{}", self.0))
    }
}

/// Document URI for a document that was loaded without one
pub fn document_urn(document: &serde_json::Value) -> Result<Url, url::ParseError> {
    Checksum::from_json(document).to_urn()
}

/// Identity of the schema produced by merging `base` with `override_uri`
pub fn merged_urn(base: &Url, override_uri: &Url) -> Result<Url, url::ParseError> {
    let checksum = Checksum::from_str(&format!("{}|{}", base, override_uri));
    Url::parse(&format!("urn:merge:{}", checksum.as_str()))
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"type": "string", "minLength": 1}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"minLength": 1, "type": "string"}"#).unwrap();
        assert_eq!(Checksum::from_json(&a), Checksum::from_json(&b));
    }

    #[test]
    fn test_document_urn() {
        let urn = document_urn(&json!({"type": "object"})).unwrap();
        assert_eq!(urn.scheme(), "urn");
        assert!(urn.as_str().starts_with("urn:sha256:"));
        assert_ne!(urn, document_urn(&json!({"type": "array"})).unwrap());
    }

    #[test]
    fn test_merged_urn_is_order_sensitive() {
        let a = Url::parse("http://example.com/a.json").unwrap();
        let b = Url::parse("http://example.com/b.json").unwrap();
        assert_eq!(merged_urn(&a, &b).unwrap(), merged_urn(&a, &b).unwrap());
        assert_ne!(merged_urn(&a, &b).unwrap(), merged_urn(&b, &a).unwrap());
    }
}
