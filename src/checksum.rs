//! Schema fingerprints for the client-side compatibility cache

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 fingerprint of a schema's registry JSON
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute a fingerprint from schema JSON text
    pub fn of_schema(schema_json: &str) -> Self {
        Self::from_bytes(schema_json.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_consistency() {
        let schema = r#"{"type":"record","name":"Foo","fields":[]}"#;
        assert_eq!(Fingerprint::of_schema(schema), Fingerprint::of_schema(schema));
        assert_eq!(Fingerprint::of_schema(schema).as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_different_content() {
        let first = Fingerprint::of_schema(r#"{"name": "Foo"}"#);
        let second = Fingerprint::of_schema(r#"{"name": "Bar"}"#);
        assert_ne!(first, second);
    }
}
