//! Error types for the compatibility gate

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors that abort a compatibility run (plus the final incompatibility verdict)
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Unable to resolve schema from {}: {source}", .path.display())]
    Resolution {
        path: PathBuf,
        #[source]
        source: ResolutionCause,
    },

    #[error("Unable to parse imports [{}]: {source}", display_paths(.paths))]
    Imports {
        paths: Vec<PathBuf>,
        #[source]
        source: apache_avro::Error,
    },

    #[error("Schema registry call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Schema file discovery failed in {}: {message}", .directory.display())]
    Discovery { directory: PathBuf, message: String },

    #[error("Invalid subject name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} local schema(s) found to be incompatible with current version in remote schema registry:\n{}", .incompatibilities.len(), format_incompatibilities(.incompatibilities))]
    Incompatible { incompatibilities: Vec<Incompatibility> },
}

/// Underlying cause of a schema resolution failure
#[derive(Error, Debug)]
pub enum ResolutionCause {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Avro parse error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("missing required schema field '{0}'")]
    MissingMetadata(&'static str),

    #[error("type '{0}' not found after parsing")]
    TypeNotDefined(String),
}

/// Failures talking to the remote schema registry
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry responded with {status}{}: {message}", error_code_suffix(.error_code))]
    Status {
        status: u16,
        error_code: Option<i64>,
        message: String,
    },

    #[error("invalid registry URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid basic auth user info: expected 'user:password'")]
    InvalidUserInfo,

    #[error("no registry URLs configured")]
    NoUrls,
}

/// A single local schema found incompatible with a registry subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    pub type_name: String,
    pub subject: String,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schema type '{}' is not compatible with schema registry subject '{}'",
            self.type_name, self.subject
        )
    }
}

fn error_code_suffix(code: &Option<i64>) -> String {
    match code {
        Some(code) => format!(" (error code {code})"),
        None => String::new(),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_incompatibilities(items: &[Incompatibility]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl GateError {
    pub(crate) fn resolution(path: impl Into<PathBuf>, source: impl Into<ResolutionCause>) -> Self {
        GateError::Resolution {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_message_enumerates_pairs() {
        let err = GateError::Incompatible {
            incompatibilities: vec![
                Incompatibility {
                    type_name: "com.example.Bar".to_string(),
                    subject: "orders-com.example.Bar-value".to_string(),
                },
                Incompatibility {
                    type_name: "com.example.Baz".to_string(),
                    subject: "audit-com.example.Baz-value".to_string(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("2 local schema(s)"));
        assert!(message.contains(
            "schema type 'com.example.Bar' is not compatible with schema registry subject 'orders-com.example.Bar-value'"
        ));
        assert!(message.contains("'audit-com.example.Baz-value'"));
    }

    #[test]
    fn test_status_error_includes_code() {
        let err = RemoteError::Status {
            status: 404,
            error_code: Some(40401),
            message: "Subject not found.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "registry responded with 404 (error code 40401): Subject not found."
        );
    }
}
