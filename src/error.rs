// src/error.rs

//! Error types for nsrewrite
//!
//! Errors fall into four families with different blast radius:
//!
//! | Variant | Raised | Effect |
//! |---------|--------|--------|
//! | `Config` | while installing rule tables | fatal, before any I/O |
//! | `Transform` | while rewriting one resource | recorded per entry inside a container |
//! | `Io` / `Archive` | while reading or writing a container | fatal for that container |
//! | `Consistency` | when rule tables disagree with a selected resource | fatal |

use std::path::PathBuf;
use thiserror::Error;

/// Result type for nsrewrite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a transformation
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or inconsistent rule tables
    #[error("configuration error: {0}")]
    Config(String),

    /// A single resource could not be parsed or rebuilt
    #[error("failed to transform {resource}: {message}")]
    Transform { resource: String, message: String },

    /// The rule tables do not cover a resource that was selected for them
    #[error("consistency error: {0}")]
    Consistency(String),

    /// No action accepts a top-level resource
    #[error("no action accepts resource: {0}")]
    NoAction(String),

    /// File system failure on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File system failure without a path of its own (in-memory streams)
    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),

    /// ZIP container could not be read or written
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transform error for a named resource
    pub fn transform(resource: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transform {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a container may record this error against one entry and carry on
    pub fn is_entry_recoverable(&self) -> bool {
        matches!(self, Self::Transform { .. } | Self::Archive(_) | Self::Stream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_names_resource() {
        let err = Error::transform("a/B.class", "bad magic");
        assert_eq!(err.to_string(), "failed to transform a/B.class: bad magic");
        assert!(err.is_entry_recoverable());
    }

    #[test]
    fn test_config_and_consistency_are_fatal() {
        assert!(!Error::config("x").is_entry_recoverable());
        assert!(!Error::Consistency("x".into()).is_entry_recoverable());
        assert!(!Error::io("/tmp/x", std::io::Error::other("boom")).is_entry_recoverable());
    }
}
