//! Error types for collection-index.
//!
//! Library crates use [`IndexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::diagnostics::Diagnostic;

/// Top-level error type for all index generation operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Conflicting input modes were supplied (e.g. files and folders together).
    #[error("usage conflict: {message}")]
    UsageConflict { message: String },

    /// A source could not be parsed, or a collection object is missing a field.
    #[error("malformed input in {source_name}: {message}")]
    MalformedInput {
        source_name: String,
        message: String,
    },

    /// No collection object was extracted from any source.
    ///
    /// Carries whatever was dropped or skipped on the way.
    #[error("no collections found in the supplied inputs{}", skipped_note(.diagnostics))]
    NoCollectionsFound { diagnostics: Vec<Diagnostic> },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Index invariant violation or serialization failure.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Create a usage conflict from any displayable message.
    pub fn usage_conflict(msg: impl Into<String>) -> Self {
        Self::UsageConflict {
            message: msg.into(),
        }
    }

    /// Create a malformed-input error attributed to a named source.
    pub fn malformed(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedInput {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// No collections, with nothing skipped along the way.
    pub fn no_collections() -> Self {
        Self::NoCollectionsFound {
            diagnostics: Vec::new(),
        }
    }

    /// Whether this error is scoped to a single source and may be skipped
    /// under a skip-and-warn policy.
    pub fn is_source_scoped(&self) -> bool {
        matches!(self, Self::MalformedInput { .. } | Self::Io { .. })
    }
}

fn skipped_note(diagnostics: &[Diagnostic]) -> String {
    match diagnostics.len() {
        0 => String::new(),
        n => format!(" ({n} inputs skipped)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = IndexError::usage_conflict("cannot use files and folders together");
        assert_eq!(
            err.to_string(),
            "usage conflict: cannot use files and folders together"
        );

        let err = IndexError::malformed("a.json", "missing field `modified`");
        assert!(err.to_string().contains("a.json"));
        assert!(err.to_string().contains("`modified`"));

        assert_eq!(
            IndexError::no_collections().to_string(),
            "no collections found in the supplied inputs"
        );

        let err = IndexError::NoCollectionsFound {
            diagnostics: vec![Diagnostic::InvalidBundle {
                position: 0,
                bundle_id: None,
            }],
        };
        assert_eq!(
            err.to_string(),
            "no collections found in the supplied inputs (1 inputs skipped)"
        );
    }

    #[test]
    fn source_scoped_errors() {
        assert!(IndexError::malformed("x", "bad").is_source_scoped());
        assert!(
            IndexError::io(
                "x.json",
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone")
            )
            .is_source_scoped()
        );
        assert!(!IndexError::no_collections().is_source_scoped());
        assert!(!IndexError::usage_conflict("both").is_source_scoped());
    }
}
