//! Error types for the corpus layer.
//!
//! Two families:
//! - [`CorpusError`]: fatal problems with the corpus itself (missing or
//!   malformed documents). The corpus is assumed internally consistent, so
//!   these abort the run.
//! - [`LookupError`]: name-resolution failures (unknown names, unresolved
//!   overloads, missing labels). These are reported per directive by the
//!   caller.
//!
//! Dangling cross-references inside type expressions are deliberately *not*
//! errors: they degrade to raw text with a warning (see `emit` in the
//! doxbind crate).

use std::path::PathBuf;

use thiserror::Error;

use crate::xml::XmlError;

/// Fatal corpus failures: a document that should exist and parse does not.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A corpus document could not be read.
    #[error("failed to read corpus document {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A corpus document could not be parsed.
    #[error("malformed corpus document {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },

    /// A corpus document parsed but is missing required structure.
    #[error("malformed corpus document {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    /// A detail document is missing a definition it is expected to carry.
    #[error("corpus document {} does not document '{refid}'", path.display())]
    MissingDefinition { path: PathBuf, refid: String },

    /// An entity was referenced but its detail never became available.
    #[error("failed to load detail for '{name}'")]
    Undocumented { name: String },
}

impl CorpusError {
    /// Create an IO error for the given document path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Name-resolution failures against the symbol graph.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No scope prefix yielded a match for the name.
    #[error("name '{name}' not found in scope '{scope}'")]
    NameNotFound { name: String, scope: String },

    /// A single-target query hit an overload set with several visible members.
    #[error("unresolved overloads for '{name}' ({count} visible candidates)")]
    Ambiguous { name: String, count: usize },

    /// A single-target query hit an overload set with no visible members.
    #[error("'{name}' has no visible overloads")]
    NoVisibleOverload { name: String },

    /// No member of the overload set carries or satisfies the label.
    #[error("no overload of '{name}' matches label '{label}'")]
    LabelNotFound { name: String, label: String },

    /// A lazy load performed during lookup failed.
    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

/// Result type for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_not_found_display() {
        let err = LookupError::NameNotFound {
            name: "Foo::bar".to_string(),
            scope: "img::geom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "name 'Foo::bar' not found in scope 'img::geom'"
        );
    }

    #[test]
    fn ambiguous_display_includes_count() {
        let err = LookupError::Ambiguous {
            name: "ns::Foo::bar".to_string(),
            count: 3,
        };
        assert!(err.to_string().contains("3 visible candidates"));
    }

    #[test]
    fn corpus_io_error_carries_path() {
        let err = CorpusError::io(
            "/corpus/xml/index.xml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/corpus/xml/index.xml"));
    }
}
