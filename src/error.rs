//! Error types for spec validation and container persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by spec construction and container save/load.
///
/// Every variant is fatal to the operation that raised it; nothing is retried
/// internally and no partial objects are ever returned.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Duplicate or empty dependency names, a narrow target that does not
    /// exist, or a malformed extras field.
    #[error("invalid dependency spec: {0}")]
    Validation(String),

    /// Ambiguous or unrecognized node shape in canonical spec JSON.
    #[error("unrecognized spec shape: {0}")]
    Shape(String),

    /// A composite construction or append would duplicate a name somewhere
    /// in the flattened tree.
    #[error("dependency overlap: {0}")]
    Disjointness(String),

    /// One of the four expected files in a model directory is absent.
    #[error("missing file in model directory: {}", path.display())]
    MissingFile { path: PathBuf },

    /// Every registered backend failed; `last` is the final backend's error,
    /// kept so the failure stays debuggable.
    #[error("all {tried} registered backend(s) failed")]
    BackendExhausted {
        tried: usize,
        #[source]
        last: anyhow::Error,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_display_names_the_file() {
        let err = StoreError::MissingFile {
            path: PathBuf::from("/tmp/m/extras.json"),
        };
        assert!(format!("{err}").contains("extras.json"));
    }

    #[test]
    fn test_backend_exhausted_keeps_last_error_as_source() {
        use std::error::Error;

        let err = StoreError::BackendExhausted {
            tried: 2,
            last: anyhow::anyhow!("disk full"),
        };
        assert!(format!("{err}").contains("2 registered backend(s)"));
        let source = err.source().expect("source");
        assert!(source.to_string().contains("disk full"));
    }
}
