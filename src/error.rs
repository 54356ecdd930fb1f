//! Typed errors for the store, configuration and summarizer seams.
//!
//! The binary boundary still speaks `Box<dyn Error>`; these enums exist so
//! callers can tell a missing day file apart from a broken one, and so the
//! summarizer batch loop can record *why* a record fell back to a sentinel.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the per-day record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no day file at {}", .0.display())]
    NotFound(PathBuf),

    #[error("day file {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("day file {} is locked by another writer", .0.display())]
    Locked(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Failures while loading `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing environment variable: {0}")]
    MissingEnv(String),
}

/// Why a single record could not be annotated by the model.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response field `{field}` outside vocabulary: {value}")]
    Vocabulary { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_detectable() {
        let err = StoreError::NotFound(PathBuf::from("/tmp/Local_news_20250101.json"));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Local_news_20250101.json"));
    }

    #[test]
    fn test_vocabulary_error_names_field() {
        let err = SummarizeError::Vocabulary {
            field: "标签",
            value: "体育新闻".into(),
        };
        assert_eq!(
            err.to_string(),
            "response field `标签` outside vocabulary: 体育新闻"
        );
    }
}
