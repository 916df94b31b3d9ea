//! Error types for catalog generation.

use thiserror::Error;

/// Errors that can occur while classifying paths and building STAC documents.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown dataset group: {0}")]
    UnknownGroup(String),

    #[error("Unrecognized path (no version marker found): {path}")]
    UnrecognizedPath { path: String },

    #[error("Malformed filename {path}: {reason}")]
    MalformedFilename { path: String, reason: String },

    #[error("Asset '{key}' not found at {href}: {reason}")]
    AssetNotFound {
        key: String,
        href: String,
        reason: String,
    },

    #[error("Item {item_id} has an incomplete asset set (missing: {missing:?}, unexpected: {unexpected:?})")]
    IncompleteAssets {
        item_id: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Document {document} failed validation: {}", issues.join("; "))]
    InvalidDocument { document: String, issues: Vec<String> },

    #[error("Item {id} would be written twice to {path}")]
    DuplicateItem { id: String, path: String },

    #[error("Failed to read or write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl Error {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Error::MalformedFilename {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;
