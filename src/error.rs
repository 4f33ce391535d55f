use crate::format::ResourceType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoxError {
    #[error("Invalid magic number in archive header")]
    InvalidMagic,

    #[error("Unsupported archive version: {found} (supported: {supported})")]
    UnsupportedVersion { found: u8, supported: u8 },

    #[error("Archive is encrypted (nonzero IV); encrypted archives are not supported")]
    Encrypted,

    #[error("Truncated archive: {0}")]
    Truncated(&'static str),

    #[error("Resource not found: {0}")]
    MissingResource(String),

    #[error("Resource type mismatch for {name}: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        name: String,
        expected: ResourceType,
        found: ResourceType,
    },

    #[error("Duplicate resource name: {0}")]
    DuplicateResource(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Decode failed for {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("Asset source error for {path}: {reason}")]
    AssetSource { path: String, reason: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BoxError>;
