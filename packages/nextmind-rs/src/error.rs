use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NextMindError {
    #[error("No recording found at {path}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    #[error("Malformed metadata in {path}: key '{key}' has invalid value '{value}' ({reason})")]
    MetadataParse {
        path: PathBuf,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Cannot infer layout of {path} ({byte_len} bytes): {reason}")]
    Inference {
        path: PathBuf,
        byte_len: u64,
        reason: String,
    },

    #[error(
        "Truncated payload in {path}: {byte_len} bytes is not a multiple of the {frame_bytes}-byte frame ({hypothesis})"
    )]
    TruncatedFile {
        path: PathBuf,
        byte_len: u64,
        frame_bytes: u64,
        hypothesis: String,
    },

    #[error("Invalid filter parameters: {0}")]
    InvalidFilterParams(String),

    #[error("Payload of {path} is {byte_len} bytes, above the {limit}-byte ceiling")]
    OversizedFile {
        path: PathBuf,
        byte_len: u64,
        limit: u64,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl NextMindError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NextMindError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable name of the error kind, used by the CLI reports.
    pub fn kind(&self) -> &'static str {
        match self {
            NextMindError::NotFound { .. } => "not_found",
            NextMindError::MetadataParse { .. } => "metadata_parse",
            NextMindError::Inference { .. } => "inference",
            NextMindError::TruncatedFile { .. } => "truncated_file",
            NextMindError::InvalidFilterParams(_) => "invalid_filter_params",
            NextMindError::OversizedFile { .. } => "oversized_file",
            NextMindError::Io { .. } => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, NextMindError>;
