//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading sources, decoding payloads or starting playback.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid source list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data URI: {0}")]
    DataUri(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("audio backend error: {0}")]
    Backend(String),

    #[error("audio start aborted at `{label}`: {cause}")]
    StartAborted {
        label: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("audio is already running")]
    AlreadyActive,

    #[error("no sources found (both fetch and embedded failed)")]
    NoSources,

    #[error("duplicate source id `{0}`")]
    DuplicateId(String),
}

impl From<symphonia::core::errors::Error> for Error {
    fn from(e: symphonia::core::errors::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
