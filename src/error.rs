//! Error types shared by every installation operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::versions::Channel;

#[derive(Debug, Error)]
pub enum Error {
    #[error("installation '{0}' already exists")]
    InstallationAlreadyExists(String),

    #[error("installation '{0}' does not exist")]
    InstallationDoesNotExist(String),

    #[error("the selected versions do not form a valid server build ({url})")]
    InvalidVersionCombination { url: String },

    #[error("no {0} versions available")]
    NoVersionsAvailable(Channel),

    #[error("{message}")]
    DirectoryWriteCancelled { dir: PathBuf, message: String },

    #[error("cancelled by user")]
    Cancelled,

    #[error("invalid path ({})", .0.display())]
    InvalidPath(PathBuf),

    #[error("update of '{name}' failed, installation restored: {source}")]
    UpdateFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response from {url}: {source}")]
    InvalidResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("invalid property argument: '{0}'")]
    InvalidProperty(String),
}

impl Error {
    /// True when the error is the user's cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::UpdateFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
