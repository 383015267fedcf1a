use std::path::PathBuf;
use std::time::Duration;

use crate::types::{DigestId, Stage};

/// All errors that can occur in vdigest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("{what} too large: {actual} exceeds the limit of {limit}")]
    SourceTooLarge { what: String, actual: u64, limit: u64 },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{tool} failed during {stage}: {detail}")]
    ExternalToolFailure {
        stage: Stage,
        tool: String,
        detail: String,
    },

    #[error("{tool} timed out during {stage} after {}s", .after.as_secs())]
    ToolTimeout {
        stage: Stage,
        tool: String,
        after: Duration,
    },

    #[error("could not parse {stage} output: {detail}")]
    OutputParseError { stage: Stage, detail: String },

    #[error("could not create working directory {path}: {source}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),

    #[error("digest not found: {id}")]
    DigestNotFound { id: DigestId },

    #[error("digest {id}: {message}")]
    InvalidState { id: DigestId, message: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("digest {id}: {source}")]
    InDigest {
        id: DigestId,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Attach the digest id to a failure. Errors that already name a digest
    /// are left alone.
    pub fn in_digest(self, id: &DigestId) -> Self {
        match self {
            Error::InDigest { .. } | Error::DigestNotFound { .. } | Error::InvalidState { .. } => {
                self
            }
            other => Error::InDigest {
                id: id.clone(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping digest context.
    pub fn root(&self) -> &Error {
        match self {
            Error::InDigest { source, .. } => source.root(),
            other => other,
        }
    }

    /// The pipeline stage the failure belongs to, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self.root() {
            Error::ExternalToolFailure { stage, .. }
            | Error::ToolTimeout { stage, .. }
            | Error::OutputParseError { stage, .. } => Some(*stage),
            Error::WorkingDirectory { .. } => Some(Stage::Alignment),
            _ => None,
        }
    }
}
