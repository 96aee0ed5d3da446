use ctf_format::FormatError;
use ctf_store::StoreError;
use ctf_types::{ErrorKind, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("artifact {reference} not found in namespace {namespace:?}")]
    ArtifactNotFound { namespace: String, reference: String },

    #[error("unsupported repository type: {0}")]
    UnsupportedType(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArtifactNotFound { .. } | Self::UnsupportedType(_) => ErrorKind::NotFound,
            Self::Config(_) => ErrorKind::InvalidState,
            Self::Format(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Type(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
