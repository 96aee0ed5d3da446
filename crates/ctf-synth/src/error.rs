use ctf_format::FormatError;
use ctf_repo::RepoError;
use ctf_store::StoreError;
use ctf_types::{Digest, ErrorKind, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("artifact set has no main artifact")]
    MissingMainArtifact,

    #[error("artifact graph references missing blob {0}")]
    MissingBlob(Digest),

    #[error("artifact graph cycles back to {0}")]
    Cycle(Digest),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SynthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingMainArtifact | Self::MissingBlob(_) => ErrorKind::NotFound,
            Self::Cycle(_) => ErrorKind::Integrity,
            Self::Repo(e) => e.kind(),
            Self::Format(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Type(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type SynthResult<T> = Result<T, SynthError>;
