use std::path::PathBuf;

use ctf_store::StoreError;
use ctf_types::{Digest, ErrorKind, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown file format: {0}")]
    UnknownFormat(String),

    #[error("no transport object at {}", .0.display())]
    NotFound(PathBuf),

    #[error("transport object already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("object is opened read-only")]
    ReadOnly,

    #[error("object is closed")]
    Closed,

    #[error("invalid access options: {0}")]
    InvalidOptions(String),

    #[error("object lock poisoned")]
    Poisoned,

    #[error("index references missing blob {0}")]
    MissingBlob(Digest),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownFormat(_) | Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_)
            | Self::ReadOnly
            | Self::Closed
            | Self::InvalidOptions(_)
            | Self::Poisoned => ErrorKind::InvalidState,
            Self::MissingBlob(_) | Self::CorruptArchive(_) => ErrorKind::Integrity,
            Self::Store(e) => e.kind(),
            Self::Type(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type FormatResult<T> = Result<T, FormatError>;
