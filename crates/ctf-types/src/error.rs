use thiserror::Error;

use crate::digest::Digest;

/// Coarse error classification shared by every crate in the workspace.
///
/// Synthesis and extraction pipelines branch on the kind, never on message
/// text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown format identifier, missing digest, namespace, or tag.
    NotFound,
    /// Mutation on a read-only or closed object, or an illegal option mix.
    InvalidState,
    /// Digest mismatch, malformed content, or a dangling index reference.
    Integrity,
    /// Underlying storage read/write failure.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::Integrity => write!(f, "integrity"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid digest {digest:?}: {reason}")]
    InvalidDigest { digest: String, reason: String },

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("digest {0} is not part of the index")]
    UnknownDigest(Digest),

    #[error("invalid tag {0:?}")]
    InvalidTag(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TypeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownDigest(_) | Self::UnsupportedMediaType(_) => ErrorKind::NotFound,
            Self::InvalidTag(_) => ErrorKind::InvalidState,
            Self::InvalidDigest { .. } | Self::UnsupportedAlgorithm(_) | Self::Serialization(_) => {
                ErrorKind::Integrity
            }
        }
    }
}
