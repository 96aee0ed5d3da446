use ctf_types::{Digest, ErrorKind, TypeError};

/// Errors from blob and blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob is not in the store.
    #[error("blob not found: {0}")]
    NotFound(Digest),

    /// Content hash mismatch (data corruption or a lying descriptor).
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: Digest, computed: Digest },

    /// Content length differs from the declared size.
    #[error("size mismatch for {digest}: expected {expected}, got {actual}")]
    SizeMismatch {
        digest: Digest,
        expected: u64,
        actual: u64,
    },

    /// The store was opened read-only.
    #[error("blob store is read-only")]
    ReadOnly,

    /// The blob handle was already released.
    #[error("blob is closed")]
    Closed,

    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DigestMismatch { .. } | Self::SizeMismatch { .. } => ErrorKind::Integrity,
            Self::ReadOnly | Self::Closed => ErrorKind::InvalidState,
            Self::Type(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
