//! Content-addressed blob storage for the common transport format.
//!
//! A blob is a byte sequence with stable identity: digest, size, and media
//! type. Blobs live in memory, in a plain file, or in a temporary file that is
//! deleted once its last handle is released. A [`BlobStore`] holds the blobs
//! of one repository object, keyed by digest.
//!
//! # Blob Kinds
//!
//! - [`MemoryBlob`] -- in-memory buffer
//! - [`FileBlob`] -- regular file owned by someone else
//! - [`TempBlob`] -- reference-counted temporary file
//! - [`TypedBlob`] -- another blob under a different media type
//!
//! # Design Rules
//!
//! 1. Digest is the sole dedup key; adding known content is a no-op.
//! 2. Write-then-link: stream to a staging file, verify, then rename.
//! 3. Stored blobs are never mutated.

pub mod blob;
pub mod dir;
pub mod error;
pub mod traits;

pub use blob::{BlobAccess, FileBlob, MemoryBlob, TempBlob, TypedBlob};
pub use dir::DirBlobStore;
pub use error::{StoreError, StoreResult};
pub use traits::BlobStore;
