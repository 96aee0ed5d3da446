//! Streaming content hashing for the common transport format.
//!
//! Blobs are never required to fit in memory: digests are computed
//! incrementally while bytes flow through a reader or writer. All hashing
//! wraps the `sha2` crate; no custom cryptography.

pub mod hasher;

pub use hasher::{digest_reader, ContentHasher, HashingReader, HashingWriter};
