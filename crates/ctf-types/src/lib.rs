//! Foundation types for the common transport format (CTF).
//!
//! Every other `ctf-*` crate depends on this one. It defines how artifacts
//! are named and catalogued, independent of how an object is physically
//! encoded on disk.
//!
//! # Key Types
//!
//! - [`Digest`]: algorithm-tagged content hash (`sha256:<hex>`)
//! - [`Descriptor`]: digest, media type, size, and annotations of one blob
//! - [`ArtifactIndex`]: ordered descriptor table with namespaces and tags
//! - [`ArtifactContent`]: parsed OCI manifest or image index
//! - [`ErrorKind`]: the error taxonomy shared across the workspace

pub mod descriptor;
pub mod digest;
pub mod error;
pub mod index;
pub mod manifest;
pub mod media;

pub use descriptor::{validate_tag, Descriptor};
pub use digest::{Digest, DigestAlgorithm};
pub use error::{ErrorKind, TypeError};
pub use index::{ArtifactIndex, INDEX_SCHEMA_VERSION};
pub use manifest::{ArtifactContent, ImageIndex, Manifest};
