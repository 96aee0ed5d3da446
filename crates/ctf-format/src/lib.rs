//! Physical encodings of a transport-format object.
//!
//! Every object has the same logical layout: an index file plus one entry per
//! blob, keyed by digest. This crate serializes that layout as loose files or
//! as a tar stream (plain, gzip, or zstd) and governs the open/modify/close
//! lifecycle of one object.
//!
//! # Architecture
//!
//! - [`FormatHandler`]: one codec (open, create, write)
//! - [`FormatRegistry`]: explicit format-identifier to codec mapping
//! - [`AccessObject`]: an open object with dirty tracking and atomic commit
//!
//! # Layout
//!
//! ```text
//! artifact-index.json
//! blobs/
//!   sha256.<hex>
//!   ...
//! ```

pub mod archive;
pub mod directory;
pub mod error;
pub mod format;
pub mod handler;
pub mod object;
pub mod registry;

pub use archive::ArchiveFormat;
pub use directory::DirectoryFormat;
pub use error::{FormatError, FormatResult};
pub use format::{
    dir_mode, AccessMode, AccessOptions, Compression, FileFormat, BLOB_DIR, DEFAULT_FILE_MODE,
    INDEX_FILE,
};
pub use handler::{FormatHandler, ObjectContent};
pub use object::{AccessObject, ObjectState};
pub use registry::FormatRegistry;
