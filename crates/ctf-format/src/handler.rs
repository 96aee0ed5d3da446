use std::path::Path;

use ctf_store::DirBlobStore;
use ctf_types::ArtifactIndex;
use tempfile::TempDir;

use crate::error::FormatResult;
use crate::format::{AccessOptions, FileFormat};

/// Private working directory for content not yet committed to its target.
pub(crate) fn staging_dir() -> FormatResult<TempDir> {
    Ok(tempfile::Builder::new().prefix("ctf-staging").tempdir()?)
}

/// In-memory index plus blob store of one object, as produced by a codec.
///
/// New objects and opened archives live in a private staging directory that
/// lasts as long as the content; an opened directory object works on the
/// target in place.
#[derive(Debug)]
pub struct ObjectContent {
    pub index: ArtifactIndex,
    pub blobs: DirBlobStore,
    pub(crate) staging: Option<TempDir>,
}

impl ObjectContent {
    pub fn new(index: ArtifactIndex, blobs: DirBlobStore) -> Self {
        Self {
            index,
            blobs,
            staging: None,
        }
    }

    pub(crate) fn staged(index: ArtifactIndex, blobs: DirBlobStore, staging: TempDir) -> Self {
        Self {
            index,
            blobs,
            staging: Some(staging),
        }
    }

    pub fn is_staged(&self) -> bool {
        self.staging.is_some()
    }
}

/// One physical encoding of the object layout.
///
/// Every codec shares the same logical layout: an index file named
/// [`INDEX_FILE`](crate::INDEX_FILE) and one entry per blob under
/// [`BLOB_DIR`](crate::BLOB_DIR). Codecs differ only in how that layout is
/// serialized.
pub trait FormatHandler: Send + Sync {
    fn format(&self) -> FileFormat;

    /// Whether an object in this format exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Decode an existing object from `path` or from the source in `options`.
    fn open(
        &self,
        path: &Path,
        read_only: bool,
        options: &mut AccessOptions,
    ) -> FormatResult<ObjectContent>;

    /// Start a new, empty object destined for `path`.
    fn create(&self, path: &Path, file_mode: u32) -> FormatResult<ObjectContent>;

    /// Persist `content` at `path`.
    fn write(&self, content: &ObjectContent, path: &Path, file_mode: u32) -> FormatResult<()>;
}
