use std::fs;
use std::io::Write;
use std::path::Path;

use ctf_store::{BlobStore, DirBlobStore};
use ctf_types::media::MEDIA_TYPE_OCTET_STREAM;
use ctf_types::ArtifactIndex;
use tempfile::NamedTempFile;

use crate::error::{FormatError, FormatResult};
use crate::format::{dir_mode, AccessOptions, FileFormat, BLOB_DIR, INDEX_FILE};
use crate::handler::{staging_dir, FormatHandler, ObjectContent};

/// Loose-file codec: the object is a directory holding the index file and a
/// blob directory.
///
/// A new object is staged privately and appears at its path on the first
/// commit. Once it exists, blobs are written into place as they are added.
/// The index file is replaced atomically on commit, but the commit as a whole
/// is best effort: a crash between blob writes and the index rename can leave
/// unreferenced blobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryFormat;

impl DirectoryFormat {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> FormatResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> FormatResult<()> {
    Ok(())
}

fn write_index(index: &ArtifactIndex, dir: &Path, file_mode: u32) -> FormatResult<()> {
    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(&index.to_json()?)?;
    staging.as_file().sync_all()?;
    let target = dir.join(INDEX_FILE);
    staging.persist(&target).map_err(|e| e.error)?;
    set_mode(&target, file_mode)
}

impl FormatHandler for DirectoryFormat {
    fn format(&self) -> FileFormat {
        FileFormat::Directory
    }

    fn exists(&self, path: &Path) -> bool {
        path.join(INDEX_FILE).is_file()
    }

    fn open(
        &self,
        path: &Path,
        read_only: bool,
        options: &mut AccessOptions,
    ) -> FormatResult<ObjectContent> {
        if options.has_source() {
            return Err(FormatError::InvalidOptions(
                "directory format cannot be read from a stream".into(),
            ));
        }
        let index_path = path.join(INDEX_FILE);
        if !index_path.is_file() {
            return Err(FormatError::NotFound(path.to_path_buf()));
        }
        let index = ArtifactIndex::from_json(&fs::read(&index_path)?)?;
        let blob_root = path.join(BLOB_DIR);
        let blobs = if read_only {
            DirBlobStore::open(blob_root, true)?
        } else {
            DirBlobStore::create(blob_root)?.with_file_mode(options.file_mode())
        };
        tracing::debug!(path = %path.display(), entries = index.len(), "opened directory object");
        Ok(ObjectContent::new(index, blobs))
    }

    fn create(&self, _path: &Path, file_mode: u32) -> FormatResult<ObjectContent> {
        let staging = staging_dir()?;
        let blobs = DirBlobStore::create(staging.path().join(BLOB_DIR))?.with_file_mode(file_mode);
        Ok(ObjectContent::staged(ArtifactIndex::new(), blobs, staging))
    }

    fn write(&self, content: &ObjectContent, path: &Path, file_mode: u32) -> FormatResult<()> {
        let blob_root = path.join(BLOB_DIR);
        if !blob_root.is_dir() {
            fs::create_dir_all(&blob_root)?;
            set_mode(path, dir_mode(file_mode))?;
            set_mode(&blob_root, dir_mode(file_mode))?;
        }
        let target = DirBlobStore::create(&blob_root)?.with_file_mode(file_mode);
        if target.root() != content.blobs.root() {
            for digest in content.blobs.digests()? {
                let blob = content.blobs.get(&digest, MEDIA_TYPE_OCTET_STREAM)?;
                target.add(blob.as_ref())?;
            }
        }
        write_index(&content.index, path, file_mode)?;
        tracing::debug!(path = %path.display(), "wrote directory object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_store::MemoryBlob;
    use ctf_types::{Descriptor, ErrorKind};

    #[test]
    fn create_write_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo");
        let codec = DirectoryFormat::new();
        assert!(!codec.exists(&path));

        let mut content = codec.create(&path, 0o644).unwrap();
        let blob = MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, &b"testdata"[..]);
        let digest = content.blobs.add(&blob).unwrap();
        content
            .index
            .add("", Descriptor::new(MEDIA_TYPE_OCTET_STREAM, digest.clone(), 8));
        codec.write(&content, &path, 0o644).unwrap();
        assert!(codec.exists(&path));

        let reopened = codec
            .open(&path, true, &mut AccessOptions::new())
            .unwrap();
        assert_eq!(reopened.index, content.index);
        assert!(reopened.blobs.has(&digest).unwrap());
        assert!(reopened.blobs.is_read_only());
        assert!(!reopened.is_staged());
    }

    #[test]
    fn create_touches_nothing_until_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo");
        let content = DirectoryFormat.create(&path, 0o644).unwrap();
        content
            .blobs
            .add(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, &b"pending"[..]))
            .unwrap();
        assert!(content.is_staged());
        assert!(!path.exists());
        drop(content);
        assert!(!path.exists());
    }

    #[test]
    fn open_without_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryFormat
            .open(dir.path(), false, &mut AccessOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn stream_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = AccessOptions::new().with_reader(Box::new(std::io::empty()));
        let err = DirectoryFormat
            .open(dir.path(), true, &mut options)
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidOptions(_)));
    }

    #[test]
    fn write_to_other_location_copies_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a");
        let content = DirectoryFormat.create(&source, 0o644).unwrap();
        let digest = content
            .blobs
            .add(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, &b"x"[..]))
            .unwrap();

        let copy = dir.path().join("b");
        DirectoryFormat.write(&content, &copy, 0o644).unwrap();
        assert!(copy.join(BLOB_DIR).join(digest.encoded()).is_file());
        assert!(copy.join(INDEX_FILE).is_file());
    }
}
