use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use ctf_crypto::{HashingReader, HashingWriter};
use ctf_types::{Digest, DigestAlgorithm};
use tempfile::NamedTempFile;

use crate::blob::{BlobAccess, FileBlob};
use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Blob store over a flat directory of `sha256.<hex>` files.
///
/// Writes go to a hidden temporary file in the same directory and are renamed
/// into place only after the digest has been verified, so a blob file under
/// its final name always holds exactly the content it is named after.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
    read_only: bool,
    file_mode: Option<u32>,
}

impl DirBlobStore {
    /// Open an existing blob directory.
    pub fn open(root: impl Into<PathBuf>, read_only: bool) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("blob directory {} does not exist", root.display()),
            )));
        }
        Ok(Self {
            root,
            read_only,
            file_mode: None,
        })
    }

    /// Create (or reuse) a writable blob directory.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            read_only: false,
            file_mode: None,
        })
    }

    /// Permission bits applied to newly stored blob files (unix only).
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the file that holds (or would hold) `digest`.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.encoded())
    }

    /// Re-hash a stored blob and compare it against its name.
    pub fn verify(&self, digest: &Digest) -> StoreResult<()> {
        let path = self.blob_path(digest);
        if !path.is_file() {
            return Err(StoreError::NotFound(digest.clone()));
        }
        let mut reader = HashingReader::new(File::open(&path)?, digest.algorithm());
        io::copy(&mut reader, &mut io::sink())?;
        let (computed, _) = reader.finish();
        if computed != *digest {
            return Err(StoreError::DigestMismatch {
                expected: digest.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Total bytes held by stored blobs.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        let mut total = 0;
        for digest in self.digests()? {
            total += fs::metadata(self.blob_path(&digest))?.len();
        }
        Ok(total)
    }

    #[cfg(unix)]
    fn apply_mode(&self, path: &Path) -> StoreResult<()> {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = self.file_mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn apply_mode(&self, _path: &Path) -> StoreResult<()> {
        Ok(())
    }
}

impl BlobStore for DirBlobStore {
    fn add(&self, blob: &dyn BlobAccess) -> StoreResult<Digest> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let declared = blob.declared_digest();
        if let Some(digest) = &declared {
            if self.blob_path(digest).is_file() {
                tracing::trace!(%digest, "blob already present");
                return Ok(digest.clone());
            }
        }

        let algorithm = declared
            .as_ref()
            .map(Digest::algorithm)
            .unwrap_or(DigestAlgorithm::Sha256);
        let staging = NamedTempFile::new_in(&self.root)?;
        let mut writer = HashingWriter::new(BufWriter::new(staging), algorithm);
        io::copy(&mut blob.reader()?, &mut writer)?;
        let (buffered, digest, size) = writer.finish();
        let staging = buffered.into_inner().map_err(|e| e.into_error())?;

        if let Some(expected) = declared {
            if expected != digest {
                return Err(StoreError::DigestMismatch {
                    expected,
                    computed: digest,
                });
            }
        }
        let expected_size = blob.size()?;
        if expected_size != size {
            return Err(StoreError::SizeMismatch {
                digest,
                expected: expected_size,
                actual: size,
            });
        }

        let target = self.blob_path(&digest);
        if target.is_file() {
            tracing::trace!(%digest, "blob already present");
            return Ok(digest);
        }
        staging.persist(&target).map_err(|e| e.error)?;
        self.apply_mode(&target)?;
        tracing::debug!(%digest, size, "stored blob");
        Ok(digest)
    }

    fn get(&self, digest: &Digest, media_type: &str) -> StoreResult<Box<dyn BlobAccess>> {
        let path = self.blob_path(digest);
        if !path.is_file() {
            return Err(StoreError::NotFound(digest.clone()));
        }
        Ok(Box::new(FileBlob::with_digest(
            path,
            digest.clone(),
            media_type,
        )))
    }

    fn has(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.blob_path(digest).is_file())
    }

    fn digests(&self) -> StoreResult<Vec<Digest>> {
        let mut digests = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            match Digest::from_encoded(name) {
                Ok(digest) => digests.push(digest),
                Err(_) => tracing::debug!(name, "ignoring foreign file in blob directory"),
            }
        }
        digests.sort();
        Ok(digests)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
