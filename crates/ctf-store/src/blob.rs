use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use ctf_crypto::digest_reader;
use ctf_types::{Descriptor, Digest};
use tempfile::TempPath;

use crate::error::{StoreError, StoreResult};

/// A byte sequence with stable identity: digest, size, and media type.
///
/// The digest is either supplied at construction or computed lazily on first
/// request and cached. Implementations must be shareable across threads.
pub trait BlobAccess: Send + Sync {
    /// Content digest, computing it on first use if it was not declared.
    fn digest(&self) -> StoreResult<Digest>;

    /// Digest supplied at construction, if any. Stores verify it on ingest.
    fn declared_digest(&self) -> Option<Digest> {
        None
    }

    fn media_type(&self) -> &str;

    fn size(&self) -> StoreResult<u64>;

    /// Open a fresh stream over the content.
    fn reader(&self) -> StoreResult<Box<dyn Read + Send>>;

    /// Release this handle. Releasing twice is a no-op.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Backing file, for file-backed blobs.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Read the whole content into memory.
    fn get(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn descriptor(&self) -> StoreResult<Descriptor> {
        Ok(Descriptor::new(self.media_type(), self.digest()?, self.size()?))
    }
}

fn cached_digest(
    cell: &OnceLock<(Digest, u64)>,
    open: impl FnOnce() -> StoreResult<File>,
) -> StoreResult<(Digest, u64)> {
    if let Some(found) = cell.get() {
        return Ok(found.clone());
    }
    let computed = digest_reader(open()?)?;
    // A concurrent caller may have won the race; both values are identical.
    let _ = cell.set(computed.clone());
    Ok(computed)
}

// ---------------------------------------------------------------------------
// MemoryBlob
// ---------------------------------------------------------------------------

/// Blob backed by an in-memory buffer.
#[derive(Debug)]
pub struct MemoryBlob {
    media_type: String,
    data: Bytes,
    digest: OnceLock<Digest>,
}

impl MemoryBlob {
    pub fn new(media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
            digest: OnceLock::new(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl BlobAccess for MemoryBlob {
    fn digest(&self) -> StoreResult<Digest> {
        Ok(self
            .digest
            .get_or_init(|| Digest::from_bytes(&self.data))
            .clone())
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn reader(&self) -> StoreResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }

    fn get(&self) -> StoreResult<Vec<u8>> {
        Ok(self.data.to_vec())
    }
}

// ---------------------------------------------------------------------------
// FileBlob
// ---------------------------------------------------------------------------

/// Blob backed by a regular file that it does not own.
#[derive(Debug)]
pub struct FileBlob {
    media_type: String,
    path: PathBuf,
    declared: Option<Digest>,
    computed: OnceLock<(Digest, u64)>,
}

impl FileBlob {
    pub fn new(path: impl Into<PathBuf>, media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            path: path.into(),
            declared: None,
            computed: OnceLock::new(),
        }
    }

    /// A file whose digest is already known, e.g. a stored blob entry.
    pub fn with_digest(
        path: impl Into<PathBuf>,
        digest: Digest,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            declared: Some(digest),
            ..Self::new(path, media_type)
        }
    }
}

impl BlobAccess for FileBlob {
    fn digest(&self) -> StoreResult<Digest> {
        if let Some(d) = &self.declared {
            return Ok(d.clone());
        }
        cached_digest(&self.computed, || Ok(File::open(&self.path)?)).map(|(d, _)| d)
    }

    fn declared_digest(&self) -> Option<Digest> {
        self.declared.clone()
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn reader(&self) -> StoreResult<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

// ---------------------------------------------------------------------------
// TypedBlob
// ---------------------------------------------------------------------------

/// Re-labels another blob with a different media type.
pub struct TypedBlob {
    inner: Box<dyn BlobAccess>,
    media_type: String,
}

impl TypedBlob {
    pub fn new(inner: Box<dyn BlobAccess>, media_type: impl Into<String>) -> Self {
        Self {
            inner,
            media_type: media_type.into(),
        }
    }
}

impl BlobAccess for TypedBlob {
    fn digest(&self) -> StoreResult<Digest> {
        self.inner.digest()
    }

    fn declared_digest(&self) -> Option<Digest> {
        self.inner.declared_digest()
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn size(&self) -> StoreResult<u64> {
        self.inner.size()
    }

    fn reader(&self) -> StoreResult<Box<dyn Read + Send>> {
        self.inner.reader()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    fn path(&self) -> Option<&Path> {
        self.inner.path()
    }
}

// ---------------------------------------------------------------------------
// TempBlob
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TempShared {
    path: TempPath,
    computed: OnceLock<(Digest, u64)>,
}

/// Blob owning a temporary file, shared by reference count.
///
/// Every handle obtained through [`TempBlob::dup`] holds one reference. The
/// handle that releases the last reference deletes the file; dropping a
/// handle without calling `close` releases it too.
#[derive(Debug)]
pub struct TempBlob {
    shared: Mutex<Option<Arc<TempShared>>>,
    path: PathBuf,
    media_type: String,
}

impl TempBlob {
    /// Take ownership of a temporary file.
    pub fn new(path: TempPath, media_type: impl Into<String>) -> Self {
        let location = path.to_path_buf();
        Self {
            shared: Mutex::new(Some(Arc::new(TempShared {
                path,
                computed: OnceLock::new(),
            }))),
            path: location,
            media_type: media_type.into(),
        }
    }

    fn shared(&self) -> StoreResult<Arc<TempShared>> {
        let guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().cloned().ok_or(StoreError::Closed)
    }

    /// Acquire another handle on the same file.
    pub fn dup(&self) -> StoreResult<Self> {
        let shared = self.shared()?;
        Ok(Self {
            shared: Mutex::new(Some(shared)),
            path: self.path.clone(),
            media_type: self.media_type.clone(),
        })
    }

    /// Number of live handles, or 0 once this handle is closed.
    pub fn holders(&self) -> usize {
        let guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(Arc::strong_count).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.holders() == 0
    }
}

impl BlobAccess for TempBlob {
    fn digest(&self) -> StoreResult<Digest> {
        let shared = self.shared()?;
        cached_digest(&shared.computed, || Ok(File::open(&shared.path)?)).map(|(d, _)| d)
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn size(&self) -> StoreResult<u64> {
        let shared = self.shared()?;
        Ok(fs::metadata(&shared.path)?.len())
    }

    fn reader(&self) -> StoreResult<Box<dyn Read + Send>> {
        let shared = self.shared()?;
        Ok(Box::new(File::open(&shared.path)?))
    }

    fn close(&self) -> StoreResult<()> {
        let taken = self
            .shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(arc) = taken else {
            return Ok(());
        };
        if let Some(last) = Arc::into_inner(arc) {
            last.path.close()?;
            tracing::debug!(path = %self.path.display(), "deleted temporary blob");
        }
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
