use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use ctf_store::{BlobAccess, BlobStore};
use ctf_types::{ArtifactIndex, Digest};

use crate::error::{FormatError, FormatResult};
use crate::format::{AccessMode, AccessOptions, FileFormat};
use crate::handler::{FormatHandler, ObjectContent};

/// Lifecycle state of an [`AccessObject`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectState {
    New,
    OpenReadOnly,
    OpenWritable,
    Closed,
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::OpenReadOnly => "open-readonly",
            Self::OpenWritable => "open-writable",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

struct Inner {
    state: ObjectState,
    dirty: bool,
    content: Option<ObjectContent>,
}

/// One open transport object: an index and a blob store bound to a codec.
///
/// Mutations mark the object dirty. [`close`](Self::close) commits a dirty
/// writable object through its codec, after checking that every descriptor in
/// the index resolves to a stored blob; if that check or the write fails,
/// nothing is committed and the object stays open. All access goes through a
/// single reader/writer lock, so reads may overlap each other but never a
/// mutation or a close.
pub struct AccessObject {
    path: PathBuf,
    handler: Arc<dyn FormatHandler>,
    file_mode: u32,
    inner: RwLock<Inner>,
}

impl AccessObject {
    /// Open an existing object through `handler`.
    ///
    /// Objects read from a stream source are always read-only.
    pub fn open(
        handler: Arc<dyn FormatHandler>,
        path: &Path,
        mode: AccessMode,
        mut options: AccessOptions,
    ) -> FormatResult<Self> {
        options.validate()?;
        let read_only = mode.is_read_only() || options.has_source();
        let content = handler.open(path, read_only, &mut options)?;
        let state = if read_only {
            ObjectState::OpenReadOnly
        } else {
            ObjectState::OpenWritable
        };
        tracing::debug!(path = %path.display(), format = %handler.format(), %state, "opened object");
        Ok(Self::from_content(handler, path, options.file_mode(), state, false, content))
    }

    /// Create a new empty object destined for `path`.
    ///
    /// Nothing becomes visible at `path` as an object until the first
    /// successful [`close`](Self::close).
    pub fn create(
        handler: Arc<dyn FormatHandler>,
        path: &Path,
        options: AccessOptions,
    ) -> FormatResult<Self> {
        options.validate()?;
        if options.has_source() {
            return Err(FormatError::InvalidOptions(
                "a new object cannot be read from a stream".into(),
            ));
        }
        if handler.exists(path) {
            return Err(FormatError::AlreadyExists(path.to_path_buf()));
        }
        let content = handler.create(path, options.file_mode())?;
        tracing::debug!(path = %path.display(), format = %handler.format(), "created object");
        Ok(Self::from_content(
            handler,
            path,
            options.file_mode(),
            ObjectState::OpenWritable,
            true,
            content,
        ))
    }

    fn from_content(
        handler: Arc<dyn FormatHandler>,
        path: &Path,
        file_mode: u32,
        state: ObjectState,
        dirty: bool,
        content: ObjectContent,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            handler,
            file_mode,
            inner: RwLock::new(Inner {
                state,
                dirty,
                content: Some(content),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.handler.format()
    }

    pub fn state(&self) -> FormatResult<ObjectState> {
        Ok(self.inner.read().map_err(|_| FormatError::Poisoned)?.state)
    }

    pub fn is_read_only(&self) -> FormatResult<bool> {
        Ok(self.state()? == ObjectState::OpenReadOnly)
    }

    pub fn is_dirty(&self) -> FormatResult<bool> {
        Ok(self.inner.read().map_err(|_| FormatError::Poisoned)?.dirty)
    }

    /// Run `f` against the open content under the shared lock.
    pub fn with_content<T>(
        &self,
        f: impl FnOnce(&ObjectContent) -> FormatResult<T>,
    ) -> FormatResult<T> {
        let inner = self.inner.read().map_err(|_| FormatError::Poisoned)?;
        match (&inner.state, &inner.content) {
            (ObjectState::OpenReadOnly | ObjectState::OpenWritable, Some(content)) => f(content),
            _ => Err(FormatError::Closed),
        }
    }

    /// Run a mutation under the exclusive lock and mark the object dirty.
    fn modify<T>(
        &self,
        f: impl FnOnce(&mut ObjectContent) -> FormatResult<T>,
    ) -> FormatResult<T> {
        let mut inner = self.inner.write().map_err(|_| FormatError::Poisoned)?;
        match inner.state {
            ObjectState::OpenWritable => {}
            ObjectState::OpenReadOnly => return Err(FormatError::ReadOnly),
            ObjectState::New | ObjectState::Closed => return Err(FormatError::Closed),
        }
        let content = inner.content.as_mut().ok_or(FormatError::Closed)?;
        let result = f(content)?;
        inner.dirty = true;
        Ok(result)
    }

    pub fn with_index<T>(&self, f: impl FnOnce(&ArtifactIndex) -> T) -> FormatResult<T> {
        self.with_content(|c| Ok(f(&c.index)))
    }

    /// Snapshot of the current index.
    pub fn index(&self) -> FormatResult<ArtifactIndex> {
        self.with_index(Clone::clone)
    }

    pub fn update_index<T>(
        &self,
        f: impl FnOnce(&mut ArtifactIndex) -> FormatResult<T>,
    ) -> FormatResult<T> {
        self.modify(|c| f(&mut c.index))
    }

    pub fn add_blob(&self, blob: &dyn BlobAccess) -> FormatResult<Digest> {
        self.modify(|c| Ok(c.blobs.add(blob)?))
    }

    pub fn get_blob(&self, digest: &Digest, media_type: &str) -> FormatResult<Box<dyn BlobAccess>> {
        self.with_content(|c| Ok(c.blobs.get(digest, media_type)?))
    }

    pub fn has_blob(&self, digest: &Digest) -> FormatResult<bool> {
        self.with_content(|c| Ok(c.blobs.has(digest)?))
    }

    pub fn blob_digests(&self) -> FormatResult<Vec<Digest>> {
        self.with_content(|c| Ok(c.blobs.digests()?))
    }

    /// Commit (if dirty) and close.
    ///
    /// Closing an already closed object fails with [`FormatError::Closed`].
    pub fn close(&self) -> FormatResult<()> {
        let mut inner = self.inner.write().map_err(|_| FormatError::Poisoned)?;
        if matches!(inner.state, ObjectState::Closed | ObjectState::New) {
            return Err(FormatError::Closed);
        }
        if inner.state == ObjectState::OpenWritable && inner.dirty {
            let content = inner.content.as_ref().ok_or(FormatError::Closed)?;
            for digest in content.index.digests() {
                if !content.blobs.has(&digest)? {
                    return Err(FormatError::MissingBlob(digest));
                }
            }
            self.handler.write(content, &self.path, self.file_mode)?;
            tracing::info!(
                path = %self.path.display(),
                format = %self.handler.format(),
                entries = content.index.len(),
                "committed object"
            );
        }
        inner.state = ObjectState::Closed;
        inner.dirty = false;
        inner.content = None;
        tracing::debug!(path = %self.path.display(), "closed object");
        Ok(())
    }
}

impl Drop for AccessObject {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if inner.state == ObjectState::OpenWritable && inner.dirty {
                tracing::warn!(
                    path = %self.path.display(),
                    "dirty object dropped without close; changes discarded"
                );
            }
        }
    }
}

impl fmt::Debug for AccessObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state().ok();
        f.debug_struct("AccessObject")
            .field("path", &self.path)
            .field("format", &self.handler.format())
            .field("state", &state)
            .finish()
    }
}
