use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ctf_store::BlobAccess;

use crate::archive::ArchiveFormat;
use crate::directory::DirectoryFormat;
use crate::error::{FormatError, FormatResult};
use crate::format::{AccessMode, AccessOptions, FileFormat};
use crate::handler::FormatHandler;
use crate::object::AccessObject;

/// Maps format identifiers to codecs.
///
/// Built once during start-up and passed to whatever needs codec dispatch.
#[derive(Clone)]
pub struct FormatRegistry {
    handlers: BTreeMap<FileFormat, Arc<dyn FormatHandler>>,
    default_format: FileFormat,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            default_format: FileFormat::Directory,
        }
    }

    /// A registry holding every built-in codec.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DirectoryFormat));
        registry.register(Arc::new(ArchiveFormat::tar()));
        registry.register(Arc::new(ArchiveFormat::gzip()));
        registry.register(Arc::new(ArchiveFormat::zstd()));
        registry
    }

    /// Built-in codecs with a fixed compression level.
    pub fn with_compression_level(level: i32) -> Self {
        let mut registry = Self::with_defaults();
        registry.register(Arc::new(ArchiveFormat::gzip().with_level(level)));
        registry.register(Arc::new(ArchiveFormat::zstd().with_level(level)));
        registry
    }

    /// Register a codec, returning the one it replaces.
    pub fn register(&mut self, handler: Arc<dyn FormatHandler>) -> Option<Arc<dyn FormatHandler>> {
        self.handlers.insert(handler.format(), handler)
    }

    /// Format used when creating an object whose format is neither given nor
    /// detectable.
    pub fn set_default_format(&mut self, format: FileFormat) {
        self.default_format = format;
    }

    pub fn default_format(&self) -> FileFormat {
        self.default_format
    }

    pub fn get(&self, format: FileFormat) -> FormatResult<Arc<dyn FormatHandler>> {
        self.handlers
            .get(&format)
            .cloned()
            .ok_or_else(|| FormatError::UnknownFormat(format.to_string()))
    }

    /// Look up a codec by its string identifier.
    pub fn lookup(&self, name: &str) -> FormatResult<Arc<dyn FormatHandler>> {
        self.get(name.parse()?)
    }

    pub fn supported_formats(&self) -> Vec<FileFormat> {
        self.handlers.keys().copied().collect()
    }

    /// Format of an existing object at `path`, if any.
    pub fn detect(&self, path: &Path) -> FormatResult<Option<FileFormat>> {
        if path.is_dir() {
            return Ok(Some(FileFormat::Directory));
        }
        if !path.is_file() {
            return Ok(None);
        }
        let mut magic = Vec::with_capacity(4);
        File::open(path)?.take(4).read_to_end(&mut magic)?;
        Ok(Some(FileFormat::sniff(&magic)))
    }

    /// Open the object at `path`, creating it when it is absent and `mode`
    /// allows creation.
    ///
    /// The codec comes from `options.format`, else from what is found at
    /// `path`, else the default format.
    pub fn open(
        &self,
        path: &Path,
        mode: AccessMode,
        mut options: AccessOptions,
    ) -> FormatResult<AccessObject> {
        options.validate()?;
        if let Some(source) = options.take_source() {
            let mut buffered = BufReader::new(source);
            let format = match options.format {
                Some(format) => format,
                None => FileFormat::sniff(buffered.fill_buf()?),
            };
            options.reader = Some(Box::new(buffered));
            tracing::debug!(%format, "opening object from stream");
            return AccessObject::open(self.get(format)?, path, mode | AccessMode::READONLY, options);
        }

        let format = match options.format {
            Some(format) => format,
            None => self.detect(path)?.unwrap_or(self.default_format),
        };
        let handler = self.get(format)?;
        if !handler.exists(path) {
            if mode.may_create() {
                return AccessObject::create(handler, path, options);
            }
            return Err(FormatError::NotFound(path.to_path_buf()));
        }
        AccessObject::open(handler, path, mode, options)
    }

    /// Create a new object in `format`; fails if one already exists.
    pub fn create(
        &self,
        path: &Path,
        format: FileFormat,
        options: AccessOptions,
    ) -> FormatResult<AccessObject> {
        AccessObject::create(self.get(format)?, path, options)
    }

    /// Open an artifact-set blob read-only.
    ///
    /// The archive codec is chosen from the blob's media type.
    pub fn open_from_blob(&self, blob: &dyn BlobAccess) -> FormatResult<AccessObject> {
        let format = FileFormat::for_media_type(blob.media_type());
        let path = blob.path().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
        tracing::debug!(%format, media_type = blob.media_type(), "opening object from blob");
        let options = AccessOptions::new()
            .with_format(format)
            .with_reader(blob.reader()?);
        AccessObject::open(self.get(format)?, &path, AccessMode::READONLY, options)
    }

    /// Write the current content of `object` to `path` in another format.
    pub fn write(
        &self,
        object: &AccessObject,
        path: &Path,
        format: FileFormat,
        file_mode: u32,
    ) -> FormatResult<()> {
        let handler = self.get(format)?;
        object.with_content(|content| handler.write(content, path, file_mode))
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.supported_formats())
            .field("default_format", &self.default_format)
            .finish()
    }
}
