use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::BitOr;
use std::str::FromStr;

use ctf_types::media::{split_compression, SUFFIX_GZIP, SUFFIX_ZSTD};
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};

/// Name of the index file at the root of every object.
pub const INDEX_FILE: &str = "artifact-index.json";

/// Name of the directory (or archive path prefix) holding blob entries.
pub const BLOB_DIR: &str = "blobs";

/// Permission bits for files written by the codecs unless overridden.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Directory permissions derived from a file mode: every read bit gains the
/// matching execute bit.
pub fn dir_mode(file_mode: u32) -> u32 {
    file_mode | ((file_mode & 0o444) >> 2)
}

/// Stream compression applied on top of a tar archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    Gzip,
    Zstd,
}

impl Compression {
    /// Media-type marker for this compression.
    pub fn media_suffix(&self) -> &'static str {
        match self {
            Self::Gzip => SUFFIX_GZIP,
            Self::Zstd => SUFFIX_ZSTD,
        }
    }
}

/// Physical encoding of one transport object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Loose files in a directory tree.
    Directory,
    /// Uncompressed tar stream.
    Tar,
    /// Gzip-compressed tar stream.
    Tgz,
    /// Zstandard-compressed tar stream.
    Tzst,
}

impl FileFormat {
    pub const ALL: [FileFormat; 4] = [Self::Directory, Self::Tar, Self::Tgz, Self::Tzst];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Tar => "tar",
            Self::Tgz => "tgz",
            Self::Tzst => "tzst",
        }
    }

    pub fn is_archive(&self) -> bool {
        !matches!(self, Self::Directory)
    }

    pub fn compression(&self) -> Option<Compression> {
        match self {
            Self::Tgz => Some(Compression::Gzip),
            Self::Tzst => Some(Compression::Zstd),
            Self::Directory | Self::Tar => None,
        }
    }

    /// Archive codec for a blob of `media_type`.
    ///
    /// A trailing compression marker selects the compressed codec; its
    /// absence selects plain tar.
    pub fn for_media_type(media_type: &str) -> Self {
        match split_compression(media_type).1 {
            Some(SUFFIX_GZIP) => Self::Tgz,
            Some(SUFFIX_ZSTD) => Self::Tzst,
            _ => Self::Tar,
        }
    }

    /// Guess an archive codec from the first bytes of a stream.
    pub fn sniff(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1f, 0x8b]) {
            Self::Tgz
        } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Tzst
        } else {
            Self::Tar
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> FormatResult<Self> {
        match s {
            "directory" => Ok(Self::Directory),
            "tar" => Ok(Self::Tar),
            "tgz" | "tar+gzip" => Ok(Self::Tgz),
            "tzst" | "tar+zstd" => Ok(Self::Tzst),
            other => Err(FormatError::UnknownFormat(other.to_string())),
        }
    }
}

/// Access-mode flags for opening an object.
///
/// The empty mode opens an existing object writable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMode(u8);

impl AccessMode {
    pub const WRITABLE: AccessMode = AccessMode(0);
    pub const READONLY: AccessMode = AccessMode(1);
    pub const CREATE: AccessMode = AccessMode(2);

    pub fn contains(&self, other: AccessMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_read_only(&self) -> bool {
        self.contains(Self::READONLY)
    }

    /// Whether a missing object may be created on open.
    pub fn may_create(&self) -> bool {
        self.contains(Self::CREATE) && !self.is_read_only()
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for AccessMode {
    type Output = AccessMode;

    fn bitor(self, rhs: AccessMode) -> AccessMode {
        AccessMode(self.0 | rhs.0)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = if self.is_read_only() {
            "readonly"
        } else {
            "writable"
        };
        if self.contains(Self::CREATE) {
            write!(f, "{base}+create")
        } else {
            f.write_str(base)
        }
    }
}

/// Options for opening or creating an object.
///
/// An object is normally read from its path. Supplying a `reader` or an
/// already open `file` reads the encoded object from that source instead;
/// such objects are always opened read-only. Supplying both is invalid.
#[derive(Default)]
pub struct AccessOptions {
    pub format: Option<FileFormat>,
    pub reader: Option<Box<dyn Read + Send>>,
    pub file: Option<File>,
    pub file_mode: Option<u32>,
}

impl AccessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_reader(mut self, reader: Box<dyn Read + Send>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_file(mut self, file: File) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    pub fn validate(&self) -> FormatResult<()> {
        if self.reader.is_some() && self.file.is_some() {
            return Err(FormatError::InvalidOptions(
                "only one of reader or file may be given".into(),
            ));
        }
        Ok(())
    }

    /// Whether the object is read from a stream rather than its path.
    pub fn has_source(&self) -> bool {
        self.reader.is_some() || self.file.is_some()
    }

    pub(crate) fn take_source(&mut self) -> Option<Box<dyn Read + Send>> {
        if let Some(reader) = self.reader.take() {
            return Some(reader);
        }
        self.file
            .take()
            .map(|f| Box::new(f) as Box<dyn Read + Send>)
    }

    pub fn file_mode(&self) -> u32 {
        self.file_mode.unwrap_or(DEFAULT_FILE_MODE)
    }
}

impl fmt::Debug for AccessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessOptions")
            .field("format", &self.format)
            .field("reader", &self.reader.is_some())
            .field("file", &self.file.is_some())
            .field("file_mode", &self.file_mode)
            .finish()
    }
}
