use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ctf_store::{BlobStore, DirBlobStore};
use ctf_types::media::MEDIA_TYPE_OCTET_STREAM;
use ctf_types::{ArtifactIndex, Digest};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tempfile::NamedTempFile;

use crate::directory::set_mode;
use crate::error::{FormatError, FormatResult};
use crate::format::{AccessOptions, Compression, FileFormat, BLOB_DIR, INDEX_FILE};
use crate::handler::{staging_dir, FormatHandler, ObjectContent};

const ENTRY_FILE_MODE: u32 = 0o644;
const ENTRY_DIR_MODE: u32 = 0o755;
const DEFAULT_GZIP_LEVEL: u32 = 6;
const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Tar codec, optionally compressed with gzip or zstd.
///
/// Output is deterministic: the index entry comes first, then the blob
/// directory, then blobs sorted by name, all with zero mtime and ownership
/// and fixed modes. Gzip output carries no timestamp or file name.
///
/// Opening unpacks into a private staging directory and verifies every blob
/// against its name. Writing goes to a temporary file beside the target which
/// replaces the target only once complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveFormat {
    compression: Option<Compression>,
    level: Option<i32>,
}

impl ArchiveFormat {
    pub fn tar() -> Self {
        Self::default()
    }

    pub fn gzip() -> Self {
        Self {
            compression: Some(Compression::Gzip),
            level: None,
        }
    }

    pub fn zstd() -> Self {
        Self {
            compression: Some(Compression::Zstd),
            level: None,
        }
    }

    /// Codec for an archive file format; `None` for the directory format.
    pub fn for_format(format: FileFormat) -> Option<Self> {
        match format {
            FileFormat::Directory => None,
            FileFormat::Tar => Some(Self::tar()),
            FileFormat::Tgz => Some(Self::gzip()),
            FileFormat::Tzst => Some(Self::zstd()),
        }
    }

    /// Compression level; clamped to 0-9 for gzip.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    /// Encode `content` into `writer`, returning the writer once the stream
    /// is complete.
    pub fn write_to<W: Write>(&self, content: &ObjectContent, writer: W) -> FormatResult<W> {
        match self.compression {
            None => write_tar(content, writer),
            Some(Compression::Gzip) => {
                let level = self
                    .level
                    .map(|l| l.clamp(0, 9) as u32)
                    .unwrap_or(DEFAULT_GZIP_LEVEL);
                let encoder = GzEncoder::new(writer, flate2::Compression::new(level));
                Ok(write_tar(content, encoder)?.finish()?)
            }
            Some(Compression::Zstd) => {
                let level = self.level.unwrap_or(DEFAULT_ZSTD_LEVEL);
                let encoder = zstd::Encoder::new(writer, level)?;
                Ok(write_tar(content, encoder)?.finish()?)
            }
        }
    }

    /// Decode an archive stream into `staging`.
    pub fn read_from<R: Read>(&self, reader: R, staging: &Path) -> FormatResult<()> {
        match self.compression {
            None => unpack(reader, staging),
            Some(Compression::Gzip) => unpack(GzDecoder::new(reader), staging),
            Some(Compression::Zstd) => unpack(zstd::Decoder::new(reader)?, staging),
        }
    }
}

fn entry_header(entry_type: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn write_tar<W: Write>(content: &ObjectContent, writer: W) -> FormatResult<W> {
    let mut builder = tar::Builder::new(writer);

    let index = content.index.to_json()?;
    let mut header = entry_header(EntryType::Regular, ENTRY_FILE_MODE, index.len() as u64);
    builder.append_data(&mut header, INDEX_FILE, index.as_slice())?;

    let mut header = entry_header(EntryType::Directory, ENTRY_DIR_MODE, 0);
    builder.append_data(&mut header, BLOB_DIR, io::empty())?;

    for digest in content.blobs.digests()? {
        let blob = content.blobs.get(&digest, MEDIA_TYPE_OCTET_STREAM)?;
        let mut header = entry_header(EntryType::Regular, ENTRY_FILE_MODE, blob.size()?);
        let name = format!("{BLOB_DIR}/{}", digest.encoded());
        builder.append_data(&mut header, name, blob.reader()?)?;
    }
    Ok(builder.into_inner()?)
}

fn unpack<R: Read>(reader: R, staging: &Path) -> FormatResult<()> {
    let blob_root = staging.join(BLOB_DIR);
    fs::create_dir_all(&blob_root)?;
    let blob_prefix = format!("{BLOB_DIR}/");

    let mut archive = tar::Archive::new(reader);
    let mut has_index = false;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.to_string_lossy().into_owned();
        let name = raw.trim_start_matches("./").trim_end_matches('/');
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            if name.is_empty() || name == BLOB_DIR {
                continue;
            }
            return Err(FormatError::CorruptArchive(format!(
                "unexpected directory {name}"
            )));
        }
        if !entry_type.is_file() {
            return Err(FormatError::CorruptArchive(format!(
                "unsupported entry type for {name}"
            )));
        }

        let target = if name == INDEX_FILE {
            has_index = true;
            staging.join(INDEX_FILE)
        } else if let Some(blob_name) = name.strip_prefix(&blob_prefix) {
            Digest::from_encoded(blob_name).map_err(|_| {
                FormatError::CorruptArchive(format!("invalid blob entry {name}"))
            })?;
            blob_root.join(blob_name)
        } else {
            return Err(FormatError::CorruptArchive(format!("unexpected entry {name}")));
        };
        let mut file = File::create(&target)?;
        io::copy(&mut entry, &mut file)?;
    }

    if !has_index {
        return Err(FormatError::CorruptArchive(format!("missing {INDEX_FILE}")));
    }
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl FormatHandler for ArchiveFormat {
    fn format(&self) -> FileFormat {
        match self.compression {
            None => FileFormat::Tar,
            Some(Compression::Gzip) => FileFormat::Tgz,
            Some(Compression::Zstd) => FileFormat::Tzst,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn open(
        &self,
        path: &Path,
        read_only: bool,
        options: &mut AccessOptions,
    ) -> FormatResult<ObjectContent> {
        let staging = staging_dir()?;
        match options.take_source() {
            Some(source) => self.read_from(source, staging.path())?,
            None => {
                if !path.is_file() {
                    return Err(FormatError::NotFound(path.to_path_buf()));
                }
                self.read_from(BufReader::new(File::open(path)?), staging.path())?;
            }
        }

        let index = ArtifactIndex::from_json(&fs::read(staging.path().join(INDEX_FILE))?)?;
        let blobs = DirBlobStore::open(staging.path().join(BLOB_DIR), read_only)?
            .with_file_mode(options.file_mode());
        for digest in blobs.digests()? {
            blobs.verify(&digest)?;
        }
        tracing::debug!(
            path = %path.display(),
            format = %self.format(),
            entries = index.len(),
            "opened archive object"
        );
        Ok(ObjectContent::staged(index, blobs, staging))
    }

    fn create(&self, _path: &Path, file_mode: u32) -> FormatResult<ObjectContent> {
        let staging = staging_dir()?;
        let blobs = DirBlobStore::create(staging.path().join(BLOB_DIR))?.with_file_mode(file_mode);
        Ok(ObjectContent::staged(ArtifactIndex::new(), blobs, staging))
    }

    fn write(&self, content: &ObjectContent, path: &Path, file_mode: u32) -> FormatResult<()> {
        let parent = parent_dir(path);
        fs::create_dir_all(&parent)?;
        let staging = NamedTempFile::new_in(&parent)?;
        let staging = self
            .write_to(content, BufWriter::new(staging))?
            .into_inner()
            .map_err(|e| e.into_error())?;
        staging.as_file().sync_all()?;
        staging.persist(path).map_err(|e| e.error)?;
        set_mode(path, file_mode)?;
        tracing::debug!(path = %path.display(), format = %self.format(), "wrote archive object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_store::MemoryBlob;
    use ctf_types::media::ANNOTATION_TAGS;
    use ctf_types::{Descriptor, ErrorKind};

    fn sample(codec: &ArchiveFormat) -> ObjectContent {
        let mut content = codec.create(Path::new("unused"), 0o644).unwrap();
        for data in [&b"testdata"[..], b"{}"] {
            let digest = content
                .blobs
                .add(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, data.to_vec()))
                .unwrap();
            content.index.add(
                "",
                Descriptor::new(MEDIA_TYPE_OCTET_STREAM, digest, data.len() as u64)
                    .with_annotation(ANNOTATION_TAGS, "v1"),
            );
        }
        content
    }

    #[test]
    fn roundtrip_every_compression() {
        for codec in [ArchiveFormat::tar(), ArchiveFormat::gzip(), ArchiveFormat::zstd()] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("object.tar");
            let content = sample(&codec);
            codec.write(&content, &path, 0o644).unwrap();
            assert!(codec.exists(&path));

            let reopened = codec.open(&path, true, &mut AccessOptions::new()).unwrap();
            assert_eq!(reopened.index, content.index, "{:?}", codec.format());
            assert_eq!(reopened.blobs.digests().unwrap(), content.blobs.digests().unwrap());
            let layer = reopened
                .blobs
                .get(&Digest::from_bytes(b"testdata"), MEDIA_TYPE_OCTET_STREAM)
                .unwrap();
            assert_eq!(layer.get().unwrap(), b"testdata");
            assert!(reopened.is_staged());
        }
    }

    #[test]
    fn output_is_deterministic() {
        for codec in [ArchiveFormat::tar(), ArchiveFormat::gzip(), ArchiveFormat::zstd()] {
            let first = codec.write_to(&sample(&codec), Vec::new()).unwrap();
            let second = codec.write_to(&sample(&codec), Vec::new()).unwrap();
            assert_eq!(first, second, "{:?}", codec.format());
        }
    }

    #[test]
    fn index_is_first_entry() {
        let codec = ArchiveFormat::tar();
        let bytes = codec.write_to(&sample(&codec), Vec::new()).unwrap();
        let mut archive = tar::Archive::new(bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names[0], INDEX_FILE);
        assert_eq!(names[1].trim_end_matches('/'), BLOB_DIR);
        assert_eq!(names.len(), 4);
        let mut blobs = names[2..].to_vec();
        blobs.sort();
        assert_eq!(blobs, names[2..].to_vec());
    }

    #[test]
    fn compressed_output_matches_magic() {
        let gz = ArchiveFormat::gzip();
        let bytes = gz.write_to(&sample(&gz), Vec::new()).unwrap();
        assert_eq!(FileFormat::sniff(&bytes), FileFormat::Tgz);
        let zst = ArchiveFormat::zstd();
        let bytes = zst.write_to(&sample(&zst), Vec::new()).unwrap();
        assert_eq!(FileFormat::sniff(&bytes), FileFormat::Tzst);
    }

    #[test]
    fn open_from_reader() {
        let codec = ArchiveFormat::gzip();
        let bytes = codec.write_to(&sample(&codec), Vec::new()).unwrap();
        let mut options = AccessOptions::new().with_reader(Box::new(io::Cursor::new(bytes)));
        let content = codec.open(Path::new(""), true, &mut options).unwrap();
        assert_eq!(content.index.len(), 2);
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveFormat::tar()
            .open(&dir.path().join("absent.tar"), true, &mut AccessOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    fn raw_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = entry_header(EntryType::Regular, 0o644, data.len() as u64);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn archive_without_index_is_corrupt() {
        let bytes = raw_archive(&[]);
        let staging = tempfile::tempdir().unwrap();
        let err = ArchiveFormat::tar()
            .read_from(bytes.as_slice(), staging.path())
            .unwrap_err();
        assert!(matches!(err, FormatError::CorruptArchive(_)));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn foreign_entries_are_rejected() {
        let index = ArtifactIndex::new().to_json().unwrap();
        let bytes = raw_archive(&[(INDEX_FILE, index.as_slice()), ("etc/passwd", &b"x"[..])]);
        let staging = tempfile::tempdir().unwrap();
        let err = ArchiveFormat::tar()
            .read_from(bytes.as_slice(), staging.path())
            .unwrap_err();
        assert!(matches!(err, FormatError::CorruptArchive(_)));
    }

    #[test]
    fn tampered_blob_fails_open() {
        let index = ArtifactIndex::new().to_json().unwrap();
        let name = format!("{BLOB_DIR}/{}", Digest::from_bytes(b"original").encoded());
        let bytes = raw_archive(&[(INDEX_FILE, index.as_slice()), (name.as_str(), &b"tampered"[..])]);
        let mut options = AccessOptions::new().with_reader(Box::new(io::Cursor::new(bytes)));
        let err = ArchiveFormat::tar()
            .open(Path::new(""), true, &mut options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn write_replaces_atomically_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("object.tgz");
        let codec = ArchiveFormat::gzip();
        fs::write(&path, b"previous").unwrap();
        codec.write(&sample(&codec), &path, 0o644).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_ne!(fs::read(&path).unwrap(), b"previous");
    }
}
