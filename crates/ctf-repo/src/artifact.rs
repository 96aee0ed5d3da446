use ctf_store::{MemoryBlob, StoreError};
use ctf_types::{ArtifactContent, Descriptor, Digest, ImageIndex, Manifest};

use crate::error::RepoResult;

/// A manifest or index read from a repository, with its parsed content.
#[derive(Clone, Debug)]
pub struct ArtifactAccess {
    descriptor: Descriptor,
    content: ArtifactContent,
    raw: Vec<u8>,
}

impl ArtifactAccess {
    /// Parse `raw` as the artifact described by `descriptor`, checking that
    /// the bytes hash to the descriptor digest.
    pub fn new(descriptor: Descriptor, raw: Vec<u8>) -> RepoResult<Self> {
        let computed = Digest::compute(descriptor.digest.algorithm(), &raw);
        if computed != descriptor.digest {
            return Err(StoreError::DigestMismatch {
                expected: descriptor.digest.clone(),
                computed,
            }
            .into());
        }
        let content = ArtifactContent::parse(&descriptor.media_type, &raw)?;
        Ok(Self {
            descriptor,
            content,
            raw,
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn digest(&self) -> &Digest {
        &self.descriptor.digest
    }

    pub fn media_type(&self) -> &str {
        &self.descriptor.media_type
    }

    pub fn content(&self) -> &ArtifactContent {
        &self.content
    }

    pub fn is_index(&self) -> bool {
        self.content.is_index()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.content.as_manifest()
    }

    pub fn index(&self) -> Option<&ImageIndex> {
        self.content.as_index()
    }

    /// Descriptors this artifact references directly.
    pub fn references(&self) -> Vec<&Descriptor> {
        self.content.references()
    }

    /// The serialized artifact exactly as stored.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The artifact bytes as a blob.
    pub fn blob(&self) -> MemoryBlob {
        MemoryBlob::new(self.descriptor.media_type.clone(), self.raw.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_types::media::{MEDIA_TYPE_IMAGE_MANIFEST, MEDIA_TYPE_OCTET_STREAM};
    use ctf_types::ErrorKind;
    use std::collections::BTreeMap;

    fn manifest_bytes() -> Vec<u8> {
        let manifest = Manifest {
            schema_version: 2,
            media_type: Some(MEDIA_TYPE_IMAGE_MANIFEST.into()),
            config: Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, b"{}"),
            layers: vec![Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, b"testdata")],
            annotations: BTreeMap::new(),
        };
        serde_json::to_vec(&manifest).unwrap()
    }

    #[test]
    fn parses_manifest() {
        let raw = manifest_bytes();
        let artifact =
            ArtifactAccess::new(Descriptor::for_content(MEDIA_TYPE_IMAGE_MANIFEST, &raw), raw.clone())
                .unwrap();
        assert!(!artifact.is_index());
        assert_eq!(artifact.references().len(), 2);
        assert_eq!(artifact.raw(), raw.as_slice());
        assert_eq!(artifact.manifest().unwrap().layers[0].size, 8);
    }

    #[test]
    fn rejects_wrong_digest() {
        let raw = manifest_bytes();
        let descriptor = Descriptor::for_content(MEDIA_TYPE_IMAGE_MANIFEST, b"other");
        let err = ArtifactAccess::new(descriptor, raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn rejects_non_artifact_media_type() {
        let raw = b"{}".to_vec();
        let descriptor = Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, &raw);
        let err = ArtifactAccess::new(descriptor, raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
