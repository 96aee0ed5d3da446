use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use ctf_format::{AccessMode, AccessObject, AccessOptions, FileFormat, FormatRegistry};
use ctf_store::BlobAccess;
use ctf_types::{ArtifactIndex, Digest};

use crate::error::RepoResult;
use crate::namespace::Namespace;

/// A transport-format repository backed by one open object.
#[derive(Clone, Debug)]
pub struct Repository {
    object: Arc<AccessObject>,
}

impl Repository {
    /// Open (or, if `mode` allows, create) the repository at `path`.
    pub fn open(
        registry: &FormatRegistry,
        path: &Path,
        mode: AccessMode,
        options: AccessOptions,
    ) -> RepoResult<Self> {
        Ok(Self::from_object(registry.open(path, mode, options)?))
    }

    /// Create a new repository in `format`.
    pub fn create(
        registry: &FormatRegistry,
        path: &Path,
        format: FileFormat,
        options: AccessOptions,
    ) -> RepoResult<Self> {
        Ok(Self::from_object(registry.create(path, format, options)?))
    }

    /// Open an artifact-set blob as a read-only repository.
    pub fn open_from_blob(registry: &FormatRegistry, blob: &dyn BlobAccess) -> RepoResult<Self> {
        Ok(Self::from_object(registry.open_from_blob(blob)?))
    }

    pub fn from_object(object: AccessObject) -> Self {
        Self {
            object: Arc::new(object),
        }
    }

    pub fn object(&self) -> &AccessObject {
        &self.object
    }

    pub fn path(&self) -> &Path {
        self.object.path()
    }

    pub fn format(&self) -> FileFormat {
        self.object.format()
    }

    pub fn is_read_only(&self) -> RepoResult<bool> {
        Ok(self.object.is_read_only()?)
    }

    /// Handle on a namespace; absent namespaces are simply empty.
    pub fn namespace(&self, name: &str) -> Namespace {
        Namespace::new(Arc::clone(&self.object), name)
    }

    /// Namespaces holding at least one artifact.
    pub fn namespaces(&self) -> RepoResult<BTreeSet<String>> {
        Ok(self.object.with_index(ArtifactIndex::namespaces)?)
    }

    pub fn index(&self) -> RepoResult<ArtifactIndex> {
        Ok(self.object.index()?)
    }

    pub fn main_artifact(&self) -> RepoResult<Option<Digest>> {
        Ok(self.object.with_index(ArtifactIndex::main_artifact)??)
    }

    pub fn set_main_artifact(&self, digest: &Digest) -> RepoResult<()> {
        self.object
            .update_index(|index| Ok(index.set_main_artifact(digest)?))?;
        Ok(())
    }

    /// Commit pending changes and close the underlying object.
    pub fn close(&self) -> RepoResult<()> {
        Ok(self.object.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceAccess;
    use crate::RepoError;
    use ctf_store::MemoryBlob;
    use ctf_types::media::{MEDIA_TYPE_IMAGE_MANIFEST, MEDIA_TYPE_OCTET_STREAM};
    use ctf_types::{Descriptor, ErrorKind, Manifest, TypeError};
    use std::collections::BTreeMap;

    fn manifest_blob(layer: &[u8]) -> MemoryBlob {
        let manifest = Manifest {
            schema_version: 2,
            media_type: Some(MEDIA_TYPE_IMAGE_MANIFEST.into()),
            config: Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, b"{}"),
            layers: vec![Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, layer)],
            annotations: BTreeMap::new(),
        };
        MemoryBlob::new(MEDIA_TYPE_IMAGE_MANIFEST, serde_json::to_vec(&manifest).unwrap())
    }

    fn populate(ns: &dyn NamespaceAccess, layer: &[u8], tag: &str) -> Descriptor {
        ns.add_blob(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, &b"{}"[..]))
            .unwrap();
        ns.add_blob(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, layer.to_vec()))
            .unwrap();
        ns.add_artifact(&manifest_blob(layer), &[tag.to_string()])
            .unwrap()
    }

    fn new_repo(dir: &Path) -> Repository {
        Repository::open(
            &FormatRegistry::with_defaults(),
            &dir.join("repo"),
            AccessMode::CREATE,
            AccessOptions::new(),
        )
        .unwrap()
    }

    #[test]
    fn namespace_lookup_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let repo = new_repo(dir.path());
        let ns = repo.namespace("team/app");
        assert!(ns.tags().unwrap().is_empty());
        assert!(ns.artifacts().unwrap().is_empty());
        assert!(repo.namespaces().unwrap().is_empty());

        populate(&ns, b"testdata", "v1");
        assert_eq!(
            repo.namespaces().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["team/app"]
        );
    }

    #[test]
    fn add_artifact_and_get_by_tag_or_digest() {
        let dir = tempfile::tempdir().unwrap();
        let repo = new_repo(dir.path());
        let ns = repo.namespace("team/app");
        let descriptor = populate(&ns, b"testdata", "v1");

        let by_tag = ns.get_artifact("v1").unwrap();
        assert_eq!(by_tag.digest(), &descriptor.digest);
        let by_digest = ns.get_artifact(&descriptor.digest.to_string()).unwrap();
        assert_eq!(by_digest.raw(), by_tag.raw());
        assert_eq!(by_tag.references().len(), 2);
        assert!(ns.lookup(&descriptor.digest).unwrap().is_some());
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = new_repo(dir.path());
        let err = repo.namespace("x").get_artifact("v9").unwrap_err();
        assert!(matches!(err, RepoError::ArtifactNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn add_artifact_rejects_plain_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let repo = new_repo(dir.path());
        let err = repo
            .namespace("")
            .add_artifact(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, &b"x"[..]), &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn malformed_tags_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = new_repo(dir.path());
        let ns = repo.namespace("team/app");
        let blob = manifest_blob(b"testdata");
        let err = ns.add_artifact(&blob, &["a,b".to_string()]).unwrap_err();
        assert!(matches!(err, RepoError::Type(TypeError::InvalidTag(ref t)) if t == "a,b"));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(ns.artifacts().unwrap().is_empty());
        assert!(!ns.has_blob(&Digest::from_bytes(&blob.get().unwrap())).unwrap());

        let descriptor = populate(&ns, b"testdata", "v1");
        let err = ns.add_tags(&descriptor.digest, &["has space".into()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let tags: Vec<_> = ns.tags().unwrap().into_iter().collect();
        assert_eq!(tags, vec!["v1"]);
    }

    #[test]
    fn tags_are_namespace_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let repo = new_repo(dir.path());
        let a = repo.namespace("a");
        let b = repo.namespace("b");
        let first = populate(&a, b"one", "latest");
        let second = populate(&b, b"two", "latest");
        assert_eq!(a.resolve("latest").unwrap().digest, first.digest);
        assert_eq!(b.resolve("latest").unwrap().digest, second.digest);

        populate(&a, b"three", "latest");
        assert_ne!(a.resolve("latest").unwrap().digest, first.digest);
        a.add_tags(&first.digest, &["stable".into()]).unwrap();
        assert!(a.tags().unwrap().contains("stable"));
    }

    #[test]
    fn persisted_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.tgz");
        let registry = FormatRegistry::with_defaults();
        let repo = Repository::create(&registry, &path, FileFormat::Tgz, AccessOptions::new())
            .unwrap();
        let descriptor = populate(&repo.namespace("team/app"), b"testdata", "v1");
        repo.set_main_artifact(&descriptor.digest).unwrap();
        repo.close().unwrap();

        let repo = Repository::open(&registry, &path, AccessMode::READONLY, AccessOptions::new())
            .unwrap();
        assert!(repo.is_read_only().unwrap());
        assert_eq!(repo.format(), FileFormat::Tgz);
        assert_eq!(repo.main_artifact().unwrap(), Some(descriptor.digest.clone()));
        let artifact = repo.namespace("team/app").get_artifact("v1").unwrap();
        assert_eq!(artifact.descriptor().size, descriptor.size);

        let err = repo
            .namespace("team/app")
            .add_blob(&MemoryBlob::new(MEDIA_TYPE_OCTET_STREAM, &b"x"[..]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
