use std::collections::BTreeSet;
use std::sync::Arc;

use ctf_format::AccessObject;
use ctf_store::BlobAccess;
use ctf_types::media::{is_index, is_manifest, ANNOTATION_TAGS};
use ctf_types::{validate_tag, ArtifactContent, Descriptor, Digest, TypeError};

use crate::artifact::ArtifactAccess;
use crate::error::{RepoError, RepoResult};

/// Tag-to-artifact binding scope inside a repository.
///
/// Every namespace shares the repository's blob store; only index entries
/// and tags are scoped.
pub trait NamespaceAccess: Send + Sync {
    /// Namespace name; the root namespace is `""`.
    fn name(&self) -> &str;

    fn add_blob(&self, blob: &dyn BlobAccess) -> RepoResult<Digest>;

    fn get_blob(&self, digest: &Digest, media_type: &str) -> RepoResult<Box<dyn BlobAccess>>;

    fn has_blob(&self, digest: &Digest) -> RepoResult<bool>;

    /// Store a manifest or index blob and list it in this namespace under
    /// `tags`.
    fn add_artifact(&self, artifact: &dyn BlobAccess, tags: &[String]) -> RepoResult<Descriptor>;

    /// List an already stored artifact in this namespace.
    fn add_descriptor(&self, descriptor: Descriptor) -> RepoResult<()>;

    fn add_tags(&self, digest: &Digest, tags: &[String]) -> RepoResult<()>;

    fn lookup(&self, digest: &Digest) -> RepoResult<Option<Descriptor>>;

    /// Resolve a tag or digest string to the listed descriptor.
    fn resolve(&self, reference: &str) -> RepoResult<Descriptor>;

    /// Read and parse the artifact named by a tag or digest string.
    fn get_artifact(&self, reference: &str) -> RepoResult<ArtifactAccess> {
        let descriptor = self.resolve(reference)?;
        let raw = self
            .get_blob(&descriptor.digest, &descriptor.media_type)?
            .get()?;
        ArtifactAccess::new(descriptor, raw)
    }

    fn tags(&self) -> RepoResult<BTreeSet<String>>;

    /// Listed artifacts, in index order.
    fn artifacts(&self) -> RepoResult<Vec<Descriptor>>;
}

/// Namespace of a [`Repository`](crate::Repository).
///
/// Handles are cheap; a namespace with no entries simply lists nothing.
#[derive(Clone, Debug)]
pub struct Namespace {
    object: Arc<AccessObject>,
    name: String,
}

impl Namespace {
    pub(crate) fn new(object: Arc<AccessObject>, name: impl Into<String>) -> Self {
        Self {
            object,
            name: name.into(),
        }
    }
}

impl NamespaceAccess for Namespace {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_blob(&self, blob: &dyn BlobAccess) -> RepoResult<Digest> {
        Ok(self.object.add_blob(blob)?)
    }

    fn get_blob(&self, digest: &Digest, media_type: &str) -> RepoResult<Box<dyn BlobAccess>> {
        Ok(self.object.get_blob(digest, media_type)?)
    }

    fn has_blob(&self, digest: &Digest) -> RepoResult<bool> {
        Ok(self.object.has_blob(digest)?)
    }

    fn add_artifact(&self, artifact: &dyn BlobAccess, tags: &[String]) -> RepoResult<Descriptor> {
        let media_type = artifact.media_type();
        if !is_manifest(media_type) && !is_index(media_type) {
            return Err(TypeError::UnsupportedMediaType(media_type.to_string()).into());
        }
        for tag in tags {
            validate_tag(tag)?;
        }
        ArtifactContent::parse(media_type, &artifact.get()?)?;
        let digest = self.object.add_blob(artifact)?;
        let mut descriptor = Descriptor::new(media_type, digest, artifact.size()?);
        if !tags.is_empty() {
            descriptor = descriptor.with_annotation(ANNOTATION_TAGS, tags.join(","));
        }
        self.add_descriptor(descriptor.clone())?;
        tracing::debug!(namespace = %self.name, digest = %descriptor.digest, ?tags, "added artifact");
        Ok(descriptor)
    }

    fn add_descriptor(&self, descriptor: Descriptor) -> RepoResult<()> {
        self.object.update_index(|index| {
            index.add(&self.name, descriptor);
            Ok(())
        })?;
        Ok(())
    }

    fn add_tags(&self, digest: &Digest, tags: &[String]) -> RepoResult<()> {
        self.object
            .update_index(|index| Ok(index.add_tags(&self.name, digest, tags)?))?;
        Ok(())
    }

    fn lookup(&self, digest: &Digest) -> RepoResult<Option<Descriptor>> {
        Ok(self
            .object
            .with_index(|index| index.lookup(&self.name, digest).cloned())?)
    }

    fn resolve(&self, reference: &str) -> RepoResult<Descriptor> {
        self.object
            .with_index(|index| index.resolve(&self.name, reference).cloned())?
            .ok_or_else(|| RepoError::ArtifactNotFound {
                namespace: self.name.clone(),
                reference: reference.to_string(),
            })
    }

    fn tags(&self) -> RepoResult<BTreeSet<String>> {
        Ok(self.object.with_index(|index| index.tags(&self.name))?)
    }

    fn artifacts(&self) -> RepoResult<Vec<Descriptor>> {
        Ok(self
            .object
            .with_index(|index| index.entries(&self.name).cloned().collect())?)
    }
}
