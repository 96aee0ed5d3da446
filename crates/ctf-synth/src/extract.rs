use ctf_format::FormatRegistry;
use ctf_repo::{Namespace, NamespaceAccess, Repository};
use ctf_store::BlobAccess;
use ctf_types::media::MEDIA_TYPE_OCTET_STREAM;
use ctf_types::{ArtifactIndex, Descriptor};

use crate::error::{SynthError, SynthResult};
use crate::synth::Synthesizer;

/// A synthesized artifact set opened for reading.
#[derive(Clone, Debug)]
pub struct ArtifactSet {
    repo: Repository,
}

impl ArtifactSet {
    /// Open an artifact-set blob; the archive format follows its media type.
    pub fn open(registry: &FormatRegistry, blob: &dyn BlobAccess) -> SynthResult<Self> {
        Ok(Self {
            repo: Repository::open_from_blob(registry, blob)?,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The set's root namespace, which holds every listed artifact.
    pub fn namespace(&self) -> Namespace {
        self.repo.namespace("")
    }

    pub fn index(&self) -> SynthResult<ArtifactIndex> {
        Ok(self.repo.index()?)
    }

    /// Descriptor of the artifact the set was synthesized for.
    pub fn main_artifact(&self) -> SynthResult<Descriptor> {
        let digest = self
            .repo
            .main_artifact()?
            .ok_or(SynthError::MissingMainArtifact)?;
        self.namespace()
            .lookup(&digest)?
            .ok_or(SynthError::MissingBlob(digest))
    }

    pub fn close(&self) -> SynthResult<()> {
        Ok(self.repo.close()?)
    }
}

pub fn open_artifact_set(registry: &FormatRegistry, blob: &dyn BlobAccess) -> SynthResult<ArtifactSet> {
    ArtifactSet::open(registry, blob)
}

/// Copy every blob and listed artifact of an artifact set into `target`.
///
/// Tags recorded in the set are kept. Returns the main artifact's descriptor
/// as listed in `target`.
pub fn import_artifact_set(
    registry: &FormatRegistry,
    blob: &dyn BlobAccess,
    target: &dyn NamespaceAccess,
) -> SynthResult<Descriptor> {
    let set = ArtifactSet::open(registry, blob)?;
    let source = set.namespace();
    let main = set.main_artifact()?;

    for digest in set.repo.object().blob_digests()? {
        let blob = source.get_blob(&digest, MEDIA_TYPE_OCTET_STREAM)?;
        target.add_blob(blob.as_ref())?;
    }
    for descriptor in source.artifacts()? {
        target.add_descriptor(descriptor)?;
    }
    set.close()?;

    let listed = target
        .lookup(&main.digest)?
        .ok_or_else(|| SynthError::MissingBlob(main.digest.clone()))?;
    tracing::info!(namespace = target.name(), digest = %listed.digest, "imported artifact set");
    Ok(listed)
}

/// Move the artifact `reference` from `source` into `target` through a
/// synthesized artifact set.
pub fn transfer_artifact(
    registry: &FormatRegistry,
    synthesizer: &Synthesizer,
    source: &dyn NamespaceAccess,
    reference: &str,
    target: &dyn NamespaceAccess,
) -> SynthResult<Descriptor> {
    let blob = synthesizer.synthesize(source, reference)?;
    let result = import_artifact_set(registry, &blob, target);
    blob.close()?;
    result
}
