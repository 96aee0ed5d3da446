use ctf_format::FormatRegistry;
use ctf_repo::NamespaceAccess;
use ctf_store::BlobAccess;
use ctf_types::media::is_artifact_set;
use ctf_types::{Descriptor, TypeError};

use crate::error::SynthResult;
use crate::extract::ArtifactSet;

/// Determines the identity of the artifact carried by an artifact-set blob.
#[derive(Clone, Debug, Default)]
pub struct ArtifactDigester {
    registry: FormatRegistry,
}

impl ArtifactDigester {
    pub fn new(registry: FormatRegistry) -> Self {
        Self { registry }
    }

    /// Descriptor of the set's main artifact, without index bookkeeping.
    ///
    /// The artifact blob is read and checked against its digest; the archive
    /// bytes themselves play no part in the result, so any encoding of the
    /// same set yields the same descriptor.
    pub fn determine_digest(&self, blob: &dyn BlobAccess) -> SynthResult<Descriptor> {
        if !is_artifact_set(blob.media_type()) {
            return Err(TypeError::UnsupportedMediaType(blob.media_type().to_string()).into());
        }
        let set = ArtifactSet::open(&self.registry, blob)?;
        let verified = set
            .main_artifact()
            .and_then(|main| Ok(set.namespace().get_artifact(&main.digest.to_string())?));
        set.close()?;
        let artifact = verified?;
        tracing::debug!(digest = %artifact.digest(), "determined artifact digest");
        Ok(artifact.descriptor().stripped())
    }
}
