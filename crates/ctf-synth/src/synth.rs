use std::collections::BTreeSet;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ctf_format::{ArchiveFormat, Compression, FormatHandler, DEFAULT_FILE_MODE};
use ctf_repo::{EngineConfig, NamespaceAccess};
use ctf_store::{BlobStore, TempBlob};
use ctf_types::media::{artifact_set_media_type, is_index, is_manifest, ANNOTATION_TAGS};
use ctf_types::{ArtifactContent, Descriptor, Digest};

use crate::error::{SynthError, SynthResult};

/// File-name prefix of synthesized artifact blobs.
pub const ARTIFACT_BLOB_PREFIX: &str = "artifactblob";

/// Builds self-contained artifact-set blobs from a namespace.
#[derive(Clone, Debug)]
pub struct Synthesizer {
    format: ArchiveFormat,
    temp_dir: Option<PathBuf>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self {
            format: ArchiveFormat::gzip(),
            temp_dir: None,
        }
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut format = ArchiveFormat::gzip();
        if let Some(level) = config.compression_level {
            format = format.with_level(level);
        }
        Self {
            format,
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// Archive codec for the synthesized blob.
    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.format = format;
        self
    }

    /// Directory the temporary blob file is created in.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn extension(&self) -> &'static str {
        match self.format.compression() {
            None => ".tar",
            Some(Compression::Gzip) => ".tgz",
            Some(Compression::Zstd) => ".tzst",
        }
    }

    /// Synthesize the artifact named by `reference` (tag or digest) in `ns`.
    ///
    /// The blob holds verbatim copies of every blob reachable from the root
    /// and an index listing every reachable manifest or index, referenced
    /// artifacts before the ones referencing them and the root last. Only the
    /// root is marked as main artifact, and it is tagged with `reference` when
    /// that is a tag. The same namespace state always yields byte-identical
    /// output.
    pub fn synthesize(&self, ns: &dyn NamespaceAccess, reference: &str) -> SynthResult<TempBlob> {
        let root = ns.resolve(reference)?;
        let reachable = walk(&root, |d| children(ns, d))?;

        let mut content = self.format.create(Path::new(""), DEFAULT_FILE_MODE)?;
        for descriptor in &reachable {
            let blob = ns.get_blob(&descriptor.digest, &descriptor.media_type)?;
            content.blobs.add(blob.as_ref())?;
        }

        for descriptor in reachable.iter().filter(|d| d.digest != root.digest) {
            if is_manifest(&descriptor.media_type) || is_index(&descriptor.media_type) {
                content.index.add("", descriptor.stripped());
            }
        }
        let mut entry = root.stripped();
        if Digest::parse(reference).is_err() {
            entry = entry.with_annotation(ANNOTATION_TAGS, reference);
        }
        content.index.add("", entry);
        content.index.set_main_artifact(&root.digest)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(ARTIFACT_BLOB_PREFIX).suffix(self.extension());
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let file = self
            .format
            .write_to(&content, BufWriter::new(file))?
            .into_inner()
            .map_err(|e| e.into_error())?;
        file.as_file().sync_all()?;

        let media_type = artifact_set_media_type(
            &root.media_type,
            self.format.compression().map(|c| c.media_suffix()),
        );
        let blob = TempBlob::new(file.into_temp_path(), media_type);
        tracing::info!(
            namespace = ns.name(),
            reference,
            root = %root.digest,
            blobs = reachable.len(),
            "synthesized artifact set"
        );
        Ok(blob)
    }
}

/// Synthesize with default settings: gzip archive in the system temp dir.
pub fn synthesize_artifact_blob(ns: &dyn NamespaceAccess, reference: &str) -> SynthResult<TempBlob> {
    Synthesizer::default().synthesize(ns, reference)
}

/// Direct references of `descriptor`, after checking its blob is present.
fn children(ns: &dyn NamespaceAccess, descriptor: &Descriptor) -> SynthResult<Vec<Descriptor>> {
    if !ns.has_blob(&descriptor.digest)? {
        return Err(SynthError::MissingBlob(descriptor.digest.clone()));
    }
    if !is_manifest(&descriptor.media_type) && !is_index(&descriptor.media_type) {
        return Ok(Vec::new());
    }
    let raw = ns
        .get_blob(&descriptor.digest, &descriptor.media_type)?
        .get()?;
    let content = ArtifactContent::parse(&descriptor.media_type, &raw)?;
    Ok(content.references().into_iter().cloned().collect())
}

enum Step {
    Enter(Descriptor),
    Exit(Descriptor),
}

/// Depth-first walk from `root` over an explicit stack.
///
/// Returns every reachable descriptor once, in completion order: each
/// descriptor follows everything it references and `root` comes last.
/// Reaching a descriptor that is still being expanded is a cycle.
pub(crate) fn walk(
    root: &Descriptor,
    mut children: impl FnMut(&Descriptor) -> SynthResult<Vec<Descriptor>>,
) -> SynthResult<Vec<Descriptor>> {
    let mut stack = vec![Step::Enter(root.clone())];
    let mut on_path = BTreeSet::new();
    let mut done = BTreeSet::new();
    let mut order = Vec::new();

    while let Some(step) = stack.pop() {
        match step {
            Step::Exit(descriptor) => {
                on_path.remove(&descriptor.digest);
                done.insert(descriptor.digest.clone());
                order.push(descriptor);
            }
            Step::Enter(descriptor) => {
                if on_path.contains(&descriptor.digest) {
                    return Err(SynthError::Cycle(descriptor.digest));
                }
                if done.contains(&descriptor.digest) {
                    continue;
                }
                let next = children(&descriptor)?;
                on_path.insert(descriptor.digest.clone());
                stack.push(Step::Exit(descriptor));
                stack.extend(next.into_iter().rev().map(Step::Enter));
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_types::media::{MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_OCTET_STREAM};
    use ctf_types::ErrorKind;
    use std::collections::BTreeMap;

    fn node(name: &str, media_type: &str) -> Descriptor {
        Descriptor::for_content(media_type, name.as_bytes())
    }

    fn graph_walk(
        root: &Descriptor,
        edges: &BTreeMap<Digest, Vec<Descriptor>>,
    ) -> SynthResult<Vec<Descriptor>> {
        walk(root, |d| Ok(edges.get(&d.digest).cloned().unwrap_or_default()))
    }

    #[test]
    fn walk_visits_shared_nodes_once() {
        let root = node("root", MEDIA_TYPE_IMAGE_INDEX);
        let a = node("a", MEDIA_TYPE_IMAGE_INDEX);
        let b = node("b", MEDIA_TYPE_IMAGE_INDEX);
        let shared = node("shared", MEDIA_TYPE_OCTET_STREAM);
        let mut edges = BTreeMap::new();
        edges.insert(root.digest.clone(), vec![a.clone(), b.clone()]);
        edges.insert(a.digest.clone(), vec![shared.clone()]);
        edges.insert(b.digest.clone(), vec![shared.clone()]);

        let order = graph_walk(&root, &edges).unwrap();
        let digests: Vec<_> = order.iter().map(|d| d.digest.clone()).collect();
        assert_eq!(digests, vec![shared.digest, a.digest, b.digest, root.digest]);
    }

    #[test]
    fn walk_detects_cycle() {
        let root = node("root", MEDIA_TYPE_IMAGE_INDEX);
        let child = node("child", MEDIA_TYPE_IMAGE_INDEX);
        let mut edges = BTreeMap::new();
        edges.insert(root.digest.clone(), vec![child.clone()]);
        edges.insert(child.digest.clone(), vec![root.clone()]);

        let err = graph_walk(&root, &edges).unwrap_err();
        assert!(matches!(err, SynthError::Cycle(ref d) if *d == root.digest));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn walk_detects_self_reference() {
        let root = node("root", MEDIA_TYPE_IMAGE_INDEX);
        let mut edges = BTreeMap::new();
        edges.insert(root.digest.clone(), vec![root.clone()]);
        assert!(matches!(graph_walk(&root, &edges), Err(SynthError::Cycle(_))));
    }

    #[test]
    fn walk_handles_deep_chains() {
        let chain: Vec<Descriptor> = (0..10_000)
            .map(|i| node(&format!("n{i}"), MEDIA_TYPE_IMAGE_INDEX))
            .collect();
        let mut edges = BTreeMap::new();
        for pair in chain.windows(2) {
            edges.insert(pair[0].digest.clone(), vec![pair[1].clone()]);
        }
        assert_eq!(graph_walk(&chain[0], &edges).unwrap().len(), chain.len());
    }

    #[test]
    fn walk_propagates_child_errors() {
        let root = node("root", MEDIA_TYPE_IMAGE_INDEX);
        let err = walk(&root, |d| Err(SynthError::MissingBlob(d.digest.clone()))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
