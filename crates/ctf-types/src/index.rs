use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::descriptor::{validate_tag, Descriptor};
use crate::digest::Digest;
use crate::error::TypeError;
use crate::media::ANNOTATION_MAIN_ARTIFACT;

/// Schema version written into every artifact index file.
pub const INDEX_SCHEMA_VERSION: u32 = 2;

/// Ordered table of artifact descriptors plus index-level annotations.
///
/// This is the root catalog of one repository object. Descriptor order is
/// insertion order and survives serialization. A descriptor is identified by
/// its namespace and digest: the same digest may appear once per namespace,
/// and tags are unique within a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactIndex {
    pub schema_version: u32,
    #[serde(rename = "manifests", default)]
    pub descriptors: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Default for ArtifactIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactIndex {
    pub fn new() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            descriptors: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn position(&self, namespace: &str, digest: &Digest) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|d| d.namespace() == namespace && d.digest == *digest)
    }

    /// Look up the descriptor for `digest` in `namespace`.
    pub fn lookup(&self, namespace: &str, digest: &Digest) -> Option<&Descriptor> {
        self.position(namespace, digest).map(|i| &self.descriptors[i])
    }

    /// First descriptor carrying `digest`, in any namespace.
    pub fn find(&self, digest: &Digest) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.digest == *digest)
    }

    /// Resolve a tag within a namespace.
    pub fn resolve_tag(&self, namespace: &str, tag: &str) -> Option<&Descriptor> {
        self.descriptors
            .iter()
            .find(|d| d.namespace() == namespace && d.has_tag(tag))
    }

    /// Resolve a reference that is either a digest string or a tag.
    pub fn resolve(&self, namespace: &str, reference: &str) -> Option<&Descriptor> {
        match Digest::parse(reference) {
            Ok(digest) => self.lookup(namespace, &digest),
            Err(_) => self.resolve_tag(namespace, reference),
        }
    }

    /// Append a descriptor to `namespace`.
    ///
    /// An existing entry with the same namespace and digest is replaced in
    /// place; its tags are merged with the new ones. Tags carried by the new
    /// descriptor are detached from every other digest in the namespace.
    pub fn add(&mut self, namespace: &str, mut descriptor: Descriptor) {
        descriptor.set_namespace(namespace);
        let new_tags = descriptor.tags();
        for tag in &new_tags {
            self.detach_tag(namespace, tag, Some(&descriptor.digest));
        }
        match self.position(namespace, &descriptor.digest) {
            Some(pos) => {
                let mut tags = self.descriptors[pos].tags();
                for tag in new_tags {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
                descriptor.set_tags(&tags);
                self.descriptors[pos] = descriptor;
            }
            None => self.descriptors.push(descriptor),
        }
    }

    /// Bind additional tags to an existing entry.
    ///
    /// Every tag is validated first; on error the index is unchanged.
    pub fn add_tags(
        &mut self,
        namespace: &str,
        digest: &Digest,
        tags: &[String],
    ) -> Result<(), TypeError> {
        for tag in tags {
            validate_tag(tag)?;
        }
        let pos = self
            .position(namespace, digest)
            .ok_or_else(|| TypeError::UnknownDigest(digest.clone()))?;
        for tag in tags {
            self.detach_tag(namespace, tag, Some(digest));
        }
        let descriptor = &mut self.descriptors[pos];
        let mut current = descriptor.tags();
        for tag in tags {
            if !current.contains(tag) {
                current.push(tag.clone());
            }
        }
        descriptor.set_tags(&current);
        Ok(())
    }

    /// Unbind a tag. Returns `true` if it was bound.
    pub fn remove_tag(&mut self, namespace: &str, tag: &str) -> bool {
        self.detach_tag(namespace, tag, None)
    }

    fn detach_tag(&mut self, namespace: &str, tag: &str, except: Option<&Digest>) -> bool {
        let mut removed = false;
        for descriptor in self
            .descriptors
            .iter_mut()
            .filter(|d| d.namespace() == namespace && Some(&d.digest) != except)
        {
            let tags = descriptor.tags();
            if tags.iter().any(|t| t == tag) {
                let kept: Vec<String> = tags.into_iter().filter(|t| t != tag).collect();
                descriptor.set_tags(&kept);
                removed = true;
            }
        }
        removed
    }

    /// Set an annotation on an existing entry.
    pub fn annotate(
        &mut self,
        namespace: &str,
        digest: &Digest,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TypeError> {
        let pos = self
            .position(namespace, digest)
            .ok_or_else(|| TypeError::UnknownDigest(digest.clone()))?;
        self.descriptors[pos]
            .annotations
            .insert(key.into(), value.into());
        Ok(())
    }

    /// All tags bound in `namespace`.
    pub fn tags(&self, namespace: &str) -> BTreeSet<String> {
        self.entries(namespace).flat_map(|d| d.tags()).collect()
    }

    /// Descriptors belonging to `namespace`, in index order.
    pub fn entries<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Descriptor> + 'a {
        self.descriptors
            .iter()
            .filter(move |d| d.namespace() == namespace)
    }

    /// Every namespace with at least one descriptor.
    pub fn namespaces(&self) -> BTreeSet<String> {
        self.descriptors
            .iter()
            .map(|d| d.namespace().to_string())
            .collect()
    }

    /// Distinct digests referenced by the index.
    pub fn digests(&self) -> BTreeSet<Digest> {
        self.descriptors.iter().map(|d| d.digest.clone()).collect()
    }

    /// Designate the main artifact. The digest must be present in the index.
    pub fn set_main_artifact(&mut self, digest: &Digest) -> Result<(), TypeError> {
        if self.find(digest).is_none() {
            return Err(TypeError::UnknownDigest(digest.clone()));
        }
        self.annotations
            .insert(ANNOTATION_MAIN_ARTIFACT.to_string(), digest.to_string());
        Ok(())
    }

    /// The designated main artifact, if any.
    pub fn main_artifact(&self) -> Result<Option<Digest>, TypeError> {
        self.annotations
            .get(ANNOTATION_MAIN_ARTIFACT)
            .map(|s| Digest::parse(s))
            .transpose()
    }

    /// Canonical JSON encoding of the index file.
    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ANNOTATION_NAMESPACE, ANNOTATION_TAGS, MEDIA_TYPE_IMAGE_MANIFEST};

    fn manifest(content: &[u8]) -> Descriptor {
        Descriptor::for_content(MEDIA_TYPE_IMAGE_MANIFEST, content)
    }

    fn tagged(content: &[u8], tag: &str) -> Descriptor {
        manifest(content).with_annotation(ANNOTATION_TAGS, tag)
    }

    #[test]
    fn add_preserves_order() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", manifest(b"a"));
        idx.add("ns", manifest(b"b"));
        idx.add("ns", manifest(b"c"));
        let digests: Vec<_> = idx.descriptors.iter().map(|d| d.digest.clone()).collect();
        assert_eq!(
            digests,
            vec![
                Digest::from_bytes(b"a"),
                Digest::from_bytes(b"b"),
                Digest::from_bytes(b"c")
            ]
        );
    }

    #[test]
    fn add_same_digest_replaces_and_merges_tags() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", tagged(b"a", "v1"));
        idx.add("ns", tagged(b"a", "v2"));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.descriptors[0].tags(), vec!["v1", "v2"]);
    }

    #[test]
    fn same_digest_in_two_namespaces() {
        let mut idx = ArtifactIndex::new();
        idx.add("one", tagged(b"a", "v1"));
        idx.add("two", tagged(b"a", "v1"));
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.namespaces().len(), 2);
        assert_eq!(idx.digests().len(), 1);
        assert_eq!(idx.descriptors[0].annotations[ANNOTATION_NAMESPACE], "one");
    }

    #[test]
    fn retagging_moves_tag() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", tagged(b"a", "latest"));
        idx.add("ns", tagged(b"b", "latest"));
        let resolved = idx.resolve_tag("ns", "latest").unwrap();
        assert_eq!(resolved.digest, Digest::from_bytes(b"b"));
        assert!(idx.lookup("ns", &Digest::from_bytes(b"a")).unwrap().tags().is_empty());
    }

    #[test]
    fn add_tags_requires_known_digest() {
        let mut idx = ArtifactIndex::new();
        let err = idx
            .add_tags("ns", &Digest::from_bytes(b"x"), &["v1".into()])
            .unwrap_err();
        assert!(matches!(err, TypeError::UnknownDigest(_)));
    }

    #[test]
    fn add_tags_rejects_malformed_tag() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", tagged(b"a", "v1"));
        let before = idx.clone();
        let err = idx
            .add_tags("ns", &Digest::from_bytes(b"a"), &["v2".into(), "a,b".into()])
            .unwrap_err();
        assert_eq!(err, TypeError::InvalidTag("a,b".into()));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
        assert_eq!(idx, before);
    }

    #[test]
    fn tags_per_namespace() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", tagged(b"a", "v1"));
        idx.add_tags("ns", &Digest::from_bytes(b"a"), &["v2".into()]).unwrap();
        idx.add("other", tagged(b"b", "v9"));
        let tags: Vec<_> = idx.tags("ns").into_iter().collect();
        assert_eq!(tags, vec!["v1", "v2"]);
        assert!(idx.remove_tag("ns", "v1"));
        assert!(!idx.remove_tag("ns", "v1"));
        assert!(idx.resolve_tag("ns", "v1").is_none());
    }

    #[test]
    fn resolve_by_digest_or_tag() {
        let mut idx = ArtifactIndex::new();
        idx.add("", tagged(b"a", "v1"));
        let digest = Digest::from_bytes(b"a");
        assert!(idx.resolve("", "v1").is_some());
        assert!(idx.resolve("", &digest.to_string()).is_some());
        assert!(idx.resolve("", "v2").is_none());
    }

    #[test]
    fn main_artifact_must_be_present() {
        let mut idx = ArtifactIndex::new();
        let digest = Digest::from_bytes(b"a");
        assert!(idx.set_main_artifact(&digest).is_err());
        idx.add("", manifest(b"a"));
        idx.set_main_artifact(&digest).unwrap();
        assert_eq!(idx.main_artifact().unwrap(), Some(digest.clone()));
        assert_eq!(idx.annotations[ANNOTATION_MAIN_ARTIFACT], digest.to_string());
    }

    #[test]
    fn annotate_entry() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", manifest(b"a"));
        idx.annotate("ns", &Digest::from_bytes(b"a"), "k", "v").unwrap();
        assert_eq!(idx.descriptors[0].annotations["k"], "v");
        assert!(idx.annotate("ns", &Digest::from_bytes(b"z"), "k", "v").is_err());
    }

    #[test]
    fn json_roundtrip_is_stable() {
        let mut idx = ArtifactIndex::new();
        idx.add("ns", tagged(b"a", "v1"));
        idx.add("", manifest(b"b"));
        idx.set_main_artifact(&Digest::from_bytes(b"b")).unwrap();
        let bytes = idx.to_json().unwrap();
        let parsed = ArtifactIndex::from_json(&bytes).unwrap();
        assert_eq!(parsed, idx);
        assert_eq!(parsed.to_json().unwrap(), bytes);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"manifests\""));
        assert!(text.contains("\"schemaVersion\": 2"));
    }

    #[test]
    fn from_json_rejects_garbage() {
        let err = ArtifactIndex::from_json(b"not json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Integrity);
    }
}
