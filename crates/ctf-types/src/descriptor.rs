use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::TypeError;
use crate::media::{ANNOTATION_NAMESPACE, ANNOTATION_TAGS};

/// Longest tag accepted by [`validate_tag`].
pub const MAX_TAG_LEN: usize = 128;

/// Check a tag against the OCI tag grammar `[A-Za-z0-9_][A-Za-z0-9._-]{0,127}`.
///
/// Tags are stored comma-joined in one annotation, so anything outside the
/// grammar could not be resolved again.
pub fn validate_tag(tag: &str) -> Result<(), TypeError> {
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphanumeric() || first == '_')
                && tag.len() <= MAX_TAG_LEN
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(TypeError::InvalidTag(tag.to_string()))
    }
}

/// Metadata record pointing at a blob: digest, media type, size, annotations.
///
/// Annotations are kept in a `BTreeMap` so serialization is byte-stable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: Digest,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: Digest, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            size,
            annotations: BTreeMap::new(),
        }
    }

    /// Descriptor for in-memory content, computing its SHA-256 digest.
    pub fn for_content(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self::new(media_type, Digest::from_bytes(data), data.len() as u64)
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Namespace this descriptor belongs to; the root namespace is `""`.
    pub fn namespace(&self) -> &str {
        self.annotations
            .get(ANNOTATION_NAMESPACE)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub(crate) fn set_namespace(&mut self, namespace: &str) {
        if namespace.is_empty() {
            self.annotations.remove(ANNOTATION_NAMESPACE);
        } else {
            self.annotations
                .insert(ANNOTATION_NAMESPACE.to_string(), namespace.to_string());
        }
    }

    /// Tags bound to this descriptor, in stored order.
    pub fn tags(&self) -> Vec<String> {
        self.annotations
            .get(ANNOTATION_TAGS)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    pub(crate) fn set_tags(&mut self, tags: &[String]) {
        if tags.is_empty() {
            self.annotations.remove(ANNOTATION_TAGS);
        } else {
            self.annotations
                .insert(ANNOTATION_TAGS.to_string(), tags.join(","));
        }
    }

    /// Copy of this descriptor without namespace and tag bookkeeping.
    pub fn stripped(&self) -> Self {
        let mut copy = self.clone();
        copy.annotations.remove(ANNOTATION_NAMESPACE);
        copy.annotations.remove(ANNOTATION_TAGS);
        copy
    }
}
