use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::TypeError;
use crate::media::{is_index, is_manifest};

/// OCI image manifest: one configuration blob plus an ordered layer list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// OCI image index: a list of manifests (or nested indexes).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Parsed content of a manifest or index blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactContent {
    Manifest(Manifest),
    Index(ImageIndex),
}

impl ArtifactContent {
    /// Parse blob bytes according to the descriptor media type.
    pub fn parse(media_type: &str, data: &[u8]) -> Result<Self, TypeError> {
        if is_manifest(media_type) {
            serde_json::from_slice(data)
                .map(Self::Manifest)
                .map_err(|e| TypeError::Serialization(format!("manifest: {e}")))
        } else if is_index(media_type) {
            serde_json::from_slice(data)
                .map(Self::Index)
                .map_err(|e| TypeError::Serialization(format!("index: {e}")))
        } else {
            Err(TypeError::UnsupportedMediaType(media_type.to_string()))
        }
    }

    /// Descriptors this artifact references directly.
    ///
    /// For a manifest: the config followed by every layer. For an index:
    /// every listed manifest.
    pub fn references(&self) -> Vec<&Descriptor> {
        match self {
            Self::Manifest(m) => std::iter::once(&m.config).chain(m.layers.iter()).collect(),
            Self::Index(i) => i.manifests.iter().collect(),
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    pub fn as_manifest(&self) -> Option<&Manifest> {
        match self {
            Self::Manifest(m) => Some(m),
            Self::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<&ImageIndex> {
        match self {
            Self::Index(i) => Some(i),
            Self::Manifest(_) => None,
        }
    }
}
