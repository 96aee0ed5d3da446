//! Media types and reserved annotation keys.

pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/octet-stream";

pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str =
    "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// Generic artifact-set archive, used when the root media type is unknown.
pub const MEDIA_TYPE_ARTIFACT_SET: &str = "application/vnd.ctf.artifact-set.v1+tar";

pub const SUFFIX_JSON: &str = "+json";
pub const SUFFIX_TAR: &str = "+tar";
pub const SUFFIX_GZIP: &str = "+gzip";
pub const SUFFIX_ZSTD: &str = "+zstd";

/// Index annotation naming the root artifact of an artifact set.
pub const ANNOTATION_MAIN_ARTIFACT: &str = "ctf.artifact/main";
/// Descriptor annotation listing the tags bound to it (comma separated).
pub const ANNOTATION_TAGS: &str = "ctf.artifact/tags";
/// Descriptor annotation naming the namespace it belongs to.
pub const ANNOTATION_NAMESPACE: &str = "ctf.artifact/namespace";

pub fn is_manifest(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_IMAGE_MANIFEST || media_type == MEDIA_TYPE_DOCKER_MANIFEST
}

pub fn is_index(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_IMAGE_INDEX || media_type == MEDIA_TYPE_DOCKER_MANIFEST_LIST
}

/// Strip a trailing compression marker, returning the base type and the marker.
pub fn split_compression(media_type: &str) -> (&str, Option<&'static str>) {
    for suffix in [SUFFIX_GZIP, SUFFIX_ZSTD] {
        if let Some(base) = media_type.strip_suffix(suffix) {
            return (base, Some(suffix));
        }
    }
    (media_type, None)
}

/// Archive media type for an artifact set whose root has `root_media_type`.
///
/// `application/vnd.oci.image.manifest.v1+json` becomes
/// `application/vnd.oci.image.manifest.v1+tar`, followed by the compression
/// marker if any.
pub fn artifact_set_media_type(root_media_type: &str, compression: Option<&str>) -> String {
    let base = if is_manifest(root_media_type) || is_index(root_media_type) {
        let stem = root_media_type
            .strip_suffix(SUFFIX_JSON)
            .unwrap_or(root_media_type);
        format!("{stem}{SUFFIX_TAR}")
    } else {
        MEDIA_TYPE_ARTIFACT_SET.to_string()
    };
    match compression {
        Some(marker) => format!("{base}{marker}"),
        None => base,
    }
}

/// Whether `media_type` denotes an artifact-set archive (any compression).
pub fn is_artifact_set(media_type: &str) -> bool {
    split_compression(media_type).0.ends_with(SUFFIX_TAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_set_type_for_manifest() {
        assert_eq!(
            artifact_set_media_type(MEDIA_TYPE_IMAGE_MANIFEST, Some(SUFFIX_GZIP)),
            "application/vnd.oci.image.manifest.v1+tar+gzip"
        );
        assert_eq!(
            artifact_set_media_type(MEDIA_TYPE_IMAGE_INDEX, None),
            "application/vnd.oci.image.index.v1+tar"
        );
    }

    #[test]
    fn artifact_set_type_for_unknown_root() {
        assert_eq!(
            artifact_set_media_type("text/plain", Some(SUFFIX_ZSTD)),
            "application/vnd.ctf.artifact-set.v1+tar+zstd"
        );
    }

    #[test]
    fn compression_split() {
        assert_eq!(split_compression("a+tar+gzip"), ("a+tar", Some(SUFFIX_GZIP)));
        assert_eq!(split_compression("a+tar+zstd"), ("a+tar", Some(SUFFIX_ZSTD)));
        assert_eq!(split_compression("a+tar"), ("a+tar", None));
    }

    #[test]
    fn artifact_set_detection() {
        assert!(is_artifact_set("application/vnd.oci.image.manifest.v1+tar+gzip"));
        assert!(is_artifact_set(MEDIA_TYPE_ARTIFACT_SET));
        assert!(!is_artifact_set(MEDIA_TYPE_IMAGE_MANIFEST));
        assert!(!is_artifact_set(MEDIA_TYPE_OCTET_STREAM));
    }
}
