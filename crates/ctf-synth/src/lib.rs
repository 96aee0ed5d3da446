//! Artifact-set synthesis and extraction.
//!
//! An artifact set is a self-contained archive holding one artifact (a
//! manifest or index) plus every blob reachable from it. Sets move artifacts
//! between repositories and let a consumer learn an artifact's identity
//! without a repository.
//!
//! # Architecture
//!
//! - [`Synthesizer`]: walks the artifact graph and writes a deterministic
//!   archive into a temporary [`TempBlob`](ctf_store::TempBlob)
//! - [`ArtifactSet`]: a set opened read-only through the format registry
//! - [`ArtifactDigester`]: main-artifact descriptor of a set blob
//! - [`import_artifact_set`] / [`transfer_artifact`]: copy a set into a
//!   namespace
//!
//! # Design Rules
//!
//! 1. The set index lists every reachable manifest and index, referenced
//!    artifacts first; only the root is tagged and marked as main artifact.
//! 2. Every copied blob is digest-verified on the way in.
//! 3. The temporary blob file lives until its last holder closes.

pub mod digester;
pub mod error;
pub mod extract;
pub mod synth;

pub use digester::ArtifactDigester;
pub use error::{SynthError, SynthResult};
pub use extract::{import_artifact_set, open_artifact_set, transfer_artifact, ArtifactSet};
pub use synth::{synthesize_artifact_blob, Synthesizer, ARTIFACT_BLOB_PREFIX};
