//! Repository view over a transport-format object.
//!
//! A [`Repository`] wraps one open object and exposes it as a set of
//! [`Namespace`]s, each binding tags to manifests and indexes. Blobs are
//! shared across namespaces. [`RepositorySpec`] describes a repository in a
//! serializable form and [`EngineConfig`] carries engine-wide settings.

pub mod artifact;
pub mod config;
pub mod error;
pub mod namespace;
pub mod repo_spec;
pub mod repository;

pub use artifact::ArtifactAccess;
pub use config::{EngineConfig, CONFIG_ENV};
pub use error::{RepoError, RepoResult};
pub use namespace::{Namespace, NamespaceAccess};
pub use repo_spec::{RepositorySpec, REPOSITORY_TYPE};
pub use repository::Repository;
