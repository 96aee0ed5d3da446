use std::path::PathBuf;

use ctf_format::{AccessMode, AccessOptions, FileFormat, FormatRegistry};
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};
use crate::repository::Repository;

/// Repository type identifier for transport-format repositories.
pub const REPOSITORY_TYPE: &str = "CommonTransportFormat";

/// Serializable description of a transport-format repository, as consumed by
/// a repository-type dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySpec {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub file_path: PathBuf,
    #[serde(default)]
    pub access_mode: AccessMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<FileFormat>,
}

impl RepositorySpec {
    pub fn new(file_path: impl Into<PathBuf>, access_mode: AccessMode) -> Self {
        Self {
            repo_type: REPOSITORY_TYPE.to_string(),
            file_path: file_path.into(),
            access_mode,
            file_format: None,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.file_format = Some(format);
        self
    }

    /// Open the described repository.
    pub fn repository(&self, registry: &FormatRegistry) -> RepoResult<Repository> {
        self.repository_with(registry, AccessOptions::new())
    }

    /// Open the described repository with extra options; the described format,
    /// if any, takes precedence over `options.format`.
    pub fn repository_with(
        &self,
        registry: &FormatRegistry,
        mut options: AccessOptions,
    ) -> RepoResult<Repository> {
        if self.repo_type != REPOSITORY_TYPE {
            return Err(RepoError::UnsupportedType(self.repo_type.clone()));
        }
        if let Some(format) = self.file_format {
            options.format = Some(format);
        }
        Repository::open(registry, &self.file_path, self.access_mode, options)
    }
}
