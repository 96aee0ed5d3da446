use std::path::{Path, PathBuf};

use ctf_format::{AccessOptions, FileFormat, FormatRegistry, DEFAULT_FILE_MODE};
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CTF_CONFIG";

/// Engine-wide settings.
///
/// ```toml
/// default_format = "tgz"
/// file_mode = 0o640
/// temp_dir = "/var/tmp/ctf"
/// compression_level = 9
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Format for new objects when none is requested.
    pub default_format: FileFormat,
    /// Permission bits for written files; directories derive from it.
    pub file_mode: u32,
    /// Where synthesized artifact blobs are materialized.
    pub temp_dir: Option<PathBuf>,
    /// gzip (0-9) or zstd (1-22) level for compressed archives.
    pub compression_level: Option<i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_format: FileFormat::Directory,
            file_mode: DEFAULT_FILE_MODE,
            temp_dir: None,
            compression_level: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> RepoResult<Self> {
        toml::from_str(s).map_err(|e| RepoError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> RepoResult<String> {
        toml::to_string_pretty(self).map_err(|e| RepoError::Config(e.to_string()))
    }

    /// Read a TOML file.
    pub fn load(path: &Path) -> RepoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load from `path`, else from the file named by `CTF_CONFIG`, else
    /// defaults.
    pub fn resolve(path: Option<&Path>) -> RepoResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(env_path) if !env_path.is_empty() => Self::load(Path::new(&env_path)),
            _ => Ok(Self::default()),
        }
    }

    /// Codec registry reflecting this configuration.
    pub fn registry(&self) -> FormatRegistry {
        let mut registry = match self.compression_level {
            Some(level) => FormatRegistry::with_compression_level(level),
            None => FormatRegistry::with_defaults(),
        };
        registry.set_default_format(self.default_format);
        registry
    }

    /// Access options carrying the configured file mode.
    pub fn access_options(&self) -> AccessOptions {
        AccessOptions::new().with_file_mode(self.file_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = EngineConfig::default();
        assert_eq!(c.default_format, FileFormat::Directory);
        assert_eq!(c.file_mode, 0o644);
        assert!(c.temp_dir.is_none());
        assert!(c.compression_level.is_none());
    }

    #[test]
    fn parse_partial_toml() {
        let c = EngineConfig::from_toml_str("default_format = \"tgz\"\ncompression_level = 9\n")
            .unwrap();
        assert_eq!(c.default_format, FileFormat::Tgz);
        assert_eq!(c.compression_level, Some(9));
        assert_eq!(c.file_mode, 0o644);
    }

    #[test]
    fn toml_roundtrip() {
        let c = EngineConfig {
            default_format: FileFormat::Tzst,
            file_mode: 0o600,
            temp_dir: Some(PathBuf::from("/tmp/ctf")),
            compression_level: Some(3),
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn bad_format_is_config_error() {
        let err = EngineConfig::from_toml_str("default_format = \"zip\"").unwrap_err();
        assert!(matches!(err, RepoError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctf.toml");
        std::fs::write(&path, "file_mode = 416\n").unwrap();
        let c = EngineConfig::resolve(Some(&path)).unwrap();
        assert_eq!(c.file_mode, 0o640);
    }

    #[test]
    fn registry_uses_default_format() {
        let c = EngineConfig {
            default_format: FileFormat::Tar,
            ..EngineConfig::default()
        };
        assert_eq!(c.registry().default_format(), FileFormat::Tar);
        assert_eq!(c.registry().supported_formats().len(), 4);
    }
}
