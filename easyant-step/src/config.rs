//! Installation registry persistence for standalone hosts.
//!
//! CI hosts with their own configuration store persist installations
//! themselves and just call [`InstallationRegistry::replace`]. The runner
//! has no such store, so it reads a small TOML file:
//!
//! ```toml
//! [[installations]]
//! name = "easyant-0.9"
//! home = "/opt/easyant"
//! ```
//!
//! Older files that used the `easyant_home` field name still load; the
//! value is migrated into the current representation on read.

use crate::installation::EasyAntInstallation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable overriding the registry file location.
pub const CONFIG_PATH_VAR: &str = "EASYANT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk form of the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub installations: Vec<InstallationEntry>,
}

/// One configured installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationEntry {
    pub name: String,
    #[serde(alias = "easyant_home")]
    pub home: String,
}

/// Default registry file location, honoring `EASYANT_CONFIG`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("easyant")
        .join("installations.toml")
}

/// Load installations from a registry file.
///
/// A missing file is an empty registry, not an error; jobs then fall back
/// to the bare command on the node's search path.
pub fn load_registry(path: &Path) -> Result<Vec<EasyAntInstallation>, ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "no installation registry file; using empty registry");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: RegistryFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        count = file.installations.len(),
        "loaded installation registry"
    );
    Ok(file
        .installations
        .into_iter()
        .map(|entry| EasyAntInstallation::new(entry.name, entry.home))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_installations_in_order() {
        let file = write_config(
            "[[installations]]\nname = \"a\"\nhome = \"/opt/a/\"\n\n\
             [[installations]]\nname = \"b\"\nhome = \"/opt/b\"\n",
        );
        let installations = load_registry(file.path()).unwrap();
        assert_eq!(installations.len(), 2);
        assert_eq!(installations[0].name(), "a");
        // Trailing separator laundered during migration into the record.
        assert_eq!(installations[0].home(), "/opt/a");
        assert_eq!(installations[1].name(), "b");
    }

    #[test]
    fn legacy_home_field_migrates() {
        let current = write_config("[[installations]]\nname = \"ea\"\nhome = \"/opt/ea\"\n");
        let legacy =
            write_config("[[installations]]\nname = \"ea\"\neasyant_home = \"/opt/ea\"\n");
        assert_eq!(
            load_registry(current.path()).unwrap(),
            load_registry(legacy.path()).unwrap()
        );
    }

    #[test]
    fn missing_file_is_empty_registry() {
        let installations = load_registry(Path::new("/no/such/config.toml")).unwrap();
        assert!(installations.is_empty());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_config("installations = \"nope\"");
        assert!(matches!(
            load_registry(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
