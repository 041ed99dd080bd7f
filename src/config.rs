//! Configuration loading and types for datamover.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Exactly one backend (grid or object store) is
//! active per deployment; the matching section must be present.
//! Validation happens eagerly at load time so a missing section or empty
//! credential fails construction instead of the first transfer call.

use serde::Deserialize;
use std::path::Path;

use crate::model::{AccountCredentials, ArchiveDestination, ArchiveType, FileLocation};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Active backend: `grid` or `object_store`.
    pub backend: String,

    /// Grid transfer service settings.
    #[serde(default)]
    pub grid: Option<GridConfig>,

    /// Object store settings.
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,

    /// Backend login credentials.
    #[serde(default)]
    pub account: AccountConfig,

    /// Directory walk bounds.
    #[serde(default)]
    pub walk: WalkConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Grid transfer service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Base URL of the transfer API (e.g. `https://transfer.example.org/v0.10`).
    pub transfer_url: String,

    /// Base URL of the token service.
    pub auth_url: String,

    /// Where uploads land.
    pub archive: ArchiveConfig,
}

/// Object store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint URL.
    pub endpoint_url: String,

    /// Region to present to the endpoint.
    #[serde(default = "default_region")]
    pub region: String,

    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,

    /// Where uploads land.
    pub archive: ArchiveConfig,
}

/// Archive root and placement policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Container identifier (grid endpoint or bucket).
    pub container: String,

    /// Base path all uploads are rooted under.
    pub path: String,

    /// `archive` (permanent) or `temporary_archive` (staging).
    #[serde(rename = "type", default = "default_archive_type")]
    pub archive_type: ArchiveType,
}

impl ArchiveConfig {
    /// The configured base archive destination.
    pub fn destination(&self) -> ArchiveDestination {
        ArchiveDestination {
            location: FileLocation::new(self.container.clone(), self.path.clone()),
            archive_type: self.archive_type,
        }
    }
}

/// Backend login credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccountConfig {
    /// Client id (grid) or access key id (object store).
    #[serde(default)]
    pub id: String,

    /// Client secret (grid) or secret access key (object store).
    #[serde(default)]
    pub secret: String,
}

impl AccountConfig {
    /// The credentials to hand to `authenticate`.
    pub fn credentials(&self) -> AccountCredentials {
        AccountCredentials {
            id: self.id.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Directory walk bounds for remote size computation.
#[derive(Debug, Clone, Deserialize)]
pub struct WalkConfig {
    /// Maximum recursion depth before a subtree is pruned.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum total entries visited before the walk is pruned.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_entries: default_max_entries(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_archive_type() -> ArchiveType {
    ArchiveType::Archive
}

fn default_max_depth() -> u32 {
    64
}

fn default_max_entries() -> u64 {
    1_000_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Validation --------------------------------------------------------------

impl Config {
    /// Validate the configuration eagerly.
    ///
    /// Fails on an unknown backend selector, a missing backend section,
    /// empty credentials, or empty archive/URL fields.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.backend.as_str() {
            "grid" => {
                let grid = self
                    .grid
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("backend is 'grid' but grid section is missing"))?;
                if grid.transfer_url.is_empty() || grid.auth_url.is_empty() {
                    anyhow::bail!("grid.transfer_url and grid.auth_url must be set");
                }
                validate_archive(&grid.archive)?;
            }
            "object_store" => {
                let store = self.object_store.as_ref().ok_or_else(|| {
                    anyhow::anyhow!("backend is 'object_store' but object_store section is missing")
                })?;
                if store.endpoint_url.is_empty() {
                    anyhow::bail!("object_store.endpoint_url must be set");
                }
                validate_archive(&store.archive)?;
            }
            other => anyhow::bail!("unknown backend '{other}' (expected 'grid' or 'object_store')"),
        }

        if self.account.id.is_empty() || self.account.secret.is_empty() {
            anyhow::bail!("account.id and account.secret must be set");
        }

        Ok(())
    }
}

fn validate_archive(archive: &ArchiveConfig) -> anyhow::Result<()> {
    if archive.container.is_empty() || archive.path.is_empty() {
        anyhow::bail!("archive.container and archive.path must be set");
    }
    Ok(())
}

// -- Loader ------------------------------------------------------------------

/// Load, parse, and validate configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_yaml() -> &'static str {
        r#"
backend: grid
grid:
  transfer_url: https://transfer.example.org/v0.10
  auth_url: https://auth.example.org
  archive:
    container: archive-endpoint
    path: /archive/root
    type: archive
account:
  id: client-id
  secret: client-secret
"#
    }

    #[test]
    fn test_grid_config_parses_and_validates() {
        let config: Config = serde_yaml::from_str(grid_yaml()).unwrap();
        config.validate().unwrap();
        let grid = config.grid.unwrap();
        assert_eq!(grid.archive.archive_type, ArchiveType::Archive);
        assert_eq!(grid.archive.destination().location.container, "archive-endpoint");
    }

    #[test]
    fn test_object_store_config_parses() {
        let yaml = r#"
backend: object_store
object_store:
  endpoint_url: https://objstore.example.org
  use_path_style: true
  archive:
    container: dme-archive
    path: /archive/root
    type: temporary_archive
account:
  id: access-key
  secret: secret-key
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        let store = config.object_store.unwrap();
        assert_eq!(store.region, "us-east-1");
        assert!(store.use_path_style);
        assert_eq!(store.archive.archive_type, ArchiveType::TemporaryArchive);
    }

    #[test]
    fn test_missing_backend_section_rejected() {
        let yaml = "backend: grid\naccount:\n  id: a\n  secret: b\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let mut config: Config = serde_yaml::from_str(grid_yaml()).unwrap();
        config.account.secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config: Config = serde_yaml::from_str(grid_yaml()).unwrap();
        config.backend = "tape".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_walk_defaults() {
        let config: Config = serde_yaml::from_str(grid_yaml()).unwrap();
        assert_eq!(config.walk.max_depth, 64);
        assert_eq!(config.walk.max_entries, 1_000_000);
    }
}
