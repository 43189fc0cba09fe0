//! Configuration management for sticky

pub mod schema;

pub use schema::{Config, GeneralConfig, ProxyConfig};

use crate::error::{StickyError, StickyResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sticky")
            .join("config.toml")
    }

    /// Get the default state directory path
    pub fn default_state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sticky")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> StickyResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> StickyResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StickyError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| StickyError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> StickyResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            StickyError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> StickyResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StickyError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Files kept in the state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pick the state directory: explicit override, then config, then default
    pub fn resolve(override_dir: Option<&Path>, config: &Config) -> Self {
        let root = override_dir
            .map(Path::to_path_buf)
            .or_else(|| config.general.state_dir.clone())
            .unwrap_or_else(ConfigManager::default_state_dir);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted version keys
    pub fn storage_file(&self) -> PathBuf {
        self.root.join("storage.json")
    }

    /// Cache generations
    pub fn caches_dir(&self) -> PathBuf {
        self.root.join("caches")
    }

    /// Recorded worker installation
    pub fn worker_file(&self) -> PathBuf {
        self.root.join("worker.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.root.join("audit.log")
    }

    /// Create the state directories with owner-only permissions
    pub async fn ensure(&self) -> StickyResult<()> {
        for dir in [self.root.clone(), self.caches_dir()] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                StickyError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&self.root, perms)
                .map_err(|e| StickyError::io("setting state dir permissions", e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert!(config.proxy.strict_header_check);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.proxy.key_prefix = "app1.".to_string();
        config.general.state_dir = Some(temp.path().join("state"));

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.proxy.key_prefix, "app1.");
        assert_eq!(loaded.general.state_dir, Some(temp.path().join("state")));
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[proxy]\nversion_length = \"six\"\n").unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, StickyError::ConfigInvalid { path: p, .. } if p == path));
    }

    #[test]
    fn state_dir_precedence() {
        let mut config = Config::default();
        config.general.state_dir = Some(PathBuf::from("/from/config"));

        let explicit = StatePaths::resolve(Some(Path::new("/explicit")), &config);
        assert_eq!(explicit.root(), Path::new("/explicit"));
        assert_eq!(explicit.storage_file(), Path::new("/explicit/storage.json"));

        let configured = StatePaths::resolve(None, &config);
        assert_eq!(configured.caches_dir(), Path::new("/from/config/caches"));
    }

    #[tokio::test]
    async fn ensure_creates_directories() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::new(temp.path().join("state"));
        paths.ensure().await.unwrap();
        assert!(paths.caches_dir().is_dir());
    }
}
