//! Configuration schema for sticky
//!
//! Configuration is stored at `~/.config/sticky/config.toml`

use crate::cache::DEFAULT_PREFIX;
use crate::integrity::DigestScheme;
use crate::resolve::FallbackRule;
use crate::worker::{VersionStyle, DEFAULT_VERSION_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Proxy, cache and update settings
    pub proxy: ProxyConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable audit logging
    pub audit_log: bool,

    /// Override the state directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            audit_log: true,
            state_dir: None,
        }
    }
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// How manifest digests are written and checked
    pub digest_scheme: DigestScheme,

    /// Refuse to pin a worker script served without the immutable
    /// cache-control contract (warn only when false)
    pub strict_header_check: bool,

    /// Path fallback rules, in precedence order
    pub fallback_rules: Vec<FallbackRule>,

    /// Namespace for persisted version keys
    pub key_prefix: String,

    /// Prefix marking cache generations owned by this proxy
    pub cache_prefix: String,

    /// Look for a newer worker script after registering
    pub check_updates: bool,

    /// Hex characters of the script hash used as version
    pub version_length: usize,

    /// Where the version goes in the pinned script URL
    pub version_style: VersionStyle,

    /// Register the canonical script unpinned and skip interception
    pub development: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            digest_scheme: DigestScheme::default(),
            strict_header_check: true,
            fallback_rules: FallbackRule::defaults(),
            key_prefix: String::new(),
            cache_prefix: DEFAULT_PREFIX.to_string(),
            check_updates: true,
            version_length: DEFAULT_VERSION_LENGTH,
            version_style: VersionStyle::default(),
            development: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[proxy]"));
        assert!(toml.contains("digest_scheme = \"transport-integrity\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.proxy, ProxyConfig::default());
        assert!(config.general.audit_log);
        assert_eq!(config.proxy.cache_prefix, "#");
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [proxy]
            digest_scheme = "content-hash"
            version_style = "query"
            fallback_rules = ["html-suffix", "dir-index"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.proxy.digest_scheme, DigestScheme::ContentHash);
        assert_eq!(config.proxy.version_style, VersionStyle::Query);
        assert_eq!(
            config.proxy.fallback_rules,
            vec![FallbackRule::HtmlSuffix, FallbackRule::DirIndex]
        );
        assert_eq!(config.proxy.version_length, 6); // default preserved
    }
}
