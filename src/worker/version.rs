//! Worker script versions
//!
//! A version is a short prefix of the SHA-256 of the script bytes. The
//! pinned script is registered at a versioned URL derived from the
//! canonical one, which the origin serves as an immutable copy.

use crate::error::{StickyError, StickyResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Default number of hex characters in a version
pub const DEFAULT_VERSION_LENGTH: usize = 6;

/// Opaque version token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wrap a persisted token as-is
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Version of a script: first `length` hex chars of its SHA-256
    pub fn of_script(script: &[u8], length: usize) -> Self {
        let digest = hex::encode(Sha256::digest(script));
        let length = length.clamp(1, digest.len());
        Self(digest[..length].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the version goes in the script URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStyle {
    /// `sw.js` → `sw.<version>.js`
    #[default]
    Infix,
    /// `sw.js` → `sw.js?version=<version>`
    Query,
}

/// URL of the immutable copy of `canonical` at `version`
pub fn versioned_url(canonical: &Url, version: &Version, style: VersionStyle) -> StickyResult<Url> {
    let mut url = canonical.clone();
    match style {
        VersionStyle::Infix => {
            let path = canonical.path();
            let (dir, file) = path.rsplit_once('/').unwrap_or(("", path));
            if file.is_empty() {
                return Err(StickyError::InvalidUrl {
                    url: canonical.to_string(),
                    reason: "worker script URL has no file name".to_string(),
                });
            }
            let file = match file.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{}.{}.{}", stem, version, ext),
                _ => format!("{}.{}", file, version),
            };
            url.set_path(&format!("{}/{}", dir, file));
        }
        VersionStyle::Query => {
            let pairs: Vec<(String, String)> = canonical
                .query_pairs()
                .filter(|(name, _)| name != "version")
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs)
                .append_pair("version", version.as_str());
        }
    }
    Ok(url)
}
