//! Deployment manifest
//!
//! Maps every normalized resource path of a deployment to its expected
//! digest. The manifest is produced at build time and consumed read-only.
//! On disk it is JSON, either an array of `[path, digest]` pairs or an
//! object of `path: digest`.

use crate::error::{StickyError, StickyResult};
use crate::integrity::{DigestScheme, Integrity};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One `(path, digest)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub integrity: Integrity,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestJson {
    Pairs(Vec<(String, String)>),
    Map(BTreeMap<String, String>),
}

/// Immutable mapping of resource path to expected digest
#[derive(Debug, Clone)]
pub struct Manifest {
    scheme: DigestScheme,
    entries: BTreeMap<String, Integrity>,
}

/// Canonicalize a manifest or request path
///
/// Paths must be absolute; trailing slashes are removed except for the root.
pub fn normalize_path(path: &str) -> StickyResult<String> {
    if !path.starts_with('/') {
        return Err(StickyError::ManifestInvalid(format!(
            "path '{}' must start with '/'",
            path
        )));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

impl Manifest {
    /// Create an empty manifest for a digest scheme
    pub fn new(scheme: DigestScheme) -> Self {
        Self {
            scheme,
            entries: BTreeMap::new(),
        }
    }

    /// Add an entry, rejecting duplicate paths
    pub fn insert(&mut self, path: &str, integrity: Integrity) -> StickyResult<()> {
        let path = normalize_path(path)?;
        if self.entries.contains_key(&path) {
            return Err(StickyError::ManifestInvalid(format!(
                "duplicate path '{}'",
                path
            )));
        }
        self.entries.insert(path, integrity);
        Ok(())
    }

    /// Build from raw `(path, token)` pairs
    pub fn from_pairs<I, P, T>(pairs: I, scheme: DigestScheme) -> StickyResult<Self>
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: AsRef<str>,
    {
        let mut manifest = Self::new(scheme);
        for (path, token) in pairs {
            let integrity = Integrity::parse(token.as_ref(), scheme)?;
            manifest.insert(path.as_ref(), integrity)?;
        }
        Ok(manifest)
    }

    /// Parse manifest JSON
    pub fn parse(content: &str, scheme: DigestScheme) -> StickyResult<Self> {
        let parsed: ManifestJson = serde_json::from_str(content)
            .map_err(|e| StickyError::ManifestInvalid(e.to_string()))?;

        match parsed {
            ManifestJson::Pairs(pairs) => Self::from_pairs(pairs, scheme),
            ManifestJson::Map(map) => Self::from_pairs(map, scheme),
        }
    }

    /// Parse a manifest JSON file from disk
    pub async fn from_file(path: &Path, scheme: DigestScheme) -> StickyResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StickyError::io(format!("reading manifest {}", path.display()), e))?;
        let manifest = Self::parse(&content, scheme)?;
        debug!(
            "Loaded manifest {} with {} entries",
            path.display(),
            manifest.len()
        );
        Ok(manifest)
    }

    /// Hash every file below `dir` into a manifest
    ///
    /// Files are visited in sorted order so the output is deterministic.
    pub fn build_from_dir(dir: &Path, scheme: DigestScheme) -> StickyResult<Self> {
        if !dir.is_dir() {
            return Err(StickyError::PathNotFound(dir.to_path_buf()));
        }

        let mut manifest = Self::new(scheme);
        for file in walk_files(dir)? {
            let relative = file
                .strip_prefix(dir)
                .map_err(|e| StickyError::Internal(e.to_string()))?;
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let contents = fs::read(&file)
                .map_err(|e| StickyError::io(format!("reading {}", file.display()), e))?;

            manifest.insert(&format!("/{}", path), Integrity::compute(&contents, scheme))?;
        }

        debug!("Hashed {} files under {}", manifest.len(), dir.display());
        Ok(manifest)
    }

    /// Digest scheme of every entry
    pub fn scheme(&self) -> DigestScheme {
        self.scheme
    }

    /// Expected digest for a normalized path
    pub fn get(&self, path: &str) -> Option<&Integrity> {
        self.entries.get(path)
    }

    /// Whether a normalized path is listed
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in path order
    pub fn entries(&self) -> impl Iterator<Item = ManifestEntry> + '_ {
        self.entries.iter().map(|(path, integrity)| ManifestEntry {
            path: path.clone(),
            integrity: integrity.clone(),
        })
    }

    /// Short content address of the whole manifest (first 12 hex chars)
    ///
    /// Same entries = same fingerprint, which names the cache generation.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, integrity) in &self.entries {
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update(integrity.token().as_bytes());
            hasher.update([b'\n']);
        }
        let result = hasher.finalize();
        hex::encode(&result[..6])
    }

    /// Serialize as an array of `[path, digest]` pairs
    pub fn to_json(&self) -> StickyResult<String> {
        let pairs: Vec<(&str, &str)> = self
            .entries
            .iter()
            .map(|(path, integrity)| (path.as_str(), integrity.token()))
            .collect();
        Ok(serde_json::to_string_pretty(&pairs)?)
    }
}

/// Recursively list files below `dir`, sorted by name at every level
pub fn walk_files(dir: &Path) -> StickyResult<Vec<PathBuf>> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| StickyError::io(format!("reading directory {}", dir.display()), e))?
        .collect::<Result<_, _>>()
        .map_err(|e| StickyError::io(format!("reading directory {}", dir.display()), e))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            files.extend(walk_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_HEX: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(normalize_path("/about/").unwrap(), "/about");
        assert_eq!(normalize_path("/about").unwrap(), "/about");
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("//").unwrap(), "/");
        assert!(normalize_path("about").is_err());
    }

    #[test]
    fn parse_pairs() {
        let json = format!(r#"[["/index.html", "{HELLO_HEX}"], ["/app.js", "{HELLO_HEX}"]]"#);
        let manifest = Manifest::parse(&json, DigestScheme::ContentHash).unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains("/index.html"));
        assert!(manifest.contains("/app.js"));
    }

    #[test]
    fn parse_object() {
        let json = format!(r#"{{"/about/": "{HELLO_HEX}"}}"#);
        let manifest = Manifest::parse(&json, DigestScheme::ContentHash).unwrap();
        assert!(manifest.contains("/about"));
        assert!(!manifest.contains("/about/"));
    }

    #[test]
    fn parse_rejects_duplicates_after_normalization() {
        let json = format!(r#"[["/a", "{HELLO_HEX}"], ["/a/", "{HELLO_HEX}"]]"#);
        let err = Manifest::parse(&json, DigestScheme::ContentHash).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn parse_rejects_bad_digest() {
        let json = r#"[["/a", "not-a-digest"]]"#;
        assert!(Manifest::parse(json, DigestScheme::ContentHash).is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_content_addressed() {
        let a = Manifest::from_pairs([("/a", HELLO_HEX)], DigestScheme::ContentHash).unwrap();
        let b = Manifest::from_pairs([("/a", HELLO_HEX)], DigestScheme::ContentHash).unwrap();
        let c = Manifest::from_pairs([("/b", HELLO_HEX)], DigestScheme::ContentHash).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }

    #[test]
    fn build_from_dir_hashes_sorted_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("about")).unwrap();
        fs::write(dir.path().join("index.html"), b"hello").unwrap();
        fs::write(dir.path().join("about").join("index.html"), b"hello").unwrap();

        let manifest = Manifest::build_from_dir(dir.path(), DigestScheme::ContentHash).unwrap();
        let paths: Vec<String> = manifest.entries().map(|e| e.path).collect();

        assert_eq!(paths, vec!["/about/index.html", "/index.html"]);
        assert_eq!(manifest.get("/index.html").unwrap().token(), HELLO_HEX);
    }

    #[test]
    fn json_roundtrip_preserves_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.js"), b"console.log(1)").unwrap();

        let manifest =
            Manifest::build_from_dir(dir.path(), DigestScheme::TransportIntegrity).unwrap();
        let json = manifest.to_json().unwrap();
        let parsed = Manifest::parse(&json, DigestScheme::TransportIntegrity).unwrap();

        assert_eq!(parsed.fingerprint(), manifest.fingerprint());
    }

    #[test]
    fn build_from_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Manifest::build_from_dir(&missing, DigestScheme::ContentHash),
            Err(StickyError::PathNotFound(_))
        ));
    }
}
