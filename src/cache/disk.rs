//! On-disk cache storage
//!
//! Layout under the root directory:
//!
//! ```text
//! caches/
//!   <hex(generation name)>/
//!     <sha256(key)>.body
//!     <sha256(key)>.json
//! ```
//!
//! Each file is written to a uniquely named temporary file and renamed
//! into place, metadata last, so an entry without metadata is never
//! visible and racing writers of the same entry never share a temp file.
//! Bodies are re-hashed on read; a mismatch or unreadable metadata is a
//! miss.

use super::CacheStorage;
use crate::error::{StickyError, StickyResult};
use crate::net::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: BTreeMap<String, String>,
    body_sha256: String,
    stored_at: DateTime<Utc>,
}

/// Cache storage persisted below a directory
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

fn entry_id(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> StickyResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StickyError::Internal(format!("{} has no parent", path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| StickyError::io(format!("creating temp file in {}", dir.display()), e))?;
    tmp.write_all(contents)
        .map_err(|e| StickyError::io(format!("writing {}", tmp.path().display()), e))?;
    tmp.persist(path)
        .map_err(|e| StickyError::io(format!("renaming into {}", path.display()), e.error))?;
    Ok(())
}

async fn write_atomic(path: PathBuf, contents: Vec<u8>) -> StickyResult<()> {
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents))
        .await
        .map_err(|e| StickyError::Internal(format!("cache write task failed: {}", e)))?
}

impl DiskCacheStorage {
    /// Use `root` as the cache directory (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(hex::encode(generation.as_bytes()))
    }

    fn entry_path(&self, generation: &str, key: &str, ext: &str) -> PathBuf {
        self.generation_dir(generation)
            .join(format!("{}.{}", entry_id(key), ext))
    }

    async fn read_meta(path: &Path) -> StickyResult<Option<EntryMeta>> {
        match fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(meta) => Ok(Some(meta)),
                Err(e) => {
                    warn!("Unreadable cache metadata {}, treating as a miss: {}", path.display(), e);
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StickyError::io(format!("reading {}", path.display()), e)),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn names(&self) -> StickyResult<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StickyError::io(
                    format!("reading cache directory {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StickyError::io("listing cache generations", e))?
        {
            let file_name = entry.file_name();
            let decoded = hex::decode(file_name.to_string_lossy().as_bytes())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(name) => names.push(name),
                None => debug!("Ignoring foreign entry {:?} in cache directory", file_name),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn has(&self, generation: &str) -> StickyResult<bool> {
        Ok(self.generation_dir(generation).is_dir())
    }

    async fn open(&self, generation: &str) -> StickyResult<()> {
        let dir = self.generation_dir(generation);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StickyError::io(format!("creating generation {}", generation), e))
    }

    async fn delete(&self, generation: &str) -> StickyResult<bool> {
        let dir = self.generation_dir(generation);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Removed generation {} at {}", generation, dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StickyError::io(format!("removing generation {}", generation), e)),
        }
    }

    async fn lookup(&self, generation: &str, key: &str) -> StickyResult<Option<Response>> {
        let meta_path = self.entry_path(generation, key, META_EXT);
        let Some(meta) = Self::read_meta(&meta_path).await? else {
            return Ok(None);
        };

        let body_path = self.entry_path(generation, key, BODY_EXT);
        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Cache entry {} lost its body, treating as a miss", key);
                return Ok(None);
            }
            Err(e) => return Err(StickyError::io(format!("reading {}", body_path.display()), e)),
        };

        if hex::encode(Sha256::digest(&body)) != meta.body_sha256 {
            warn!("Cache entry {} is corrupt on disk, treating as a miss", key);
            return Ok(None);
        }

        Ok(Some(Response {
            status: meta.status,
            headers: meta.headers,
            body,
            url: None,
            redirected: false,
        }))
    }

    async fn put(&self, generation: &str, key: &str, response: &Response) -> StickyResult<()> {
        self.open(generation).await?;

        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            body_sha256: hex::encode(Sha256::digest(&response.body)),
            stored_at: Utc::now(),
        };

        write_atomic(
            self.entry_path(generation, key, BODY_EXT),
            response.body.clone(),
        )
        .await?;
        let meta_json = serde_json::to_vec_pretty(&meta)?;
        write_atomic(self.entry_path(generation, key, META_EXT), meta_json).await
    }

    async fn keys(&self, generation: &str) -> StickyResult<Vec<String>> {
        let dir = self.generation_dir(generation);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StickyError::io(format!("reading {}", dir.display()), e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StickyError::io("listing cache entries", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            if let Some(meta) = Self::read_meta(&path).await? {
                keys.push(meta.key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}
