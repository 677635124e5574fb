//! Per-build cache directory.
//!
//! Layout under `{cacheRoot}/builds/{buildKey}/`:
//! - `integrity.json`: relative path to SHA-1 hex of the stored bytes
//! - `manifest.json`: at minimum `{"lastAccess": millis}`, refreshed on
//!   every hit and store
//! - blobs at the directory root (`BUILD_ENCODING`, `BUILD_ROOT`) or in a
//!   subdirectory (`data/`, `indices/`)
//!
//! All operations serialize on one lock so concurrent readers and writers
//! always observe a consistent integrity map.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::CascDirs;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(rename = "lastAccess", default)]
    last_access: u64,
    /// Fields written by other tools are preserved across rewrites.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct CacheState {
    integrity: HashMap<String, String>,
    manifest: Manifest,
}

/// Cache for one build, keyed by its build identifier.
#[derive(Debug)]
pub struct BuildCache {
    key: String,
    dir: PathBuf,
    state: Mutex<CacheState>,
}

impl BuildCache {
    /// Open (creating if needed) the cache directory for `key` and stamp
    /// the access time.
    pub async fn open(dirs: &CascDirs, key: &str) -> Result<Self> {
        let dir = dirs.builds_dir().join(key);
        tokio::fs::create_dir_all(&dir).await?;

        let integrity = match tokio::fs::read(dir.join("integrity.json")).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(key, "discarding unreadable integrity.json: {e}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        let manifest = match tokio::fs::read(dir.join("manifest.json")).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Manifest::default(),
        };

        let cache = Self {
            key: key.to_string(),
            dir,
            state: Mutex::new(CacheState { integrity, manifest }),
        };
        {
            let mut state = cache.state.lock().await;
            state.manifest.last_access = now_millis();
            cache.save_manifest(&state.manifest).await?;
        }
        debug!(key, "opened build cache");
        Ok(cache)
    }

    pub fn build_key(&self) -> &str {
        &self.key
    }

    /// Fetch a cached blob. Missing files and integrity mismatches both
    /// read as a miss; only real IO failures surface as errors.
    pub async fn get(&self, name: &str, subdir: Option<&str>) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        let rel = relative_name(name, subdir);

        let data = match tokio::fs::read(self.dir.join(&rel)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Some(expected) = state.integrity.get(&rel) {
            let actual = hex::encode(Sha1::digest(&data));
            if &actual != expected {
                warn!(%rel, "cached file failed integrity check, treating as miss");
                return Ok(None);
            }
        }

        state.manifest.last_access = now_millis();
        self.save_manifest(&state.manifest).await?;
        Ok(Some(data))
    }

    /// Store a blob, record its SHA-1, and stamp the access time. The
    /// data, integrity, and manifest files are all on disk before this
    /// returns.
    pub async fn put(&self, name: &str, data: &[u8], subdir: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        let rel = relative_name(name, subdir);

        let path = self.dir.join(&rel);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        state
            .integrity
            .insert(rel, hex::encode(Sha1::digest(data)));
        let bytes = serde_json::to_vec(&state.integrity)?;
        tokio::fs::write(self.dir.join("integrity.json"), bytes).await?;

        state.manifest.last_access = now_millis();
        self.save_manifest(&state.manifest).await?;
        Ok(())
    }

    async fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let bytes = serde_json::to_vec(manifest)?;
        tokio::fs::write(self.dir.join("manifest.json"), bytes).await?;
        Ok(())
    }
}

fn relative_name(name: &str, subdir: Option<&str>) -> String {
    match subdir {
        Some(sub) if !sub.is_empty() => format!("{sub}/{name}"),
        _ => name.to_string(),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
