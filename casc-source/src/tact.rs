//! Process-wide TACT key ring lifecycle.
//!
//! The ring is initialized at most once per process. Key sources, in
//! order: a file named by `TACT_KEYS_PATH`, the persisted copy at
//! `{cacheRoot}/tact.json`, and finally a URL named by `TACT_KEYS_URL`
//! whose payload is persisted for the next run. The URL step needs the
//! HTTP client, so it runs inside `load_build`, before any container
//! could require a key.

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use casc_cache::CascDirs;
use casc_cdn::CdnClient;
use casc_crypto::TactKeyring;

use crate::error::Result;

static RING: OnceLock<RwLock<TactKeyring>> = OnceLock::new();
static SEEDED: OnceCell<()> = OnceCell::const_new();

/// The shared ring, creating it from `TACT_KEYS_PATH` on first touch.
fn ring() -> &'static RwLock<TactKeyring> {
    RING.get_or_init(|| {
        let mut ring = TactKeyring::new();
        if let Ok(path) = env::var("TACT_KEYS_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                match ring.load_file(Path::new(path)) {
                    Ok(count) => info!(count, "loaded TACT keys from TACT_KEYS_PATH"),
                    Err(e) => warn!("failed to load TACT_KEYS_PATH: {e}"),
                }
            }
        }
        RwLock::new(ring)
    })
}

/// Read access for decode paths.
pub fn read() -> RwLockReadGuard<'static, TactKeyring> {
    ring().read()
}

/// Inject a key, initializing the ring if needed. Used by tests and by
/// operators feeding freshly published keys.
pub fn add_key(key_name: &str, key_hex: &str) -> Result<()> {
    ring().write().add_key(key_name, key_hex)?;
    Ok(())
}

/// Run the disk/URL seeding steps once per process. Failures are logged
/// rather than surfaced: a missing ring only matters once an encrypted
/// block is hit, and that path reports `MissingKey` precisely.
pub async fn ensure_loaded(dirs: &CascDirs, client: &CdnClient) {
    SEEDED
        .get_or_init(|| async {
            {
                let mut guard = ring().write();
                if guard.is_empty() {
                    let path = dirs.tact_keys_path();
                    if path.exists() {
                        match guard.load_file(&path) {
                            Ok(count) => info!(count, "loaded persisted TACT keys"),
                            Err(e) => warn!("failed to load persisted TACT keys: {e}"),
                        }
                    }
                }
            }

            if !ring().read().is_empty() {
                return;
            }
            let url = match env::var("TACT_KEYS_URL") {
                Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
                _ => return,
            };

            match client.get(&url).await {
                Ok(bytes) => {
                    let added = ring().write().merge(&bytes);
                    info!(added, "seeded TACT keys from TACT_KEYS_URL");
                    if added > 0 {
                        let path = dirs.tact_keys_path();
                        if let Some(parent) = path.parent() {
                            let _ = tokio::fs::create_dir_all(parent).await;
                        }
                        if let Err(e) = tokio::fs::write(&path, &bytes).await {
                            warn!("failed to persist TACT keys: {e}");
                        }
                    }
                }
                Err(e) => warn!("failed to fetch TACT_KEYS_URL: {e}"),
            }
        })
        .await;
}
