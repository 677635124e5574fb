//! Storage source backed by a game installation on disk.
//!
//! Reads are served from the journal-indexed `data.NNN` blobs whenever
//! possible; anything the installation does not hold locally falls back
//! to a lazily created remote source for the same product, and the result
//! is kept in the per-build cache.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use casc_blte::BLTE_MAGIC;
use casc_cache::{BuildCache, CascDirs};
use casc_cdn::{format_cdn_key, CdnClient};
use casc_formats::{
    flags::locale, parse_kv_config, EncodingKey, EncodingTable, JournalEntry, JournalIndex,
    RootTable,
};

use crate::build::{parse_build_info, Build};
use crate::error::{Error, Result};
use crate::remote::RemoteSource;
use crate::source::{
    decode_container, encoding_key_from_config, resolve_encoding_key, root_content_key,
};
use crate::tact;

/// Region used when a local install needs CDN fallback.
const FALLBACK_REGION: &str = "eu";

/// Offset of the BLTE payload within a journal-addressed slice: the local
/// blob format prefixes every entry with a 0x1E-byte header.
const LOCAL_HEADER_LENGTH: u32 = 0x1E;

#[derive(Debug)]
struct LoadedState {
    cache: BuildCache,
    journal: JournalIndex,
    build_config: std::collections::HashMap<String, String>,
    cdn_config: std::collections::HashMap<String, String>,
    encoding: EncodingTable,
    root: RootTable,
}

/// Source over `{installDir}` with remote fallback.
#[derive(Debug)]
pub struct LocalSource {
    install_dir: PathBuf,
    data_dir: PathBuf,
    storage_dir: PathBuf,
    dirs: CascDirs,
    client: CdnClient,
    locale_mask: u32,
    builds: Vec<Build>,
    selected: Option<usize>,
    state: Option<LoadedState>,
    remote: OnceCell<RemoteSource>,
}

impl LocalSource {
    pub fn new(install_dir: impl Into<PathBuf>, dirs: CascDirs) -> Result<Self> {
        let install_dir = install_dir.into();
        Ok(Self {
            data_dir: install_dir.join("Data"),
            storage_dir: install_dir.join("Data").join("data"),
            install_dir,
            dirs,
            client: CdnClient::new()?,
            locale_mask: locale::EN_US,
            builds: Vec::new(),
            selected: None,
            state: None,
            remote: OnceCell::new(),
        })
    }

    /// Select which locale root entries resolve under. Defaults to enUS.
    pub fn with_locale(mut self, locale_mask: u32) -> Self {
        self.locale_mask = locale_mask;
        self
    }

    /// Enumerate builds from `.build.info`.
    pub async fn init(&mut self) -> Result<()> {
        let path = self.install_dir.join(".build.info");
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| Error::InvalidInstall(self.install_dir.clone()))?;
        self.builds = parse_build_info(&text)?;
        info!(builds = self.builds.len(), dir = %self.install_dir.display(), "enumerated local builds");
        Ok(())
    }

    pub fn list_builds(&self) -> &[Build] {
        &self.builds
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn selected_build(&self) -> Option<&Build> {
        self.builds.get(self.selected?)
    }

    pub fn build_config(&self) -> Option<&std::collections::HashMap<String, String>> {
        self.state.as_ref().map(|s| &s.build_config)
    }

    /// Load one build end to end. State is staged and only committed on
    /// success, so a failed load can simply be retried.
    pub async fn load_build(&mut self, index: usize) -> Result<()> {
        let build = self
            .builds
            .get(index)
            .ok_or(Error::InvalidBuildIndex(index))?
            .clone();

        let cache = BuildCache::open(&self.dirs, &build.build_key).await?;

        info!("loading journal indexes");
        let journal = self.load_journal()?;

        tact::ensure_loaded(&self.dirs, &self.client).await;

        info!("fetching build configuration");
        let build_config = self.load_build_config(&build).await?;
        let cdn_config = self.load_cdn_config(&build).await?;

        info!("loading encoding table");
        let encoding = self
            .load_encoding(&journal, &cache, &build, &build_config)
            .await?;

        info!("loading root table");
        let root = self
            .load_root(&journal, &cache, &build, &build_config, &encoding)
            .await?;

        self.state = Some(LoadedState {
            cache,
            journal,
            build_config,
            cdn_config,
            encoding,
            root,
        });
        self.selected = Some(index);
        info!(index, build = %build.version, "local build loaded");
        Ok(())
    }

    pub fn resolve_encoding_key(&self, fdid: u32) -> Result<EncodingKey> {
        let state = self.state.as_ref().ok_or(Error::NotLoaded)?;
        resolve_encoding_key(&state.root, &state.encoding, self.locale_mask, fdid)
    }

    pub fn valid_root_entries(&self) -> Result<Vec<u32>> {
        let state = self.state.as_ref().ok_or(Error::NotLoaded)?;
        Ok(state.root.valid_entries(self.locale_mask))
    }

    pub async fn data_by_encoding_key(&self, ekey: &EncodingKey) -> Result<Vec<u8>> {
        let state = self.state.as_ref().ok_or(Error::NotLoaded)?;
        let product = self
            .selected_build()
            .map(|b| b.product.clone())
            .or_else(|| self.builds.first().map(|b| b.product.clone()))
            .unwrap_or_default();
        self.fetch_by_ekey(&state.journal, &state.cache, &product, ekey)
            .await
    }

    /// The CDN config of the loaded build. Always sourced remotely; the
    /// install does not carry its key.
    pub fn cdn_config(&self) -> Option<&std::collections::HashMap<String, String>> {
        self.state.as_ref().map(|s| &s.cdn_config)
    }

    // --- journal ---

    /// Merge every `*.idx` under `Data/data`, in filename order so
    /// first-wins deduplication is deterministic.
    fn load_journal(&self) -> Result<JournalIndex> {
        let mut names: Vec<PathBuf> = std::fs::read_dir(&self.storage_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "idx"))
            .collect();
        names.sort();

        let mut journal = JournalIndex::new();
        let mut files = 0;
        for path in &names {
            let data = std::fs::read(path)?;
            match journal.merge(&data) {
                Ok(_) => files += 1,
                Err(e) => warn!(path = %path.display(), "skipping unparseable journal index: {e}"),
            }
        }
        info!(files, entries = journal.len(), "merged journal indexes");
        Ok(journal)
    }

    /// Read one journal-addressed slice from its `data.NNN` blob. Any
    /// failure reads as a miss so the caller can fall back.
    async fn read_local_data(&self, entry: &JournalEntry) -> Option<Vec<u8>> {
        let length = entry.size.checked_sub(LOCAL_HEADER_LENGTH)? as usize;
        let path = self
            .storage_dir
            .join(format!("data.{:03}", entry.file_number));

        let mut file = tokio::fs::File::open(&path).await.ok()?;
        file.seek(SeekFrom::Start(u64::from(entry.offset + LOCAL_HEADER_LENGTH)))
            .await
            .ok()?;
        let mut buf = vec![0u8; length];
        file.read_exact(&mut buf).await.ok()?;

        // A zeroed or foreign slice means the journal entry is stale.
        if buf.len() < 4
            || u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) != BLTE_MAGIC
        {
            warn!(file = %path.display(), "journal entry does not point at a container");
            return None;
        }
        Some(buf)
    }

    // --- configs ---

    fn config_path(&self, key: &str) -> PathBuf {
        if key.len() < 4 {
            return self.data_dir.join("config").join(key);
        }
        self.data_dir
            .join("config")
            .join(&key[..2])
            .join(&key[2..4])
            .join(key)
    }

    async fn load_build_config(
        &self,
        build: &Build,
    ) -> Result<std::collections::HashMap<String, String>> {
        let key = &build.build_key;
        if let Ok(text) = tokio::fs::read_to_string(self.config_path(key)).await {
            return Ok(parse_kv_config(&text)?);
        }

        // Not on disk; fetch it by the same key from the CDN.
        debug!(%key, "build config not local, falling back to CDN");
        let remote = self.ensure_remote(&build.product).await?;
        let data = self
            .client
            .get_with_fallback(remote.hosts()?, &format!("config/{}", format_cdn_key(key)))
            .await?;
        Ok(parse_kv_config(&String::from_utf8_lossy(&data))?)
    }

    /// The CDN config key never appears in `.build.info`; it is always
    /// discovered through the remote product listing.
    async fn load_cdn_config(
        &self,
        build: &Build,
    ) -> Result<std::collections::HashMap<String, String>> {
        let remote = self.ensure_remote(&build.product).await?;
        let key = remote
            .list_builds()
            .iter()
            .find(|b| b.product == build.product)
            .map(|b| {
                if b.cdn_config.is_empty() {
                    b.cdn_key.clone()
                } else {
                    b.cdn_config.clone()
                }
            })
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingCdnConfig(build.product.clone()))?;

        let data = self
            .client
            .get_with_fallback(remote.hosts()?, &format!("config/{}", format_cdn_key(&key)))
            .await?;
        Ok(parse_kv_config(&String::from_utf8_lossy(&data))?)
    }

    // --- encoding / root ---

    async fn load_encoding(
        &self,
        journal: &JournalIndex,
        cache: &BuildCache,
        build: &Build,
        build_config: &std::collections::HashMap<String, String>,
    ) -> Result<EncodingTable> {
        let ekey = encoding_key_from_config(build_config)?;

        if let Some(cached) = cache.get("BUILD_ENCODING", None).await? {
            debug!(build = %cache.build_key(), "encoding container cached locally");
            let decoded = decode_container(cached, &ekey)?;
            return Ok(EncodingTable::parse(&decoded)?);
        }

        let raw = self
            .fetch_by_ekey(journal, cache, &build.product, &ekey)
            .await?;
        cache.put("BUILD_ENCODING", &raw, None).await?;
        let decoded = decode_container(raw, &ekey)?;
        let table = EncodingTable::parse(&decoded)?;
        info!(entries = table.len(), "parsed encoding table");
        Ok(table)
    }

    async fn load_root(
        &self,
        journal: &JournalIndex,
        cache: &BuildCache,
        build: &Build,
        build_config: &std::collections::HashMap<String, String>,
        encoding: &EncodingTable,
    ) -> Result<RootTable> {
        let ckey = root_content_key(build_config)?;
        let ekey = *encoding
            .ekey_for(&ckey)
            .ok_or_else(|| Error::ContentKeyNotFound(ckey.to_hex()))?;

        if let Some(cached) = cache.get("BUILD_ROOT", None).await? {
            let decoded = decode_container(cached, &ekey)?;
            return Ok(RootTable::parse(&decoded)?);
        }

        let raw = self
            .fetch_by_ekey(journal, cache, &build.product, &ekey)
            .await?;
        cache.put("BUILD_ROOT", &raw, None).await?;
        let decoded = decode_container(raw, &ekey)?;
        let table = RootTable::parse(&decoded)?;
        info!(
            files = table.file_count(),
            types = table.types().len(),
            "parsed root table"
        );
        Ok(table)
    }

    // --- data path ---

    /// Local journal first, then the build cache, then the remote source.
    async fn fetch_by_ekey(
        &self,
        journal: &JournalIndex,
        cache: &BuildCache,
        product: &str,
        ekey: &EncodingKey,
    ) -> Result<Vec<u8>> {
        if let Some(entry) = journal.lookup(ekey) {
            if let Some(data) = self.read_local_data(entry).await {
                return Ok(data);
            }
        }

        let hex_key = ekey.to_hex();
        if let Some(cached) = cache.get(&hex_key, Some("data")).await? {
            return Ok(cached);
        }

        let remote = self.ensure_remote(product).await?;
        let hosts = remote.hosts()?;

        if let Some((archive, offset, size)) = remote.archive_slice(ekey) {
            let suffix = format!("data/{}", format_cdn_key(&archive));
            if let Ok(data) = self
                .client
                .get_range_with_fallback(hosts, &suffix, u64::from(offset), u64::from(size))
                .await
            {
                cache.put(&hex_key, &data, Some("data")).await?;
                return Ok(data);
            }
        }

        match self
            .client
            .get_with_fallback(hosts, &format!("data/{}", format_cdn_key(&hex_key)))
            .await
        {
            Ok(data) => {
                cache.put(&hex_key, &data, Some("data")).await?;
                Ok(data)
            }
            Err(e) if e.is_not_found() => Err(Error::DataNotFound(hex_key)),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the remote fallback on first demand: same product, fixed
    /// fallback region, fully loaded so its archive indexes can route
    /// ranged fetches.
    async fn ensure_remote(&self, product: &str) -> Result<&RemoteSource> {
        self.remote
            .get_or_try_init(|| async {
                info!(product, region = FALLBACK_REGION, "initializing remote fallback");
                let mut remote = RemoteSource::with_client(
                    FALLBACK_REGION,
                    self.dirs.clone(),
                    self.client.clone(),
                )
                .with_locale(self.locale_mask);
                remote.init().await?;
                let index = remote
                    .list_builds()
                    .iter()
                    .position(|b| b.product == product)
                    .ok_or_else(|| Error::NoRemoteProduct(product.to_string()))?;
                remote.load_build(index).await?;
                Ok(remote)
            })
            .await
    }

    /// The installation directory this source reads from.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }
}
