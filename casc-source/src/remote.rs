//! Storage source backed entirely by the CDN.
//!
//! Build enumeration walks the well-known product list against the
//! region's version server. Loading a build ranks the advertised CDN
//! hosts by latency, pulls both configs, fans out over the archive
//! indexes, and then loads encoding and root exactly like the local
//! source does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use casc_cache::{BuildCache, CascDirs};
use casc_cdn::{format_cdn_key, CdnClient, RankedHosts};
use casc_formats::{
    flags::locale, parse_kv_config, ArchiveIndex, EncodingKey, EncodingTable, RootTable, TextTable,
};

use crate::build::{builds_from_versions, Build};
use crate::error::{Error, Result};
use crate::source::{
    decode_container, encoding_key_from_config, resolve_encoding_key, root_content_key,
};
use crate::tact;

/// Products enumerated against the version server.
const PRODUCTS: [&str; 9] = [
    "wow",
    "wowt",
    "wowxptr",
    "wow_beta",
    "wow_classic",
    "wow_classic_beta",
    "wow_classic_ptr",
    "wow_classic_era",
    "wow_classic_era_ptr",
];

/// Parallelism cap for archive-index loading.
const ARCHIVE_CONCURRENCY: usize = 50;

/// Where a payload lives inside a CDN archive.
#[derive(Debug, Clone)]
struct ArchiveSlice {
    archive: String,
    offset: u32,
    size: u32,
}

#[derive(Debug)]
struct RemoteState {
    hosts: RankedHosts,
    cache: BuildCache,
    cdn_config: HashMap<String, String>,
    build_config: HashMap<String, String>,
    /// Populated concurrently during load; readers may observe a partial
    /// map, which only costs them a ranged fetch.
    archives: Arc<DashMap<EncodingKey, ArchiveSlice>>,
    encoding: EncodingTable,
    root: RootTable,
}

/// Source over a region's CDN.
#[derive(Debug)]
pub struct RemoteSource {
    region: String,
    dirs: CascDirs,
    client: CdnClient,
    locale_mask: u32,
    builds: Vec<Build>,
    selected: Option<usize>,
    state: Option<RemoteState>,
}

impl RemoteSource {
    pub fn new(region: impl Into<String>, dirs: CascDirs) -> Result<Self> {
        let client = CdnClient::new()?;
        Ok(Self::with_client(region, dirs, client))
    }

    /// Construct around an existing client so a local source can share
    /// its connection pool.
    pub fn with_client(region: impl Into<String>, dirs: CascDirs, client: CdnClient) -> Self {
        Self {
            region: region.into(),
            dirs,
            client,
            locale_mask: locale::EN_US,
            builds: Vec::new(),
            selected: None,
            state: None,
        }
    }

    /// Select which locale root entries resolve under. Defaults to enUS.
    pub fn with_locale(mut self, locale_mask: u32) -> Self {
        self.locale_mask = locale_mask;
        self
    }

    fn version_host(&self) -> String {
        format!("https://{}.version.battle.net/", self.region)
    }

    /// Enumerate builds across all known products. A product whose
    /// listing cannot be fetched is skipped, not fatal.
    pub async fn init(&mut self) -> Result<()> {
        let host = self.version_host();
        self.builds.clear();
        for product in PRODUCTS {
            let url = format!("{host}{product}/versions");
            debug!(%url, "fetching versions");
            let data = match self.client.get(&url).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(product, "versions fetch failed: {e}");
                    continue;
                }
            };
            let table = match TextTable::parse(&String::from_utf8_lossy(&data)) {
                Ok(table) => table,
                Err(e) => {
                    warn!(product, "versions parse failed: {e}");
                    continue;
                }
            };
            self.builds
                .extend(builds_from_versions(&table, product, &self.region));
        }
        info!(region = %self.region, builds = self.builds.len(), "enumerated remote builds");
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

    pub fn build_config(&self) -> Option<&HashMap<String, String>> {
        self.state.as_ref().map(|s| &s.build_config)
    }

    pub fn cdn_config(&self) -> Option<&HashMap<String, String>> {
        self.state.as_ref().map(|s| &s.cdn_config)
    }

    pub async fn load_build(&mut self, index: usize) -> Result<()> {
        let build = self
            .builds
            .get(index)
            .ok_or(Error::InvalidBuildIndex(index))?
            .clone();

        // Resolve and rank this region's CDN hosts.
        let cdns_url = format!("{}{}/cdns", self.version_host(), build.product);
        debug!(url = %cdns_url, "fetching cdns");
        let data = self.client.get(&cdns_url).await?;
        let table = TextTable::parse(&String::from_utf8_lossy(&data))?;
        let row = (0..table.row_count())
            .find(|&row| table.get(row, "Name") == Some(self.region.as_str()))
            .ok_or_else(|| Error::RegionNotInCdns(self.region.clone()))?;
        let hosts = self
            .client
            .rank_hosts(
                table.get(row, "Hosts").unwrap_or_default(),
                table.get(row, "Path").unwrap_or_default(),
            )
            .await?;

        // Both configs come through the ranked hosts.
        let cdn_key = if build.cdn_config.is_empty() {
            build.cdn_key.clone()
        } else {
            build.cdn_config.clone()
        };
        if cdn_key.is_empty() {
            return Err(Error::MissingCdnConfig(build.product.clone()));
        }
        let cdn_config = self.fetch_config(&hosts, &cdn_key).await?;
        let build_config = self.fetch_config(&hosts, &build.build_config).await?;

        let cache = BuildCache::open(&self.dirs, &build.build_config).await?;

        tact::ensure_loaded(&self.dirs, &self.client).await;

        // Archive indexes make ranged fetches possible but are not
        // required for correctness; direct fetches cover the gap.
        let archives = Arc::new(DashMap::new());
        if let Err(e) = self
            .load_archives(&hosts, &cache, &cdn_config, &archives)
            .await
        {
            warn!("archive index load failed: {e}");
        }

        info!("loading encoding table");
        let ekey = encoding_key_from_config(&build_config)?;
        let encoding = {
            let raw = match cache.get("BUILD_ENCODING", None).await? {
                Some(cached) => cached,
                None => {
                    let raw = self
                        .fetch_by_ekey_with(&hosts, &cache, &archives, &ekey)
                        .await?;
                    cache.put("BUILD_ENCODING", &raw, None).await?;
                    raw
                }
            };
            let table = EncodingTable::parse(&decode_container(raw, &ekey)?)?;
            info!(entries = table.len(), "parsed encoding table");
            table
        };

        info!("loading root table");
        let root_ckey = root_content_key(&build_config)?;
        let root_ekey = *encoding
            .ekey_for(&root_ckey)
            .ok_or_else(|| Error::ContentKeyNotFound(root_ckey.to_hex()))?;
        let root = {
            let raw = match cache.get("BUILD_ROOT", None).await? {
                Some(cached) => cached,
                None => {
                    let raw = self
                        .fetch_by_ekey_with(&hosts, &cache, &archives, &root_ekey)
                        .await?;
                    cache.put("BUILD_ROOT", &raw, None).await?;
                    raw
                }
            };
            let table = RootTable::parse(&decode_container(raw, &root_ekey)?)?;
            info!(
                files = table.file_count(),
                types = table.types().len(),
                "parsed root table"
            );
            table
        };

        self.state = Some(RemoteState {
            hosts,
            cache,
            cdn_config,
            build_config,
            archives,
            encoding,
            root,
        });
        self.selected = Some(index);
        info!(index, build = %build.versions_name, "remote build loaded");
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
        self.fetch_by_ekey_with(&state.hosts, &state.cache, &state.archives, ekey)
            .await
    }

    /// Cache, then archive partial, then direct fetch.
    async fn fetch_by_ekey_with(
        &self,
        hosts: &RankedHosts,
        cache: &BuildCache,
        archives: &DashMap<EncodingKey, ArchiveSlice>,
        ekey: &EncodingKey,
    ) -> Result<Vec<u8>> {
        let hex_key = ekey.to_hex();
        if let Some(cached) = cache.get(&hex_key, Some("data")).await? {
            return Ok(cached);
        }

        // Clone out of the map guard before awaiting anything.
        let slice = archives.get(ekey).map(|s| s.value().clone());
        if let Some(slice) = slice {
            let suffix = format!("data/{}", format_cdn_key(&slice.archive));
            if let Ok(data) = self
                .client
                .get_range_with_fallback(
                    hosts,
                    &suffix,
                    u64::from(slice.offset),
                    u64::from(slice.size),
                )
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

    async fn fetch_config(
        &self,
        hosts: &RankedHosts,
        key: &str,
    ) -> Result<HashMap<String, String>> {
        let data = self
            .client
            .get_with_fallback(hosts, &format!("config/{}", format_cdn_key(key)))
            .await?;
        Ok(parse_kv_config(&String::from_utf8_lossy(&data))?)
    }

    /// Pull every archive index named by the CDN config, bounded to
    /// [`ARCHIVE_CONCURRENCY`] in flight, merging entries as they land.
    async fn load_archives(
        &self,
        hosts: &RankedHosts,
        cache: &BuildCache,
        cdn_config: &HashMap<String, String>,
        archives: &Arc<DashMap<EncodingKey, ArchiveSlice>>,
    ) -> Result<()> {
        let Some(keys) = cdn_config.get("archives") else {
            return Ok(());
        };

        let started = Instant::now();
        let cached = AtomicUsize::new(0);
        let downloaded = AtomicUsize::new(0);

        stream::iter(keys.split_whitespace())
            .for_each_concurrent(ARCHIVE_CONCURRENCY, |key| {
                let cached = &cached;
                let downloaded = &downloaded;
                let archives = Arc::clone(archives);
                async move {
                    match self.load_archive_index(hosts, cache, &archives, key).await {
                        Ok(true) => {
                            cached.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {
                            downloaded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => warn!(key, "archive index failed: {e}"),
                    }
                }
            })
            .await;

        info!(
            cached = cached.load(Ordering::Relaxed),
            downloaded = downloaded.load(Ordering::Relaxed),
            entries = archives.len(),
            elapsed = ?started.elapsed(),
            "archive indexes loaded"
        );
        Ok(())
    }

    /// Load one archive index, from cache when possible. Returns whether
    /// the cached copy was used.
    async fn load_archive_index(
        &self,
        hosts: &RankedHosts,
        cache: &BuildCache,
        archives: &DashMap<EncodingKey, ArchiveSlice>,
        key: &str,
    ) -> Result<bool> {
        let name = format!("{key}.index");
        if let Some(data) = cache.get(&name, Some("indices")).await? {
            merge_archive_index(archives, key, &data)?;
            return Ok(true);
        }

        let suffix = format!("data/{}.index", format_cdn_key(key));
        let data = self.client.get_with_fallback(hosts, &suffix).await?;
        cache.put(&name, &data, Some("indices")).await?;
        merge_archive_index(archives, key, &data)?;
        debug!(key, "archive index downloaded");
        Ok(false)
    }

    /// The ranked hosts of the loaded build, for callers routing their own
    /// fetches (the local source's fallback path).
    pub(crate) fn hosts(&self) -> Result<&RankedHosts> {
        Ok(&self.state.as_ref().ok_or(Error::NotLoaded)?.hosts)
    }

    /// Archive routing for an encoding key, if its index has been seen.
    pub(crate) fn archive_slice(&self, ekey: &EncodingKey) -> Option<(String, u32, u32)> {
        let state = self.state.as_ref()?;
        let slice = state.archives.get(ekey)?;
        Some((slice.archive.clone(), slice.offset, slice.size))
    }
}

fn merge_archive_index(
    archives: &DashMap<EncodingKey, ArchiveSlice>,
    key: &str,
    data: &[u8],
) -> Result<()> {
    let index = ArchiveIndex::parse(data)?;
    for (ekey, location) in index.entries() {
        archives.insert(
            *ekey,
            ArchiveSlice {
                archive: key.to_string(),
                offset: location.offset,
                size: location.size,
            },
        );
    }
    Ok(())
}
