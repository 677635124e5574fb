//! The unified storage-source surface consumed by the service layer.

use std::collections::HashMap;

use casc_formats::{EncodingKey, EncodingTable, RootTable};

use crate::build::Build;
use crate::error::{Error, Result};
use crate::local::LocalSource;
use crate::remote::RemoteSource;

/// A storage source in either transport flavor.
///
/// Lifecycle: construct → [`init`](Self::init) (enumerate builds) →
/// [`load_build`](Self::load_build) (tables resident) → reads. A failed
/// `load_build` leaves the source un-loaded and retryable.
#[derive(Debug)]
pub enum StorageSource {
    Local(LocalSource),
    Remote(RemoteSource),
}

impl StorageSource {
    /// Enumerate the available builds.
    pub async fn init(&mut self) -> Result<()> {
        match self {
            StorageSource::Local(s) => s.init().await,
            StorageSource::Remote(s) => s.init().await,
        }
    }

    /// Load one enumerated build: indexes, configs, encoding, root.
    pub async fn load_build(&mut self, index: usize) -> Result<()> {
        match self {
            StorageSource::Local(s) => s.load_build(index).await,
            StorageSource::Remote(s) => s.load_build(index).await,
        }
    }

    pub fn list_builds(&self) -> &[Build] {
        match self {
            StorageSource::Local(s) => s.list_builds(),
            StorageSource::Remote(s) => s.list_builds(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self {
            StorageSource::Local(s) => s.is_loaded(),
            StorageSource::Remote(s) => s.is_loaded(),
        }
    }

    pub fn selected_build(&self) -> Option<&Build> {
        match self {
            StorageSource::Local(s) => s.selected_build(),
            StorageSource::Remote(s) => s.selected_build(),
        }
    }

    /// The identifier the build cache is keyed by.
    pub fn build_key(&self) -> Option<&str> {
        match self {
            StorageSource::Local(s) => s.selected_build().map(|b| b.build_key.as_str()),
            StorageSource::Remote(s) => s.selected_build().map(|b| b.build_config.as_str()),
        }
    }

    /// Human-readable build version.
    pub fn build_name(&self) -> Option<&str> {
        match self {
            StorageSource::Local(s) => s.selected_build().map(|b| b.version.as_str()),
            StorageSource::Remote(s) => s.selected_build().map(|b| b.versions_name.as_str()),
        }
    }

    /// The parsed build config of the loaded build.
    pub fn build_config(&self) -> Option<&HashMap<String, String>> {
        match self {
            StorageSource::Local(s) => s.build_config(),
            StorageSource::Remote(s) => s.build_config(),
        }
    }

    /// FileDataID → encoding key through the root and encoding tables.
    pub fn resolve_encoding_key(&self, fdid: u32) -> Result<EncodingKey> {
        match self {
            StorageSource::Local(s) => s.resolve_encoding_key(fdid),
            StorageSource::Remote(s) => s.resolve_encoding_key(fdid),
        }
    }

    /// Raw container bytes for an encoding key.
    pub async fn data_by_encoding_key(&self, ekey: &EncodingKey) -> Result<Vec<u8>> {
        match self {
            StorageSource::Local(s) => s.data_by_encoding_key(ekey).await,
            StorageSource::Remote(s) => s.data_by_encoding_key(ekey).await,
        }
    }

    /// FileDataIDs visible under the current locale and content filters.
    pub fn valid_root_entries(&self) -> Result<Vec<u32>> {
        match self {
            StorageSource::Local(s) => s.valid_root_entries(),
            StorageSource::Remote(s) => s.valid_root_entries(),
        }
    }
}

/// Decode a BLTE container against the process key ring, verifying the
/// outer hash against its encoding key.
pub(crate) fn decode_container(raw: Vec<u8>, ekey: &EncodingKey) -> Result<Vec<u8>> {
    let ring = crate::tact::read();
    Ok(casc_blte::decode_blte(raw, ekey, &ring, false)?)
}

/// The encoding table's own key, from the `encoding` build-config field
/// (`"<content key> <encoding key>"`; the second token addresses the
/// container).
pub(crate) fn encoding_key_from_config(
    build_config: &HashMap<String, String>,
) -> Result<EncodingKey> {
    let field = build_config
        .get("encoding")
        .ok_or(Error::MissingConfigKey("encoding"))?;
    let key = field
        .split_whitespace()
        .nth(1)
        .ok_or(Error::MissingConfigKey("encoding"))?;
    Ok(EncodingKey::from_hex(key)?)
}

/// The root table's content key from the build config.
pub(crate) fn root_content_key(
    build_config: &HashMap<String, String>,
) -> Result<casc_formats::ContentKey> {
    let field = build_config
        .get("root")
        .ok_or(Error::MissingConfigKey("root"))?;
    Ok(casc_formats::ContentKey::from_hex(field.trim())?)
}

/// Resolve a FileDataID against loaded tables: walk root types in
/// ascending index order, skip types hidden by the locale/content filter,
/// and return the first content key the encoding table knows.
pub fn resolve_encoding_key(
    root: &RootTable,
    encoding: &EncodingTable,
    locale: u32,
    fdid: u32,
) -> Result<EncodingKey> {
    let entries = root.entries_for(fdid).ok_or(Error::FileIdNotFound(fdid))?;
    for (type_index, ckey) in entries {
        if !root.type_passes(*type_index, locale) {
            continue;
        }
        if let Some(entry) = encoding.lookup(ckey) {
            return Ok(entry.ekey);
        }
    }
    Err(Error::EncodingKeyNotFound(fdid))
}
