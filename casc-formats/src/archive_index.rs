//! CDN archive index parser.
//!
//! Each `.index` blob lists which encoding keys live inside one 256 MB CDN
//! archive and where, enabling ranged fetches instead of whole-archive
//! downloads. The record count sits twelve bytes before the end of the
//! file; records start at byte zero.

use std::collections::HashMap;

use tracing::trace;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::keys::EncodingKey;

/// Byte range of one payload within its archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub offset: u32,
    pub size: u32,
}

/// Parsed index of a single CDN archive.
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    entries: HashMap<EncodingKey, ArchiveLocation>,
}

impl ArchiveIndex {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(Error::malformed("entryCount"));
        }
        let mut cur = ByteCursor::new(data);
        cur.seek(data.len() - 12, "entryCount")?;
        let count = cur.u32_le("entryCount")? as usize;
        if count.checked_mul(24).is_none_or(|n| n > data.len()) {
            return Err(Error::malformed("entryCount"));
        }

        cur.seek(0, "records")?;
        let mut entries = HashMap::with_capacity(count);
        for _ in 0..count {
            let mut key = EncodingKey::new(cur.array("eKey")?);
            if key.is_zero() {
                // Zero keys pad page boundaries; the real key follows.
                key = EncodingKey::new(cur.array("eKey")?);
            }
            let size = cur.u32_be("size")?;
            let offset = cur.u32_be("offset")?;
            entries.insert(key, ArchiveLocation { offset, size });
        }

        trace!(entries = entries.len(), "parsed archive index");
        Ok(Self { entries })
    }

    pub fn lookup(&self, ekey: &EncodingKey) -> Option<&ArchiveLocation> {
        self.entries.get(ekey)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&EncodingKey, &ArchiveLocation)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
