//! Root table parser: FileDataID → content key, per root type.
//!
//! Three layouts share one body shape. The modern `TSFM` format carries a
//! header with file counts; a `TSFM` file whose second word is not `0x18`
//! is the implicit version-0 layout where that word and the next are
//! actually the file counts. The classic magic-less layout interleaves
//! each content key with its name hash instead of storing them columnar.

use std::collections::HashMap;

use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::flags::content;
use crate::keys::ContentKey;

/// `"TSFM"` as a little-endian u32.
const ROOT_MAGIC: u32 = 0x4D46_5354;

/// One (locale mask, content flags) block of the root table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootType {
    pub content_flags: u32,
    pub locale_flags: u32,
}

impl RootType {
    /// Whether entries of this type are visible under `locale_mask`.
    /// Low-violence variants are never served.
    pub fn passes(&self, locale_mask: u32) -> bool {
        (self.locale_flags & locale_mask) != 0
            && (self.content_flags & content::LOW_VIOLENCE) == 0
    }
}

/// Parsed root table.
#[derive(Debug, Default)]
pub struct RootTable {
    types: Vec<RootType>,
    /// Per FileDataID, `(root type index, content key)` pairs in ascending
    /// type order. Blocks are parsed in file order, so pushes keep the vec
    /// sorted without an explicit sort.
    entries: HashMap<u32, Vec<(u16, ContentKey)>>,
}

impl RootTable {
    /// Parse a decoded root payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = ByteCursor::new(data);
        let mut table = RootTable::default();

        let magic = cur.u32_le("magic")?;
        if magic == ROOT_MAGIC {
            table.parse_modern(&mut cur)?;
        } else {
            cur.seek(0, "records")?;
            table.parse_classic(&mut cur)?;
        }

        debug!(
            files = table.entries.len(),
            types = table.types.len(),
            "parsed root table"
        );
        Ok(table)
    }

    fn parse_modern(&mut self, cur: &mut ByteCursor<'_>) -> Result<()> {
        let header_size = cur.u32_le("headerSize")?;
        let version_word = cur.u32_le("version")?;

        let (version, total_file_count, named_file_count) = if header_size == 0x18 {
            if version_word != 1 && version_word != 2 {
                return Err(Error::UnsupportedVersion {
                    what: "root",
                    version: version_word,
                });
            }
            let total = cur.u32_le("totalFileCount")?;
            let named = cur.u32_le("namedFileCount")?;
            cur.seek(header_size as usize, "header")?;
            (version_word, total, named)
        } else {
            // Implicit version 0: the two words read so far were the file
            // counts and the header is 12 bytes.
            cur.seek(12, "header")?;
            (0, header_size, version_word)
        };
        let allow_nameless = total_file_count != named_file_count;

        while cur.remaining() > 0 {
            let num_records = cur.u32_le("numRecords")? as usize;

            let flags = if version == 2 {
                let locale_flags = cur.u32_le("localeFlags")?;
                let c1 = cur.u32_le("contentFlags1")?;
                let c2 = cur.u32_le("contentFlags2")?;
                let c3 = cur.u8("contentFlags3")?;
                RootType {
                    content_flags: c1 | c2 | (u32::from(c3) << 17),
                    locale_flags,
                }
            } else {
                RootType {
                    content_flags: cur.u32_le("contentFlags")?,
                    locale_flags: cur.u32_le("localeFlags")?,
                }
            };

            let file_ids = read_file_ids(cur, num_records)?;
            let type_index = self.push_type(flags)?;
            for &fdid in &file_ids {
                let ckey = ContentKey::new(cur.array("cKey")?);
                self.entries.entry(fdid).or_default().push((type_index, ckey));
            }

            if !(allow_nameless && (flags.content_flags & content::NO_NAME_HASH) != 0) {
                cur.skip(8 * num_records, "nameHashes")?;
            }
        }
        Ok(())
    }

    fn parse_classic(&mut self, cur: &mut ByteCursor<'_>) -> Result<()> {
        while cur.remaining() > 0 {
            let num_records = cur.u32_le("numRecords")? as usize;
            let flags = RootType {
                content_flags: cur.u32_le("contentFlags")?,
                locale_flags: cur.u32_le("localeFlags")?,
            };

            let file_ids = read_file_ids(cur, num_records)?;
            let type_index = self.push_type(flags)?;
            for &fdid in &file_ids {
                let ckey = ContentKey::new(cur.array("cKey")?);
                cur.skip(8, "nameHash")?;
                self.entries.entry(fdid).or_default().push((type_index, ckey));
            }
        }
        Ok(())
    }

    fn push_type(&mut self, flags: RootType) -> Result<u16> {
        let index =
            u16::try_from(self.types.len()).map_err(|_| Error::malformed("rootTypeCount"))?;
        self.types.push(flags);
        Ok(index)
    }

    pub fn types(&self) -> &[RootType] {
        &self.types
    }

    /// Entries for one FileDataID, ascending by root type index.
    pub fn entries_for(&self, fdid: u32) -> Option<&[(u16, ContentKey)]> {
        self.entries.get(&fdid).map(Vec::as_slice)
    }

    pub fn type_passes(&self, index: u16, locale_mask: u32) -> bool {
        self.types
            .get(index as usize)
            .is_some_and(|t| t.passes(locale_mask))
    }

    /// All FileDataIDs with at least one entry visible under `locale_mask`.
    pub fn valid_entries(&self, locale_mask: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, types)| {
                types.iter().any(|(idx, _)| self.type_passes(*idx, locale_mask))
            })
            .map(|(&fdid, _)| fdid)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn file_count(&self) -> usize {
        self.entries.len()
    }
}

/// Decode the delta-compressed FileDataID column: each stored value is the
/// gap from the previous ID plus one.
fn read_file_ids(cur: &mut ByteCursor<'_>, num_records: usize) -> Result<Vec<u32>> {
    let mut out = Vec::with_capacity(num_records);
    let mut next = 0u32;
    for _ in 0..num_records {
        let delta = cur.i32_le("fileDataIDDelta")?;
        let fdid = next
            .checked_add_signed(delta)
            .ok_or(Error::malformed("fileDataIDDelta"))?;
        out.push(fdid);
        next = fdid
            .checked_add(1)
            .ok_or(Error::malformed("fileDataIDDelta"))?;
    }
    Ok(out)
}
