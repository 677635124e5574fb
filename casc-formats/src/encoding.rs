//! Encoding table parser: content key → (uncompressed size, encoding key).
//!
//! The table header mixes byte orders: counts and sizes are big-endian
//! while the magic reads as little-endian `"EN"`. Records sit on fixed-size
//! pages; a zero `keys_count` terminates a page early.

use std::collections::HashMap;

use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::keys::{ContentKey, EncodingKey};
use crate::KEY_LENGTH;

/// `"EN"` as a little-endian u16.
const ENCODING_MAGIC: u16 = 0x4E45;

/// One record of the encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingEntry {
    /// Decompressed size of the content.
    pub size: u64,
    /// Primary encoding key. Alias keys are consumed but not retained.
    pub ekey: EncodingKey,
}

/// Parsed encoding table.
#[derive(Debug, Default)]
pub struct EncodingTable {
    entries: HashMap<ContentKey, EncodingEntry>,
}

impl EncodingTable {
    /// Parse a decoded encoding payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = ByteCursor::new(data);

        if cur.u16_le("magic")? != ENCODING_MAGIC {
            return Err(Error::malformed("magic"));
        }
        cur.skip(1, "version")?;
        let ckey_hash_size = cur.u8("hashSizeCKey")? as usize;
        let ekey_hash_size = cur.u8("hashSizeEKey")? as usize;
        if ckey_hash_size != KEY_LENGTH || ekey_hash_size != KEY_LENGTH {
            return Err(Error::UnsupportedVersion {
                what: "encoding hash size",
                version: ckey_hash_size as u32,
            });
        }
        let ckey_page_size = cur.u16_be("cKeyPageSize")? as usize * 1024;
        cur.skip(2, "eKeyPageSize")?;
        let ckey_page_count = cur.u32_be("cKeyPageCount")? as usize;
        cur.skip(4 + 1, "eKeyPageCount")?;
        let spec_block_size = cur.u32_be("specBlockSize")? as usize;

        // ESpec strings and the per-page digest table are not needed for
        // forward resolution.
        cur.skip(spec_block_size, "specBlock")?;
        cur.skip(ckey_page_count * (ckey_hash_size + 16), "pageDigests")?;
        let pages_start = cur.offset();

        let mut entries = HashMap::new();
        for page in 0..ckey_page_count {
            let page_start = pages_start + page * ckey_page_size;
            let page_end = page_start + ckey_page_size;
            cur.seek(page_start, "cKeyPage")?;

            while cur.offset() < page_end {
                let keys_count = cur.u8("keysCount")? as usize;
                if keys_count == 0 {
                    break;
                }
                let size = cur.u40_be("size")?;
                let ckey = ContentKey::new(cur.array("cKey")?);
                let ekey = EncodingKey::new(cur.array("eKey")?);
                // Remaining keys are aliases of the first; skip them.
                cur.skip((keys_count - 1) * ekey_hash_size, "eKeyAliases")?;
                entries.insert(ckey, EncodingEntry { size, ekey });
            }
        }

        debug!(entries = entries.len(), pages = ckey_page_count, "parsed encoding table");
        Ok(Self { entries })
    }

    pub fn lookup(&self, ckey: &ContentKey) -> Option<&EncodingEntry> {
        self.entries.get(ckey)
    }

    pub fn ekey_for(&self, ckey: &ContentKey) -> Option<&EncodingKey> {
        self.entries.get(ckey).map(|e| &e.ekey)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_table(records: &[(u8, u64, [u8; 16], Vec<[u8; 16]>)]) -> Vec<u8> {
        let mut page = Vec::new();
        for (count, size, ckey, ekeys) in records {
            page.push(*count);
            page.extend_from_slice(&size.to_be_bytes()[3..]);
            page.extend_from_slice(ckey);
            for ekey in ekeys {
                page.extend_from_slice(ekey);
            }
        }
        // One 1 KiB page, zero-terminated.
        page.resize(1024, 0);

        let mut data = Vec::new();
        data.extend_from_slice(b"EN");
        data.push(1); // version
        data.push(16); // ckey hash size
        data.push(16); // ekey hash size
        data.extend_from_slice(&1u16.to_be_bytes()); // ckey page size (KiB)
        data.extend_from_slice(&0u16.to_be_bytes()); // ekey page size
        data.extend_from_slice(&1u32.to_be_bytes()); // ckey page count
        data.extend_from_slice(&0u32.to_be_bytes()); // ekey page count
        data.push(0); // padding
        data.extend_from_slice(&0u32.to_be_bytes()); // ESpec block size
        data.extend_from_slice(&[0u8; 32]); // page digest (first hash + md5)
        data.extend_from_slice(&page);
        data
    }

    #[test]
    fn parses_records_and_sizes() {
        let data = build_table(&[
            (1, 4096, [0xAA; 16], vec![[0x01; 16]]),
            (1, 123, [0xBB; 16], vec![[0x02; 16]]),
        ]);
        let table = EncodingTable::parse(&data).unwrap();
        assert_eq!(table.len(), 2);

        let entry = table.lookup(&ContentKey::new([0xAA; 16])).unwrap();
        assert_eq!(entry.size, 4096);
        assert_eq!(entry.ekey, EncodingKey::new([0x01; 16]));
    }

    #[test]
    fn aliases_do_not_override_primary_key() {
        let data = build_table(&[(3, 10, [0xCC; 16], vec![[0x10; 16], [0x11; 16], [0x12; 16]])]);
        let table = EncodingTable::parse(&data).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.ekey_for(&ContentKey::new([0xCC; 16])),
            Some(&EncodingKey::new([0x10; 16]))
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = build_table(&[]);
        data[0] = b'X';
        assert!(matches!(
            EncodingTable::parse(&data),
            Err(Error::Malformed { field: "magic" })
        ));
    }

    #[test]
    fn rejects_unknown_hash_sizes() {
        let mut data = build_table(&[]);
        data[3] = 9;
        assert!(matches!(
            EncodingTable::parse(&data),
            Err(Error::UnsupportedVersion { .. })
        ));
    }
}
