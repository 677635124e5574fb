//! Local `.idx` journal index parser.
//!
//! The journal maps 9-byte truncated encoding keys to slices of the local
//! `data.NNN` blob files. A client merges every `.idx` under
//! `Data/data/`; the first occurrence of a key wins, both within one file
//! and across files.

use std::collections::HashMap;

use tracing::trace;

use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::keys::{EncodingKey, TRUNCATED_KEY_LENGTH};

/// Size of one journal record on disk.
const ENTRY_LENGTH: usize = 18;

/// Location of a payload inside a local `data.NNN` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalEntry {
    /// Number of the `data.NNN` file holding the payload.
    pub file_number: u16,
    pub offset: u32,
    pub size: u32,
}

/// Merged journal entries across any number of `.idx` files.
#[derive(Debug, Default)]
pub struct JournalIndex {
    entries: HashMap<[u8; TRUNCATED_KEY_LENGTH], JournalEntry>,
}

impl JournalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one `.idx` file and merge its entries, first occurrence wins.
    /// Returns how many new entries were added.
    pub fn merge(&mut self, data: &[u8]) -> Result<usize> {
        let mut cur = ByteCursor::new(data);

        let header_hash_size = cur.u32_le("headerHashSize")? as usize;
        cur.skip(4, "headerHash")?;
        cur.skip(header_hash_size, "headerHash")?;
        // The data section starts at the next 16-byte boundary.
        let aligned = (8 + header_hash_size + 0x0F) & !0x0F;
        cur.seek(aligned, "dataStart")?;
        let data_length = cur.u32_le("dataLength")? as usize;
        cur.skip(4, "dataHash")?;

        let count = data_length / ENTRY_LENGTH;
        let mut added = 0;
        for _ in 0..count {
            let key: [u8; TRUNCATED_KEY_LENGTH] = cur.array("eKey")?;
            if self.entries.contains_key(&key) {
                cur.skip(ENTRY_LENGTH - TRUNCATED_KEY_LENGTH, "duplicate")?;
                continue;
            }
            let idx_high = cur.u8("idxHigh")?;
            let idx_low = cur.u32_be("idxLow")?;
            let size = cur.u32_le("size")?;
            self.entries.insert(
                key,
                JournalEntry {
                    file_number: (u16::from(idx_high) << 2) | ((idx_low >> 30) & 0x3) as u16,
                    offset: idx_low & 0x3FFF_FFFF,
                    size,
                },
            );
            added += 1;
        }

        trace!(added, total = self.entries.len(), "merged journal index");
        Ok(added)
    }

    /// Look up by the first nine bytes of an encoding key.
    pub fn lookup(&self, ekey: &EncodingKey) -> Option<&JournalEntry> {
        self.entries.get(&ekey.truncated())
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

    fn idx_file(entries: &[([u8; 9], u8, u32, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&8u32.to_le_bytes()); // header hash size
        data.extend_from_slice(&[0u8; 4]); // header hash (u32)
        data.extend_from_slice(&[0u8; 8]); // header blob
        // 8 + 8 = 16, already aligned.
        data.extend_from_slice(&((entries.len() * ENTRY_LENGTH) as u32).to_le_bytes());
        data.extend_from_slice(&[0u8; 4]); // data hash
        for (key, idx_high, idx_low, size) in entries {
            data.extend_from_slice(key);
            data.push(*idx_high);
            data.extend_from_slice(&idx_low.to_be_bytes());
            data.extend_from_slice(&size.to_le_bytes());
        }
        data
    }

    #[test]
    fn decomposes_file_number_and_offset() {
        // idx_high = 1, top 2 bits of idx_low = 0b10 -> file 0b110 = 6.
        let idx_low: u32 = (0b10 << 30) | 0x1234;
        let mut journal = JournalIndex::new();
        journal
            .merge(&idx_file(&[([0xAB; 9], 1, idx_low, 4096)]))
            .unwrap();

        let mut full = [0u8; 16];
        full[..9].copy_from_slice(&[0xAB; 9]);
        let entry = journal.lookup(&EncodingKey::new(full)).unwrap();
        assert_eq!(entry.file_number, 6);
        assert_eq!(entry.offset, 0x1234);
        assert_eq!(entry.size, 4096);
    }

    #[test]
    fn first_occurrence_wins_within_a_file() {
        let data = idx_file(&[([0x01; 9], 0, 100, 10), ([0x01; 9], 0, 200, 20)]);
        let mut journal = JournalIndex::new();
        assert_eq!(journal.merge(&data).unwrap(), 1);

        let mut full = [0u8; 16];
        full[..9].copy_from_slice(&[0x01; 9]);
        assert_eq!(journal.lookup(&EncodingKey::new(full)).unwrap().offset, 100);
    }

    #[test]
    fn first_file_wins_across_merges() {
        let mut journal = JournalIndex::new();
        journal.merge(&idx_file(&[([0x02; 9], 0, 1, 1)])).unwrap();
        let added = journal.merge(&idx_file(&[([0x02; 9], 0, 2, 2)])).unwrap();
        assert_eq!(added, 0);

        let mut full = [0u8; 16];
        full[..9].copy_from_slice(&[0x02; 9]);
        assert_eq!(journal.lookup(&EncodingKey::new(full)).unwrap().offset, 1);
    }

    #[test]
    fn truncated_file_is_malformed() {
        let mut data = idx_file(&[([0x03; 9], 0, 0, 0)]);
        data.truncate(data.len() - 4);
        assert!(JournalIndex::new().merge(&data).is_err());
    }
}
