//! TACT key ring: 8-byte key name → symmetric key.
//!
//! Two interchangeable on-disk formats are accepted: a JSON object of
//! `{keyName: keyHex}` pairs, or whitespace-separated text with one
//! `keyName keyHex` pair per line (`#` and `//` comments, optional `0x`
//! prefixes). Invalid lines are skipped; invalid JSON falls through to the
//! text parser. Lifecycle (env/default-path/URL discovery) belongs to the
//! storage layer; this type is just the map and its loaders.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::CryptoError;
use crate::Result;

/// Length of a key name in hex characters (8 bytes).
const KEY_NAME_HEX_LENGTH: usize = 16;

/// In-memory TACT key map, addressed by lowercase hex key name.
#[derive(Debug, Default)]
pub struct TactKeyring {
    keys: HashMap<String, Vec<u8>>,
}

impl TactKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key by its 16-hex-char name, case-insensitively.
    pub fn get(&self, key_name: &str) -> Option<&[u8]> {
        if key_name.chars().any(|c| c.is_ascii_uppercase()) {
            return self.keys.get(&key_name.to_ascii_lowercase()).map(Vec::as_slice);
        }
        self.keys.get(key_name).map(Vec::as_slice)
    }

    /// Insert a key from its hex representation. The name is normalized to
    /// lowercase and stripped of any `0x` prefix.
    pub fn add_key(&mut self, key_name: &str, key_hex: &str) -> Result<()> {
        let name = normalize_key_name(key_name)?;
        let key = hex::decode(key_hex.trim())
            .map_err(|_| CryptoError::InvalidKeyHex(key_hex.to_string()))?;
        if key.len() != 16 && key.len() != 32 {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        self.keys.insert(name, key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Merge keys from raw bytes in either accepted format. Returns how
    /// many keys were added or replaced.
    pub fn merge(&mut self, data: &[u8]) -> usize {
        if let Ok(added) = self.merge_json(data) {
            return added;
        }
        self.merge_text(&String::from_utf8_lossy(data))
    }

    /// Merge a JSON object of `{keyName: keyHex}` pairs.
    pub fn merge_json(&mut self, data: &[u8]) -> std::result::Result<usize, serde_json::Error> {
        let map: HashMap<String, String> = serde_json::from_slice(data)?;
        let mut added = 0;
        for (name, key_hex) in &map {
            match self.add_key(name, key_hex) {
                Ok(()) => added += 1,
                Err(e) => warn!("skipping TACT key {name:?}: {e}"),
            }
        }
        debug!(added, "merged TACT keys from JSON");
        Ok(added)
    }

    /// Merge whitespace-separated `keyName keyHex` lines.
    pub fn merge_text(&mut self, data: &str) -> usize {
        let mut added = 0;
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(name), Some(key_hex)) = (fields.next(), fields.next()) else {
                continue;
            };
            if self.add_key(name, key_hex).is_ok() {
                added += 1;
            }
        }
        debug!(added, "merged TACT keys from text");
        added
    }

    /// Load a key file from disk, auto-detecting the format.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let data = fs::read(path)?;
        Ok(self.merge(&data))
    }
}

fn normalize_key_name(key_name: &str) -> Result<String> {
    let name = key_name.trim().trim_start_matches("0x").to_ascii_lowercase();
    if name.len() != KEY_NAME_HEX_LENGTH || !name.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidKeyName(key_name.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn add_and_get_is_case_insensitive() {
        let mut ring = TactKeyring::new();
        ring.add_key("FA505078126ACB3E", "BDC51862ABED79B2DE48C8E7E66C6200")
            .unwrap();
        assert!(ring.get("fa505078126acb3e").is_some());
        assert!(ring.get("FA505078126ACB3E").is_some());
        assert_eq!(ring.get("fa505078126acb3e").unwrap().len(), 16);
    }

    #[test]
    fn rejects_bad_names_and_keys() {
        let mut ring = TactKeyring::new();
        assert!(ring.add_key("123", "00112233445566778899aabbccddeeff").is_err());
        assert!(ring.add_key("fa505078126acb3e", "beef").is_err());
        assert!(ring.add_key("fa505078126acb3e", "not-hex").is_err());
    }

    #[test]
    fn json_format() {
        let mut ring = TactKeyring::new();
        let added = ring
            .merge_json(
                br#"{"0xFA505078126ACB3E": "BDC51862ABED79B2DE48C8E7E66C6200",
                     "ff813f7d062ac0bc": "AA0B5C77F088CCC2D39049BD267F066D"}"#,
            )
            .unwrap();
        assert_eq!(added, 2);
        assert!(ring.get("ff813f7d062ac0bc").is_some());
    }

    #[test]
    fn text_format_skips_invalid_lines() {
        let mut ring = TactKeyring::new();
        let added = ring.merge_text(
            "# comment\n\
             // another comment\n\
             0xFA505078126ACB3E BDC51862ABED79B2DE48C8E7E66C6200\n\
             short 00\n\
             ff813f7d062ac0bc AA0B5C77F088CCC2D39049BD267F066D trailing words\n",
        );
        assert_eq!(added, 2);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn invalid_json_falls_through_to_text() {
        let mut ring = TactKeyring::new();
        let added = ring.merge(b"fa505078126acb3e bdc51862abed79b2de48c8e7e66c6200\n");
        assert_eq!(added, 1);
    }

    #[test]
    fn load_file_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "fa505078126acb3e bdc51862abed79b2de48c8e7e66c6200").unwrap();

        let mut ring = TactKeyring::new();
        assert_eq!(ring.load_file(file.path()).unwrap(), 1);
        assert!(ring.get("fa505078126acb3e").is_some());
    }
}
