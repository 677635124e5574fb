//! Parsers for the content-addressed tables that drive CASC resolution.
//!
//! Everything in this crate is a pure function over an immutable byte slice
//! or string: the encoding table (content key → encoding key), the root
//! table (FileDataID → content key), CDN archive indexes, local `.idx`
//! journal indexes, and the two text config formats served by the patch
//! endpoints. Decompression and transport live elsewhere; parsers here
//! always receive fully decoded payloads.

pub mod archive_index;
pub mod config;
pub mod cursor;
pub mod encoding;
pub mod error;
pub mod flags;
pub mod journal;
pub mod keys;
pub mod root;

pub use archive_index::{ArchiveIndex, ArchiveLocation};
pub use config::{parse_kv_config, TextTable};
pub use cursor::ByteCursor;
pub use encoding::{EncodingEntry, EncodingTable};
pub use error::{Error, Result};
pub use journal::{JournalEntry, JournalIndex};
pub use keys::{ContentKey, EncodingKey};
pub use root::{RootTable, RootType};

/// Length of an MD5-style key in bytes.
pub const KEY_LENGTH: usize = 16;
