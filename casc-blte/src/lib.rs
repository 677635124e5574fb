//! BLTE container reader.
//!
//! BLTE frames every asset served from CASC storage: a header with an
//! optional block table, then a sequence of blocks that are raw,
//! zlib-compressed, or Salsa20-encrypted around an inner block. The outer
//! container hash is the encoding key of the payload, so integrity is
//! verified before any block is touched.

pub mod error;
pub mod reader;

pub use error::{Error, Result};
pub use reader::{decode_blte, BlockMode, BlteReader};

/// `"BLTE"` as a little-endian u32.
pub const BLTE_MAGIC: u32 = 0x4554_4C42;
