//! Container parsing and block decoding.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::{trace, warn};

use casc_crypto::{Salsa20, TactKeyring};
use casc_formats::{ByteCursor, EncodingKey};

use crate::error::{Error, Result};
use crate::BLTE_MAGIC;

/// Block mode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// `0x4E`: raw copy.
    Raw,
    /// `0x5A`: zlib stream.
    ZLib,
    /// `0x45`: encrypted wrapper around an inner block.
    Encrypted,
}

impl BlockMode {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x4E => Some(Self::Raw),
            0x5A => Some(Self::ZLib),
            0x45 => Some(Self::Encrypted),
            _ => None,
        }
    }
}

/// Salsa20 marker in the encrypted block header.
const ENCRYPT_TYPE_SALSA20: u8 = 0x53;

#[derive(Debug, Clone, Copy)]
struct BlockInfo {
    comp_size: usize,
    decomp_size: usize,
    /// `None` for the all-zero sentinel, which disables verification.
    hash: Option<[u8; 16]>,
}

/// A verified BLTE container ready to decode.
///
/// Construction parses the block table and checks the container MD5
/// against the encoding key; nothing inside a block is inspected until
/// [`decode`](BlteReader::decode).
pub struct BlteReader {
    data: Vec<u8>,
    blocks: Vec<BlockInfo>,
    data_start: usize,
    partial: bool,
    zlib_fallback: bool,
}

impl BlteReader {
    /// Parse a raw container. `expected` is the encoding key of the
    /// payload, which must equal the MD5 of the header (or of the entire
    /// container when there is no block table). With `partial` set,
    /// encrypted blocks whose key is absent decode to zeros instead of
    /// failing.
    pub fn new(data: Vec<u8>, expected: &EncodingKey, partial: bool) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Truncated {
                expected: 8,
                actual: data.len(),
            });
        }

        let mut cur = ByteCursor::new(&data);
        let magic = cur.u32_le("magic").map_err(map_truncated)?;
        if magic != BLTE_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        let header_size = cur.u32_be("headerSize").map_err(map_truncated)? as usize;

        // Integrity of the header is checked before any block is parsed.
        let hashed = if header_size > 0 {
            data.get(..header_size).ok_or(Error::Truncated {
                expected: header_size,
                actual: data.len(),
            })?
        } else {
            &data[..]
        };
        let digest = md5::compute(hashed);
        if digest.0 != *expected.as_bytes() {
            return Err(Error::ChecksumMismatch {
                expected: expected.to_hex(),
                actual: hex::encode(digest.0),
            });
        }

        let blocks = if header_size == 0 {
            // Implicit single block: the remainder of the container, with
            // the mode byte accounting for the one-byte difference.
            vec![BlockInfo {
                comp_size: data.len() - 8,
                decomp_size: data.len().saturating_sub(9),
                hash: None,
            }]
        } else {
            let fc0 = cur.u8("frameControl").map_err(map_truncated)?;
            let num_blocks = {
                let b1 = cur.u8("numBlocks").map_err(map_truncated)? as usize;
                let b2 = cur.u8("numBlocks").map_err(map_truncated)? as usize;
                let b3 = cur.u8("numBlocks").map_err(map_truncated)? as usize;
                (b1 << 16) | (b2 << 8) | b3
            };
            if fc0 != 0x0F || num_blocks == 0 {
                return Err(Error::InvalidBlockTable("frameControl"));
            }
            if header_size != 24 * num_blocks + 12 {
                return Err(Error::InvalidHeaderSize(header_size as u32));
            }
            if data.len() < header_size {
                return Err(Error::Truncated {
                    expected: header_size,
                    actual: data.len(),
                });
            }

            let mut blocks = Vec::with_capacity(num_blocks);
            for _ in 0..num_blocks {
                let comp_size = cur.u32_be("compSize").map_err(map_truncated)? as usize;
                let decomp_size = cur.u32_be("decompSize").map_err(map_truncated)? as usize;
                let hash: [u8; 16] = cur.array("blockHash").map_err(map_truncated)?;
                blocks.push(BlockInfo {
                    comp_size,
                    decomp_size,
                    hash: (hash != [0u8; 16]).then_some(hash),
                });
            }
            blocks
        };

        Ok(Self {
            data,
            blocks,
            data_start: if header_size == 0 { 8 } else { header_size },
            partial,
            zlib_fallback: true,
        })
    }

    /// Toggle the raw-copy fallback for zlib blocks that fail to inflate.
    /// On by default: it matches containers observed in the wild, though it
    /// is not part of the documented format.
    pub fn with_zlib_fallback(mut self, enabled: bool) -> Self {
        self.zlib_fallback = enabled;
        self
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total declared decompressed size across all blocks.
    pub fn decompressed_size(&self) -> usize {
        self.blocks.iter().map(|b| b.decomp_size).sum()
    }

    /// Decode every block in order into one contiguous buffer.
    pub fn decode(&self, keyring: &TactKeyring) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.decompressed_size()];
        let mut pos = self.data_start;
        let mut write = 0;

        for (index, block) in self.blocks.iter().enumerate() {
            let end = pos + block.comp_size;
            let bytes = self.data.get(pos..end).ok_or(Error::Truncated {
                expected: end,
                actual: self.data.len(),
            })?;

            if let Some(expected) = block.hash {
                let digest = md5::compute(bytes);
                if digest.0 != expected {
                    return Err(Error::ChecksumMismatch {
                        expected: hex::encode(expected),
                        actual: hex::encode(digest.0),
                    });
                }
            }

            self.handle_block(bytes, index, &mut out[write..write + block.decomp_size], keyring)?;
            pos = end;
            write += block.decomp_size;
        }

        Ok(out)
    }

    /// Decode one block into its output window. Encrypted blocks recurse
    /// into the decrypted inner block with the same window and index.
    fn handle_block(
        &self,
        block: &[u8],
        index: usize,
        out: &mut [u8],
        keyring: &TactKeyring,
    ) -> Result<()> {
        let Some((&mode_byte, body)) = block.split_first() else {
            return Err(Error::Truncated {
                expected: 1,
                actual: 0,
            });
        };
        let mode = BlockMode::from_byte(mode_byte)
            .ok_or(Error::UnsupportedBlockMode(mode_byte))?;
        trace!(?mode, index, len = block.len(), "decoding block");

        match mode {
            BlockMode::Raw => {
                copy_into(out, body);
                Ok(())
            }
            BlockMode::ZLib => {
                let mut decoder = ZlibDecoder::new(body);
                let mut inflated = Vec::with_capacity(out.len());
                match decoder.read_to_end(&mut inflated) {
                    Ok(_) => {
                        copy_into(out, &inflated);
                        Ok(())
                    }
                    Err(e) if self.zlib_fallback => {
                        warn!(index, "zlib inflate failed, copying block raw: {e}");
                        copy_into(out, body);
                        Ok(())
                    }
                    Err(e) => Err(Error::Inflate(e.to_string())),
                }
            }
            BlockMode::Encrypted => match self.decrypt_block(body, index, keyring) {
                Ok(inner) => self.handle_block(&inner, index, out, keyring),
                Err(Error::MissingKey(name)) if self.partial => {
                    // Leave the window zeroed; the caller only wanted
                    // whatever plaintext was reachable.
                    trace!(index, key = %name, "skipping encrypted block without key");
                    Ok(())
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Strip the encryption envelope and return the inner block bytes.
    fn decrypt_block(&self, body: &[u8], index: usize, keyring: &TactKeyring) -> Result<Vec<u8>> {
        let mut cur = ByteCursor::new(body);

        let key_name_size = cur.u8("keyNameSize").map_err(map_encrypted)? as usize;
        if key_name_size != 8 {
            return Err(Error::InvalidEncryptedBlock("keyNameSize"));
        }
        // The key name is stored byte-reversed.
        let mut name_bytes = cur.slice(key_name_size, "keyName").map_err(map_encrypted)?;
        name_bytes.reverse();
        let key_name = hex::encode(&name_bytes);

        let iv_size = cur.u8("ivSize").map_err(map_encrypted)? as usize;
        if iv_size != 4 && iv_size != 8 {
            return Err(Error::InvalidEncryptedBlock("ivSize"));
        }
        let mut iv = cur.slice(iv_size, "iv").map_err(map_encrypted)?;
        let encrypt_type = cur.u8("encryptType").map_err(map_encrypted)?;
        if encrypt_type != ENCRYPT_TYPE_SALSA20 {
            return Err(Error::UnsupportedEncryptionType(encrypt_type));
        }

        // The low IV bytes are combined with the block index so every
        // block keys a distinct stream.
        for (i, iv_byte) in iv.iter_mut().take(4).enumerate() {
            *iv_byte ^= ((index >> (8 * i)) & 0xFF) as u8;
        }

        let Some(key) = keyring.get(&key_name) else {
            return Err(Error::MissingKey(key_name));
        };

        let mut nonce = [0u8; 8];
        nonce[..iv.len()].copy_from_slice(&iv);
        let mut cipher = Salsa20::new(key, nonce)?;
        Ok(cipher.process(&body[cur.offset()..]))
    }
}

/// Copy as many bytes as fit; shorter sources leave the tail zeroed, which
/// mirrors how undersized raw fallbacks behave.
fn copy_into(out: &mut [u8], src: &[u8]) {
    let n = out.len().min(src.len());
    out[..n].copy_from_slice(&src[..n]);
}

fn map_truncated(_: casc_formats::Error) -> Error {
    Error::InvalidBlockTable("header")
}

fn map_encrypted(_: casc_formats::Error) -> Error {
    Error::InvalidEncryptedBlock("header")
}

/// Parse and decode a container in one step.
pub fn decode_blte(
    data: Vec<u8>,
    expected: &EncodingKey,
    keyring: &TactKeyring,
    partial: bool,
) -> Result<Vec<u8>> {
    BlteReader::new(data, expected, partial)?.decode(keyring)
}
