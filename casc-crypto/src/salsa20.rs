//! Salsa20 stream cipher as deployed for BLTE block encryption.
//!
//! TACT's variant differs from a stock implementation in one respect:
//! 16-byte keys are duplicated to 32 bytes but keep the `"expand 32-byte k"`
//! constants, while 32-byte keys get the `"expand 16-byte k"` constants.
//! The constant row is selected by the key length *before* expansion. The
//! RustCrypto `salsa20` crate only accepts 32-byte keys with fixed
//! constants, so the keystream is implemented here.

use crate::error::CryptoError;
use crate::Result;

/// `"expand 32-byte k"` as four little-endian words.
const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];
/// `"expand 16-byte k"` as four little-endian words.
const TAU: [u32; 4] = [0x6170_7865, 0x3120_646e, 0x7962_2d36, 0x6b20_6574];

const ROUNDS: usize = 20;
const BLOCK_LENGTH: usize = 64;

/// Salsa20 keystream generator with an 8-byte nonce and a 64-bit block
/// counter starting at zero.
pub struct Salsa20 {
    constants: [u32; 4],
    key_words: [u32; 8],
    nonce_words: [u32; 2],
    counter: u64,
    block: [u8; BLOCK_LENGTH],
    block_used: usize,
}

impl Salsa20 {
    /// Create a cipher from a 16- or 32-byte key and an 8-byte nonce.
    pub fn new(key: &[u8], nonce: [u8; 8]) -> Result<Self> {
        let (constants, expanded) = match key.len() {
            32 => {
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                (TAU, k)
            }
            16 => {
                let mut k = [0u8; 32];
                k[..16].copy_from_slice(key);
                k[16..].copy_from_slice(key);
                (SIGMA, k)
            }
            n => return Err(CryptoError::InvalidKeyLength(n)),
        };

        let mut key_words = [0u32; 8];
        for (i, chunk) in expanded.chunks_exact(4).enumerate() {
            key_words[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let nonce_words = [
            u32::from_le_bytes([nonce[0], nonce[1], nonce[2], nonce[3]]),
            u32::from_le_bytes([nonce[4], nonce[5], nonce[6], nonce[7]]),
        ];

        Ok(Self {
            constants,
            key_words,
            nonce_words,
            counter: 0,
            block: [0u8; BLOCK_LENGTH],
            block_used: BLOCK_LENGTH,
        })
    }

    /// Rewind the block counter to zero.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.block_used = BLOCK_LENGTH;
    }

    /// XOR `buf` with the keystream, returning the processed bytes. A
    /// stream cipher is its own inverse: processing twice from the same
    /// counter position yields the input.
    pub fn process(&mut self, buf: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(buf.len());
        for &byte in buf {
            if self.block_used == BLOCK_LENGTH {
                self.generate_block();
                self.counter = self.counter.wrapping_add(1);
                self.block_used = 0;
            }
            out.push(byte ^ self.block[self.block_used]);
            self.block_used += 1;
        }
        out
    }

    fn generate_block(&mut self) {
        let input: [u32; 16] = [
            self.constants[0],
            self.key_words[0],
            self.key_words[1],
            self.key_words[2],
            self.key_words[3],
            self.constants[1],
            self.nonce_words[0],
            self.nonce_words[1],
            self.counter as u32,
            (self.counter >> 32) as u32,
            self.constants[2],
            self.key_words[4],
            self.key_words[5],
            self.key_words[6],
            self.key_words[7],
            self.constants[3],
        ];

        let mut x = input;
        for _ in (0..ROUNDS).step_by(2) {
            // Column round.
            quarter_round(&mut x, 0, 4, 8, 12);
            quarter_round(&mut x, 5, 9, 13, 1);
            quarter_round(&mut x, 10, 14, 2, 6);
            quarter_round(&mut x, 15, 3, 7, 11);
            // Row round.
            quarter_round(&mut x, 0, 1, 2, 3);
            quarter_round(&mut x, 5, 6, 7, 4);
            quarter_round(&mut x, 10, 11, 8, 9);
            quarter_round(&mut x, 15, 12, 13, 14);
        }

        for (i, word) in x.iter().enumerate() {
            let value = word.wrapping_add(input[i]);
            self.block[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

#[inline]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_row_follows_pre_expansion_key_length() {
        // An all-zero 16-byte key duplicates to the same 32 bytes as an
        // all-zero 32-byte key; only the constant row differs, so the
        // keystreams must diverge from the first block.
        let mut long = Salsa20::new(&[0u8; 32], [0u8; 8]).unwrap();
        let mut short = Salsa20::new(&[0u8; 16], [0u8; 8]).unwrap();
        assert_ne!(long.process(&[0u8; 64]), short.process(&[0u8; 64]));
    }

    #[test]
    fn process_is_involutive_after_reset() {
        let key = [0x42u8; 16];
        let nonce = [1, 2, 3, 4, 5, 6, 7, 8];
        let plaintext: Vec<u8> = (0..200u16).map(|i| (i % 251) as u8).collect();

        let mut cipher = Salsa20::new(&key, nonce).unwrap();
        let encrypted = cipher.process(&plaintext);
        assert_ne!(encrypted, plaintext);

        cipher.reset();
        assert_eq!(cipher.process(&encrypted), plaintext);
    }

    #[test]
    fn fresh_instance_decrypts() {
        let key = [0xA5u8; 32];
        let nonce = [9, 8, 7, 6, 5, 4, 3, 2];
        let plaintext = b"spanning more than one 64-byte keystream block to cover the counter increment path";

        let mut enc = Salsa20::new(&key, nonce).unwrap();
        let ciphertext = enc.process(plaintext);

        let mut dec = Salsa20::new(&key, nonce).unwrap();
        assert_eq!(dec.process(&ciphertext), plaintext);
    }

    #[test]
    fn split_processing_matches_one_shot() {
        let key = [0x11u8; 16];
        let nonce = [0u8; 8];
        let data = [0xAAu8; 100];

        let mut one_shot = Salsa20::new(&key, nonce).unwrap();
        let expected = one_shot.process(&data);

        let mut split = Salsa20::new(&key, nonce).unwrap();
        let mut got = split.process(&data[..33]);
        got.extend(split.process(&data[33..]));
        assert_eq!(got, expected);
    }

    #[test]
    fn nonce_changes_keystream() {
        let key = [0x77u8; 16];
        let mut a = Salsa20::new(&key, [0u8; 8]).unwrap();
        let mut b = Salsa20::new(&key, [1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_ne!(a.process(&[0u8; 16]), b.process(&[0u8; 16]));
    }

    #[test]
    fn rejects_bad_key_lengths() {
        assert!(matches!(
            Salsa20::new(&[0u8; 15], [0u8; 8]),
            Err(CryptoError::InvalidKeyLength(15))
        ));
        assert!(Salsa20::new(&[0u8; 24], [0u8; 8]).is_err());
        assert!(Salsa20::new(&[], [0u8; 8]).is_err());
    }
}
