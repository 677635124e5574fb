//! Content and encoding key newtypes.
//!
//! Both are 16-byte MD5-shaped addresses; keeping them as distinct types
//! stops a content key from ever being handed to an archive lookup.

use std::fmt;

use crate::error::{Error, Result};
use crate::KEY_LENGTH;

/// Number of bytes of an encoding key the local journal retains.
pub const TRUNCATED_KEY_LENGTH: usize = 9;

macro_rules! key_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; KEY_LENGTH]);

        impl $name {
            pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; KEY_LENGTH] = bytes.try_into().ok()?;
                Some(Self(arr))
            }

            /// Parse from 32 hex characters (either case).
            pub fn from_hex(s: &str) -> Result<Self> {
                let mut out = [0u8; KEY_LENGTH];
                hex::decode_to_slice(s, &mut out)
                    .map_err(|_| Error::InvalidKey(s.to_string()))?;
                Ok(Self(out))
            }

            pub const fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub const fn is_zero(&self) -> bool {
                let mut i = 0;
                while i < KEY_LENGTH {
                    if self.0[i] != 0 {
                        return false;
                    }
                    i += 1;
                }
                true
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for b in &self.0 {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    };
}

key_type!(ContentKey, "Content address used by the root table.");
key_type!(
    EncodingKey,
    "Physical address used by the encoding and archive tables, and as the BLTE outer hash."
);

impl EncodingKey {
    /// The 9-byte prefix the local journal indexes by.
    pub fn truncated(&self) -> [u8; TRUNCATED_KEY_LENGTH] {
        let mut out = [0u8; TRUNCATED_KEY_LENGTH];
        out.copy_from_slice(&self.0[..TRUNCATED_KEY_LENGTH]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let key = EncodingKey::from_hex("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(key.to_hex(), "000102030405060708090a0b0c0d0e0f");
        assert_eq!(key.to_string(), key.to_hex());
        assert_eq!(key.as_bytes()[9], 0x09);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(ContentKey::from_hex("zz").is_err());
        assert!(ContentKey::from_hex("0001").is_err());
    }

    #[test]
    fn truncation() {
        let key = EncodingKey::from_hex("0102030405060708090a0b0c0d0e0f10").unwrap();
        assert_eq!(
            key.truncated(),
            [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09]
        );
    }

    #[test]
    fn zero_sentinel() {
        assert!(EncodingKey::new([0u8; 16]).is_zero());
        assert!(!EncodingKey::new([1u8; 16]).is_zero());
    }
}
