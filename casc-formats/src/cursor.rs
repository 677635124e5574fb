//! Sequential typed reader over an immutable byte slice.
//!
//! Endianness is per-field, never per-cursor; the table formats freely mix
//! little- and big-endian integers within one header. Every read takes the
//! name of the field being read so an out-of-range access reports what the
//! parser was after, not just an offset.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Cursor over a borrowed byte slice. Reads advance the offset; [`seek`]
/// repositions it absolutely.
///
/// [`seek`]: ByteCursor::seek
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Total length of the underlying slice.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the offset and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Set the offset absolutely. Seeking to `len` is allowed (EOF).
    pub fn seek(&mut self, pos: usize, field: &'static str) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::malformed(field));
        }
        self.offset = pos;
        Ok(())
    }

    /// Advance the offset by `n` without reading.
    pub fn skip(&mut self, n: usize, field: &'static str) -> Result<()> {
        let pos = self
            .offset
            .checked_add(n)
            .ok_or(Error::malformed(field))?;
        self.seek(pos, field)
    }

    /// Borrow the next `n` bytes and advance.
    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::malformed(field));
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    /// Read `n` bytes into a fresh owned buffer.
    pub fn slice(&mut self, n: usize, field: &'static str) -> Result<Vec<u8>> {
        Ok(self.take(n, field)?.to_vec())
    }

    /// Read `N` bytes into a fixed array.
    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// Read `n` bytes as a lowercase hex string.
    pub fn hex(&mut self, n: usize, field: &'static str) -> Result<String> {
        Ok(hex::encode(self.take(n, field)?))
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8> {
        let mut b = self.take(1, field)?;
        b.read_u8().map_err(|_| Error::malformed(field))
    }

    pub fn u16_le(&mut self, field: &'static str) -> Result<u16> {
        let mut b = self.take(2, field)?;
        b.read_u16::<LittleEndian>().map_err(|_| Error::malformed(field))
    }

    pub fn u16_be(&mut self, field: &'static str) -> Result<u16> {
        let mut b = self.take(2, field)?;
        b.read_u16::<BigEndian>().map_err(|_| Error::malformed(field))
    }

    pub fn u32_le(&mut self, field: &'static str) -> Result<u32> {
        let mut b = self.take(4, field)?;
        b.read_u32::<LittleEndian>().map_err(|_| Error::malformed(field))
    }

    pub fn u32_be(&mut self, field: &'static str) -> Result<u32> {
        let mut b = self.take(4, field)?;
        b.read_u32::<BigEndian>().map_err(|_| Error::malformed(field))
    }

    pub fn i32_le(&mut self, field: &'static str) -> Result<i32> {
        let mut b = self.take(4, field)?;
        b.read_i32::<LittleEndian>().map_err(|_| Error::malformed(field))
    }

    pub fn i32_be(&mut self, field: &'static str) -> Result<i32> {
        let mut b = self.take(4, field)?;
        b.read_i32::<BigEndian>().map_err(|_| Error::malformed(field))
    }

    /// Read a 40-bit big-endian unsigned integer.
    pub fn u40_be(&mut self, field: &'static str) -> Result<u64> {
        let mut b = self.take(5, field)?;
        b.read_uint::<BigEndian>(5).map_err(|_| Error::malformed(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_endian_reads() {
        let data = [
            0x01, // u8
            0x02, 0x03, // u16le = 0x0302
            0x04, 0x05, // u16be = 0x0405
            0xDE, 0xAD, 0xBE, 0xEF, // u32be
            0xEF, 0xBE, 0xAD, 0xDE, // u32le
        ];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.u8("a").unwrap(), 1);
        assert_eq!(cur.u16_le("b").unwrap(), 0x0302);
        assert_eq!(cur.u16_be("c").unwrap(), 0x0405);
        assert_eq!(cur.u32_be("d").unwrap(), 0xDEADBEEF);
        assert_eq!(cur.u32_le("e").unwrap(), 0xDEADBEEF);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn u40_be() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.u40_be("size").unwrap(), 0x0102030405);
    }

    #[test]
    fn hex_and_slice_advance() {
        let data = [0xAB, 0xCD, 0x01, 0x02];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.hex(2, "key").unwrap(), "abcd");
        assert_eq!(cur.slice(2, "rest").unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn out_of_range_reports_field() {
        let mut cur = ByteCursor::new(&[0x00]);
        let err = cur.u32_le("numBlocks").unwrap_err();
        assert!(matches!(err, Error::Malformed { field: "numBlocks" }));
        // Offset is unchanged after a failed read.
        assert_eq!(cur.offset(), 0);
    }

    #[test]
    fn seek_and_skip_bounds() {
        let mut cur = ByteCursor::new(&[0u8; 8]);
        cur.seek(8, "end").unwrap();
        assert_eq!(cur.remaining(), 0);
        assert!(cur.seek(9, "past").is_err());
        cur.seek(0, "start").unwrap();
        cur.skip(4, "pad").unwrap();
        assert_eq!(cur.offset(), 4);
        assert!(cur.skip(5, "pad").is_err());
    }
}
