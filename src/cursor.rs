//! Bounded byte-slice cursor used by the hand-rolled page/block codecs.
//!
//! The original source passes around a raw `char*` and a `size_t` cursor
//! that the caller is responsible for keeping in bounds. This is the
//! memory-safe replacement design note §9 calls for: a cursor over a fixed
//! buffer that returns `PageOverflow`/`CorruptedBlock` instead of reading or
//! writing out of bounds.

use crate::errors::{IndexerError, IndexerResult};

/// A write cursor over a fixed-size buffer.
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn ensure_room(&self, n: usize) -> IndexerResult<()> {
        if self.pos + n > self.buf.len() {
            return Err(IndexerError::PageOverflow);
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> IndexerResult<()> {
        self.ensure_room(data.len())?;
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> IndexerResult<()> {
        self.write_bytes(&[v])
    }

    pub fn write_u16(&mut self, v: u16) -> IndexerResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> IndexerResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> IndexerResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_hash(&mut self, h: &[u8; 32]) -> IndexerResult<()> {
        self.write_bytes(h)
    }

    /// Writes `bytes.len()` as a u64 length prefix followed by the bytes.
    pub fn write_sized_bytes(&mut self, bytes: &[u8]) -> IndexerResult<()> {
        self.write_u64(bytes.len() as u64)?;
        self.write_bytes(bytes)
    }

    /// Zero-fills the remainder of the buffer.
    pub fn pad_to_end(&mut self) {
        for b in &mut self.buf[self.pos..] {
            *b = 0;
        }
        self.pos = self.buf.len();
    }
}

/// A read cursor over a fixed-size buffer.
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> IndexerResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(IndexerError::CorruptedBlock(format!(
                "read past end of buffer: pos={}, n={}, len={}",
                self.pos,
                n,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> IndexerResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> IndexerResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> IndexerResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> IndexerResult<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_hash(&mut self) -> IndexerResult<[u8; 32]> {
        let b = self.take(32)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(b);
        Ok(arr)
    }

    pub fn read_bytes(&mut self, n: usize) -> IndexerResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Reads a u64 length prefix followed by that many bytes.
    pub fn read_sized_bytes(&mut self) -> IndexerResult<Vec<u8>> {
        let len = self.read_u64()? as usize;
        self.read_bytes(len)
    }
}
