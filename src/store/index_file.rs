//! `IndexBlock`, `LookupBlock`, and the `IndexFile` record: the two-level
//! on-disk index a flushed page file is searched through.

use std::path::PathBuf;

use crate::cursor::{ReadCursor, WriteCursor};
use crate::errors::{IndexerError, IndexerResult};
use crate::page_key::PageKey;

pub const BLOCK_SIZE: usize = 12288;

fn serialize_entries(entries: &[(PageKey, u64)]) -> IndexerResult<[u8; BLOCK_SIZE]> {
    let mut buf = [0u8; BLOCK_SIZE];
    {
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.write_u32(entries.len() as u32)?;
        for (key, pos) in entries {
            key.serialize_to(&mut cursor)?;
            cursor.write_u64(*pos)?;
        }
        cursor.pad_to_end();
    }
    Ok(buf)
}

fn deserialize_entries(buf: &[u8]) -> IndexerResult<Vec<(PageKey, u64)>> {
    if buf.len() != BLOCK_SIZE {
        return Err(IndexerError::CorruptedBlock(format!(
            "expected block of {BLOCK_SIZE} bytes, got {}",
            buf.len()
        )));
    }
    let mut cursor = ReadCursor::new(buf);
    let count = cursor.read_u32()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = PageKey::deserialize_from(&mut cursor)?;
        let pos = cursor.read_u64()?;
        entries.push((key, pos));
    }
    Ok(entries)
}

/// A 12 KiB on-disk block of `(PageKey -> file_offset)` mappings, sorted
/// ascending by `PageKey`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBlock {
    pub entries: Vec<(PageKey, u64)>,
}

impl IndexBlock {
    pub fn new() -> Self {
        Self::default()
    }

    fn encoded_size(&self) -> usize {
        4 + self
            .entries
            .iter()
            .map(|(k, _)| k.encoded_len() + 8)
            .sum::<usize>()
    }

    pub fn fits(&self, key: &PageKey) -> bool {
        self.encoded_size() + key.encoded_len() + 8 <= BLOCK_SIZE
    }

    pub fn push(&mut self, key: PageKey, file_offset: u64) -> IndexerResult<()> {
        if !self.fits(&key) {
            return Err(IndexerError::CorruptedBlock(
                "index block exceeds declared capacity".into(),
            ));
        }
        self.entries.push((key, file_offset));
        Ok(())
    }

    pub fn first_key(&self) -> Option<&PageKey> {
        self.entries.first().map(|(k, _)| k)
    }

    /// Linear scan for exact PageKey equality.
    pub fn find(&self, key: &PageKey) -> Option<u64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, offset)| *offset)
    }

    pub fn serialize(&self) -> IndexerResult<[u8; BLOCK_SIZE]> {
        serialize_entries(&self.entries)
    }

    pub fn deserialize(buf: &[u8]) -> IndexerResult<Self> {
        Ok(Self {
            entries: deserialize_entries(buf)?,
        })
    }
}

/// A 12 KiB block of `(first_pagekey_of_index_block -> index_block_offset)`
/// entries, placed as the last block of an index file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupBlock {
    pub entries: Vec<(PageKey, u64)>,
}

impl LookupBlock {
    pub fn new() -> Self {
        Self::default()
    }

    fn encoded_size(&self) -> usize {
        4 + self
            .entries
            .iter()
            .map(|(k, _)| k.encoded_len() + 8)
            .sum::<usize>()
    }

    pub fn fits(&self, key: &PageKey) -> bool {
        self.encoded_size() + key.encoded_len() + 8 <= BLOCK_SIZE
    }

    pub fn push(&mut self, first_pagekey: PageKey, index_block_offset: u64) -> IndexerResult<()> {
        if !self.fits(&first_pagekey) {
            return Err(IndexerError::CorruptedBlock(
                "lookup block exceeds declared capacity".into(),
            ));
        }
        self.entries.push((first_pagekey, index_block_offset));
        Ok(())
    }

    /// Finds the greatest entry `<= key` (an `upper_bound - 1` search; spec
    /// §4.4 `pageLookup` step 3). Entries must already be sorted ascending.
    pub fn floor(&self, key: &PageKey) -> Option<u64> {
        match self.entries.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(idx) => Some(self.entries[idx].1),
            Err(0) => None,
            Err(idx) => Some(self.entries[idx - 1].1),
        }
    }

    pub fn serialize(&self) -> IndexerResult<[u8; BLOCK_SIZE]> {
        serialize_entries(&self.entries)
    }

    pub fn deserialize(buf: &[u8]) -> IndexerResult<Self> {
        Ok(Self {
            entries: deserialize_entries(buf)?,
        })
    }
}

/// On-disk record of one flushed index file: the `PageKey` range it covers
/// and where it lives.
#[derive(Debug, Clone)]
pub struct IndexFile {
    pub min_pagekey: PageKey,
    pub max_pagekey: PageKey,
    pub path: PathBuf,
}

impl IndexFile {
    pub fn covers(&self, key: &PageKey) -> bool {
        &self.min_pagekey <= key && key <= &self.max_pagekey
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_key::PageType;

    #[test]
    fn index_block_round_trips() {
        let mut block = IndexBlock::new();
        block
            .push(PageKey::new(1, 0, PageType::Base, "ab"), 0)
            .unwrap();
        block
            .push(PageKey::new(2, 0, PageType::Base, "ac"), 4096)
            .unwrap();
        let bytes = block.serialize().unwrap();
        assert_eq!(bytes.len(), BLOCK_SIZE);
        let decoded = IndexBlock::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(block.find(&PageKey::new(2, 0, PageType::Base, "ac")), Some(4096));
        assert_eq!(block.find(&PageKey::new(9, 0, PageType::Base, "zz")), None);
    }

    #[test]
    fn lookup_block_floor_finds_greatest_entry_leq_key() {
        let mut block = LookupBlock::new();
        block
            .push(PageKey::new(1, 0, PageType::Base, "aa"), 0)
            .unwrap();
        block
            .push(PageKey::new(1, 0, PageType::Base, "cc"), BLOCK_SIZE as u64)
            .unwrap();

        assert_eq!(block.floor(&PageKey::new(1, 0, PageType::Base, "bb")), Some(0));
        assert_eq!(
            block.floor(&PageKey::new(1, 0, PageType::Base, "dd")),
            Some(BLOCK_SIZE as u64)
        );
        assert_eq!(block.floor(&PageKey::new(1, 0, PageType::Base, "aa")), Some(0));
        assert_eq!(block.floor(&PageKey::new(1, 0, PageType::Base, "a0")), None);
    }
}
